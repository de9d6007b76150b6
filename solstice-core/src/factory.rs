//! Piece instantiation: activate a definition, wrap it in its normalization
//! gain, and start its first session.

use solstice_types::PieceId;

use solstice_audio::{Node, NodeSpec};

use crate::piece::{ActivePiece, PieceEnv, SessionHandle};
use crate::pieces;

/// One running piece: its activated state, the per-piece gain stage every
/// session plays through, and the current session.
pub struct PieceInstance {
    id: PieceId,
    active: Box<dyn ActivePiece>,
    gain: Node,
    session: SessionHandle,
}

impl PieceInstance {
    /// Activate the piece named by `id` and start its first session into
    /// `destination`. The normalization gain sits between the piece and the
    /// destination for the instance's whole lifetime.
    pub fn create(id: &PieceId, env: &PieceEnv, destination: &Node) -> Result<Self, String> {
        let def = pieces::by_id(id).ok_or_else(|| format!("unknown piece `{}`", id))?;
        let mut active = (def.activate)(env)?;

        // Anything failing past activation unwinds what activation built
        // before reporting.
        let gain = match env.engine.create(NodeSpec::Volume { db: def.gain_db }) {
            Ok(gain) => gain,
            Err(e) => {
                if let Err(e2) = active.deactivate() {
                    log::warn!(target: "factory", "cleanup after failed start: {}", e2);
                }
                return Err(e);
            }
        };
        let session = gain
            .connect(destination)
            .and_then(|_| active.schedule(&gain));
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                if let Err(e2) = active.deactivate() {
                    log::warn!(target: "factory", "cleanup after failed start: {}", e2);
                }
                if let Err(e2) = gain.dispose() {
                    log::warn!(target: "factory", "cleanup after failed start: {}", e2);
                }
                return Err(e);
            }
        };

        Ok(Self {
            id: id.clone(),
            active,
            gain,
            session,
        })
    }

    pub fn id(&self) -> &PieceId {
        &self.id
    }

    /// Stop the current session. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Start a fresh session after a stop. A no-op error if the current
    /// session is still running.
    pub fn reschedule(&mut self) -> Result<(), String> {
        if !self.session.is_stopped() {
            return Err(format!("piece `{}` is already playing", self.id));
        }
        self.session = self.active.schedule(&self.gain)?;
        Ok(())
    }

    /// Tear the instance down completely: stop the session, then dispose
    /// the activated graph and the gain stage.
    pub fn deactivate(&mut self) -> Result<(), String> {
        self.session.stop();
        let mut failures = Vec::new();
        if let Err(e) = self.active.deactivate() {
            failures.push(e);
        }
        if let Err(e) = self.gain.dispose() {
            failures.push(e);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use solstice_audio::{
        AudioBackend, AudioBuffer, AudioEngine, BackendError, BackendResult, MemoryLibrary,
        NodeId, RenderOptions, SampleSet, TestBackend, TestOp,
    };
    use solstice_types::Note;

    use super::*;
    use crate::cache::PrerenderCache;
    use crate::rng::Rng;
    use crate::transport::Transport;

    fn env() -> (Arc<TestBackend>, PieceEnv) {
        let backend = Arc::new(TestBackend::new());
        let engine = AudioEngine::new(backend.clone() as Arc<dyn AudioBackend>);
        let library = MemoryLibrary::new();
        let mut piano = SampleSet::new();
        for note in ["C3", "C4", "C5"] {
            piano.insert(note, AudioBuffer::silent(44100, 0.1));
        }
        library.insert("grand-piano", piano);
        let library = Arc::new(library);
        let env = PieceEnv::new(
            engine,
            library.clone(),
            Arc::new(PrerenderCache::new(library)),
            Transport::new(),
            Rng::seeded(5),
        );
        (backend, env)
    }

    #[test]
    fn unknown_id_is_an_error() {
        let (_, env) = env();
        let Err(err) =
            PieceInstance::create(&PieceId::new("nonesuch"), &env, &env.engine.destination())
        else {
            panic!("nonexistent piece must not instantiate");
        };
        assert!(err.contains("nonesuch"));
    }

    #[test]
    fn create_wires_gain_to_destination() {
        let (backend, env) = env();
        let instance =
            PieceInstance::create(&PieceId::new("stratus"), &env, &env.engine.destination())
                .unwrap();
        assert_eq!(instance.id().as_str(), "stratus");
        assert_eq!(
            backend.count(|op| matches!(op, TestOp::CreateNode { kind, .. } if *kind == "volume")),
            1
        );
        assert!(backend.count(|op| matches!(op, TestOp::Connect { dest: 0, .. })) > 0);
    }

    #[test]
    fn stop_then_reschedule_yields_fresh_session() {
        let (backend, env) = env();
        let mut instance =
            PieceInstance::create(&PieceId::new("stratus"), &env, &env.engine.destination())
                .unwrap();
        assert!(instance.reschedule().is_err());

        instance.stop();
        assert_eq!(env.transport.pending(), 0);
        backend.clear();

        instance.reschedule().unwrap();
        assert!(env.transport.pending() > 0);
        env.transport.advance(120.0);
        assert!(backend.count(|op| matches!(op, TestOp::TriggerAttack { .. })) > 0);
    }

    /// Rejects volume creation; everything else records into the inner
    /// backend.
    struct NoVolumeBackend(TestBackend);

    impl AudioBackend for NoVolumeBackend {
        fn create_node(&self, node_id: NodeId, spec: &NodeSpec) -> BackendResult {
            if matches!(spec, NodeSpec::Volume { .. }) {
                return Err(BackendError("no volume nodes".into()));
            }
            self.0.create_node(node_id, spec)
        }

        fn connect(&self, source: NodeId, dest: NodeId) -> BackendResult {
            self.0.connect(source, dest)
        }

        fn free_node(&self, node_id: NodeId) -> BackendResult {
            self.0.free_node(node_id)
        }

        fn trigger_attack(
            &self,
            node_id: NodeId,
            note: Note,
            at: f64,
            velocity: f32,
        ) -> BackendResult {
            self.0.trigger_attack(node_id, note, at, velocity)
        }

        fn trigger_attack_release(
            &self,
            node_id: NodeId,
            note: Note,
            at: f64,
            duration: f64,
        ) -> BackendResult {
            self.0.trigger_attack_release(node_id, note, at, duration)
        }

        fn release_all(&self, node_id: NodeId, at: f64) -> BackendResult {
            self.0.release_all(node_id, at)
        }

        fn render(
            &self,
            source: &AudioBuffer,
            chain: &[NodeSpec],
            options: &RenderOptions,
        ) -> BackendResult<AudioBuffer> {
            self.0.render(source, chain, options)
        }
    }

    #[test]
    fn failed_gain_creation_unwinds_activation() {
        let backend = Arc::new(NoVolumeBackend(TestBackend::new()));
        let engine = AudioEngine::new(backend.clone() as Arc<dyn AudioBackend>);
        let library = MemoryLibrary::new();
        let mut piano = SampleSet::new();
        for note in ["C3", "C4", "C5"] {
            piano.insert(note, AudioBuffer::silent(44100, 0.1));
        }
        library.insert("grand-piano", piano);
        let library = Arc::new(library);
        let env = PieceEnv::new(
            engine,
            library.clone(),
            Arc::new(PrerenderCache::new(library)),
            Transport::new(),
            Rng::seeded(5),
        );

        let result = PieceInstance::create(&PieceId::new("stratus"), &env, &env.engine.destination());
        assert!(result.is_err());
        // The sampler built during activation was disposed on the way out.
        assert_eq!(env.engine.live_nodes(), 0);
        assert_eq!(backend.0.nodes_freed().len(), 1);
    }

    #[test]
    fn deactivate_releases_every_node() {
        let (_, env) = env();
        let mut instance =
            PieceInstance::create(&PieceId::new("stratus"), &env, &env.engine.destination())
                .unwrap();
        instance.deactivate().unwrap();
        assert_eq!(env.engine.live_nodes(), 0);
        assert_eq!(env.transport.pending(), 0);
    }
}
