//! The composer: a polling session manager over a live text source.
//!
//! The composer's input is a plain string (the *value*). Every line of the
//! form `p(<id>)` names a piece that should currently be playing; all other
//! lines are prose and ignored. On each reconcile tick the composer diffs
//! the named set against its running instances: newly named pieces are
//! activated and scheduled, no-longer-named pieces have their session
//! stopped and forgotten. Forgetting only halts playback: the instance's
//! prepared nodes are not released, and a later reappearance activates a
//! fresh instance (prerendered buffers stay resident in the cache, so the
//! expensive work is not repeated). Only `end` deactivates.

use std::collections::{BTreeSet, HashMap};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use regex::Regex;

use solstice_types::PieceId;

use solstice_audio::Node;

use crate::factory::PieceInstance;
use crate::piece::PieceEnv;

/// Lifecycle state of the composer as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    Stopped,
    Playing,
    /// Terminal. Every instance has been deactivated; the composer ignores
    /// further input.
    Ended,
}

pub struct Composer {
    env: PieceEnv,
    destination: Node,
    value: String,
    state: ComposerState,
    instances: HashMap<PieceId, PieceInstance>,
    piece_line: Option<Regex>,
}

impl Composer {
    pub fn new(env: PieceEnv, destination: Node) -> Self {
        // The pattern is a literal; the error arm only guards a typo.
        let piece_line = match Regex::new(r"^p\((.+)\)$") {
            Ok(re) => Some(re),
            Err(e) => {
                log::error!(target: "composer", "piece-line pattern: {}", e);
                None
            }
        };
        Self {
            env,
            destination,
            value: String::new(),
            state: ComposerState::Stopped,
            instances: HashMap::new(),
            piece_line,
        }
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    pub fn env(&self) -> &PieceEnv {
        &self.env
    }

    /// Replace the live text. Takes effect at the next reconcile tick.
    pub fn set_value(&mut self, value: String) {
        self.value = value;
    }

    /// The piece ids the current value names, deduplicated.
    fn desired(&self) -> BTreeSet<PieceId> {
        let Some(piece_line) = &self.piece_line else {
            return BTreeSet::new();
        };
        self.value
            .lines()
            .filter_map(|line| piece_line.captures(line.trim()))
            .filter_map(|caps| caps.get(1))
            .map(|m| PieceId::new(m.as_str()))
            .collect()
    }

    /// Start reconciling. Every held instance gets a fresh session; a play
    /// after a stop resumes without re-activation.
    pub fn play(&mut self) {
        match self.state {
            ComposerState::Ended => {
                log::warn!(target: "composer", "play ignored: composer has ended");
            }
            _ => {
                self.state = ComposerState::Playing;
                for instance in self.instances.values_mut() {
                    instance.stop();
                }
                self.tick();
            }
        }
    }

    /// Stop every running session but keep the activated instances, so a
    /// later play resumes without re-activation.
    pub fn stop(&mut self) {
        if self.state != ComposerState::Playing {
            return;
        }
        self.state = ComposerState::Stopped;
        for instance in self.instances.values_mut() {
            instance.stop();
        }
    }

    /// Terminal teardown: stop and deactivate everything.
    pub fn end(&mut self) {
        if self.state == ComposerState::Ended {
            return;
        }
        self.state = ComposerState::Ended;
        for (id, mut instance) in self.instances.drain() {
            if let Err(e) = instance.deactivate() {
                log::warn!(target: "composer", "deactivating `{}`: {}", id, e);
            }
        }
    }

    /// One reconcile pass: align running sessions with the value's named
    /// set. Does nothing unless playing.
    pub fn tick(&mut self) {
        if self.state != ComposerState::Playing {
            return;
        }
        let desired = self.desired();

        // Dropped ids are stopped and forgotten; their nodes stay allocated.
        self.instances.retain(|id, instance| {
            if desired.contains(id) {
                true
            } else {
                instance.stop();
                false
            }
        });

        for id in desired {
            match self.instances.get_mut(&id) {
                Some(instance) => {
                    // Already running sessions fall through untouched.
                    if let Err(e) = instance.reschedule() {
                        log::debug!(target: "composer", "{}", e);
                    }
                }
                None => match PieceInstance::create(&id, &self.env, &self.destination) {
                    Ok(instance) => {
                        log::info!(target: "composer", "piece `{}` started", id);
                        self.instances.insert(id, instance);
                    }
                    Err(e) => {
                        log::warn!(target: "composer", "starting `{}`: {}", id, e);
                    }
                },
            }
        }
    }
}

/// Commands accepted by the composer thread.
pub enum ComposerCmd {
    SetValue(String),
    Play,
    Stop,
    /// Terminal; the thread tears down and exits.
    End,
}

/// Handle to a running composer thread.
pub struct ComposerHandle {
    tx: Sender<ComposerCmd>,
    join: JoinHandle<()>,
}

impl ComposerHandle {
    pub fn send(&self, cmd: ComposerCmd) -> Result<(), String> {
        self.tx
            .send(cmd)
            .map_err(|_| "composer thread is gone".to_string())
    }

    /// End the composer and wait for the thread to exit.
    pub fn shutdown(self) -> Result<(), String> {
        let _ = self.tx.send(ComposerCmd::End);
        self.join
            .join()
            .map_err(|_| "composer thread panicked".to_string())
    }
}

/// Spawn the composer thread: advances the shared clock every
/// `tick_interval` of wall time and reconciles every `poll_interval`.
pub fn run_composer(
    mut composer: Composer,
    poll_interval: Duration,
    tick_interval: Duration,
) -> Result<ComposerHandle, String> {
    let (tx, rx) = crossbeam_channel::unbounded::<ComposerCmd>();
    let join = thread::Builder::new()
        .name("composer".into())
        .spawn(move || composer_loop(&mut composer, &rx, poll_interval, tick_interval))
        .map_err(|e| format!("failed to spawn composer thread: {}", e))?;
    Ok(ComposerHandle { tx, join })
}

fn composer_loop(
    composer: &mut Composer,
    rx: &Receiver<ComposerCmd>,
    poll_interval: Duration,
    tick_interval: Duration,
) {
    let mut last_advance = Instant::now();
    let mut last_poll = Instant::now();

    loop {
        let remaining = tick_interval.saturating_sub(last_advance.elapsed());
        crossbeam_channel::select! {
            recv(rx) -> result => {
                match result {
                    Ok(ComposerCmd::SetValue(value)) => composer.set_value(value),
                    Ok(ComposerCmd::Play) => composer.play(),
                    Ok(ComposerCmd::Stop) => composer.stop(),
                    Ok(ComposerCmd::End) | Err(_) => break,
                }
            }
            default(remaining) => {}
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_advance);
        if elapsed >= tick_interval {
            last_advance = now;
            // Scheduled callbacks run here, on this thread, so a reconcile
            // pass can never overlap a firing voice.
            composer.env.transport.advance(elapsed.as_secs_f64());
        }

        if last_poll.elapsed() >= poll_interval {
            last_poll = Instant::now();
            composer.tick();
        }
    }

    composer.end();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use solstice_audio::{
        AudioBackend, AudioBuffer, AudioEngine, MemoryLibrary, SampleSet, TestBackend, TestOp,
    };

    use super::*;
    use crate::cache::PrerenderCache;
    use crate::rng::Rng;
    use crate::transport::Transport;

    fn composer() -> (Arc<TestBackend>, Composer) {
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
            Rng::seeded(9),
        );
        let destination = env.engine.destination();
        (backend, Composer::new(env, destination))
    }

    #[test]
    fn value_lines_parse_to_piece_ids() {
        let (_, mut composer) = composer();
        composer.set_value(
            "late light on the water\np(stratus)\n\nnot a piece p(cairn)\np(cairn)\n".into(),
        );
        let desired = composer.desired();
        assert_eq!(
            desired.into_iter().collect::<Vec<_>>(),
            vec![PieceId::new("cairn"), PieceId::new("stratus")]
        );
    }

    #[test]
    fn unchanged_value_is_idempotent() {
        let (backend, mut composer) = composer();
        composer.set_value("p(stratus)".into());
        composer.play();
        let created = backend.count(|op| matches!(op, TestOp::CreateNode { .. }));
        composer.tick();
        composer.tick();
        assert_eq!(
            backend.count(|op| matches!(op, TestOp::CreateNode { .. })),
            created
        );
    }

    #[test]
    fn removed_piece_is_stopped_and_forgotten_without_deactivate() {
        let (backend, mut composer) = composer();
        composer.set_value("p(stratus)".into());
        composer.play();
        let live = composer.env.engine.live_nodes();

        composer.set_value(String::new());
        composer.tick();
        // Playback halted and the instance dropped, but its nodes stay
        // allocated: forgetting is not a deactivate.
        assert_eq!(composer.env.transport.pending(), 0);
        assert!(composer.instances.is_empty());
        assert_eq!(composer.env.engine.live_nodes(), live);
        assert_eq!(backend.count(|op| matches!(op, TestOp::FreeNode(_))), 0);

        // Reappearing builds a fresh instance on top.
        composer.set_value("p(stratus)".into());
        composer.tick();
        assert!(composer.env.transport.pending() > 0);
        assert_eq!(composer.instances.len(), 1);
        assert!(composer.env.engine.live_nodes() > live);
    }

    #[test]
    fn unknown_piece_is_logged_not_fatal() {
        let (_, mut composer) = composer();
        composer.set_value("p(nonesuch)\np(stratus)".into());
        composer.play();
        assert!(composer.env.transport.pending() > 0);
        assert_eq!(composer.instances.len(), 1);
    }

    #[test]
    fn empty_parens_name_no_piece() {
        let (_, mut composer) = composer();
        composer.set_value("p()".into());
        composer.play();
        assert!(composer.instances.is_empty());
    }

    #[test]
    fn stop_keeps_instances_play_resumes() {
        let (_, mut composer) = composer();
        composer.set_value("p(stratus)".into());
        composer.play();
        composer.stop();
        assert_eq!(composer.env.transport.pending(), 0);
        assert_eq!(composer.instances.len(), 1);

        composer.play();
        assert!(composer.env.transport.pending() > 0);
    }

    #[test]
    fn end_is_terminal() {
        let (_, mut composer) = composer();
        composer.set_value("p(stratus)".into());
        composer.play();
        composer.end();
        assert_eq!(composer.env.engine.live_nodes(), 0);
        assert_eq!(composer.state(), ComposerState::Ended);

        composer.play();
        composer.tick();
        assert!(composer.instances.is_empty());
        assert_eq!(composer.env.transport.pending(), 0);
    }
}
