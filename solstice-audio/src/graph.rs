//! Node graph handles: engine-side id allocation and cheap-clone node
//! references with idempotent dispose.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use solstice_types::Note;

use crate::backend::{AudioBackend, NodeId, NodeSpec, DESTINATION_NODE};

/// Shared handle over a backend plus id bookkeeping. Clones are cheap and
/// refer to the same engine.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    backend: Arc<dyn AudioBackend>,
    next_id: Mutex<NodeId>,
    live: Mutex<HashSet<NodeId>>,
}

impl AudioEngine {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                backend,
                next_id: Mutex::new(DESTINATION_NODE + 1),
                live: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.inner.backend
    }

    /// The backend's main output destination.
    pub fn destination(&self) -> Node {
        Node {
            id: DESTINATION_NODE,
            engine: self.clone(),
        }
    }

    /// Create a node from a spec, allocating its id.
    pub fn create(&self, spec: NodeSpec) -> Result<Node, String> {
        let id = {
            let mut next = self.inner.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        self.inner
            .backend
            .create_node(id, &spec)
            .map_err(|e| e.to_string())?;
        self.inner.live.lock().unwrap().insert(id);
        Ok(Node {
            id,
            engine: self.clone(),
        })
    }

    /// Create a sampler node.
    pub fn sampler(
        &self,
        buffers: crate::buffers::SampleSet,
        options: crate::backend::SamplerOptions,
    ) -> Result<Sampler, String> {
        let node = self.create(NodeSpec::Sampler { buffers, options })?;
        Ok(Sampler { node })
    }

    /// Number of live (created, not yet freed) nodes.
    pub fn live_nodes(&self) -> usize {
        self.inner.live.lock().unwrap().len()
    }

    fn dispose(&self, id: NodeId) -> Result<(), String> {
        if id == DESTINATION_NODE {
            return Ok(());
        }
        // Double-dispose is a no-op: deactivate must be safe to repeat.
        if !self.inner.live.lock().unwrap().remove(&id) {
            return Ok(());
        }
        self.inner.backend.free_node(id).map_err(|e| e.to_string())
    }
}

/// A reference to one node in the backend graph. Clones refer to the same
/// node.
#[derive(Clone)]
pub struct Node {
    id: NodeId,
    engine: AudioEngine,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn connect(&self, dest: &Node) -> Result<(), String> {
        self.engine
            .inner
            .backend
            .connect(self.id, dest.id)
            .map_err(|e| e.to_string())
    }

    /// Free the node. Idempotent; freeing an already-freed node is a no-op.
    pub fn dispose(&self) -> Result<(), String> {
        self.engine.dispose(self.id)
    }
}

/// A sampler node: per-note triggering over a sample set.
#[derive(Clone)]
pub struct Sampler {
    node: Node,
}

impl Sampler {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn connect(&self, dest: &Node) -> Result<(), String> {
        self.node.connect(dest)
    }

    pub fn trigger_attack(&self, note: Note, at: f64, velocity: f32) -> Result<(), String> {
        self.node
            .engine
            .inner
            .backend
            .trigger_attack(self.node.id, note, at, velocity)
            .map_err(|e| e.to_string())
    }

    pub fn trigger_attack_release(
        &self,
        note: Note,
        at: f64,
        duration: f64,
    ) -> Result<(), String> {
        self.node
            .engine
            .inner
            .backend
            .trigger_attack_release(self.node.id, note, at, duration)
            .map_err(|e| e.to_string())
    }

    pub fn release_all(&self, at: f64) -> Result<(), String> {
        self.node
            .engine
            .inner
            .backend
            .release_all(self.node.id, at)
            .map_err(|e| e.to_string())
    }

    pub fn dispose(&self) -> Result<(), String> {
        self.node.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{TestBackend, TestOp};

    fn engine() -> (Arc<TestBackend>, AudioEngine) {
        let backend = Arc::new(TestBackend::new());
        let engine = AudioEngine::new(backend.clone() as Arc<dyn AudioBackend>);
        (backend, engine)
    }

    #[test]
    fn ids_start_after_destination() {
        let (_, engine) = engine();
        let node = engine.create(NodeSpec::Compressor).unwrap();
        assert!(node.id() > DESTINATION_NODE);
    }

    #[test]
    fn dispose_is_idempotent() {
        let (backend, engine) = engine();
        let node = engine.create(NodeSpec::Gain { value: 1.0 }).unwrap();
        node.dispose().unwrap();
        node.dispose().unwrap();
        node.dispose().unwrap();
        assert_eq!(backend.nodes_freed(), vec![node.id()]);
        assert_eq!(engine.live_nodes(), 0);
    }

    #[test]
    fn destination_is_never_freed() {
        let (backend, engine) = engine();
        engine.destination().dispose().unwrap();
        assert!(backend.nodes_freed().is_empty());
    }

    #[test]
    fn connect_records_routing() {
        let (backend, engine) = engine();
        let a = engine.create(NodeSpec::Compressor).unwrap();
        a.connect(&engine.destination()).unwrap();
        assert_eq!(
            backend.count(|op| matches!(
                op,
                TestOp::Connect { dest, .. } if *dest == DESTINATION_NODE
            )),
            1
        );
    }
}
