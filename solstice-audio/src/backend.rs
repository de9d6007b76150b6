//! Audio backend trait: a semantic-level abstraction over the playback engine.
//!
//! `AudioBackend` captures what the runtime *means* to do (create a node,
//! route it, trigger a note at a clock time, render a buffer offline)
//! independently of how it's done. This keeps the synthesis engine an
//! external collaborator and lets the piece/session logic be unit tested
//! against a recording backend.

use std::fmt;

use solstice_types::Note;

use crate::buffers::AudioBuffer;

/// Result type for backend operations.
pub type BackendResult<T = ()> = Result<T, BackendError>;

/// Error from a backend operation.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError(e.to_string())
    }
}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

/// Engine-allocated node identity.
pub type NodeId = i32;

/// The reserved id of the backend's main output destination.
pub const DESTINATION_NODE: NodeId = 0;

/// Fade shape for sampler envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeCurve {
    #[default]
    Exponential,
    Linear,
}

/// Construction options for sampler nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerOptions {
    /// Attack seconds applied to every triggered note.
    pub attack: f64,
    /// Release seconds applied on release.
    pub release: f64,
    pub curve: FadeCurve,
    /// Constant pitch shift in semitones applied to every trigger.
    pub pitch_shift: f32,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            attack: 0.0,
            release: 0.1,
            curve: FadeCurve::Exponential,
            pitch_shift: 0.0,
        }
    }
}

/// Playback overrides applied to a source buffer before an offline capture.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOptions {
    pub fade_in: f64,
    pub fade_out: f64,
    pub curve: FadeCurve,
    pub playback_rate: f64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            fade_in: 0.0,
            fade_out: 0.0,
            curve: FadeCurve::Exponential,
            playback_rate: 1.0,
        }
    }
}

/// Options for one offline render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    /// Semitones, applied as a playback-rate change. Default 0.
    pub pitch_shift: f32,
    /// Play the source reversed.
    pub reverse: bool,
    /// Extra seconds captured after the source ends, for reverb/decay tails.
    pub additional_render_length: f64,
    pub source_options: SourceOptions,
}

/// What kind of node to create. The runtime only ever asks for what the
/// built-in pieces need; backends are free to approximate.
#[derive(Debug, Clone)]
pub enum NodeSpec {
    Sampler {
        buffers: crate::buffers::SampleSet,
        options: SamplerOptions,
    },
    Gain {
        value: f32,
    },
    Volume {
        db: f32,
    },
    FeedbackDelay {
        delay_time: f64,
        feedback: f32,
        wet: f32,
        max_delay: f64,
    },
    Freeverb {
        room_size: f32,
        wet: f32,
    },
    Reverb {
        decay: f64,
        wet: f32,
    },
    Compressor,
}

impl NodeSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeSpec::Sampler { .. } => "sampler",
            NodeSpec::Gain { .. } => "gain",
            NodeSpec::Volume { .. } => "volume",
            NodeSpec::FeedbackDelay { .. } => "feedback-delay",
            NodeSpec::Freeverb { .. } => "freeverb",
            NodeSpec::Reverb { .. } => "reverb",
            NodeSpec::Compressor => "compressor",
        }
    }
}

/// Semantic-level audio backend trait.
///
/// `at` arguments are absolute seconds on the shared virtual clock.
/// Implementations translate these operations into engine-specific commands
/// or record them for testing.
pub trait AudioBackend: Send + Sync {
    /// Create a node with engine-assigned identity.
    fn create_node(&self, node_id: NodeId, spec: &NodeSpec) -> BackendResult;

    /// Route `source`'s output into `dest`.
    fn connect(&self, source: NodeId, dest: NodeId) -> BackendResult;

    /// Free (remove) a node and its routing.
    fn free_node(&self, node_id: NodeId) -> BackendResult;

    /// Start a note on a sampler node at a clock time.
    fn trigger_attack(&self, node_id: NodeId, note: Note, at: f64, velocity: f32)
        -> BackendResult;

    /// Start a note and release it after `duration` seconds.
    fn trigger_attack_release(
        &self,
        node_id: NodeId,
        note: Note,
        at: f64,
        duration: f64,
    ) -> BackendResult;

    /// Release every sounding note on a sampler node.
    fn release_all(&self, node_id: NodeId, at: f64) -> BackendResult;

    /// Offline render of one source buffer through a throwaway processing
    /// chain. The chain exists only for this pass.
    fn render(
        &self,
        source: &AudioBuffer,
        chain: &[NodeSpec],
        options: &RenderOptions,
    ) -> BackendResult<AudioBuffer>;
}

/// One recorded backend operation, for test assertions.
#[derive(Debug, Clone)]
pub enum TestOp {
    CreateNode { node_id: NodeId, kind: &'static str },
    Connect { source: NodeId, dest: NodeId },
    FreeNode(NodeId),
    TriggerAttack { node_id: NodeId, note: Note, at: f64 },
    TriggerAttackRelease { node_id: NodeId, note: Note, at: f64, duration: f64 },
    ReleaseAll { node_id: NodeId, at: f64 },
    Render { reverse: bool, pitch_shift: f32 },
}

/// A test backend that records all operations into a vector for assertions.
/// All operations succeed. Uses `Mutex` for interior mutability so the
/// backend is `Send + Sync` (needed for `Arc<TestBackend>` sharing).
#[derive(Default)]
pub struct TestBackend {
    ops: std::sync::Mutex<Vec<TestOp>>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<TestOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Clear recorded operations.
    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&TestOp) -> bool>(&self, f: F) -> usize {
        self.ops.lock().unwrap().iter().filter(|op| f(op)).count()
    }

    pub fn renders(&self) -> usize {
        self.count(|op| matches!(op, TestOp::Render { .. }))
    }

    pub fn triggers(&self) -> usize {
        self.count(|op| {
            matches!(
                op,
                TestOp::TriggerAttack { .. } | TestOp::TriggerAttackRelease { .. }
            )
        })
    }

    /// Node ids freed, in order.
    pub fn nodes_freed(&self) -> Vec<NodeId> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                TestOp::FreeNode(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: TestOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl AudioBackend for TestBackend {
    fn create_node(&self, node_id: NodeId, spec: &NodeSpec) -> BackendResult {
        self.record(TestOp::CreateNode {
            node_id,
            kind: spec.kind(),
        });
        Ok(())
    }

    fn connect(&self, source: NodeId, dest: NodeId) -> BackendResult {
        self.record(TestOp::Connect { source, dest });
        Ok(())
    }

    fn free_node(&self, node_id: NodeId) -> BackendResult {
        self.record(TestOp::FreeNode(node_id));
        Ok(())
    }

    fn trigger_attack(
        &self,
        node_id: NodeId,
        note: Note,
        at: f64,
        _velocity: f32,
    ) -> BackendResult {
        self.record(TestOp::TriggerAttack { node_id, note, at });
        Ok(())
    }

    fn trigger_attack_release(
        &self,
        node_id: NodeId,
        note: Note,
        at: f64,
        duration: f64,
    ) -> BackendResult {
        self.record(TestOp::TriggerAttackRelease {
            node_id,
            note,
            at,
            duration,
        });
        Ok(())
    }

    fn release_all(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.record(TestOp::ReleaseAll { node_id, at });
        Ok(())
    }

    fn render(
        &self,
        source: &AudioBuffer,
        _chain: &[NodeSpec],
        options: &RenderOptions,
    ) -> BackendResult<AudioBuffer> {
        self.record(TestOp::Render {
            reverse: options.reverse,
            pitch_shift: options.pitch_shift,
        });
        Ok(source.clone())
    }
}
