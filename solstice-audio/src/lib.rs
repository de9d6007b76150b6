//! Audio collaborator boundary for the solstice runtime.
//!
//! The runtime never talks to a concrete synthesis engine. It talks to the
//! [`AudioBackend`] trait: a semantic-level vocabulary of node creation,
//! routing, timed triggers and offline rendering. Node identity is an
//! engine-allocated integer so implementations can map operations onto a
//! server-side graph, record them for tests, or drop them on the floor.

pub mod backend;
pub mod buffers;
pub mod graph;
pub mod library;
pub mod offline;

pub use backend::{
    AudioBackend, BackendError, BackendResult, FadeCurve, NodeId, NodeSpec,
    RenderOptions, SamplerOptions, SourceOptions, TestBackend, TestOp, DESTINATION_NODE,
};
pub use buffers::{AudioBuffer, SampleMap, SampleSet};
pub use graph::{AudioEngine, Node, Sampler};
pub use library::{DirLibrary, MemoryLibrary, SampleLibrary};
pub use offline::OfflineBackend;
