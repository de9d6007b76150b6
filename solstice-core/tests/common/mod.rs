#![allow(dead_code)]
//! Test harness utilities for solstice-core integration tests.

use std::sync::Arc;

use solstice_audio::{
    AudioBackend, AudioBuffer, AudioEngine, MemoryLibrary, SampleSet, TestBackend,
};
use solstice_core::{PieceEnv, PrerenderCache, Rng, Transport};

/// Instruments the built-in pieces pull from the library.
pub const INSTRUMENTS: &[&str] = &["grand-piano", "strings-susvib", "nylon-guitar", "choir-hum"];

/// A sample set with a handful of pitches spread across the range the
/// pieces play in. Nearest-sample resolution covers the gaps.
pub fn sparse_set() -> SampleSet {
    let mut set = SampleSet::new();
    for note in ["C2", "E2", "C3", "A3", "E4", "C5", "B5"] {
        set.insert(note, AudioBuffer::silent(44100, 0.1));
    }
    set
}

/// A library stocked for every built-in piece.
pub fn stocked_library() -> MemoryLibrary {
    let library = MemoryLibrary::new();
    for name in INSTRUMENTS {
        library.insert(*name, sparse_set());
    }
    library
}

/// Full environment over a recording backend and a stocked library.
pub fn test_env(seed: u64) -> (Arc<TestBackend>, PieceEnv) {
    let backend = Arc::new(TestBackend::new());
    let engine = AudioEngine::new(backend.clone() as Arc<dyn AudioBackend>);
    let library = Arc::new(stocked_library());
    let env = PieceEnv::new(
        engine,
        library.clone(),
        Arc::new(PrerenderCache::new(library)),
        Transport::new(),
        Rng::seeded(seed),
    );
    (backend, env)
}
