//! The piece lifecycle protocol.
//!
//! A piece goes through three phases:
//!
//! 1. **activate** — resolve samples (rendering through the cache where
//!    needed) and build the audio graph that survives across playback
//!    sessions. Nothing sounds yet.
//! 2. **schedule** — wire the persistent graph into a destination and start
//!    the piece's generative voices. Returns a [`SessionHandle`]; calling
//!    `schedule` again after a stop yields a fully independent session.
//! 3. **deactivate** — dispose everything activate built. Idempotent, and
//!    safe even if the piece was never scheduled.

use std::sync::Arc;

use solstice_audio::{AudioEngine, Node, Sampler, SampleLibrary};

use crate::cache::PrerenderCache;
use crate::rng::Rng;
use crate::scope::SessionScope;
use crate::transport::Transport;

/// Everything a piece needs to activate: the audio engine, the sample
/// library, the shared prerender cache, the virtual clock, the seeded
/// random source, and a progress sink for slow renders.
#[derive(Clone)]
pub struct PieceEnv {
    pub engine: AudioEngine,
    pub library: Arc<dyn SampleLibrary>,
    pub cache: Arc<PrerenderCache>,
    pub transport: Transport,
    pub rng: Rng,
    pub on_progress: Arc<dyn Fn(f64) + Send + Sync>,
}

impl PieceEnv {
    /// An env reporting progress into the log only.
    pub fn new(
        engine: AudioEngine,
        library: Arc<dyn SampleLibrary>,
        cache: Arc<PrerenderCache>,
        transport: Transport,
        rng: Rng,
    ) -> Self {
        Self {
            engine,
            library,
            cache,
            transport,
            rng,
            on_progress: Arc::new(|v| {
                log::debug!(target: "piece", "prerender progress {:.0}%", v * 100.0);
            }),
        }
    }
}

pub type ActivateFn = fn(&PieceEnv) -> Result<Box<dyn ActivePiece>, String>;

/// Registry entry for one piece: identity, normalization gain, and the
/// activate entry point.
pub struct PieceDefinition {
    pub id: &'static str,
    /// Static decibel adjustment applied to the piece's whole output,
    /// wired once at instantiation.
    pub gain_db: f32,
    pub activate: ActivateFn,
}

/// An activated piece: resources resolved, ready to be scheduled.
pub trait ActivePiece: Send {
    /// Start a fresh playback session into `destination`.
    fn schedule(&mut self, destination: &Node) -> Result<SessionHandle, String>;

    /// Dispose every resource obtained during activation. Must be safe to
    /// call repeatedly and without any prior `schedule`.
    fn deactivate(&mut self) -> Result<(), String>;
}

/// Owns one playback session: its cancellation scope plus the cleanup that
/// `stop` performs (release sounding notes, dispose session-local nodes).
/// Activate-owned nodes are never touched here.
pub struct SessionHandle {
    scope: SessionScope,
    release: Vec<Sampler>,
    dispose: Vec<Node>,
    stopped: bool,
}

impl SessionHandle {
    pub fn new(scope: SessionScope) -> Self {
        Self {
            scope,
            release: Vec::new(),
            dispose: Vec::new(),
            stopped: false,
        }
    }

    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    /// Release this sampler's sounding notes when the session stops.
    pub fn release_on_stop(&mut self, sampler: Sampler) {
        self.release.push(sampler);
    }

    /// Dispose this session-local node when the session stops.
    pub fn dispose_on_stop(&mut self, node: Node) {
        self.dispose.push(node);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the session: cancel every callback it scheduled, silence its
    /// samplers, dispose its session-local nodes. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.scope.cancel_all();
        let now = self.scope.transport().now();
        for sampler in &self.release {
            if let Err(e) = sampler.release_all(now) {
                log::warn!(target: "piece", "release on stop failed: {}", e);
            }
        }
        for node in &self.dispose {
            if let Err(e) = node.dispose() {
                log::warn!(target: "piece", "dispose on stop failed: {}", e);
            }
        }
    }
}

/// Dispose a set of nodes, collecting failures instead of aborting at the
/// first: teardown must reach every resource.
pub fn dispose_all<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Result<(), String> {
    let mut failures = Vec::new();
    for node in nodes {
        if let Err(e) = node.dispose() {
            failures.push(e);
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures.join("; "))
    }
}
