//! # solstice-core
//!
//! Runtime for an ensemble of endlessly-running generative pieces. A piece
//! is a set of stochastic voices scheduled on a shared virtual clock,
//! triggering notes on prerendered sample buffers through an abstract audio
//! backend.
//!
//! The moving parts:
//!
//! - [`transport`] — the virtual clock. Time only moves when the owner
//!   advances it; every due callback runs on the advancing thread.
//! - [`scope`] — per-session cancellation scopes over the transport.
//! - [`cache`] — the shared prerender cache: at most one render per key,
//!   concurrent requesters wait for and share the same result.
//! - [`piece`] / [`factory`] / [`pieces`] — the piece lifecycle protocol
//!   (activate, schedule, deactivate), instantiation with per-piece
//!   normalization gain, and the built-in piece registry.
//! - [`composer`] — the polling session manager: diffs a live text source
//!   against running instances and reconciles.
//! - [`config`] — embedded TOML defaults merged with a user override.

pub mod cache;
pub mod composer;
pub mod config;
pub mod factory;
pub mod piece;
pub mod pieces;
pub mod prerender;
pub mod rng;
pub mod scope;
pub mod transport;
pub mod voices;

pub use cache::PrerenderCache;
pub use composer::{run_composer, Composer, ComposerCmd, ComposerHandle, ComposerState};
pub use config::Config;
pub use factory::PieceInstance;
pub use piece::{ActivePiece, PieceDefinition, PieceEnv, SessionHandle};
pub use rng::Rng;
pub use scope::SessionScope;
pub use transport::{EventId, Transport};
