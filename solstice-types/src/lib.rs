//! Shared music and identity types for the solstice generative runtime.
//!
//! Everything here is plain data: note names, chord construction helpers,
//! and the piece identifier type. No audio or scheduling logic.

pub mod chord;
pub mod note;
pub mod piece;

pub use chord::{invert, major9th, toss};
pub use note::{Note, PitchClass};
pub use piece::PieceId;
