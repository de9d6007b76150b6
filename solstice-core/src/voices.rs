//! Shared helpers for generative voices.
//!
//! A *voice* is one independently self-rescheduling event stream inside a
//! piece. The template every voice follows:
//!
//! 1. decide what to play next from the shared [`Rng`](crate::rng::Rng);
//! 2. issue one or more timed triggers at a positive future offset;
//! 3. schedule its own next invocation at a randomized future offset —
//!    *before* returning, so the chain never holds two pending invocations.
//!
//! There is no termination condition: a voice runs until its session's
//! scope is cancelled. Intervals are drawn per event, not on a grid, to
//! avoid audible periodicity. Everything transient (active note lists,
//! generator cursors) is re-derived fresh on every `schedule`, so voices
//! cold-start correctly.

use std::collections::HashMap;

/// Per-voice start offsets derived from the voices' cycle lengths, with the
/// shortest cycle subtracted out: the first events of a polyphonic voice
/// align near time zero and diverge afterwards.
pub fn desynced_offsets(intervals: &[f64]) -> Vec<f64> {
    let floor = intervals
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if floor.is_finite() {
        intervals.iter().map(|i| i - floor).collect()
    } else {
        Vec::new()
    }
}

/// Debounce keyed by content identity: a rare event may fire again only
/// after `window` seconds of clock time have passed for that key.
pub struct CooldownGate {
    window: f64,
    last: HashMap<String, f64>,
}

impl CooldownGate {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    /// True (and records the pass) when `key` has not fired within the
    /// cooldown window ending at `now`.
    pub fn try_pass(&mut self, key: &str, now: f64) -> bool {
        match self.last.get(key) {
            Some(&at) if now - at <= self.window => false,
            _ => {
                self.last.insert(key.to_string(), now);
                true
            }
        }
    }
}

/// Target-weighted quadratic wait curve for trills: the wait starts at
/// `upper`, dips to `lower` mid-trill, and returns to `upper` — a natural
/// speed-up-then-slow-down. `x` is the trill position in [0, 1].
pub fn trill_curve(lower: f64, upper: f64, x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    -4.0 * (lower - upper) * x * x + 4.0 * (lower - upper) * x + upper
}
