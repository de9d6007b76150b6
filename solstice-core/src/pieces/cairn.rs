//! Cairn: isolated piano gestures separated by long silences.
//!
//! One chain of one-shot events drives the whole piece. Each firing picks a
//! gesture: a *splatter* (a handful of chord tones scattered inside a short
//! window) or a *trill* (two adjacent tones alternating with waits drawn
//! from a quadratic curve, fast in the middle, slow at the edges). The
//! piano is prerendered an octave up through a long reverb.

use solstice_types::{toss, Note, PitchClass};

use solstice_audio::{Node, NodeSpec, Sampler, SamplerOptions};

use crate::piece::{ActivePiece, PieceDefinition, PieceEnv, SessionHandle};
use crate::prerender::{prerenderable_sampler, PrerenderSpec};
use crate::rng::Rng;
use crate::scope::SessionScope;
use crate::transport::Transport;
use crate::voices::trill_curve;

const PIANO: &str = "grand-piano";
const RENDERED_PIANO: &str = "cairn__grand-piano";

const GESTURE_GAP_MIN: f64 = 20.0;
const GESTURE_GAP_MAX: f64 = 45.0;
const TRILL_WAIT_LOWER: f64 = 0.07;
const TRILL_WAIT_UPPER: f64 = 0.3;

pub static DEFINITION: PieceDefinition = PieceDefinition {
    id: "cairn",
    gain_db: -14.5,
    activate,
};

fn notes() -> Vec<Note> {
    toss(
        &[
            PitchClass::D,
            PitchClass::F,
            PitchClass::A,
            PitchClass::C,
            PitchClass::E,
        ],
        &[3, 4],
    )
}

fn activate(env: &PieceEnv) -> Result<Box<dyn ActivePiece>, String> {
    let samples = env.library.request(&[PIANO, RENDERED_PIANO])?;

    let on_progress = env.on_progress.clone();
    let notes = notes();
    let mut spec = PrerenderSpec::new(&notes, PIANO, RENDERED_PIANO);
    spec.chain = vec![NodeSpec::Reverb {
        decay: 12.0,
        wet: 0.5,
    }];
    spec.pitch_shift = 12.0;
    spec.additional_render_length = 12.0;
    let piano = prerenderable_sampler(
        env,
        &samples,
        &spec,
        SamplerOptions::default(),
        &|v| on_progress(v),
    )?;

    Ok(Box::new(Cairn {
        piano,
        transport: env.transport.clone(),
        rng: env.rng.clone(),
    }))
}

struct Cairn {
    piano: Sampler,
    transport: Transport,
    rng: Rng,
}

/// Chord tones scattered inside a short window.
fn splatter(piano: &Sampler, rng: &Rng, now: f64) {
    let notes = notes();
    let count = 4 + (rng.random() * 4.0) as usize;
    for _ in 0..count {
        if let Some(&note) = rng.pick(&notes) {
            let at = now + 1.0 + rng.between(0.0, 1.5);
            if let Err(e) = piano.trigger_attack(note, at, rng.between(0.6, 1.0) as f32) {
                log::warn!(target: "piece::cairn", "splatter trigger failed: {}", e);
            }
        }
    }
}

/// Two adjacent chord tones alternating; the wait between strikes follows
/// the trill curve across the gesture.
fn trill(piano: &Sampler, rng: &Rng, now: f64) {
    let notes = notes();
    let start = (rng.random() * (notes.len() - 1) as f64) as usize;
    let pair = [notes[start], notes[start + 1]];
    let steps = 7 + (rng.random() * 7.0) as usize;
    let mut at = now + 1.0;
    for i in 0..steps {
        let x = i as f64 / (steps - 1) as f64;
        if let Err(e) = piano.trigger_attack(pair[i % 2], at, 0.8) {
            log::warn!(target: "piece::cairn", "trill trigger failed: {}", e);
        }
        at += trill_curve(TRILL_WAIT_LOWER, TRILL_WAIT_UPPER, x);
    }
}

fn chain(scope: &SessionScope, piano: Sampler, rng: Rng, delay: f64) {
    let rescope = scope.clone();
    scope.schedule_once(delay, move |transport, _| {
        let now = transport.now();
        if rng.coin(0.6) {
            splatter(&piano, &rng, now);
        } else {
            trill(&piano, &rng, now);
        }
        let next = rng.between(GESTURE_GAP_MIN, GESTURE_GAP_MAX);
        chain(&rescope, piano.clone(), rng.clone(), next);
    });
}

impl ActivePiece for Cairn {
    fn schedule(&mut self, destination: &Node) -> Result<SessionHandle, String> {
        self.piano.connect(destination)?;
        let scope = SessionScope::new(&self.transport);
        let mut session = SessionHandle::new(scope.clone());

        chain(
            &scope,
            self.piano.clone(),
            self.rng.clone(),
            self.rng.between(0.0, GESTURE_GAP_MIN),
        );

        session.release_on_stop(self.piano.clone());
        Ok(session)
    }

    fn deactivate(&mut self) -> Result<(), String> {
        self.piano.dispose()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use solstice_audio::{
        AudioBackend, AudioBuffer, AudioEngine, MemoryLibrary, SampleSet, TestBackend, TestOp,
    };

    use super::*;
    use crate::cache::PrerenderCache;

    fn env_with_samples() -> (Arc<TestBackend>, PieceEnv) {
        let backend = Arc::new(TestBackend::new());
        let engine = AudioEngine::new(backend.clone() as Arc<dyn AudioBackend>);
        let library = MemoryLibrary::new();
        let mut piano = SampleSet::new();
        for note in ["C3", "A3", "E4", "C5"] {
            piano.insert(note, AudioBuffer::silent(44100, 0.1));
        }
        library.insert(PIANO, piano);
        let library = Arc::new(library);
        let env = PieceEnv::new(
            engine,
            library.clone(),
            Arc::new(PrerenderCache::new(library)),
            Transport::new(),
            Rng::seeded(3),
        );
        (backend, env)
    }

    #[test]
    fn renders_shift_an_octave_up() {
        let (backend, env) = env_with_samples();
        let _piece = (DEFINITION.activate)(&env).unwrap();
        // Base shift of +12, adjusted per note by its distance to the
        // nearest sampled pitch (never more than a few semitones here).
        let renders = backend.count(|op| {
            matches!(op, TestOp::Render { pitch_shift, .. } if *pitch_shift > 6.0)
        });
        assert_eq!(renders, notes().len());
    }

    #[test]
    fn single_chain_survives_and_stops() {
        let (backend, env) = env_with_samples();
        let mut piece = (DEFINITION.activate)(&env).unwrap();
        let mut session = piece.schedule(&env.engine.destination()).unwrap();
        assert_eq!(env.transport.pending(), 1);

        env.transport.advance(500.0);
        assert!(backend.count(|op| matches!(op, TestOp::TriggerAttack { .. })) > 10);
        assert_eq!(env.transport.pending(), 1);

        session.stop();
        piece.deactivate().unwrap();
        assert_eq!(env.transport.pending(), 0);
        assert_eq!(env.engine.live_nodes(), 0);
    }
}
