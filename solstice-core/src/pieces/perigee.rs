//! Perigee: reversed piano through long feedback delays, under sustained
//! strings.
//!
//! Both instruments are prerendered through a large reverb. The piano's
//! per-note cycles start together and drift apart (each note's first entry
//! is offset by its cycle length minus the shortest cycle); the delays are
//! session-local and rebuilt fresh on every schedule.

use solstice_types::{toss, Note, PitchClass};

use solstice_audio::{AudioEngine, FadeCurve, Node, NodeSpec, Sampler, SamplerOptions, SourceOptions};

use crate::piece::{ActivePiece, PieceDefinition, PieceEnv, SessionHandle};
use crate::prerender::{prerenderable_sampler, PrerenderSpec};
use crate::rng::Rng;
use crate::scope::SessionScope;
use crate::transport::Transport;
use crate::voices::desynced_offsets;

const PIANO: &str = "grand-piano";
const STRINGS: &str = "strings-susvib";
const RENDERED_PIANO: &str = "perigee__grand-piano";
const RENDERED_STRINGS: &str = "perigee__strings-susvib";

pub static DEFINITION: PieceDefinition = PieceDefinition {
    id: "perigee",
    gain_db: -7.4,
    activate,
};

fn piano_notes() -> Vec<Note> {
    toss(
        &[PitchClass::C, PitchClass::E, PitchClass::G, PitchClass::B],
        &[3, 4, 5],
    )
}

fn strings_notes() -> Vec<Note> {
    toss(
        &[PitchClass::C, PitchClass::E, PitchClass::G, PitchClass::B],
        &[2, 3],
    )
}

fn activate(env: &PieceEnv) -> Result<Box<dyn ActivePiece>, String> {
    let samples = env
        .library
        .request(&[PIANO, STRINGS, RENDERED_PIANO, RENDERED_STRINGS])?;

    let on_progress = env.on_progress.clone();

    let notes = piano_notes();
    let mut spec = PrerenderSpec::new(&notes, PIANO, RENDERED_PIANO);
    spec.chain = vec![NodeSpec::Freeverb {
        room_size: 0.9,
        wet: 0.5,
    }];
    spec.additional_render_length = 1.0;
    spec.reverse = true;
    let reverse_piano = prerenderable_sampler(
        env,
        &samples,
        &spec,
        SamplerOptions::default(),
        &|v| on_progress(v * 0.5),
    )?;

    let notes = strings_notes();
    let mut spec = PrerenderSpec::new(&notes, STRINGS, RENDERED_STRINGS);
    spec.chain = vec![NodeSpec::Freeverb {
        room_size: 0.8,
        wet: 0.5,
    }];
    spec.additional_render_length = 1.0;
    spec.source_options = SourceOptions {
        fade_out: 8.0,
        curve: FadeCurve::Linear,
        ..SourceOptions::default()
    };
    let strings = prerenderable_sampler(
        env,
        &samples,
        &spec,
        SamplerOptions::default(),
        &|v| on_progress(v * 0.5 + 0.5),
    )?;

    // Strings sit well below the piano; the trim survives across sessions.
    let strings_volume = env.engine.create(NodeSpec::Volume { db: -25.0 })?;
    strings.connect(&strings_volume)?;

    Ok(Box::new(Perigee {
        engine: env.engine.clone(),
        reverse_piano,
        strings,
        strings_volume,
        transport: env.transport.clone(),
        rng: env.rng.clone(),
    }))
}

struct Perigee {
    engine: AudioEngine,
    reverse_piano: Sampler,
    strings: Sampler,
    strings_volume: Node,
    transport: Transport,
    rng: Rng,
}

impl ActivePiece for Perigee {
    fn schedule(&mut self, destination: &Node) -> Result<SessionHandle, String> {
        self.strings_volume.connect(destination)?;

        let delay1 = self.engine.create(NodeSpec::FeedbackDelay {
            delay_time: 0.2,
            feedback: 0.7,
            wet: 0.5,
            max_delay: 1.0,
        })?;
        let delay2_time = self.rng.between(20.0, 30.0);
        let delay2 = self.engine.create(NodeSpec::FeedbackDelay {
            delay_time: delay2_time,
            feedback: 0.6,
            wet: 0.5,
            max_delay: delay2_time,
        })?;
        self.reverse_piano.connect(&delay1)?;
        delay1.connect(&delay2)?;
        delay2.connect(destination)?;

        let scope = SessionScope::new(&self.transport);
        let mut session = SessionHandle::new(scope.clone());

        for note in strings_notes() {
            let interval = self.rng.between(60.0, 180.0);
            let delay = self.rng.between(15.0, 30.0);
            let strings = self.strings.clone();
            scope.schedule_repeat(interval, delay, move |transport, _| {
                if let Err(e) = strings.trigger_attack(note, transport.now() + 1.0, 1.0) {
                    log::warn!(target: "piece::perigee", "strings trigger failed: {}", e);
                }
            });
        }

        let notes = piano_notes();
        let intervals: Vec<f64> = notes.iter().map(|_| self.rng.between(30.0, 60.0)).collect();
        for ((&note, &interval), offset) in
            notes.iter().zip(&intervals).zip(desynced_offsets(&intervals))
        {
            let piano = self.reverse_piano.clone();
            scope.schedule_repeat(interval, offset, move |transport, _| {
                if let Err(e) = piano.trigger_attack(note, transport.now() + 1.0, 1.0) {
                    log::warn!(target: "piece::perigee", "piano trigger failed: {}", e);
                }
            });
        }

        session.release_on_stop(self.reverse_piano.clone());
        session.release_on_stop(self.strings.clone());
        session.dispose_on_stop(delay1);
        session.dispose_on_stop(delay2);
        Ok(session)
    }

    fn deactivate(&mut self) -> Result<(), String> {
        crate::piece::dispose_all([
            self.reverse_piano.node(),
            self.strings.node(),
            &self.strings_volume,
        ])
    }
}
