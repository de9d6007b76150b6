//! Vesper: slow nylon-guitar tones, occasionally shadowed by a choir hum.
//!
//! Each guitar note runs its own self-rescheduling chain of one-shot
//! events rather than a fixed-interval repeat: every firing draws the wait
//! until the next one. A cooldown gate keeps any single pitch from
//! restriking within a 30 second window no matter what the chains draw.

use std::sync::{Arc, Mutex};

use solstice_types::{toss, Note, PitchClass};

use solstice_audio::{Node, NodeSpec, Sampler, SamplerOptions};

use crate::piece::{ActivePiece, PieceDefinition, PieceEnv, SessionHandle};
use crate::prerender::{prerenderable_sampler, PrerenderSpec};
use crate::rng::Rng;
use crate::scope::SessionScope;
use crate::transport::Transport;
use crate::voices::CooldownGate;

const GUITAR: &str = "nylon-guitar";
const HUM: &str = "choir-hum";
const RENDERED_GUITAR: &str = "vesper__nylon-guitar";
const RENDERED_HUM: &str = "vesper__choir-hum";

const COOLDOWN_SECS: f64 = 30.0;
const HUM_PROBABILITY: f64 = 0.1;

pub static DEFINITION: PieceDefinition = PieceDefinition {
    id: "vesper",
    gain_db: -12.2,
    activate,
};

fn guitar_notes() -> Vec<Note> {
    toss(
        &[
            PitchClass::E,
            PitchClass::Fs,
            PitchClass::Gs,
            PitchClass::B,
            PitchClass::Cs,
        ],
        &[3, 4],
    )
}

fn hum_notes() -> Vec<Note> {
    toss(&[PitchClass::E, PitchClass::B], &[2, 3])
}

fn activate(env: &PieceEnv) -> Result<Box<dyn ActivePiece>, String> {
    let samples = env
        .library
        .request(&[GUITAR, HUM, RENDERED_GUITAR, RENDERED_HUM])?;

    let on_progress = env.on_progress.clone();

    let notes = guitar_notes();
    let mut spec = PrerenderSpec::new(&notes, GUITAR, RENDERED_GUITAR);
    spec.chain = vec![NodeSpec::Reverb {
        decay: 8.0,
        wet: 0.5,
    }];
    spec.additional_render_length = 8.0;
    let guitar = prerenderable_sampler(
        env,
        &samples,
        &spec,
        SamplerOptions::default(),
        &|v| on_progress(v * 0.5),
    )?;

    let notes = hum_notes();
    let mut spec = PrerenderSpec::new(&notes, HUM, RENDERED_HUM);
    spec.chain = vec![NodeSpec::Reverb {
        decay: 8.0,
        wet: 0.6,
    }];
    spec.additional_render_length = 8.0;
    let hums = prerenderable_sampler(
        env,
        &samples,
        &spec,
        SamplerOptions::default(),
        &|v| on_progress(v * 0.5 + 0.5),
    )?;

    // The long reverb tails stack; compress, then trim the sum.
    let compressor = env.engine.create(NodeSpec::Compressor)?;
    let volume = env.engine.create(NodeSpec::Volume { db: -15.0 })?;
    guitar.connect(&compressor)?;
    hums.connect(&compressor)?;
    compressor.connect(&volume)?;

    Ok(Box::new(Vesper {
        guitar,
        hums,
        compressor,
        volume,
        transport: env.transport.clone(),
        rng: env.rng.clone(),
    }))
}

struct Vesper {
    guitar: Sampler,
    hums: Sampler,
    compressor: Node,
    volume: Node,
    transport: Transport,
    rng: Rng,
}

fn chain(
    scope: &SessionScope,
    guitar: Sampler,
    hums: Sampler,
    gate: Arc<Mutex<CooldownGate>>,
    rng: Rng,
    note: Note,
    delay: f64,
) {
    let rescope = scope.clone();
    scope.schedule_once(delay, move |transport, _| {
        let now = transport.now();
        if gate.lock().unwrap().try_pass(&note.to_string(), now) {
            if let Err(e) = guitar.trigger_attack(note, now + 1.0, 1.0) {
                log::warn!(target: "piece::vesper", "guitar trigger failed: {}", e);
            }
            if rng.coin(HUM_PROBABILITY) {
                if let Some(&hum) = rng.pick(&hum_notes()) {
                    let at = now + 1.0 + rng.between(0.0, 2.0);
                    if let Err(e) = hums.trigger_attack(hum, at, 1.0) {
                        log::warn!(target: "piece::vesper", "hum trigger failed: {}", e);
                    }
                }
            }
        }
        let next = rng.between(45.0, 100.0);
        chain(
            &rescope,
            guitar.clone(),
            hums.clone(),
            gate.clone(),
            rng.clone(),
            note,
            next,
        );
    });
}

impl ActivePiece for Vesper {
    fn schedule(&mut self, destination: &Node) -> Result<SessionHandle, String> {
        self.volume.connect(destination)?;
        let scope = SessionScope::new(&self.transport);
        let mut session = SessionHandle::new(scope.clone());

        let gate = Arc::new(Mutex::new(CooldownGate::new(COOLDOWN_SECS)));
        let notes = guitar_notes();
        let delays: Vec<f64> = notes.iter().map(|_| self.rng.between(0.0, 55.0)).collect();
        let floor = delays.iter().copied().fold(f64::INFINITY, f64::min);
        for (&note, &delay) in notes.iter().zip(&delays) {
            chain(
                &scope,
                self.guitar.clone(),
                self.hums.clone(),
                gate.clone(),
                self.rng.clone(),
                note,
                delay - floor,
            );
        }

        session.release_on_stop(self.guitar.clone());
        session.release_on_stop(self.hums.clone());
        Ok(session)
    }

    fn deactivate(&mut self) -> Result<(), String> {
        crate::piece::dispose_all([
            self.guitar.node(),
            self.hums.node(),
            &self.compressor,
            &self.volume,
        ])
    }
}
