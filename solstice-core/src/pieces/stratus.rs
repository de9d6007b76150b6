//! Stratus: sparse piano over an inverted major-9th chord.
//!
//! Each of fifteen notes repeats on its own independently drawn cycle, so
//! the chord never voices the same way twice.

use solstice_types::{invert, major9th, toss, Note, PitchClass};

use solstice_audio::{Node, Sampler, SamplerOptions};

use crate::piece::{ActivePiece, PieceDefinition, PieceEnv, SessionHandle};
use crate::rng::Rng;
use crate::scope::SessionScope;
use crate::transport::Transport;

const PIANO: &str = "grand-piano";
const OCTAVES: [i8; 3] = [3, 4, 5];
const MIN_REPEAT_SECS: f64 = 20.0;
const MAX_REPEAT_SECS: f64 = 60.0;

pub static DEFINITION: PieceDefinition = PieceDefinition {
    id: "stratus",
    gain_db: -10.5,
    activate,
};

fn notes() -> Vec<Note> {
    toss(&invert(&major9th(PitchClass::Cs), 1), &OCTAVES)
}

fn activate(env: &PieceEnv) -> Result<Box<dyn ActivePiece>, String> {
    let samples = env.library.request(&[PIANO])?;
    let set = samples
        .get(PIANO)
        .ok_or_else(|| format!("missing instrument `{PIANO}`"))?;
    let piano = env.engine.sampler(set.clone(), SamplerOptions::default())?;
    (env.on_progress)(1.0);
    Ok(Box::new(Stratus {
        piano,
        transport: env.transport.clone(),
        rng: env.rng.clone(),
    }))
}

struct Stratus {
    piano: Sampler,
    transport: Transport,
    rng: Rng,
}

impl ActivePiece for Stratus {
    fn schedule(&mut self, destination: &Node) -> Result<SessionHandle, String> {
        self.piano.connect(destination)?;
        let scope = SessionScope::new(&self.transport);
        let mut session = SessionHandle::new(scope.clone());

        for note in notes() {
            let interval = self.rng.between(MIN_REPEAT_SECS, MAX_REPEAT_SECS);
            let delay = self.rng.between(0.0, MAX_REPEAT_SECS - MIN_REPEAT_SECS);
            let piano = self.piano.clone();
            scope.schedule_repeat(interval, delay, move |transport, _| {
                if let Err(e) = piano.trigger_attack(note, transport.now() + 1.0, 1.0) {
                    log::warn!(target: "piece::stratus", "trigger failed: {}", e);
                }
            });
        }

        session.release_on_stop(self.piano.clone());
        Ok(session)
    }

    fn deactivate(&mut self) -> Result<(), String> {
        self.piano.dispose()
    }
}
