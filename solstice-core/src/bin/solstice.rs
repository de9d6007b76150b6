//! Runtime entry point: play the pieces a score file names.
//!
//! The score is a plain text file re-read on the composer's poll cadence;
//! each `p(<id>)` line names a piece that should be playing. Edit the file
//! while the runtime is up and the ensemble follows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use solstice_audio::{AudioEngine, DirLibrary, NodeSpec, OfflineBackend};
use solstice_core::{
    run_composer, Composer, ComposerCmd, Config, PieceEnv, PrerenderCache, Rng, Transport,
};

fn main() {
    env_logger::init();

    let score_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: solstice <score.txt>");
            std::process::exit(2);
        }
    };

    let config = Config::load();
    if let Err(e) = run(&score_path, &config) {
        log::error!(target: "solstice", "{}", e);
        eprintln!("solstice: {}", e);
        std::process::exit(1);
    }
}

fn run(score_path: &PathBuf, config: &Config) -> Result<(), String> {
    let backend = Arc::new(OfflineBackend::new());
    let engine = AudioEngine::new(backend as Arc<dyn solstice_audio::AudioBackend>);
    let library: Arc<dyn solstice_audio::SampleLibrary> =
        Arc::new(DirLibrary::new(config.sample_dir()));
    let transport = Transport::new();
    let rng = match config.seed() {
        Some(seed) => Rng::seeded(seed),
        None => Rng::from_entropy(),
    };

    let master = engine.create(NodeSpec::Volume {
        db: config.master_gain_db(),
    })?;
    master.connect(&engine.destination())?;

    let env = PieceEnv::new(
        engine,
        library.clone(),
        Arc::new(PrerenderCache::new(library)),
        transport,
        rng,
    );
    let composer = Composer::new(env, master);
    let handle = run_composer(composer, config.poll_interval(), config.tick_interval())?;

    handle.send(ComposerCmd::Play)?;
    log::info!(
        target: "solstice",
        "playing from {} (poll {:?})",
        score_path.display(),
        config.poll_interval()
    );

    // Feed the score to the composer on its own poll cadence. The composer
    // thread does everything else.
    loop {
        match std::fs::read_to_string(score_path) {
            Ok(value) => handle.send(ComposerCmd::SetValue(value))?,
            Err(e) => {
                log::warn!(target: "solstice", "reading {}: {}", score_path.display(), e);
            }
        }
        std::thread::sleep(config.poll_interval().max(Duration::from_millis(100)));
    }
}
