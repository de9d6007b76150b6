use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    runtime: RuntimeConfig,
    #[serde(default)]
    audio: AudioConfig,
}

#[derive(Deserialize, Default)]
struct RuntimeConfig {
    poll_interval_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    master_gain_db: Option<f32>,
    sample_dir: Option<String>,
}

pub struct Config {
    runtime: RuntimeConfig,
    audio: AudioConfig,
}

impl Config {
    pub fn load() -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => {
                            merge_runtime(&mut base.runtime, user.runtime);
                            merge_audio(&mut base.audio, user.audio);
                        }
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            runtime: base.runtime,
            audio: base.audio,
        }
    }

    /// How often the composer re-reads its live source (clamped to
    /// 100ms..10min).
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.runtime
                .poll_interval_ms
                .unwrap_or(3000)
                .clamp(100, 600_000),
        )
    }

    /// Clock advance granularity for the composer thread (clamped to
    /// 1ms..1s).
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.tick_interval_ms.unwrap_or(50).clamp(1, 1000))
    }

    /// Fixed seed for the shared random source, if configured.
    pub fn seed(&self) -> Option<u64> {
        self.runtime.seed
    }

    pub fn master_gain_db(&self) -> f32 {
        self.audio.master_gain_db.unwrap_or(0.0)
    }

    pub fn sample_dir(&self) -> PathBuf {
        PathBuf::from(self.audio.sample_dir.as_deref().unwrap_or("samples"))
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("solstice").join("config.toml"))
}

fn merge_runtime(base: &mut RuntimeConfig, user: RuntimeConfig) {
    if user.poll_interval_ms.is_some() {
        base.poll_interval_ms = user.poll_interval_ms;
    }
    if user.tick_interval_ms.is_some() {
        base.tick_interval_ms = user.tick_interval_ms;
    }
    if user.seed.is_some() {
        base.seed = user.seed;
    }
}

fn merge_audio(base: &mut AudioConfig, user: AudioConfig) {
    if user.master_gain_db.is_some() {
        base.master_gain_db = user.master_gain_db;
    }
    if user.sample_dir.is_some() {
        base.sample_dir = user.sample_dir;
    }
}
