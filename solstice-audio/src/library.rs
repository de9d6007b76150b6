//! Sample library: where instrument sample sets come from and where newly
//! rendered sets are persisted for future runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::buffers::{AudioBuffer, SampleMap, SampleSet};

/// External asset store contract. `request` resolves instrument names to
/// per-note sample sets; `save` persists rendered sets under a name so a
/// later process run finds them resident.
pub trait SampleLibrary: Send + Sync {
    /// Resolve the named instruments. Names the library does not know are
    /// simply absent from the returned map.
    fn request(&self, names: &[&str]) -> Result<SampleMap, String>;

    /// Persist rendered sample sets. Overwrites existing entries.
    fn save(&self, entries: &[(String, SampleSet)]) -> Result<(), String>;
}

/// In-memory library. Used by tests and by hosts that assemble their sample
/// data elsewhere.
#[derive(Default)]
pub struct MemoryLibrary {
    samples: Mutex<SampleMap>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: SampleMap) -> Self {
        Self {
            samples: Mutex::new(samples),
        }
    }

    pub fn insert(&self, name: impl Into<String>, set: SampleSet) {
        self.samples.lock().unwrap().insert(name.into(), set);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.samples.lock().unwrap().contains_key(name)
    }
}

impl SampleLibrary for MemoryLibrary {
    fn request(&self, names: &[&str]) -> Result<SampleMap, String> {
        let samples = self.samples.lock().unwrap();
        let mut out = HashMap::new();
        for &name in names {
            if let Some(set) = samples.get(name) {
                out.insert(name.to_string(), set.clone());
            }
        }
        Ok(out)
    }

    fn save(&self, entries: &[(String, SampleSet)]) -> Result<(), String> {
        let mut samples = self.samples.lock().unwrap();
        for (name, set) in entries {
            samples.insert(name.clone(), set.clone());
        }
        Ok(())
    }
}

/// Wav-directory library: `<root>/<instrument>/<key>.wav`, one mono file per
/// note (or index). Rendered sets are saved the same way.
pub struct DirLibrary {
    root: PathBuf,
}

impl DirLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn instrument_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl SampleLibrary for DirLibrary {
    fn request(&self, names: &[&str]) -> Result<SampleMap, String> {
        let mut out = HashMap::new();
        for &name in names {
            let dir = self.instrument_dir(name);
            if !dir.is_dir() {
                continue;
            }
            let mut set = SampleSet::new();
            let entries = fs::read_dir(&dir)
                .map_err(|e| format!("cannot read sample dir {}: {}", dir.display(), e))?;
            for entry in entries {
                let entry = entry.map_err(|e| e.to_string())?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                    continue;
                }
                let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                set.insert(key.to_string(), read_wav(&path)?);
            }
            if !set.is_empty() {
                out.insert(name.to_string(), set);
            }
        }
        Ok(out)
    }

    fn save(&self, entries: &[(String, SampleSet)]) -> Result<(), String> {
        for (name, set) in entries {
            let dir = self.instrument_dir(name);
            fs::create_dir_all(&dir)
                .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
            for (key, buffer) in set.iter() {
                write_wav(&dir.join(format!("{key}.wav")), buffer)?;
            }
            log::debug!(target: "library", "saved rendered set `{}` ({} buffers)", name, set.len());
        }
        Ok(())
    }
}

fn read_wav(path: &Path) -> Result<AudioBuffer, String> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let frames: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .step_by(channels)
            .collect::<Result<_, _>>()
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .step_by(channels)
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?
        }
    };
    Ok(AudioBuffer::new(spec.sample_rate, frames))
}

fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    for &frame in buffer.frames() {
        writer
            .write_sample(frame)
            .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
    }
    writer
        .finalize()
        .map_err(|e| format!("cannot finalize {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> AudioBuffer {
        AudioBuffer::new(8000, (0..len).map(|i| (i as f32 * 0.01).sin()).collect())
    }

    #[test]
    fn memory_library_round_trip() {
        let library = MemoryLibrary::new();
        let mut set = SampleSet::new();
        set.insert("C4", tone(32));
        library.save(&[("piano".to_string(), set)]).unwrap();

        let map = library.request(&["piano", "missing"]).unwrap();
        assert!(map.contains_key("piano"));
        assert!(!map.contains_key("missing"));
        assert_eq!(map["piano"].len(), 1);
    }

    #[test]
    fn dir_library_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let library = DirLibrary::new(dir.path());

        let mut set = SampleSet::new();
        set.insert("C4", tone(64));
        set.insert("E4", tone(48));
        library.save(&[("rendered__piano".to_string(), set)]).unwrap();

        let map = library.request(&["rendered__piano"]).unwrap();
        let loaded = &map["rendered__piano"];
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("C4").unwrap().len(), 64);
        assert_eq!(loaded.get("E4").unwrap().sample_rate(), 8000);
    }

    #[test]
    fn unknown_instruments_are_absent_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let library = DirLibrary::new(dir.path());
        let map = library.request(&["nope"]).unwrap();
        assert!(map.is_empty());
    }
}
