//! Shared immutable audio buffers and the per-note sample collections
//! pieces are built from.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use solstice_types::Note;

/// An immutable mono pcm buffer. Clones share the underlying frames.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    inner: Arc<BufferData>,
}

#[derive(Debug)]
struct BufferData {
    sample_rate: u32,
    frames: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, frames: Vec<f32>) -> Self {
        Self {
            inner: Arc::new(BufferData {
                sample_rate,
                frames,
            }),
        }
    }

    /// A silent buffer of the given duration.
    pub fn silent(sample_rate: u32, seconds: f64) -> Self {
        let frames = (seconds.max(0.0) * sample_rate as f64) as usize;
        Self::new(sample_rate, vec![0.0; frames])
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn frames(&self) -> &[f32] {
        &self.inner.frames
    }

    pub fn len(&self) -> usize {
        self.inner.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.frames.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.inner.frames.len() as f64 / self.inner.sample_rate as f64
    }

    /// Pointer identity: true when both clones share the same frames.
    pub fn same_buffer(&self, other: &AudioBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Buffers for one instrument, keyed by note name (`"C4"`) or, for unpitched
/// collections, by index string (`"0"`, `"1"`, ...).
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    by_key: BTreeMap<String, AudioBuffer>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, buffer: AudioBuffer) {
        self.by_key.insert(key.into(), buffer);
    }

    pub fn get(&self, key: &str) -> Option<&AudioBuffer> {
        self.by_key.get(key)
    }

    pub fn get_note(&self, note: Note) -> Option<&AudioBuffer> {
        self.by_key.get(&note.to_string())
    }

    /// Lookup by position, for index-keyed collections.
    pub fn get_index(&self, i: usize) -> Option<&AudioBuffer> {
        self.by_key.values().nth(i)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AudioBuffer)> {
        self.by_key.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys that parse as note names, with their buffers.
    pub fn notes(&self) -> impl Iterator<Item = (Note, &AudioBuffer)> {
        self.by_key
            .iter()
            .filter_map(|(k, v)| k.parse::<Note>().ok().map(|n| (n, v)))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl FromIterator<(String, AudioBuffer)> for SampleSet {
    fn from_iter<T: IntoIterator<Item = (String, AudioBuffer)>>(iter: T) -> Self {
        Self {
            by_key: iter.into_iter().collect(),
        }
    }
}

/// Instrument name -> its sample set.
pub type SampleMap = HashMap<String, SampleSet>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_rate() {
        let buf = AudioBuffer::new(100, vec![0.0; 250]);
        assert!((buf.duration() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn silent_length() {
        let buf = AudioBuffer::silent(100, 1.5);
        assert_eq!(buf.len(), 150);
        assert!(buf.frames().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn clones_share_frames() {
        let a = AudioBuffer::new(44100, vec![0.5; 8]);
        let b = a.clone();
        assert!(a.same_buffer(&b));
    }

    #[test]
    fn index_lookup_is_key_ordered() {
        let mut set = SampleSet::new();
        set.insert("1", AudioBuffer::new(10, vec![1.0]));
        set.insert("0", AudioBuffer::new(10, vec![0.0]));
        assert_eq!(set.get_index(0).unwrap().frames(), &[0.0]);
        assert_eq!(set.get_index(1).unwrap().frames(), &[1.0]);
        assert!(set.get_index(2).is_none());
    }

    #[test]
    fn notes_iterator_skips_unpitched_keys() {
        let mut set = SampleSet::new();
        set.insert("C4", AudioBuffer::new(10, vec![0.0]));
        set.insert("0", AudioBuffer::new(10, vec![0.0]));
        assert_eq!(set.notes().count(), 1);
    }
}
