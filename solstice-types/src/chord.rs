//! Chord construction helpers used by the generative pieces.

use crate::note::{Note, PitchClass};

/// Pitch classes of a major 9th chord built on `root`
/// (root, major 3rd, 5th, major 7th, 9th).
pub fn major9th(root: PitchClass) -> Vec<PitchClass> {
    [0, 4, 7, 11, 14].iter().map(|&s| root.offset(s)).collect()
}

/// Chord inversion: rotate the first `n` pitch classes to the end.
pub fn invert(chord: &[PitchClass], n: usize) -> Vec<PitchClass> {
    if chord.is_empty() {
        return Vec::new();
    }
    let n = n % chord.len();
    chord[n..]
        .iter()
        .chain(chord[..n].iter())
        .copied()
        .collect()
}

/// Expand pitch classes across octaves: every octave paired with every
/// pitch class, octave-major order.
pub fn toss(pitch_classes: &[PitchClass], octaves: &[i8]) -> Vec<Note> {
    octaves
        .iter()
        .flat_map(|&octave| {
            pitch_classes
                .iter()
                .map(move |&pc| Note::new(pc, octave))
        })
        .collect()
}
