//! Note names: pitch classes and octave-qualified notes.
//!
//! Notes print and parse in scientific pitch notation (`"C#4"`, `"Eb2"`).
//! Flats are accepted on input and normalized to their sharp spelling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pitch class (note name without an octave).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }

    /// Semitone offset from C.
    pub fn semitone(&self) -> i32 {
        match self {
            PitchClass::C => 0,
            PitchClass::Cs => 1,
            PitchClass::D => 2,
            PitchClass::Ds => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::Fs => 6,
            PitchClass::G => 7,
            PitchClass::Gs => 8,
            PitchClass::A => 9,
            PitchClass::As => 10,
            PitchClass::B => 11,
        }
    }

    /// Pitch class `semitones` above (or below, when negative) this one.
    pub fn offset(&self, semitones: i32) -> PitchClass {
        let idx = (self.semitone() + semitones).rem_euclid(12) as usize;
        PitchClass::ALL[idx]
    }

    fn parse(s: &str) -> Option<(PitchClass, &str)> {
        let mut chars = s.chars();
        let letter = chars.next()?;
        let rest = chars.as_str();
        let base = match letter.to_ascii_uppercase() {
            'C' => PitchClass::C,
            'D' => PitchClass::D,
            'E' => PitchClass::E,
            'F' => PitchClass::F,
            'G' => PitchClass::G,
            'A' => PitchClass::A,
            'B' => PitchClass::B,
            _ => return None,
        };
        match rest.chars().next() {
            Some('#') => Some((base.offset(1), &rest[1..])),
            Some('b') => Some((base.offset(-1), &rest[1..])),
            _ => Some((base, rest)),
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An octave-qualified note, e.g. `C#4`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i8,
}

impl Note {
    pub fn new(pitch_class: PitchClass, octave: i8) -> Self {
        Self {
            pitch_class,
            octave,
        }
    }

    /// MIDI note number (C4 = 60).
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.pitch_class.semitone()
    }

    /// Note `semitones` above (or below, when negative) this one.
    pub fn transpose(&self, semitones: i32) -> Note {
        let midi = self.midi() + semitones;
        let octave = midi.div_euclid(12) - 1;
        Note {
            pitch_class: PitchClass::ALL[midi.rem_euclid(12) as usize],
            octave: octave as i8,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Note {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pitch_class, rest) = PitchClass::parse(s)
            .ok_or_else(|| format!("invalid note name `{}`", s))?;
        let octave: i8 = rest
            .parse()
            .map_err(|_| format!("invalid octave in note `{}`", s))?;
        Ok(Note {
            pitch_class,
            octave,
        })
    }
}
