use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ClackError, Result};

/// Exclusive lower bound for a tempo in beats per minute.
pub const MIN_TEMPO: i64 = 0;
/// Exclusive upper bound for a tempo in beats per minute.
pub const MAX_TEMPO: i64 = 600;

const NANOS_PER_MINUTE: u64 = 60_000_000_000;

/// Every time signature the metronome accepts, in display order.
const CATALOG: [TimeSignature; 10] = [
    TimeSignature::new(4, 4),
    TimeSignature::new(3, 4),
    TimeSignature::new(2, 4),
    TimeSignature::new(2, 2),
    TimeSignature::new(3, 8),
    TimeSignature::new(6, 8),
    TimeSignature::new(9, 8),
    TimeSignature::new(12, 8),
    TimeSignature::new(5, 4),
    TimeSignature::new(6, 4),
];

/// A time signature taken from the supported catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Number of beats per measure.
    pub beats: u32,
    /// Note value that represents one beat.
    pub note_value: u32,
}

impl TimeSignature {
    const fn new(beats: u32, note_value: u32) -> Self {
        Self { beats, note_value }
    }

    /// Parses `B/N` text and looks the pair up in the catalog.
    ///
    /// Only exact catalog entries are accepted: `7/4` is well formed but
    /// still rejected.
    pub fn resolve(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split('/').collect();
        let [beats, note_value] = parts.as_slice() else {
            return Err(ClackError::TimeSignatureFormat(text.to_string()));
        };

        let (Ok(beats), Ok(note_value)) = (beats.parse::<u32>(), note_value.parse::<u32>()) else {
            return Err(ClackError::TimeSignatureNumeric(text.to_string()));
        };

        let candidate = Self::new(beats, note_value);
        if CATALOG.contains(&candidate) {
            Ok(candidate)
        } else {
            Err(ClackError::TimeSignatureUnsupported(text.to_string()))
        }
    }

    /// Iterates over the supported time signatures in catalog order.
    pub fn list() -> impl Iterator<Item = TimeSignature> + Clone {
        CATALOG.into_iter()
    }

    /// Signatures counted in groups of three (6, 9 or 12 beats) tick on the
    /// subdivided beat unit.
    pub fn is_compound(&self) -> bool {
        matches!(self.beats, 6 | 9 | 12)
    }
}

impl FromStr for TimeSignature {
    type Err = ClackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.note_value)
    }
}

/// Tempo in beats per minute, strictly between [`MIN_TEMPO`] and [`MAX_TEMPO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tempo(u32);

impl Tempo {
    pub fn new(bpm: i64) -> Result<Self> {
        if bpm > MIN_TEMPO && bpm < MAX_TEMPO {
            // The range check keeps the value well inside u32.
            Ok(Self(bpm as u32))
        } else {
            Err(ClackError::TempoRange(bpm))
        }
    }

    pub fn bpm(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpm", self.0)
    }
}

/// Time between two ticks.
///
/// Compound signatures use `60s / (tempo / 0.5)`, i.e. half the simple
/// interval.
pub fn beat_interval(tempo: Tempo, signature: TimeSignature) -> Duration {
    let per_minute = if signature.is_compound() {
        NANOS_PER_MINUTE / 2
    } else {
        NANOS_PER_MINUTE
    };
    Duration::from_nanos(per_minute / u64::from(tempo.bpm()))
}
