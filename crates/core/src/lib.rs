//! Core library for the clack terminal metronome.
//!
//! The tick loop in [`timeline`] is the heart of the crate: it owns the beat
//! counter, a drift-corrected clock and the [`Transport`], and reacts to
//! timer expiries and [`ControlEvent`]s one at a time. Sound output, key
//! input and terminal drawing sit behind the [`TickPlayer`], [`KeySource`]
//! and [`BeatDisplay`] seams so the loop can be driven without hardware.

pub mod audio;
pub mod config;
pub mod error;
pub mod input;
pub mod render;
pub mod signature;
pub mod timeline;
pub mod transport;

pub use audio::{AudioEngine, BufferFormat, Sound, SoundBank, TickPlayer};
pub use config::{Preset, PresetStore, RunSettings};
pub use error::{ClackError, Result};
pub use input::{install_signal_handler, ControlEvent, KeyListener, KeySource};
pub use render::{beat_row, BeatDisplay, Status, TerminalDisplay};
pub use signature::{beat_interval, Tempo, TimeSignature, MAX_TEMPO, MIN_TEMPO};
pub use timeline::{DriftClock, TickReport, TickScheduler};
pub use transport::{Transport, TransportState};
