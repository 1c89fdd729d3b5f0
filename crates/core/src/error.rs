use std::path::PathBuf;

/// Result alias that carries the custom [`ClackError`] type.
pub type Result<T> = std::result::Result<T, ClackError>;

/// Common error type for the core crate.
///
/// Everything up to [`ClackError::DeviceInit`] is a startup error: it is
/// reported before the tick loop starts and the process exits nonzero.
#[derive(Debug, thiserror::Error)]
pub enum ClackError {
    /// The presets file exists but does not hold a JSON list of presets.
    #[error("config file `{}` is malformed: {source}", .path.display())]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{0}` config not found")]
    ConfigNotFound(String),
    #[error("`{0}` config already exists")]
    ConfigDuplicate(String),
    #[error("tempo {0} is not valid, make sure it is above {} and below {}", crate::MIN_TEMPO, crate::MAX_TEMPO)]
    TempoRange(i64),
    #[error("invalid time signature format `{0}`, expected BEATS/NOTE")]
    TimeSignatureFormat(String),
    #[error("invalid number in time signature `{0}`")]
    TimeSignatureNumeric(String),
    #[error("time signature `{0}` is not supported, see `clack siglist`")]
    TimeSignatureUnsupported(String),
    /// A sound asset is missing or could not be decoded.
    #[error("failed to load audio asset `{}`: {reason}", .path.display())]
    AudioAsset { path: PathBuf, reason: String },
    /// No usable output device or stream.
    #[error("failed to initialise audio output: {0}")]
    DeviceInit(String),
    /// The keyboard could not be read. Fatal once the metronome runs.
    #[error("input device error: {0}")]
    InputDevice(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ClackError {
    pub(crate) fn asset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AudioAsset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
