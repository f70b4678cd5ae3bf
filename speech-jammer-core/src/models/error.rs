use thiserror::Error;

/// Errors surfaced by the jammer controller and its recording session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JammerError {
    #[error("device initialization failed: {0}")]
    DeviceInit(String),

    /// Start requested while already running. The controller treats this as
    /// success and never returns it from `start`.
    #[error("already active")]
    AlreadyActive,

    #[error("not running")]
    NotRunning,

    #[error("recording already in progress")]
    AlreadyRecording,

    #[error("no active recording")]
    NoActiveRecording,

    #[error("io error: {0}")]
    Io(String),

    #[error("audio device closed")]
    DeviceClosed,

    #[error("delay of {delay_ms}ms exceeds the {max_ms}ms maximum")]
    InvalidDelay { delay_ms: u32, max_ms: u32 },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

/// Errors reported by `AudioSource`/`AudioSink` implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("unsupported stream parameters: {0}")]
    Unsupported(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("device closed")]
    Closed,
}

impl DeviceError {
    /// Whether the processing loop must stop because of this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
