use std::sync::Arc;

use crate::models::audio_models::StreamFormat;
use crate::models::error::DeviceError;

/// An opened capture stream.
///
/// `read` is called only from the processing thread. `close` may be called
/// from any thread, including while a `read` is blocked, and must be
/// idempotent; a blocked or later `read` then returns `DeviceError::Closed`.
pub trait CaptureStream: Send + Sync {
    /// Fill `buffer` with captured samples and return how many were written.
    ///
    /// Blocks until at least one sample is available. `Ok(0)` is allowed and
    /// treated as "nothing yet".
    fn read(&self, buffer: &mut [i16]) -> Result<usize, DeviceError>;

    /// Stop the stream and release the device.
    fn close(&self);
}

/// An opened playback stream.
///
/// Same threading contract as [`CaptureStream`].
pub trait PlaybackStream: Send + Sync {
    /// Queue `buffer` for playback.
    ///
    /// May block until the device has room; this is the only backpressure
    /// the processing loop sees.
    fn write(&self, buffer: &[i16]) -> Result<(), DeviceError>;

    /// Stop the stream and release the device.
    fn close(&self);
}

/// Capture device capability (microphone).
///
/// Implemented outside the core by platform bindings, and by
/// `devices::SyntheticSource` for tests.
pub trait AudioSource: Send + Sync {
    /// Open a capture stream. Fails with `DeviceError::Unsupported` if the
    /// device cannot deliver `format`.
    fn open(&self, format: &StreamFormat) -> Result<Arc<dyn CaptureStream>, DeviceError>;
}

/// Playback device capability (speaker/headphones).
pub trait AudioSink: Send + Sync {
    /// Open a playback stream. Fails with `DeviceError::Unsupported` if the
    /// device cannot play `format`.
    fn open(&self, format: &StreamFormat) -> Result<Arc<dyn PlaybackStream>, DeviceError>;
}
