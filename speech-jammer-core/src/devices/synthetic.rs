//! In-memory devices implementing the `AudioSource`/`AudioSink` contracts.
//!
//! `SyntheticSource` replays a scripted sample sequence; `MemorySink`
//! collects everything written to it. Both support failure injection so the
//! processing loop's error paths can be driven without hardware.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::StreamFormat;
use crate::models::error::DeviceError;
use crate::traits::audio_device::{AudioSource, AudioSink, CaptureStream, PlaybackStream};

/// What a `SyntheticSource` stream does once its script is used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Keep returning full batches of zeros.
    Silence,
    /// Block in `read` until the stream is closed.
    Block,
    /// Report `DeviceError::Closed`, as if the device was unplugged.
    Close,
}

/// Scripted capture device.
pub struct SyntheticSource {
    script: Vec<i16>,
    exhaustion: Exhaustion,
    read_failures: usize,
    pacing: Option<Duration>,
    gated: bool,
    format: StreamFormat,
    fail_open: bool,
    last_stream: Mutex<Option<Arc<SyntheticCaptureStream>>>,
}

impl SyntheticSource {
    /// A source that plays `script` once and then blocks until closed.
    pub fn new(script: Vec<i16>) -> Self {
        Self {
            script,
            exhaustion: Exhaustion::Block,
            read_failures: 0,
            pacing: None,
            gated: false,
            format: StreamFormat::JAMMER,
            fail_open: false,
            last_stream: Mutex::new(None),
        }
    }

    /// A source that produces nothing but silence, one batch per `pacing`.
    pub fn silence(pacing: Duration) -> Self {
        Self::new(Vec::new())
            .with_exhaustion(Exhaustion::Silence)
            .with_pacing(pacing)
    }

    pub fn with_exhaustion(mut self, exhaustion: Exhaustion) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Fail the first `count` reads of each opened stream with `DeviceError::Read`.
    pub fn with_read_failures(mut self, count: usize) -> Self {
        self.read_failures = count;
        self
    }

    /// Sleep this long after every successful read.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Hold every read of an opened stream until `release` is called.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Make `open` fail with `DeviceError::Unsupported`.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Let the most recently opened stream start delivering samples.
    pub fn release(&self) {
        if let Some(stream) = self.last_stream.lock().as_ref() {
            stream.inner.lock().gated = false;
            stream.closed_signal.notify_all();
        }
    }

    /// Whether the most recently opened stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.last_stream
            .lock()
            .as_ref()
            .map(|s| s.is_closed())
            .unwrap_or(false)
    }

    /// Whether any stream has been opened.
    pub fn was_opened(&self) -> bool {
        self.last_stream.lock().is_some()
    }
}

impl AudioSource for SyntheticSource {
    fn open(&self, format: &StreamFormat) -> Result<Arc<dyn CaptureStream>, DeviceError> {
        if self.fail_open {
            return Err(DeviceError::Unsupported("synthetic source configured to fail".into()));
        }
        if *format != self.format {
            return Err(DeviceError::Unsupported(format!("{:?}", format)));
        }

        let stream = Arc::new(SyntheticCaptureStream {
            inner: Mutex::new(CaptureInner {
                script: self.script.clone(),
                position: 0,
                pending_failures: self.read_failures,
                gated: self.gated,
                closed: false,
            }),
            closed_signal: Condvar::new(),
            exhaustion: self.exhaustion,
            pacing: self.pacing,
        });
        *self.last_stream.lock() = Some(Arc::clone(&stream));
        Ok(stream)
    }
}

struct CaptureInner {
    script: Vec<i16>,
    position: usize,
    pending_failures: usize,
    gated: bool,
    closed: bool,
}

/// Stream handle returned by `SyntheticSource::open`.
pub struct SyntheticCaptureStream {
    inner: Mutex<CaptureInner>,
    /// Signalled on close and on release of the gate.
    closed_signal: Condvar,
    exhaustion: Exhaustion,
    pacing: Option<Duration>,
}

impl SyntheticCaptureStream {
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn next_batch(&self, buffer: &mut [i16]) -> Result<usize, DeviceError> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(DeviceError::Closed);
            }
            if inner.gated {
                self.closed_signal.wait(&mut inner);
                continue;
            }
            if inner.pending_failures > 0 {
                inner.pending_failures -= 1;
                return Err(DeviceError::Read("injected read failure".into()));
            }

            let remaining = inner.script.len() - inner.position;
            if remaining > 0 {
                let n = remaining.min(buffer.len());
                let start = inner.position;
                buffer[..n].copy_from_slice(&inner.script[start..start + n]);
                inner.position += n;
                return Ok(n);
            }

            match self.exhaustion {
                Exhaustion::Silence => {
                    buffer.fill(0);
                    return Ok(buffer.len());
                }
                Exhaustion::Close => {
                    inner.closed = true;
                    return Err(DeviceError::Closed);
                }
                Exhaustion::Block => self.closed_signal.wait(&mut inner),
            }
        }
    }
}

impl CaptureStream for SyntheticCaptureStream {
    fn read(&self, buffer: &mut [i16]) -> Result<usize, DeviceError> {
        let n = self.next_batch(buffer)?;
        if let Some(pacing) = self.pacing {
            thread::sleep(pacing);
        }
        Ok(n)
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.closed_signal.notify_all();
    }
}

/// Playback device that keeps everything written to it.
pub struct MemorySink {
    write_failures: usize,
    fail_open: bool,
    format: StreamFormat,
    last_stream: Mutex<Option<Arc<MemoryPlaybackStream>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            write_failures: 0,
            fail_open: false,
            format: StreamFormat::JAMMER,
            last_stream: Mutex::new(None),
        }
    }

    /// Fail the first `count` writes of each opened stream with `DeviceError::Write`.
    pub fn with_write_failures(mut self, count: usize) -> Self {
        self.write_failures = count;
        self
    }

    /// Make `open` fail with `DeviceError::Unsupported`.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Samples played by the most recently opened stream.
    pub fn samples(&self) -> Vec<i16> {
        self.last_stream
            .lock()
            .as_ref()
            .map(|s| s.inner.lock().samples.clone())
            .unwrap_or_default()
    }

    /// Wait until the current stream has played at least `count` samples.
    pub fn wait_for_samples(&self, count: usize, timeout: Duration) -> bool {
        let Some(stream) = self.last_stream.lock().clone() else {
            return false;
        };
        let deadline = Instant::now() + timeout;
        let mut inner = stream.inner.lock();
        while inner.samples.len() < count {
            if stream.written.wait_until(&mut inner, deadline).timed_out() {
                return inner.samples.len() >= count;
            }
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.last_stream
            .lock()
            .as_ref()
            .map(|s| s.inner.lock().closed)
            .unwrap_or(false)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for MemorySink {
    fn open(&self, format: &StreamFormat) -> Result<Arc<dyn PlaybackStream>, DeviceError> {
        if self.fail_open {
            return Err(DeviceError::Unsupported("memory sink configured to fail".into()));
        }
        if *format != self.format {
            return Err(DeviceError::Unsupported(format!("{:?}", format)));
        }

        let stream = Arc::new(MemoryPlaybackStream {
            inner: Mutex::new(PlaybackInner {
                samples: Vec::new(),
                pending_failures: self.write_failures,
                closed: false,
            }),
            written: Condvar::new(),
        });
        *self.last_stream.lock() = Some(Arc::clone(&stream));
        Ok(stream)
    }
}

struct PlaybackInner {
    samples: Vec<i16>,
    pending_failures: usize,
    closed: bool,
}

/// Stream handle returned by `MemorySink::open`.
pub struct MemoryPlaybackStream {
    inner: Mutex<PlaybackInner>,
    written: Condvar,
}

impl PlaybackStream for MemoryPlaybackStream {
    fn write(&self, buffer: &[i16]) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(DeviceError::Closed);
        }
        if inner.pending_failures > 0 {
            inner.pending_failures -= 1;
            return Err(DeviceError::Write("injected write failure".into()));
        }
        inner.samples.extend_from_slice(buffer);
        self.written.notify_all();
        Ok(())
    }

    fn close(&self) {
        self.inner.lock().closed = true;
    }
}
