//! Host-facing operation surface.
//!
//! Mirrors the calls a host (method channel, FFI shim, IPC handler) makes:
//! plain integers and strings in, `bool`/`Option<String>` out. Errors are
//! logged here and collapse to `false`/`None`.

use parking_lot::Mutex;

use crate::models::error::JammerError;
use crate::session::controller::JammerController;
use crate::traits::audio_device::{AudioSink, AudioSource};

/// Thread-safe wrapper exposing a `JammerController` to a host dispatcher.
pub struct SpeechJammerChannel<S: AudioSource, K: AudioSink> {
    controller: Mutex<JammerController<S, K>>,
}

impl<S: AudioSource, K: AudioSink> SpeechJammerChannel<S, K> {
    pub fn new(controller: JammerController<S, K>) -> Self {
        Self {
            controller: Mutex::new(controller),
        }
    }

    pub fn start(&self, delay_ms: i32) -> bool {
        report("start", self.controller.lock().start(clamp_delay(delay_ms)))
    }

    /// Always succeeds; stopping an idle jammer is a no-op.
    pub fn stop(&self) -> bool {
        self.controller.lock().stop();
        true
    }

    pub fn update_delay(&self, delay_ms: i32) -> bool {
        report("updateDelay", self.controller.lock().update_delay(clamp_delay(delay_ms)))
    }

    pub fn start_recording(&self, file_path: &str) -> bool {
        report("startRecording", self.controller.lock().start_recording(file_path))
    }

    /// Absolute path of the finished WAV file, or `None` if nothing was recording
    /// or the file could not be produced.
    pub fn stop_recording(&self) -> Option<String> {
        match self.controller.lock().stop_recording() {
            Ok(result) => Some(result.file_path.to_string_lossy().to_string()),
            Err(JammerError::NoActiveRecording) => {
                log::debug!("stopRecording: no active recording");
                None
            }
            Err(e) => {
                log::error!("stopRecording failed: {}", e);
                None
            }
        }
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut JammerController<S, K>) -> R) -> R {
        f(&mut self.controller.lock())
    }
}

/// Negative delays from the host are treated as zero.
fn clamp_delay(delay_ms: i32) -> u32 {
    delay_ms.max(0) as u32
}

fn report(operation: &str, result: Result<(), JammerError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("{} failed: {}", operation, e);
            false
        }
    }
}
