use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::models::audio_models::{AudioLevels, JammerDiagnostics, StreamFormat};
use crate::models::config::JammerConfiguration;
use crate::models::error::JammerError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::JammerState;
use crate::processing::delay_line::{DelayLine, DelayStatus};
use crate::storage::metadata;
use crate::storage::recording_writer::RecordingWriter;
use crate::traits::audio_device::{AudioSink, AudioSource, CaptureStream, PlaybackStream};
use crate::traits::jammer_delegate::JammerDelegate;

use super::processing_loop::{remaining, LoopShared, ProcessingLoop};

/// Delay used until a caller asks for another one.
pub const DEFAULT_DELAY_MS: u32 = 200;

/// Everything that exists only while the controller is running.
struct RunningSession {
    shared: Arc<LoopShared>,
    capture: Arc<dyn CaptureStream>,
    playback: Arc<dyn PlaybackStream>,
    worker: Option<thread::JoinHandle<()>>,
}

/// Delayed auditory feedback engine.
///
/// Generic over capture and playback backends via the `AudioSource` and
/// `AudioSink` traits. Owns the delay line and the optional recording, and
/// runs the processing loop on a dedicated thread:
///
/// ```text
/// [AudioSource] → read batch ─┬→ [RecordingWriter] (raw input, optional)
///                             └→ [DelayLine] → [AudioSink]
/// ```
///
/// Operations take `&mut self`; hosts that dispatch from several threads
/// wrap the controller in a mutex (see `SpeechJammerChannel`).
pub struct JammerController<S: AudioSource, K: AudioSink> {
    source: S,
    sink: K,
    config: JammerConfiguration,
    format: StreamFormat,
    state: JammerState,
    requested_delay_ms: u32,
    delegate: Option<Arc<dyn JammerDelegate>>,
    session: Option<RunningSession>,
    last_diagnostics: JammerDiagnostics,
}

impl<S: AudioSource, K: AudioSink> JammerController<S, K> {
    /// Controller with the default configuration. Use `with_config` to supply
    /// a custom one; that constructor validates it.
    pub fn new(source: S, sink: K) -> Self {
        Self {
            source,
            sink,
            config: JammerConfiguration::default(),
            format: StreamFormat::JAMMER,
            state: JammerState::Idle,
            requested_delay_ms: DEFAULT_DELAY_MS,
            delegate: None,
            session: None,
            last_diagnostics: JammerDiagnostics::default(),
        }
    }

    pub fn with_config(source: S, sink: K, config: JammerConfiguration) -> Result<Self, JammerError> {
        config.validate().map_err(JammerError::ConfigurationFailed)?;
        let mut controller = Self::new(source, sink);
        controller.config = config;
        Ok(controller)
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn JammerDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> JammerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// False once the processing thread has exited on its own (device lost)
    /// while the controller still reports running.
    pub fn is_loop_alive(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.shared.has_exited())
            .unwrap_or(false)
    }

    pub fn is_recording(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.shared.recorder.lock().is_some())
            .unwrap_or(false)
    }

    pub fn config(&self) -> &JammerConfiguration {
        &self.config
    }

    /// The delay most recently passed to `start` or `update_delay`.
    pub fn requested_delay_ms(&self) -> u32 {
        self.requested_delay_ms
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Geometry of the live delay line, if running.
    pub fn delay_status(&self) -> Option<DelayStatus> {
        self.session.as_ref().map(|s| s.shared.delay_line.lock().status())
    }

    pub fn current_levels(&self) -> AudioLevels {
        self.session
            .as_ref()
            .map(|s| *s.shared.levels.lock())
            .unwrap_or_default()
    }

    /// Counters for the current run, or for the last one once stopped.
    pub fn diagnostics(&self) -> JammerDiagnostics {
        match self.session {
            Some(ref s) => s.shared.diagnostics.lock().clone(),
            None => self.last_diagnostics.clone(),
        }
    }

    /// Open both devices and start the processing thread. Transitions: idle → running.
    ///
    /// Already running: returns `Ok` without touching the delay line. If the
    /// loop died because a device was lost, the old session is cleaned up and
    /// a new one started.
    pub fn start(&mut self, delay_ms: u32) -> Result<(), JammerError> {
        if self.is_loop_alive() {
            log::debug!("Already running");
            return Ok(());
        }
        self.reap_dead_loop();

        // Size the line before touching any device so a bad delay leaves nothing open.
        let delay_line = DelayLine::new(self.format.sample_rate, delay_ms)?;
        self.requested_delay_ms = delay_ms;

        let capture = self
            .source
            .open(&self.format)
            .map_err(|e| JammerError::DeviceInit(format!("capture: {}", e)))?;

        let playback = match self.sink.open(&self.format) {
            Ok(playback) => playback,
            Err(e) => {
                capture.close();
                return Err(JammerError::DeviceInit(format!("playback: {}", e)));
            }
        };

        let capacity = delay_line.capacity();
        let shared = Arc::new(LoopShared::new(delay_line));

        let processing = ProcessingLoop {
            shared: Arc::clone(&shared),
            capture: Arc::clone(&capture),
            playback: Arc::clone(&playback),
            frame_size: self.config.frame_size,
            delegate: self.delegate.clone(),
        };

        let worker = thread::Builder::new()
            .name("jammer-processing".into())
            .spawn(move || processing.run());

        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                capture.close();
                playback.close();
                return Err(JammerError::DeviceInit(format!(
                    "failed to spawn processing thread: {}",
                    e
                )));
            }
        };

        self.session = Some(RunningSession {
            shared,
            capture,
            playback,
            worker: Some(worker),
        });
        self.set_state(JammerState::Running { delay_ms });

        log::info!("Speech jammer started with {}ms delay (buffer {} samples)", delay_ms, capacity);
        Ok(())
    }

    /// Stop the loop and release both devices. Transitions: running → idle.
    ///
    /// Waits at most `config.stop_timeout` for the thread; on timeout the
    /// thread is detached and cleanup proceeds. An active recording is
    /// finalized before the devices are closed. A no-op when idle.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            log::debug!("Already stopped");
            return;
        };

        log::info!("Stopping speech jammer");
        let deadline = Instant::now() + self.config.stop_timeout;
        session.shared.running.store(false, Ordering::SeqCst);

        if session.shared.wait_for_exit(deadline) {
            if let Some(handle) = session.worker.take() {
                if handle.join().is_err() {
                    log::error!("Processing thread panicked");
                }
            }
        } else {
            log::warn!(
                "Processing thread did not exit within {:?}; releasing devices anyway",
                self.config.stop_timeout
            );
        }

        // Finalize before releasing devices. If the loop is wedged inside an
        // append, give up on the recording rather than wait past the deadline.
        let writer = match session.shared.recorder.try_lock_for(remaining(deadline)) {
            Some(mut recorder) => recorder.take(),
            None => {
                log::warn!("Recording is busy; abandoning it");
                None
            }
        };
        if let Some(writer) = writer {
            match writer.finish() {
                Ok(result) => self.recording_finished(&result),
                Err(e) => {
                    log::error!("Failed to finalize recording on stop: {}", e);
                    self.notify_error(&e);
                }
            }
        }

        session.capture.close();
        session.playback.close();

        self.last_diagnostics = session.shared.diagnostics.lock().clone();
        drop(session);

        self.set_state(JammerState::Idle);
        log::info!("Speech jammer stopped");
    }

    /// Replace the delay line with a new zero-filled one sized for `delay_ms`.
    ///
    /// Buffered audio is discarded (an audible gap). Capture and playback keep
    /// running. While idle only the requested delay is recorded.
    ///
    /// Fails with `NotRunning` if the loop had died from a lost device; the
    /// dead session is torn down first.
    pub fn update_delay(&mut self, delay_ms: u32) -> Result<(), JammerError> {
        // Allocate outside the lock; the loop sees either the old line or
        // the new one, never a mix.
        let fresh = DelayLine::new(self.format.sample_rate, delay_ms)?;
        self.requested_delay_ms = delay_ms;

        if self.reap_dead_loop() {
            return Err(JammerError::NotRunning);
        }
        let Some(ref session) = self.session else {
            log::debug!("Delay set to {}ms while idle", delay_ms);
            return Ok(());
        };

        let capacity = fresh.capacity();
        let old = std::mem::replace(&mut *session.shared.delay_line.lock(), fresh);
        drop(old);

        session.shared.diagnostics.lock().delay_reinitializations += 1;
        self.set_state(JammerState::Running { delay_ms });

        log::info!("Delay updated to {}ms, buffer size: {}", delay_ms, capacity);
        Ok(())
    }

    /// Begin recording the raw microphone input to `path` (WAV on stop).
    pub fn start_recording(&mut self, path: impl Into<PathBuf>) -> Result<(), JammerError> {
        if self.reap_dead_loop() {
            return Err(JammerError::NotRunning);
        }
        let session = self.session.as_ref().ok_or(JammerError::NotRunning)?;
        if session.shared.recorder.lock().is_some() {
            return Err(JammerError::AlreadyRecording);
        }

        let writer = RecordingWriter::start(path, self.config.copy_chunk_size)?;
        log::info!("Recording started: {}", writer.target_path().display());
        *session.shared.recorder.lock() = Some(writer);
        Ok(())
    }

    /// Finish the active recording and return the finished file.
    ///
    /// If the loop had died from a lost device, the audio captured before the
    /// loss is still returned and the dead session is torn down.
    pub fn stop_recording(&mut self) -> Result<RecordingResult, JammerError> {
        let session = self.session.as_ref().ok_or(JammerError::NoActiveRecording)?;
        let writer = session.shared.recorder.lock().take();
        self.reap_dead_loop();
        let writer = writer.ok_or(JammerError::NoActiveRecording)?;

        let result = writer.finish()?;
        self.recording_finished(&result);
        Ok(result)
    }

    // --- Internal helpers ---

    /// Run the stop cleanup if the processing thread exited on its own.
    /// Returns whether a dead session was torn down.
    fn reap_dead_loop(&mut self) -> bool {
        if self.session.is_none() || self.is_loop_alive() {
            return false;
        }
        log::warn!("Processing loop is gone; releasing devices");
        self.stop();
        true
    }

    fn set_state(&mut self, new_state: JammerState) {
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }

    fn notify_error(&self, error: &JammerError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }

    fn recording_finished(&self, result: &RecordingResult) {
        if self.config.write_metadata {
            let meta = RecordingMetadata::from_result(result, &self.format);
            if let Err(e) = metadata::write_metadata(&meta, &result.file_path) {
                log::warn!("Failed to write recording metadata: {}", e);
            }
        }
        if let Some(ref delegate) = self.delegate {
            delegate.on_recording_finished(result);
        }
    }
}

impl<S: AudioSource, K: AudioSink> Drop for JammerController<S, K> {
    fn drop(&mut self) {
        self.stop();
    }
}
