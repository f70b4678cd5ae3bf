use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::{AudioLevels, JammerDiagnostics};
use crate::models::error::{DeviceError, JammerError};
use crate::processing::delay_line::DelayLine;
use crate::processing::pcm;
use crate::storage::recording_writer::RecordingWriter;
use crate::traits::audio_device::{CaptureStream, PlaybackStream};
use crate::traits::jammer_delegate::JammerDelegate;

/// Pause after an empty read or a failed read, so a misbehaving capture
/// device cannot spin the processing thread.
const READ_BACKOFF: Duration = Duration::from_millis(5);

/// State shared between the controller and one run of the processing thread.
///
/// A fresh instance is created for every `start`, so a thread left behind by
/// a timed-out `stop` can never touch the next session.
pub(crate) struct LoopShared {
    pub running: AtomicBool,
    /// Swapped wholesale by `update_delay`; the loop holds the lock for one batch.
    pub delay_line: Mutex<DelayLine>,
    /// Taken by `stop_recording`/`stop`; the loop holds the lock for one append.
    pub recorder: Mutex<Option<RecordingWriter>>,
    pub levels: Mutex<AudioLevels>,
    pub diagnostics: Mutex<JammerDiagnostics>,
    exited: Mutex<bool>,
    exited_signal: Condvar,
}

impl LoopShared {
    pub fn new(delay_line: DelayLine) -> Self {
        Self {
            running: AtomicBool::new(true),
            delay_line: Mutex::new(delay_line),
            recorder: Mutex::new(None),
            levels: Mutex::new(AudioLevels::default()),
            diagnostics: Mutex::new(JammerDiagnostics::default()),
            exited: Mutex::new(false),
            exited_signal: Condvar::new(),
        }
    }

    pub fn has_exited(&self) -> bool {
        *self.exited.lock()
    }

    /// Block until the loop has exited or `deadline` passes. Returns whether it exited.
    pub fn wait_for_exit(&self, deadline: Instant) -> bool {
        let mut exited = self.exited.lock();
        while !*exited {
            if self.exited_signal.wait_until(&mut exited, deadline).timed_out() {
                break;
            }
        }
        *exited
    }

    fn mark_exited(&self) {
        *self.exited.lock() = true;
        self.exited_signal.notify_all();
    }
}

/// Marks the loop as exited on every path out of `run`, including panics.
struct ExitGuard<'a>(&'a LoopShared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

/// Per-thread inputs of the processing loop.
pub(crate) struct ProcessingLoop {
    pub shared: Arc<LoopShared>,
    pub capture: Arc<dyn CaptureStream>,
    pub playback: Arc<dyn PlaybackStream>,
    pub frame_size: usize,
    pub delegate: Option<Arc<dyn JammerDelegate>>,
}

impl ProcessingLoop {
    /// Blocking read → record → delay → write cycle until the run flag clears
    /// or a device reports `Closed`. Transient device errors are logged and skipped.
    pub fn run(self) {
        let shared = Arc::clone(&self.shared);
        let _guard = ExitGuard(&shared);

        let mut input = vec![0i16; self.frame_size];
        let mut dry = vec![0.0f32; self.frame_size];
        let mut wet = vec![0.0f32; self.frame_size];
        let mut output = vec![0i16; self.frame_size];
        let mut raw = Vec::with_capacity(self.frame_size * 2);

        log::debug!("Processing loop started (frame size {})", self.frame_size);

        while shared.running.load(Ordering::SeqCst) {
            let frames = match self.capture.read(&mut input) {
                Ok(n) => n.min(self.frame_size),
                Err(e) if e.is_fatal() => {
                    self.device_lost("capture", &e);
                    break;
                }
                Err(e) => {
                    let errors = {
                        let mut diagnostics = shared.diagnostics.lock();
                        diagnostics.read_errors += 1;
                        diagnostics.read_errors
                    };
                    // First few in full, then every 100th.
                    if errors <= 3 || errors % 100 == 0 {
                        log::warn!("Capture read error ({} so far): {}", errors, e);
                    }
                    thread::sleep(READ_BACKOFF);
                    continue;
                }
            };
            if frames == 0 {
                thread::sleep(READ_BACKOFF);
                continue;
            }

            let batch = &input[..frames];
            self.record(batch, &mut raw);

            pcm::decode_i16(batch, &mut dry[..frames]);
            shared
                .delay_line
                .lock()
                .process_slice(&dry[..frames], &mut wet[..frames]);
            pcm::encode_i16(&wet[..frames], &mut output[..frames]);

            {
                let mut levels = shared.levels.lock();
                levels.input_level = pcm::rms_level(&dry[..frames]);
                levels.peak_input_level = pcm::peak_level(&dry[..frames]);
                levels.output_level = pcm::rms_level(&wet[..frames]);
                levels.peak_output_level = pcm::peak_level(&wet[..frames]);
            }
            {
                let mut diagnostics = shared.diagnostics.lock();
                diagnostics.batches_processed += 1;
                diagnostics.samples_processed += frames as u64;
            }

            match self.playback.write(&output[..frames]) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    self.device_lost("playback", &e);
                    break;
                }
                Err(e) => {
                    log::warn!("Playback write error: {}", e);
                    shared.diagnostics.lock().write_errors += 1;
                }
            }
        }

        log::debug!("Processing loop stopped");
    }

    /// Append the raw input batch to the active recording, if any.
    ///
    /// A failed append discards the recording; playback is unaffected.
    fn record(&self, batch: &[i16], raw: &mut Vec<u8>) {
        let error = {
            let mut recorder = self.shared.recorder.lock();
            let Some(writer) = recorder.as_mut() else {
                return;
            };

            raw.clear();
            pcm::extend_le_bytes(batch, raw);
            match writer.append(raw.as_slice()) {
                Ok(()) => {
                    self.shared.diagnostics.lock().bytes_recorded += raw.len() as u64;
                    return;
                }
                Err(e) => {
                    if let Some(mut writer) = recorder.take() {
                        writer.abort();
                    }
                    e
                }
            }
        };

        log::error!("Recording failed, session discarded: {}", error);
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
    }

    fn device_lost(&self, which: &str, error: &DeviceError) {
        // A close issued by `stop` is expected and not worth reporting.
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        log::error!("{} device lost: {}", which, error);
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&JammerError::DeviceClosed);
        }
    }
}

/// Time left until `deadline`, saturating at zero.
pub(crate) fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Exhaustion, MemorySink, SyntheticSource};
    use crate::models::audio_models::StreamFormat;
    use crate::traits::audio_device::{AudioSink, AudioSource};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct ErrorLog {
        errors: Mutex<Vec<JammerError>>,
        caller: Mutex<Option<thread::ThreadId>>,
    }

    impl JammerDelegate for ErrorLog {
        fn on_state_changed(&self, _state: &crate::models::state::JammerState) {}

        fn on_error(&self, error: &JammerError) {
            self.errors.lock().push(error.clone());
            *self.caller.lock() = Some(thread::current().id());
        }

        fn on_recording_finished(&self, _result: &crate::models::recording_result::RecordingResult) {}
    }

    fn run_to_end(source: &SyntheticSource, sink: &MemorySink, delay_line: DelayLine, frame_size: usize) -> Arc<LoopShared> {
        let shared = Arc::new(LoopShared::new(delay_line));
        let processing = ProcessingLoop {
            shared: Arc::clone(&shared),
            capture: source.open(&StreamFormat::JAMMER).unwrap(),
            playback: sink.open(&StreamFormat::JAMMER).unwrap(),
            frame_size,
            delegate: None,
        };
        processing.run();
        shared
    }

    #[test]
    fn plays_input_delayed_by_capacity() {
        let script: Vec<i16> = (0..3000).map(|i| (i % 200 - 100) as i16 * 100).collect();
        let source = SyntheticSource::new(script.clone()).with_exhaustion(Exhaustion::Close);
        let sink = MemorySink::new();

        let shared = run_to_end(&source, &sink, DelayLine::new(44_100, 0).unwrap(), 256);

        let played = sink.samples();
        assert_eq!(played.len(), 3000);
        assert!(played[..1024].iter().all(|&s| s == 0));
        assert_eq!(&played[1024..], &script[..3000 - 1024]);

        assert!(shared.has_exited());
        let diagnostics = shared.diagnostics.lock().clone();
        assert_eq!(diagnostics.samples_processed, 3000);
        assert_eq!(diagnostics.batches_processed, 12); // ceil(3000 / 256)
    }

    #[test]
    fn transient_errors_are_counted_and_skipped() {
        let source = SyntheticSource::new(vec![1000; 100])
            .with_exhaustion(Exhaustion::Close)
            .with_read_failures(3);
        let sink = MemorySink::new().with_write_failures(1);

        let shared = run_to_end(&source, &sink, DelayLine::new(44_100, 0).unwrap(), 64);

        let diagnostics = shared.diagnostics.lock().clone();
        assert_eq!(diagnostics.read_errors, 3);
        assert_eq!(diagnostics.write_errors, 1);
        assert_eq!(diagnostics.samples_processed, 100);
        // The first 64-sample batch was dropped by the failing write.
        assert_eq!(sink.samples().len(), 36);
    }

    #[test]
    fn device_closed_stops_loop_and_clears_flag() {
        let source = SyntheticSource::new(vec![0; 10]).with_exhaustion(Exhaustion::Close);
        let sink = MemorySink::new();

        let shared = run_to_end(&source, &sink, DelayLine::new(44_100, 0).unwrap(), 1024);

        assert!(shared.has_exited());
        assert!(!shared.running.load(Ordering::SeqCst));
        assert!(shared.wait_for_exit(Instant::now()));
    }

    #[test]
    fn levels_reflect_last_batch() {
        let source = SyntheticSource::new(vec![i16::MAX; 50]).with_exhaustion(Exhaustion::Close);
        let sink = MemorySink::new();

        let shared = run_to_end(&source, &sink, DelayLine::new(44_100, 0).unwrap(), 1024);

        let levels = *shared.levels.lock();
        assert_eq!(levels.peak_input_level, 1.0);
        assert_eq!(levels.peak_output_level, 0.0);
    }

    #[test]
    fn recording_failure_keeps_playback_running() {
        let source = SyntheticSource::new(vec![300; 500]).with_exhaustion(Exhaustion::Close);
        let sink = MemorySink::new();
        let shared = Arc::new(LoopShared::new(DelayLine::new(44_100, 0).unwrap()));

        // An aborted writer has no open spool, so its first append fails.
        let path = std::env::temp_dir().join(format!("speech_jammer_loop_{}.wav", uuid::Uuid::new_v4()));
        let mut writer = RecordingWriter::start(&path, 8192).unwrap();
        writer.abort();
        *shared.recorder.lock() = Some(writer);

        let delegate = Arc::new(ErrorLog::default());
        let processing = ProcessingLoop {
            shared: Arc::clone(&shared),
            capture: source.open(&StreamFormat::JAMMER).unwrap(),
            playback: sink.open(&StreamFormat::JAMMER).unwrap(),
            frame_size: 128,
            delegate: Some(delegate.clone()),
        };
        let worker = thread::spawn(move || processing.run());
        worker.join().unwrap();

        let errors = delegate.errors.lock().clone();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], JammerError::Io(_)));
        assert_eq!(errors[1], JammerError::DeviceClosed);
        let caller = *delegate.caller.lock();
        assert!(caller.is_some());
        assert_ne!(caller, Some(thread::current().id()));

        assert!(shared.recorder.lock().is_none());
        assert_eq!(sink.samples().len(), 500);
        assert_eq!(shared.diagnostics.lock().bytes_recorded, 0);
        assert!(!path.exists());
    }

    #[test]
    fn empty_reads_back_off() {
        struct EmptyStream(Arc<AtomicUsize>);

        impl CaptureStream for EmptyStream {
            fn read(&self, _buffer: &mut [i16]) -> Result<usize, DeviceError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            }

            fn close(&self) {}
        }

        let reads = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(LoopShared::new(DelayLine::new(44_100, 0).unwrap()));
        let sink = MemorySink::new();
        let processing = ProcessingLoop {
            shared: Arc::clone(&shared),
            capture: Arc::new(EmptyStream(Arc::clone(&reads))),
            playback: sink.open(&StreamFormat::JAMMER).unwrap(),
            frame_size: 64,
            delegate: None,
        };

        let worker = thread::spawn(move || processing.run());
        thread::sleep(Duration::from_millis(100));
        shared.running.store(false, Ordering::SeqCst);
        worker.join().unwrap();

        // 100 ms at one read per 5 ms backoff; a spinning loop would do millions.
        let reads = reads.load(Ordering::SeqCst);
        assert!(reads > 0);
        assert!(reads < 100, "{} reads", reads);
        assert_eq!(shared.diagnostics.lock().batches_processed, 0);
        assert!(sink.samples().is_empty());
    }

    #[test]
    fn remaining_saturates() {
        assert_eq!(remaining(Instant::now() - Duration::from_millis(5)), Duration::ZERO);
    }
}
