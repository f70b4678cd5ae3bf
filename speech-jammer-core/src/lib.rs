//! # speech-jammer-core
//!
//! Delayed auditory feedback engine.
//!
//! Captures microphone audio, plays it back after a configurable delay, and
//! optionally records the undelayed input to a WAV file. Platform audio
//! backends implement the `AudioSource`/`AudioSink` traits and plug into the
//! generic `JammerController`.
//!
//! ## Architecture
//!
//! ```text
//! speech-jammer-core (this crate)
//! ├── traits/       ← AudioSource, AudioSink, CaptureStream, PlaybackStream, JammerDelegate
//! ├── models/       ← JammerError, JammerState, JammerConfiguration, StreamFormat, etc.
//! ├── processing/   ← DelayLine, PCM conversion, WAV header
//! ├── session/      ← JammerController + realtime processing loop
//! ├── storage/      ← RecordingWriter, metadata sidecar
//! ├── devices/      ← Synthetic in-memory source/sink
//! └── channel       ← SpeechJammerChannel (host-facing bool/string surface)
//! ```

pub mod channel;
pub mod devices;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use channel::SpeechJammerChannel;
pub use devices::{Exhaustion, MemorySink, SyntheticSource};
pub use models::audio_models::{AudioLevels, JammerDiagnostics, SampleEncoding, StreamFormat};
pub use models::config::JammerConfiguration;
pub use models::error::{DeviceError, JammerError};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::JammerState;
pub use processing::delay_line::{DelayLine, DelayStatus, MAX_DELAY_MS};
pub use session::controller::{JammerController, DEFAULT_DELAY_MS};
pub use storage::recording_writer::RecordingWriter;
pub use traits::audio_device::{AudioSink, AudioSource, CaptureStream, PlaybackStream};
pub use traits::jammer_delegate::JammerDelegate;
