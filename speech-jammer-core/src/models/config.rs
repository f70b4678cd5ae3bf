use std::time::Duration;

/// Tunables for a jammer controller.
///
/// Stream parameters are fixed (see `StreamFormat::JAMMER`); only the loop
/// batch size, stop behaviour and recording output can be adjusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JammerConfiguration {
    /// Samples read from the source per loop iteration (default: 1024).
    pub frame_size: usize,

    /// Upper bound on how long `stop` waits for the processing thread
    /// (default: 1000 ms).
    pub stop_timeout: Duration,

    /// Bytes copied per step when the WAV file is produced (default: 8192).
    pub copy_chunk_size: usize,

    /// Write a `.metadata.json` sidecar next to each finished recording.
    pub write_metadata: bool,
}

impl JammerConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_size == 0 {
            return Err("frame size must be positive".into());
        }
        if self.stop_timeout.is_zero() {
            return Err("stop timeout must be positive".into());
        }
        if self.copy_chunk_size == 0 || self.copy_chunk_size % 2 != 0 {
            return Err(format!(
                "copy chunk size must be a positive multiple of 2: {}",
                self.copy_chunk_size
            ));
        }
        Ok(())
    }
}

impl Default for JammerConfiguration {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            stop_timeout: Duration::from_millis(1000),
            copy_chunk_size: 8192,
            write_metadata: false,
        }
    }
}
