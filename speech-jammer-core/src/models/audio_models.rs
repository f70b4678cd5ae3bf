/// Sample encoding of a device stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Signed 16-bit little-endian PCM.
    Pcm16,
}

/// Parameters a device stream is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl StreamFormat {
    /// The only format the jammer runs: 44.1 kHz mono 16-bit PCM.
    pub const JAMMER: StreamFormat = StreamFormat {
        sample_rate: 44_100,
        channels: 1,
        encoding: SampleEncoding::Pcm16,
    };

    pub fn bits_per_sample(&self) -> u16 {
        match self.encoding {
            SampleEncoding::Pcm16 => 16,
        }
    }

    /// Bytes per frame (all channels of one sample instant).
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample() / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Real-time level metering (RMS and peak, 0.0–1.0) of the last batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub input_level: f32,
    pub output_level: f32,
    pub peak_input_level: f32,
    pub peak_output_level: f32,
}

/// Counters collected by the processing loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JammerDiagnostics {
    pub batches_processed: u64,
    pub samples_processed: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub bytes_recorded: u64,
    pub delay_reinitializations: u64,
}
