use crate::models::error::JammerError;

/// Smallest delay buffer ever allocated, in samples.
pub const MIN_CAPACITY: usize = 1024;

/// Longest delay a line accepts. 10 s at 44.1 kHz is 441 000 samples.
pub const MAX_DELAY_MS: u32 = 10_000;

/// Number of samples held by a delay line for `delay_ms` at `sample_rate`.
///
/// `max(1024, sample_rate * delay_ms / 1000)`, integer arithmetic.
pub fn capacity_for(sample_rate: u32, delay_ms: u32) -> usize {
    let samples = sample_rate as u64 * delay_ms as u64 / 1000;
    (samples as usize).max(MIN_CAPACITY)
}

/// Point-in-time view of a delay line's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayStatus {
    pub delay_ms: u32,
    pub capacity: usize,
    pub write_index: usize,
    pub read_index: usize,
}

/// Fixed-capacity circular buffer imposing a constant offset of `capacity`
/// samples between input and output.
///
/// Not synchronized. The controller keeps it behind a
/// `parking_lot::Mutex<DelayLine>`; only the processing thread calls
/// `process`, and a delay change swaps in a freshly built line.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_index: usize,
    read_index: usize,
    sample_rate: u32,
    delay_ms: u32,
}

impl DelayLine {
    /// Allocate a zero-filled line for `delay_ms` with both indices at 0.
    ///
    /// Fails with `InvalidDelay` above `MAX_DELAY_MS` and with `Io` if the
    /// buffer cannot be allocated.
    pub fn new(sample_rate: u32, delay_ms: u32) -> Result<Self, JammerError> {
        Ok(Self {
            buffer: zeroed_buffer(sample_rate, delay_ms)?,
            write_index: 0,
            read_index: 0,
            sample_rate,
            delay_ms,
        })
    }

    /// Push one sample and return the sample pushed `capacity` calls ago
    /// (silence until the line has filled once).
    pub fn process(&mut self, sample: f32) -> f32 {
        let capacity = self.buffer.len();

        let delayed = self.buffer[self.read_index];
        self.read_index = (self.read_index + 1) % capacity;

        self.buffer[self.write_index] = sample;
        self.write_index = (self.write_index + 1) % capacity;

        delayed
    }

    /// Run `input` through the line, writing delayed samples into `output`.
    ///
    /// Processes `min(input.len(), output.len())` samples.
    pub fn process_slice(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process(sample);
        }
    }

    /// Reallocate for a new delay. Buffered audio is discarded and both
    /// indices return to 0, so playback restarts from silence.
    ///
    /// On error the line is left as it was.
    pub fn update_delay(&mut self, delay_ms: u32) -> Result<(), JammerError> {
        self.buffer = zeroed_buffer(self.sample_rate, delay_ms)?;
        self.write_index = 0;
        self.read_index = 0;
        self.delay_ms = delay_ms;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn status(&self) -> DelayStatus {
        DelayStatus {
            delay_ms: self.delay_ms,
            capacity: self.buffer.len(),
            write_index: self.write_index,
            read_index: self.read_index,
        }
    }

    /// Raw buffer contents in storage order.
    pub fn samples(&self) -> &[f32] {
        &self.buffer
    }
}

fn zeroed_buffer(sample_rate: u32, delay_ms: u32) -> Result<Vec<f32>, JammerError> {
    if delay_ms > MAX_DELAY_MS {
        return Err(JammerError::InvalidDelay {
            delay_ms,
            max_ms: MAX_DELAY_MS,
        });
    }

    let capacity = capacity_for(sample_rate, delay_ms);
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|e| JammerError::Io(format!("failed to allocate delay buffer of {} samples: {}", capacity, e)))?;
    buffer.resize(capacity, 0.0);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn capacity_floors_at_1024() {
        assert_eq!(capacity_for(44_100, 0), 1024);
        assert_eq!(capacity_for(44_100, 10), 1024); // 441 samples
        assert_eq!(capacity_for(44_100, 23), 1024); // 1014 samples
        assert_eq!(capacity_for(44_100, 24), 1058);
    }

    #[test]
    fn capacity_scales_with_delay() {
        assert_eq!(capacity_for(44_100, 200), 8820);
        assert_eq!(capacity_for(44_100, 1000), 44_100);
        assert_eq!(capacity_for(48_000, 250), 12_000);
    }

    #[test]
    fn capacity_does_not_overflow() {
        assert_eq!(capacity_for(44_100, u32::MAX), 44_100 * u32::MAX as usize / 1000);
    }

    #[test]
    fn new_line_is_zeroed() {
        let line = DelayLine::new(44_100, 200).unwrap();
        assert_eq!(line.capacity(), 8820);
        assert_eq!(line.write_index(), 0);
        assert_eq!(line.read_index(), 0);
        assert!(line.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn output_is_input_delayed_by_capacity() {
        let mut line = DelayLine::new(44_100, 0).unwrap();
        let capacity = line.capacity();
        let input: Vec<f32> = (0..capacity).map(|i| (i as f32 / capacity as f32) - 0.5).collect();

        for &sample in &input {
            assert_eq!(line.process(sample), 0.0);
        }

        // Step C+1 returns the first input, step C+2 the second, ...
        assert_eq!(line.process(0.9), input[0]);
        assert_eq!(line.process(0.9), input[1]);
        assert_eq!(line.process(0.9), input[2]);
    }

    #[test]
    fn indices_stay_in_lockstep() {
        let mut line = DelayLine::new(44_100, 0).unwrap();
        for i in 0..(line.capacity() * 2 + 7) {
            line.process(i as f32);
            assert_eq!(line.write_index(), line.read_index());
            assert!(line.write_index() < line.capacity());
        }
        assert_eq!(line.write_index(), 7);
    }

    #[test]
    fn two_hundred_ms_delay_scenario() {
        let mut line = DelayLine::new(44_100, 200).unwrap();
        assert_eq!(line.capacity(), 8820);

        for _ in 0..8820 {
            assert_eq!(line.process(0.0), 0.0);
        }
        // Step 8821: the pulse goes in, the first zero comes out.
        assert_eq!(line.process(0.5), 0.0);

        for _ in 0..8819 {
            assert_eq!(line.process(0.0), 0.0);
        }
        // Exactly 8820 steps after it entered, the pulse plays.
        assert_abs_diff_eq!(line.process(0.0), 0.5, epsilon = 1.0 / 32767.0);
    }

    #[test]
    fn update_delay_resets_indices_and_buffer() {
        let mut line = DelayLine::new(44_100, 100).unwrap();
        for i in 0..3000 {
            line.process((i % 7) as f32 * 0.1);
        }
        assert_ne!(line.write_index(), 0);

        line.update_delay(300).unwrap();

        assert_eq!(line.delay_ms(), 300);
        assert_eq!(line.capacity(), 13_230);
        assert_eq!(line.write_index(), 0);
        assert_eq!(line.read_index(), 0);
        assert!(line.samples().iter().all(|&s| s == 0.0));
        assert_eq!(line.process(0.7), 0.0);
    }

    #[test]
    fn process_slice_matches_per_sample() {
        let input: Vec<f32> = (0..3000).map(|i| (i as f32 * 0.01).sin()).collect();

        let mut a = DelayLine::new(44_100, 0).unwrap();
        let mut out_a = vec![0.0; input.len()];
        a.process_slice(&input, &mut out_a);

        let mut b = DelayLine::new(44_100, 0).unwrap();
        let out_b: Vec<f32> = input.iter().map(|&s| b.process(s)).collect();

        assert_eq!(out_a, out_b);
        assert_eq!(&out_a[1024..], &input[..3000 - 1024]);
    }

    #[test]
    fn total_for_arbitrary_floats() {
        let mut line = DelayLine::new(44_100, 0).unwrap();
        for &sample in &[f32::NAN, f32::INFINITY, -f32::INFINITY, 5.0, -5.0] {
            line.process(sample);
        }
        for _ in 0..1019 {
            line.process(0.0);
        }
        assert!(line.process(0.0).is_nan());
        assert_eq!(line.process(0.0), f32::INFINITY);
    }

    #[test]
    fn rejects_delay_above_maximum() {
        assert!(DelayLine::new(44_100, MAX_DELAY_MS).is_ok());
        assert_eq!(
            DelayLine::new(44_100, i32::MAX as u32).unwrap_err(),
            JammerError::InvalidDelay {
                delay_ms: i32::MAX as u32,
                max_ms: MAX_DELAY_MS,
            }
        );
    }

    #[test]
    fn failed_update_keeps_current_line() {
        let mut line = DelayLine::new(44_100, 200).unwrap();
        line.process(0.25);

        assert!(line.update_delay(MAX_DELAY_MS + 1).is_err());

        assert_eq!(line.delay_ms(), 200);
        assert_eq!(line.capacity(), 8820);
        assert_eq!(line.write_index(), 1);
    }
}
