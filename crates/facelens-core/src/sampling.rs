//! Sampling gate: thins the incoming video stream down to the analysis rate.
//!
//! The gate keeps a fractional accumulator instead of a fixed "every Nth
//! frame" pattern, so a 29.97 fps stream sampled at 10 Hz alternates between
//! gaps of 3 and 2 frames and the long-run rate stays on target.

use thiserror::Error;

/// Frame rate assumed when the video source does not report one.
pub const DEFAULT_STREAM_FRAME_RATE: f64 = 30.0;

/// Default analysis rate. A blink lasts roughly 100 ms, so 10 Hz is the
/// lowest rate that still lands at least one sample inside every blink.
pub const DEFAULT_SAMPLING_FRAME_RATE: f64 = 10.0;

#[derive(Error, Debug, PartialEq)]
pub enum SamplingError {
    #[error("invalid sampling frame rate: {0} (must be a positive number)")]
    InvalidSamplingRate(f64),
}

#[derive(Debug, Clone)]
pub struct SamplingGate {
    sampling_frame_rate: f64,
    stream_frame_rate: f64,
    stride: f64,
    accumulator: f64,
}

impl SamplingGate {
    /// Build a gate for `sampling_frame_rate` analyses per second over a
    /// stream delivering `stream_frame_rate` frames per second.
    pub fn new(
        sampling_frame_rate: f64,
        stream_frame_rate: Option<f64>,
    ) -> Result<Self, SamplingError> {
        if !sampling_frame_rate.is_finite() || sampling_frame_rate <= 0.0 {
            return Err(SamplingError::InvalidSamplingRate(sampling_frame_rate));
        }
        let mut gate = Self {
            sampling_frame_rate,
            stream_frame_rate: DEFAULT_STREAM_FRAME_RATE,
            stride: 1.0,
            accumulator: 0.0,
        };
        gate.reconfigure(stream_frame_rate);
        Ok(gate)
    }

    /// Adopt a new stream frame rate. Resets the accumulator so the carry
    /// from the old stride does not leak into the new one.
    pub fn reconfigure(&mut self, stream_frame_rate: Option<f64>) {
        self.stream_frame_rate = stream_frame_rate
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .unwrap_or(DEFAULT_STREAM_FRAME_RATE);

        let stride = self.stream_frame_rate / self.sampling_frame_rate;
        if stride < 1.0 {
            tracing::debug!(
                stream_fps = self.stream_frame_rate,
                sampling_fps = self.sampling_frame_rate,
                "stream slower than sampling rate, analyzing every frame"
            );
        }
        // A stride below one frame would let the accumulator grow without bound.
        self.stride = stride.max(1.0);
        self.accumulator = 0.0;
    }

    /// Called once per incoming frame. Returns true when the frame should be analyzed.
    pub fn should_process(&mut self) -> bool {
        self.accumulator += 1.0;
        if self.accumulator >= self.stride {
            self.accumulator -= self.stride;
            true
        } else {
            false
        }
    }

    pub fn sampling_frame_rate(&self) -> f64 {
        self.sampling_frame_rate
    }

    pub fn stream_frame_rate(&self) -> f64 {
        self.stream_frame_rate
    }

    pub fn stride(&self) -> f64 {
        self.stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed_count(gate: &mut SamplingGate, frames: usize) -> usize {
        (0..frames).filter(|_| gate.should_process()).count()
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert_eq!(
            SamplingGate::new(0.0, Some(30.0)).unwrap_err(),
            SamplingError::InvalidSamplingRate(0.0)
        );
        assert!(SamplingGate::new(-5.0, Some(30.0)).is_err());
        assert!(SamplingGate::new(f64::NAN, Some(30.0)).is_err());
    }

    #[test]
    fn test_integer_stride_pattern() {
        // 30 fps at 10 Hz: every third frame
        let mut gate = SamplingGate::new(10.0, Some(30.0)).unwrap();
        let pattern: Vec<bool> = (0..6).map(|_| gate.should_process()).collect();
        assert_eq!(pattern, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_missing_stream_rate_falls_back() {
        let gate = SamplingGate::new(10.0, None).unwrap();
        assert_eq!(gate.stream_frame_rate(), DEFAULT_STREAM_FRAME_RATE);
        let gate = SamplingGate::new(10.0, Some(0.0)).unwrap();
        assert_eq!(gate.stream_frame_rate(), DEFAULT_STREAM_FRAME_RATE);
    }

    #[test]
    fn test_long_run_rate_within_one_frame() {
        for &(stream, target) in &[
            (30.0, 10.0),
            (29.97, 10.0),
            (60.0, 10.0),
            (24.0, 10.0),
            (25.0, 7.0),
            (15.0, 10.0),
            (10.0, 10.0),
        ] {
            let mut gate = SamplingGate::new(target, Some(stream)).unwrap();
            let seconds = 60.0;
            let frames = (stream * seconds) as usize;
            let processed = processed_count(&mut gate, frames) as f64;
            let expected = target * frames as f64 / stream;
            assert!(
                (processed - expected).abs() <= 1.0,
                "stream={stream} target={target}: processed {processed}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_fractional_stride_keeps_carry() {
        // 25 fps at 10 Hz: stride 2.5 alternates gaps of 3 and 2
        let mut gate = SamplingGate::new(10.0, Some(25.0)).unwrap();
        let hits: Vec<usize> = (1..=10).filter(|_| gate.should_process()).collect();
        assert_eq!(hits, vec![3, 5, 8, 10]);
    }

    #[test]
    fn test_slow_stream_processes_every_frame() {
        let mut gate = SamplingGate::new(10.0, Some(5.0)).unwrap();
        assert_eq!(gate.stride(), 1.0);
        assert_eq!(processed_count(&mut gate, 50), 50);
    }

    #[test]
    fn test_reconfigure_resets_accumulator() {
        let mut gate = SamplingGate::new(10.0, Some(30.0)).unwrap();
        assert!(!gate.should_process());
        assert!(!gate.should_process());
        gate.reconfigure(Some(60.0));
        // Fresh accumulator: the next hit comes after a full new stride
        let first_hit = (1..=10).find(|_| gate.should_process());
        assert_eq!(first_hit, Some(6));
    }
}
