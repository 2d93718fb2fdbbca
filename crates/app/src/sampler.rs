use std::time::{Duration, Instant};

/// Outcome of one scheduler poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Run one classify cycle now.
    Run,
    /// Too soon; wait this long and poll again.
    Wait(Duration),
}

/// Paces inference to at most one run per interval.
///
/// The interval is derived from the window duration and the overlap factor:
/// with 0.5 overlap, consecutive windows share half their samples. Waits are
/// short fixed pauses rather than one long sleep so the caller can observe
/// cancellation between ticks.
pub struct SampleScheduler {
    last_inference: Instant,
    interval: Duration,
    pause: Duration,
}

impl SampleScheduler {
    /// `overlap_factor` must already be validated to (0, 1).
    pub fn new(window_duration: Duration, overlap_factor: f32, now: Instant) -> Self {
        let interval = window_duration.mul_f32(1.0 - overlap_factor);
        Self {
            last_inference: now,
            interval,
            pause: interval / 10,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    pub fn poll(&mut self, now: Instant) -> Tick {
        if now.duration_since(self.last_inference) < self.interval {
            Tick::Wait(self.pause)
        } else {
            self.last_inference = now;
            Tick::Run
        }
    }
}
