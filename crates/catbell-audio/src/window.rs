use std::collections::VecDeque;

use parking_lot::Mutex;

/// One fixed-length slice of recent audio, mono i16.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    pub samples: Vec<i16>,
    pub sample_rate_hz: u32,
}

/// Rolling buffer holding the most recent `window_len` mono samples.
///
/// The buffer starts pre-filled with silence so a snapshot taken before the
/// first callback still has the full window length. The capture callback
/// pushes, the sampling loop snapshots; both sides touch the lock briefly.
pub struct WindowRing {
    window_len: usize,
    samples: Mutex<VecDeque<i16>>,
}

impl WindowRing {
    pub fn new(window_len: usize) -> Self {
        Self {
            window_len,
            samples: Mutex::new(VecDeque::from(vec![0i16; window_len])),
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn push(&self, incoming: &[i16]) {
        let mut samples = self.samples.lock();
        for &s in incoming {
            if samples.len() == self.window_len {
                samples.pop_front();
            }
            samples.push_back(s);
        }
    }

    /// Copies the current window, oldest sample first, into `out`.
    pub fn snapshot(&self, out: &mut Vec<i16>) {
        let samples = self.samples.lock();
        out.clear();
        out.extend(samples.iter().copied());
    }
}
