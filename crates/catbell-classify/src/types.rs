use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One ranked classification entry. Scores are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Ranked classification result for one audio window, descending by score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    pub ranked: Vec<LabelScore>,
}

impl Classification {
    /// The highest-scoring entry, if any label survived filtering.
    pub fn top(&self) -> Option<&LabelScore> {
        self.ranked.first()
    }
}

/// The input shape a classifier expects from the capture side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub sample_rate_hz: u32,
    pub window_len: usize,
}

impl InputSpec {
    /// Wall-clock duration of one input window.
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs_f64(self.window_len as f64 / self.sample_rate_hz as f64)
    }

    pub fn matches(&self, sample_rate_hz: u32, len: usize) -> bool {
        self.sample_rate_hz == sample_rate_hz && self.window_len == len
    }
}
