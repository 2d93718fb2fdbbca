use std::time::{Duration, Instant};

use crate::types::LabelScore;

/// Decision for one classification cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Target label on top and the cooldown has elapsed (or never fired).
    Fire,
    /// Top label is not the target.
    NotTarget,
    /// Target label on top but a notification went out too recently.
    CoolingDown { remaining: Duration },
}

/// Level-triggered notification debounce.
///
/// A sustained detection re-fires each time the cooldown elapses; it does
/// not wait for the label to disappear and reappear. The caller advances the
/// gate with [`mark_notified`](Self::mark_notified) only after the
/// notification actually went out, so a failed publish is retried on the
/// next qualifying detection.
pub struct NotificationGate {
    target_label: String,
    cooldown: Duration,
    last_notified: Option<Instant>,
}

impl NotificationGate {
    pub fn new(target_label: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            target_label: target_label.into(),
            cooldown,
            last_notified: None,
        }
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn evaluate(&self, top: &LabelScore, now: Instant) -> GateDecision {
        if top.label != self.target_label {
            return GateDecision::NotTarget;
        }
        match self.last_notified {
            None => GateDecision::Fire,
            Some(last) => {
                let elapsed = now.duration_since(last);
                if elapsed >= self.cooldown {
                    GateDecision::Fire
                } else {
                    GateDecision::CoolingDown {
                        remaining: self.cooldown - elapsed,
                    }
                }
            }
        }
    }

    pub fn mark_notified(&mut self, now: Instant) {
        self.last_notified = Some(now);
    }
}
