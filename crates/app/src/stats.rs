use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters for the monitoring pipeline, reported on the stats tick.
/// The inbound counter is the only field touched from the transport's
/// driver task; everything else belongs to the main loop.
#[derive(Clone, Default)]
pub struct RunStats {
    pub cycles: Arc<AtomicU64>,
    pub classify_errors: Arc<AtomicU64>,
    pub detections: Arc<AtomicU64>,
    pub publishes: Arc<AtomicU64>,
    pub publish_failures: Arc<AtomicU64>,
    pub suppressed: Arc<AtomicU64>,
    pub inbound_messages: Arc<AtomicU64>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classify_error(&self) {
        self.classify_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self) {
        self.detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inbound(&self) {
        self.inbound_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn log_summary(&self) {
        tracing::info!(
            cycles = self.cycles.load(Ordering::Relaxed),
            classify_errors = self.classify_errors.load(Ordering::Relaxed),
            detections = self.detections.load(Ordering::Relaxed),
            publishes = self.publishes.load(Ordering::Relaxed),
            publish_failures = self.publish_failures.load(Ordering::Relaxed),
            suppressed = self.suppressed.load(Ordering::Relaxed),
            inbound = self.inbound_messages.load(Ordering::Relaxed),
            "Monitor running"
        );
    }
}
