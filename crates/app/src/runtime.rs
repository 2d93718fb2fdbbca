use std::time::{Duration, Instant};

use catbell_audio::AudioSource;
use catbell_classify::{Classifier, GateDecision, NotificationGate};
use catbell_foundation::{AppError, ShutdownGuard};
use catbell_transport::{ConnectionManager, RetryPolicy, Transport};

use crate::config::RunConfig;
use crate::sampler::{SampleScheduler, Tick};
use crate::stats::RunStats;

const STATS_PERIOD: Duration = Duration::from_secs(30);

/// Reads tokio's clock so paused-time tests drive the scheduler and the
/// cooldown the same way they drive the sleeps.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Composes capture, classification, debounce, and transport into the
/// indefinite monitoring loop. Generic over the three capability traits so
/// integration tests run entirely on fakes.
pub struct MonitorRuntime<S, C, T: Transport> {
    config: RunConfig,
    audio: S,
    classifier: C,
    manager: ConnectionManager<T>,
    gate: NotificationGate,
    stats: RunStats,
}

impl<S, C, T> MonitorRuntime<S, C, T>
where
    S: AudioSource,
    C: Classifier,
    T: Transport,
{
    pub fn new(config: RunConfig, audio: S, classifier: C, transport: T) -> Self {
        let gate = NotificationGate::new(config.target_label.clone(), config.cooldown);
        Self {
            config,
            audio,
            classifier,
            manager: ConnectionManager::new(transport, RetryPolicy::default()),
            gate,
            stats: RunStats::new(),
        }
    }

    /// Shared handle to the run counters, for the stats tick and tests.
    pub fn stats(&self) -> RunStats {
        self.stats.clone()
    }

    /// Connects, subscribes, and runs until the shutdown guard fires.
    pub async fn run(mut self, shutdown: ShutdownGuard) -> Result<(), AppError> {
        self.manager
            .connect()
            .await
            .map_err(|e| AppError::Fatal(format!("Could not connect to broker: {}", e)))?;

        if self.config.mode.subscribes() {
            // Side channel for operator visibility only; the handler runs on
            // the transport's driver task and must not touch loop state.
            let stats = self.stats.clone();
            let result = self
                .manager
                .subscribe(
                    &self.config.topic,
                    self.config.qos,
                    Box::new(move |msg| {
                        stats.record_inbound();
                        tracing::info!(
                            topic = %msg.topic,
                            payload = %String::from_utf8_lossy(&msg.payload),
                            "Received control message"
                        );
                    }),
                )
                .await;
            if let Err(e) = result {
                tracing::warn!("Subscribe to {} failed: {}", self.config.topic, e);
            }
        }

        self.audio.start()?;

        let spec = self.classifier.input_spec();
        let mut scheduler =
            SampleScheduler::new(spec.window_duration(), self.config.overlap_factor, now());
        tracing::info!(
            "Monitoring for {:?} every {:?} (window {:?})",
            self.config.target_label,
            scheduler.interval(),
            spec.window_duration()
        );

        let payload = serde_json::json!({ "message": self.config.message }).to_string();
        let mut stats_interval =
            tokio::time::interval_at(tokio::time::Instant::now() + STATS_PERIOD, STATS_PERIOD);

        loop {
            if shutdown.is_shutdown_requested() {
                break;
            }
            match scheduler.poll(now()) {
                Tick::Run => self.cycle(&payload).await,
                Tick::Wait(pause) => {
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(pause) => {}
                        _ = stats_interval.tick() => self.stats.log_summary(),
                    }
                }
            }
        }

        tracing::info!("Shutting down monitor");
        if let Err(e) = self.manager.disconnect().await {
            tracing::warn!("Disconnect failed: {}", e);
        }
        Ok(())
    }

    /// One classify cycle. Transient failures log and skip; only the
    /// shutdown signal ends the loop.
    async fn cycle(&mut self, payload: &str) {
        self.stats.record_cycle();

        let window = match self.audio.read_window() {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!("Window read failed, skipping cycle: {}", e);
                self.stats.record_classify_error();
                return;
            }
        };
        let result = match self.classifier.classify(&window) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Classification failed, skipping cycle: {}", e);
                self.stats.record_classify_error();
                return;
            }
        };
        let Some(top) = result.top() else {
            return;
        };
        tracing::trace!(label = %top.label, score = top.score, "Top classification");

        let now = now();
        match self.gate.evaluate(top, now) {
            GateDecision::NotTarget => {}
            GateDecision::CoolingDown { remaining } => {
                self.stats.record_detection();
                self.stats.record_suppressed();
                tracing::debug!(
                    "{} detected, cooling down for {:?}",
                    top.label,
                    remaining
                );
            }
            GateDecision::Fire => {
                self.stats.record_detection();
                tracing::info!(label = %top.label, score = top.score, "Target sound detected");

                if !self.config.mode.publishes() {
                    // Subscribe-only mode still debounces the detection log.
                    self.gate.mark_notified(now);
                    return;
                }
                match self
                    .manager
                    .publish(&self.config.topic, payload.as_bytes(), self.config.qos)
                    .await
                {
                    Ok(()) => {
                        self.gate.mark_notified(now);
                        self.stats.record_publish();
                        tracing::info!("Notification published to {}", self.config.topic);
                    }
                    Err(e) => {
                        // Cooldown stays open so the next detection retries.
                        self.stats.record_publish_failure();
                        tracing::warn!("Publish failed, will retry on next detection: {}", e);
                    }
                }
            }
        }
    }
}
