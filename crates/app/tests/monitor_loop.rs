//! End-to-end monitoring loop tests on fake capture, classifier, and
//! transport, driven by paused tokio time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use catbell_app::cli::Mode;
use catbell_app::config::RunConfig;
use catbell_app::runtime::MonitorRuntime;
use catbell_audio::{AudioSource, AudioWindow};
use catbell_classify::{
    Classification, Classifier, ClassifyError, InputSpec, LabelScore, YamnetOptions,
};
use catbell_foundation::{AppError, AudioError, ShutdownGuard};
use catbell_transport::{Credentials, MessageHandler, QosLevel, Transport, TransportError};

const SPEC: InputSpec = InputSpec {
    sample_rate_hz: 16_000,
    window_len: 15_600,
};

struct FakeAudio;

impl AudioSource for FakeAudio {
    fn start(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn read_window(&mut self) -> Result<AudioWindow, AudioError> {
        Ok(AudioWindow {
            samples: vec![0i16; SPEC.window_len],
            sample_rate_hz: SPEC.sample_rate_hz,
        })
    }
}

/// Returns the same ranked result every cycle.
struct FakeClassifier {
    result: Classification,
}

impl FakeClassifier {
    fn always(ranked: &[(&str, f32)]) -> Self {
        Self {
            result: Classification {
                ranked: ranked
                    .iter()
                    .map(|&(label, score)| LabelScore {
                        label: label.to_string(),
                        score,
                    })
                    .collect(),
            },
        }
    }
}

impl Classifier for FakeClassifier {
    fn input_spec(&self) -> InputSpec {
        SPEC
    }

    fn classify(&mut self, _window: &AudioWindow) -> Result<Classification, ClassifyError> {
        Ok(self.result.clone())
    }
}

#[derive(Clone, Default)]
struct FakeTransport {
    connect_failures: Arc<AtomicU32>,
    connect_attempts: Arc<AtomicU32>,
    publish_failures: Arc<AtomicU32>,
    publish_attempts: Arc<AtomicU32>,
    published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    subscribed: Arc<Mutex<Vec<String>>>,
}

impl FakeTransport {
    fn new() -> Self {
        Self::default()
    }

    fn failing_connects(self, failures: u32) -> Self {
        self.connect_failures.store(failures, Ordering::SeqCst);
        self
    }

    fn failing_publishes(self, failures: u32) -> Self {
        self.publish_failures.store(failures, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.connect_failures.load(Ordering::SeqCst) {
            Err(TransportError::Connect("fake broker down".to_string()))
        } else {
            Ok(())
        }
    }

    async fn subscribe(
        &mut self,
        topic: &str,
        _qos: QosLevel,
        _handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.subscribed.lock().push(topic.to_string());
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        _qos: QosLevel,
    ) -> Result<(), TransportError> {
        let attempt = self.publish_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.publish_failures.load(Ordering::SeqCst) {
            return Err(TransportError::Publish("fake broker hiccup".to_string()));
        }
        self.published.lock().push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn test_config(mode: Mode, cooldown_secs: u64) -> RunConfig {
    RunConfig {
        classifier: YamnetOptions {
            model: "yamnet.onnx".into(),
            labels: "yamnet_class_map.csv".into(),
            num_threads: 1,
            max_results: 5,
            score_threshold: 0.0,
            accelerator: false,
        },
        overlap_factor: 0.5,
        endpoint: "broker.example.com".to_string(),
        port: 8883,
        client_id: "catbell-test".to_string(),
        credentials: Credentials::Websocket {
            root_ca: "/tmp/ca.pem".into(),
        },
        qos: QosLevel::AtLeastOnce,
        topic: "catbell/doorbell".to_string(),
        mode,
        message: "The cat is at the door".to_string(),
        target_label: "Cat".to_string(),
        cooldown: Duration::from_secs(cooldown_secs),
    }
}

#[tokio::test(start_paused = true)]
async fn cat_detection_publishes_then_respects_cooldown() {
    let transport = FakeTransport::new();
    let published = transport.published.clone();
    let classifier = FakeClassifier::always(&[("Cat", 0.92), ("Dog", 0.04)]);

    let runtime = MonitorRuntime::new(test_config(Mode::Both, 120), FakeAudio, classifier, transport);
    let shutdown = ShutdownGuard::manual();
    let guard = shutdown.clone();
    let task = tokio::spawn(runtime.run(shutdown));

    // The first detection fires once the initial interval elapses.
    tokio::time::sleep(Duration::from_secs(30)).await;
    {
        let published = published.lock();
        assert_eq!(published.len(), 1, "first detection should publish once");
        assert_eq!(published[0].0, "catbell/doorbell");
        assert_eq!(
            published[0].1,
            br#"{"message":"The cat is at the door"}"#.to_vec()
        );
    }

    // Sustained detection inside the cooldown stays suppressed.
    tokio::time::sleep(Duration::from_secs(80)).await;
    assert_eq!(published.lock().len(), 1, "cooldown must suppress repeats");

    // Past the cooldown it fires again.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(published.lock().len(), 2, "should re-fire after cooldown");

    guard.request_shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn non_target_labels_never_publish() {
    let transport = FakeTransport::new();
    let published = transport.published.clone();
    let classifier = FakeClassifier::always(&[("Dog", 0.99), ("Cat", 0.01)]);

    let runtime = MonitorRuntime::new(test_config(Mode::Both, 120), FakeAudio, classifier, transport);
    let shutdown = ShutdownGuard::manual();
    let guard = shutdown.clone();
    let task = tokio::spawn(runtime.run(shutdown));

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(published.lock().is_empty());

    guard.request_shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn connect_retry_exhaustion_is_fatal() {
    let transport = FakeTransport::new().failing_connects(u32::MAX);
    let attempts = transport.connect_attempts.clone();
    let classifier = FakeClassifier::always(&[("Cat", 0.92)]);

    let runtime = MonitorRuntime::new(test_config(Mode::Both, 120), FakeAudio, classifier, transport);
    let start = tokio::time::Instant::now();
    let result = runtime.run(ShutdownGuard::manual()).await;

    assert!(matches!(result, Err(AppError::Fatal(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    // Fixed 5 s backoff between attempts, none after the last.
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn connect_succeeds_after_transient_failures() {
    let transport = FakeTransport::new().failing_connects(4);
    let attempts = transport.connect_attempts.clone();
    let published = transport.published.clone();
    let classifier = FakeClassifier::always(&[("Cat", 0.92)]);

    let runtime = MonitorRuntime::new(test_config(Mode::Both, 120), FakeAudio, classifier, transport);
    let shutdown = ShutdownGuard::manual();
    let guard = shutdown.clone();
    let task = tokio::spawn(runtime.run(shutdown));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    assert_eq!(published.lock().len(), 1);

    guard.request_shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_publish_retries_on_next_detection() {
    let transport = FakeTransport::new().failing_publishes(2);
    let attempts = transport.publish_attempts.clone();
    let published = transport.published.clone();
    let classifier = FakeClassifier::always(&[("Cat", 0.92)]);

    let runtime = MonitorRuntime::new(test_config(Mode::Both, 120), FakeAudio, classifier, transport);
    let shutdown = ShutdownGuard::manual();
    let guard = shutdown.clone();
    let task = tokio::spawn(runtime.run(shutdown));

    // Two failed attempts leave the cooldown open, so the next cycles retry
    // until one publish lands; only then does the cooldown start.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(published.lock().len(), 1);

    // Well inside the cooldown: no further attempts.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    guard.request_shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn subscribe_mode_listens_but_never_publishes() {
    let transport = FakeTransport::new();
    let published = transport.published.clone();
    let subscribed = transport.subscribed.clone();
    let classifier = FakeClassifier::always(&[("Cat", 0.92)]);

    let runtime = MonitorRuntime::new(
        test_config(Mode::Subscribe, 120),
        FakeAudio,
        classifier,
        transport,
    );
    let stats = runtime.stats();
    let shutdown = ShutdownGuard::manual();
    let guard = shutdown.clone();
    let task = tokio::spawn(runtime.run(shutdown));

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(subscribed.lock().as_slice(), ["catbell/doorbell"]);
    assert!(published.lock().is_empty());
    // The monitor still classifies and records detections.
    assert!(stats.detections.load(Ordering::Relaxed) > 0);

    guard.request_shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn publish_mode_skips_the_subscription() {
    let transport = FakeTransport::new();
    let published = transport.published.clone();
    let subscribed = transport.subscribed.clone();
    let classifier = FakeClassifier::always(&[("Cat", 0.92)]);

    let runtime = MonitorRuntime::new(
        test_config(Mode::Publish, 120),
        FakeAudio,
        classifier,
        transport,
    );
    let shutdown = ShutdownGuard::manual();
    let guard = shutdown.clone();
    let task = tokio::spawn(runtime.run(shutdown));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(subscribed.lock().is_empty());
    assert_eq!(published.lock().len(), 1);

    guard.request_shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn classify_errors_skip_the_cycle_without_killing_the_loop() {
    struct FlakyClassifier {
        calls: u32,
    }

    impl Classifier for FlakyClassifier {
        fn input_spec(&self) -> InputSpec {
            SPEC
        }

        fn classify(&mut self, _window: &AudioWindow) -> Result<Classification, ClassifyError> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                Err(ClassifyError::Inference("bad frame".to_string()))
            } else {
                Ok(Classification {
                    ranked: vec![LabelScore {
                        label: "Cat".to_string(),
                        score: 0.92,
                    }],
                })
            }
        }
    }

    let transport = FakeTransport::new();
    let published = transport.published.clone();

    let runtime = MonitorRuntime::new(
        test_config(Mode::Both, 120),
        FakeAudio,
        FlakyClassifier { calls: 0 },
        transport,
    );
    let stats = runtime.stats();
    let shutdown = ShutdownGuard::manual();
    let guard = shutdown.clone();
    let task = tokio::spawn(runtime.run(shutdown));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(stats.classify_errors.load(Ordering::Relaxed) > 0);
    // The loop survived the errors and the first good frame published.
    assert_eq!(published.lock().len(), 1);

    guard.request_shutdown();
    task.await.unwrap().unwrap();
}
