use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Acoustic doorbell monitor: classifies ambient audio with a pre-trained
/// sound model and publishes a debounced MQTT notification when the target
/// label is detected.
#[derive(Parser, Debug)]
#[command(name = "catbell", version)]
pub struct Cli {
    /// Path to the audio classification model.
    #[arg(long, default_value = "yamnet.onnx")]
    pub model: PathBuf,

    /// Path to the model's class-map CSV.
    #[arg(long, default_value = "yamnet_class_map.csv")]
    pub labels: PathBuf,

    /// Maximum number of classification results to keep per window.
    #[arg(long, default_value_t = 5)]
    pub max_results: usize,

    /// Overlap between adjacent inference windows. Must be in (0, 1).
    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub overlap_factor: f32,

    /// Minimum score for a classification result to be kept. In [0, 1].
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub score_threshold: f32,

    /// Number of CPU threads for inference.
    #[arg(long, default_value_t = 4)]
    pub num_threads: usize,

    /// Run the model on a hardware accelerator.
    #[arg(long)]
    pub accelerator: bool,

    /// Broker endpoint hostname.
    #[arg(long)]
    pub endpoint: String,

    /// Root CA file path.
    #[arg(long)]
    pub root_ca: PathBuf,

    /// Client certificate file path (certificate auth).
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Client private key file path (certificate auth).
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Port override. Defaults to 8883, or 443 with --websocket.
    #[arg(long)]
    pub port: Option<u16>,

    /// Use MQTT over secure WebSocket instead of certificate auth.
    #[arg(long)]
    pub websocket: bool,

    /// Client identifier presented to the broker.
    #[arg(long, default_value = "catbell")]
    pub client_id: String,

    /// Topic for outbound notifications and the inbound control channel.
    #[arg(long, default_value = "catbell/doorbell")]
    pub topic: String,

    /// Operation mode.
    #[arg(long, value_enum, default_value = "both")]
    pub mode: Mode,

    /// Notification message text.
    #[arg(long, default_value = "The cat is at the door")]
    pub message: String,

    /// Classification label that triggers a notification.
    #[arg(long, default_value = "Cat")]
    pub target_label: String,

    /// Minimum seconds between two notifications.
    #[arg(long, default_value_t = 120)]
    pub cooldown_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Subscribe to the control topic and publish notifications.
    Both,
    /// Publish notifications only, no control subscription.
    Publish,
    /// Subscribe only; detections are logged but never published.
    Subscribe,
}

impl Mode {
    pub fn publishes(self) -> bool {
        matches!(self, Mode::Both | Mode::Publish)
    }

    pub fn subscribes(self) -> bool {
        matches!(self, Mode::Both | Mode::Subscribe)
    }
}
