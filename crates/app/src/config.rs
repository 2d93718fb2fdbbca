use std::time::Duration;

use catbell_classify::YamnetOptions;
use catbell_foundation::AppError;
use catbell_transport::{Credentials, QosLevel};

use crate::cli::{Cli, Mode};

/// Immutable configuration snapshot, validated once at startup and passed
/// by reference into each component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub classifier: YamnetOptions,
    pub overlap_factor: f32,
    pub endpoint: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Credentials,
    pub qos: QosLevel,
    pub topic: String,
    pub mode: Mode,
    pub message: String,
    pub target_label: String,
    pub cooldown: Duration,
}

impl RunConfig {
    /// Validates the parsed arguments and freezes them. All failures here
    /// happen before any network or device activity.
    pub fn from_cli(cli: Cli) -> Result<Self, AppError> {
        if cli.overlap_factor <= 0.0 || cli.overlap_factor >= 1.0 {
            return Err(AppError::Config(format!(
                "--overlap-factor must be in (0, 1) exclusive, got {}",
                cli.overlap_factor
            )));
        }
        if !(0.0..=1.0).contains(&cli.score_threshold) {
            return Err(AppError::Config(format!(
                "--score-threshold must be in [0, 1], got {}",
                cli.score_threshold
            )));
        }
        if cli.cooldown_secs == 0 {
            return Err(AppError::Config(
                "--cooldown-secs must be greater than zero".to_string(),
            ));
        }

        let credentials = if cli.websocket {
            if cli.cert.is_some() || cli.key.is_some() {
                return Err(AppError::Config(
                    "--websocket and --cert/--key are mutually exclusive".to_string(),
                ));
            }
            Credentials::Websocket {
                root_ca: cli.root_ca,
            }
        } else {
            match (cli.cert, cli.key) {
                (Some(cert), Some(key)) => Credentials::Certificate {
                    root_ca: cli.root_ca,
                    cert,
                    key,
                },
                _ => {
                    return Err(AppError::Config(
                        "certificate auth requires both --cert and --key (or use --websocket)"
                            .to_string(),
                    ))
                }
            }
        };

        let port = cli.port.unwrap_or(if cli.websocket { 443 } else { 8883 });

        Ok(Self {
            classifier: YamnetOptions {
                model: cli.model,
                labels: cli.labels,
                num_threads: cli.num_threads,
                max_results: cli.max_results,
                score_threshold: cli.score_threshold,
                accelerator: cli.accelerator,
            },
            overlap_factor: cli.overlap_factor,
            endpoint: cli.endpoint,
            port,
            client_id: cli.client_id,
            credentials,
            qos: QosLevel::AtLeastOnce,
            topic: cli.topic,
            mode: cli.mode,
            message: cli.message,
            target_label: cli.target_label,
            cooldown: Duration::from_secs(cli.cooldown_secs),
        })
    }
}
