use anyhow::Context;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use catbell_app::cli::Cli;
use catbell_app::config::RunConfig;
use catbell_app::runtime::MonitorRuntime;
use catbell_audio::MicSource;
use catbell_classify::{Classifier, YamnetClassifier};
use catbell_foundation::ShutdownHandler;
use catbell_transport::{MqttSettings, MqttTransport};

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "catbell.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(_guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let cli = Cli::parse();
    let config = RunConfig::from_cli(cli).context("Invalid configuration")?;
    tracing::info!("Starting catbell monitor");

    let shutdown = ShutdownHandler::new().install().await;

    let classifier =
        YamnetClassifier::new(&config.classifier).context("Failed to load classifier")?;
    let spec = classifier.input_spec();
    let audio = MicSource::new(spec.sample_rate_hz, spec.window_len);
    let transport = MqttTransport::new(
        config.endpoint.clone(),
        config.port,
        config.client_id.clone(),
        config.credentials.clone(),
        MqttSettings::default(),
    );

    let runtime = MonitorRuntime::new(config, audio, classifier, transport);
    runtime.run(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
