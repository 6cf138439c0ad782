mod config;
mod imu;
mod output;
mod tcp;
mod udp;

use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use imu::ImuSample;
use output::OutputFormat;
use udp::ReceiverStats;

#[derive(Parser)]
#[command(name = "imu-link")]
#[command(about = "Register with a camera over TCP and print the IMU samples it streams over UDP")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Camera IP address or hostname
    #[arg(long)]
    camera: Option<String>,

    /// Camera TCP control port
    #[arg(long)]
    control_port: Option<u16>,

    /// Local UDP port receiving IMU datagrams
    #[arg(short, long)]
    port: Option<u16>,

    /// Output format for decoded samples
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(ref camera) = self.camera {
            config.camera.address = camera.clone();
        }
        if let Some(port) = self.control_port {
            config.camera.control_port = port;
        }
        if let Some(port) = self.port {
            config.telemetry.port = port;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = config::Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        config::Config::default()
    });
    cli.apply_overrides(&mut config);

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("imu-link v{}", env!("CARGO_PKG_VERSION"));
    info!("Camera control: {}", config.camera.control_endpoint());
    info!("IMU telemetry:  udp://{}", config.telemetry.bind_endpoint());

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(output::run_printer(rx, config.output.format));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shutdown.cancel();
        }
    });

    let stats = run(&config, tx, cancel).await?;
    info!(
        "Received {} datagrams: {} emitted, {} empty, {} undecodable",
        stats.datagrams, stats.emitted, stats.empty, stats.failed
    );

    printer.await?;
    Ok(())
}

/// Start the receive loop in the background, register on this task, then
/// wait for the receive loop.
///
/// The registration ending (refused or disconnected) never stops the
/// receiver; only `cancel` does. A bind failure is returned once the
/// registration has ended.
async fn run(
    config: &config::Config,
    sink: mpsc::UnboundedSender<ImuSample>,
    cancel: CancellationToken,
) -> anyhow::Result<ReceiverStats> {
    let telemetry = config.telemetry.clone();
    let receiver_cancel = cancel.clone();
    let receiver = tokio::spawn(async move {
        let result = run_receiver(telemetry, sink, receiver_cancel).await;
        if let Err(ref e) = result {
            error!("Telemetry receiver failed: {}", e);
        }
        result
    });

    tokio::select! {
        result = tcp::register(&config.camera) => match result {
            Ok(session) => info!(
                "Registration ended after {} reads ({} bytes)",
                session.reads, session.bytes
            ),
            Err(e) => error!("{}", e),
        },
        _ = cancel.cancelled() => {}
    }

    receiver.await?
}

async fn run_receiver(
    config: config::TelemetryConfig,
    sink: mpsc::UnboundedSender<ImuSample>,
    cancel: CancellationToken,
) -> anyhow::Result<ReceiverStats> {
    let receiver = udp::TelemetryReceiver::bind(&config).await?;
    receiver.run(sink, cancel).await
}
