use serde::Deserialize;
use std::io::Write;
use tokio::sync::mpsc;
use tracing::error;

use crate::imu::ImuSample;

/// How decoded samples are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `Parsed IMU data: AccelX: 12, GyroX: -3, ...`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

pub fn render(sample: &ImuSample, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("Parsed IMU data: {}", sample.fields)),
        OutputFormat::Json => serde_json::to_string(sample)
            .map_err(|e| anyhow::anyhow!("Failed to serialize IMU sample: {}", e)),
    }
}

/// Drain the receiver's sink to stdout until every sender is gone
pub async fn run_printer(mut rx: mpsc::UnboundedReceiver<ImuSample>, format: OutputFormat) {
    let stdout = std::io::stdout();
    while let Some(sample) = rx.recv().await {
        let line = match render(&sample, format) {
            Ok(line) => line,
            Err(e) => {
                error!("{}", e);
                continue;
            }
        };
        let mut out = stdout.lock();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            error!("Failed to write IMU sample: {}", e);
        }
    }
}
