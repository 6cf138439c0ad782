use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::imu::{self, ImuSample};

/// Counters reported when the receive loop is cancelled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub datagrams: u64,
    pub emitted: u64,
    pub empty: u64,
    pub failed: u64,
}

/// Datagram listener for the camera's IMU stream.
///
/// Binding and running are separate steps so that a bind failure can be
/// reported before the loop is spawned.
pub struct TelemetryReceiver {
    socket: UdpSocket,
    buffer_size: usize,
}

impl TelemetryReceiver {
    pub async fn bind(config: &TelemetryConfig) -> anyhow::Result<Self> {
        let endpoint = config.bind_endpoint();
        let socket = UdpSocket::bind(&endpoint)
            .await
            .map_err(|e| anyhow::anyhow!("UDP bind to {} failed: {}", endpoint, e))?;

        Ok(Self {
            socket,
            buffer_size: config.buffer_size.max(1),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until `cancel` fires.
    ///
    /// Nothing inside the loop stops it: receive errors and decode failures
    /// are logged and skipped, and a dropped `sink` only silences emission.
    /// Only cancellation ends it.
    pub async fn run(
        self,
        sink: mpsc::UnboundedSender<ImuSample>,
        cancel: CancellationToken,
    ) -> anyhow::Result<ReceiverStats> {
        info!(
            "UDP listener started on {}, waiting for IMU data...",
            self.local_addr()?
        );

        let mut buf = vec![0u8; self.buffer_size];
        let mut stats = ReceiverStats::default();
        let mut sink_open = true;

        loop {
            let (len, src) = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("UDP listener stopped after {} datagrams", stats.datagrams);
                    return Ok(stats);
                }
                received = self.socket.recv_from(&mut buf) => {
                    match accept_received(received, &mut stats) {
                        Some(received) => received,
                        None => continue,
                    }
                }
            };

            let Some(sample) = handle_datagram(&buf[..len], src, &mut stats) else {
                continue;
            };

            if sink_open && sink.send(sample).is_err() {
                warn!("Record sink closed, decoded samples will be dropped");
                sink_open = false;
            }
        }
    }
}

/// Count a `recv_from` result, turning errors into a skipped datagram.
///
/// An oversized datagram is an error rather than a truncation on some
/// platforms (WSAEMSGSIZE), so it goes through the same path as a payload
/// that fails to decode.
fn accept_received(
    received: std::io::Result<(usize, SocketAddr)>,
    stats: &mut ReceiverStats,
) -> Option<(usize, SocketAddr)> {
    match received {
        Ok(received) => {
            stats.datagrams += 1;
            Some(received)
        }
        // ICMP port-unreachable echoes on some platforms; no datagram was consumed
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
            debug!("Ignoring UDP receive error: {}", e);
            None
        }
        Err(e) => {
            warn!("UDP receive failed, skipping datagram: {}", e);
            stats.datagrams += 1;
            stats.failed += 1;
            None
        }
    }
}

fn handle_datagram(
    payload: &[u8],
    src: SocketAddr,
    stats: &mut ReceiverStats,
) -> Option<ImuSample> {
    debug!(
        "Received {} bytes from {}: {}",
        payload.len(),
        src,
        String::from_utf8_lossy(payload)
    );

    match imu::decode_payload(payload) {
        Ok(fields) if fields.is_empty() => {
            debug!("No IMU fields in datagram from {}", src);
            stats.empty += 1;
            None
        }
        Ok(fields) => {
            debug!("Decoded {} IMU fields from {}", fields.len(), src);
            stats.emitted += 1;
            Some(ImuSample {
                source: src,
                received_at: chrono::Utc::now(),
                fields,
            })
        }
        Err(e) => {
            warn!("Failed to decode IMU datagram from {}: {}", src, e);
            stats.failed += 1;
            None
        }
    }
}
