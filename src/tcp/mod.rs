//! Control-channel registration
//!
//! The camera starts streaming IMU datagrams to whichever host holds a TCP
//! connection to its control port. No request is sent: the connect is the
//! registration. The connection is then only read to notice when the camera
//! drops it.

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;

/// What was drained from the control channel before the camera closed it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSession {
    pub reads: u64,
    pub bytes: u64,
}

/// Register with the camera and block until it disconnects.
///
/// Returns `Err` only when the connect fails. A single attempt is made.
pub async fn register(config: &CameraConfig) -> anyhow::Result<ControlSession> {
    let endpoint = config.control_endpoint();
    let mut stream = TcpStream::connect(&endpoint)
        .await
        .map_err(|e| anyhow::anyhow!("TCP connection to camera {} failed: {}", endpoint, e))?;

    info!("TCP connected to camera {}, IP registered", endpoint);

    let mut buf = [0u8; 1024];
    let mut session = ControlSession::default();

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => {
                warn!("Camera {} closed the TCP connection", endpoint);
                break;
            }
            Ok(n) => {
                session.reads += 1;
                session.bytes += n as u64;
                debug!("Ignoring {} bytes on control channel", n);
            }
            Err(e) => {
                warn!("Camera {} TCP connection lost: {}", endpoint, e);
                break;
            }
        }
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn camera_at(addr: std::net::SocketAddr) -> CameraConfig {
        CameraConfig {
            address: addr.ip().to_string(),
            control_port: addr.port(),
        }
    }

    #[tokio::test]
    async fn test_peer_close_ends_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = camera_at(listener.local_addr().unwrap());

        let camera = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            for chunk in [&b"hello"[..], &b"keepalive"[..], &b"!"[..]] {
                conn.write_all(chunk).await.unwrap();
                conn.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let session = timeout(Duration::from_secs(5), register(&config))
            .await
            .expect("registration did not observe close")
            .unwrap();
        camera.await.unwrap();

        assert_eq!(session.bytes, 15);
        assert!(session.reads >= 1 && session.reads <= 3);
    }

    #[tokio::test]
    async fn test_immediate_close_is_not_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = camera_at(listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (conn, _) = listener.accept().await.unwrap();
            drop(conn);
        });

        let session = tokio_test::assert_ok!(register(&config).await);
        assert_eq!(session, ControlSession::default());
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        // Reserve a port, then free it so nothing is listening there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = camera_at(listener.local_addr().unwrap());
        drop(listener);

        tokio_test::assert_err!(register(&config).await);
    }
}
