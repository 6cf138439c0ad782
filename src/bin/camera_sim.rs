//! Camera Simulator
//!
//! Plays the camera side of the link: accepts a TCP connection on the
//! control port, streams IMU XML datagrams to the connecting host's
//! telemetry port, then hangs up. Useful for testing without hardware.
//!
//! Usage: cargo run --bin camera-sim [control_bind] [telemetry_port] [samples]

use std::env;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::{sleep, Duration, Instant};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let control_bind = args.next().unwrap_or_else(|| "0.0.0.0:3333".to_string());
    let telemetry_port: u16 = args.next().unwrap_or_else(|| "5555".to_string()).parse()?;
    let samples: u32 = args.next().unwrap_or_else(|| "50".to_string()).parse()?;

    let listener = TcpListener::bind(&control_bind).await?;
    println!("📷 imu-link Camera Simulator");
    println!("  Control port: {}", listener.local_addr()?);
    println!("  Telemetry port: {}", telemetry_port);
    println!("  Samples per registration: {}", samples);
    println!();

    loop {
        let (conn, peer) = listener.accept().await?;
        println!("🔗 Registered host {}", peer.ip());

        let target = SocketAddr::new(peer.ip(), telemetry_port);
        tokio::spawn(async move {
            match stream_samples(conn, target, samples).await {
                Ok(()) => println!("👋 Closed control connection to {}", peer),
                Err(e) => println!("❌ Stream to {} failed: {}", target, e),
            }
        });
    }
}

async fn stream_samples(conn: TcpStream, target: SocketAddr, samples: u32) -> anyhow::Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let started = Instant::now();

    for seq in 0..samples {
        let payload = match seq {
            // Exercise the receiver's skip paths once per session
            3 => "<Function></Function>".to_string(),
            7 => "<Function><GyroX>garbled".to_string(),
            _ => build_sample(seq, started.elapsed().as_micros() as i64),
        };

        socket.send_to(payload.as_bytes(), target).await?;
        println!("📡 #{} → {} ({} bytes)", seq, target, payload.len());

        sleep(SAMPLE_INTERVAL).await;
    }

    drop(conn);
    Ok(())
}

/// One IMU sample with a slow triangle wave on each axis
fn build_sample(seq: u32, timestamp_us: i64) -> String {
    let wave = |period: i64, amplitude: i64| {
        let phase = i64::from(seq) % period;
        let half = period / 2;
        let ramp = if phase < half { phase } else { period - phase };
        ramp * 2 * amplitude / period - amplitude / 2
    };

    format!(
        "<Function>\
         <Timestamp>{}</Timestamp>\
         <GyroX>{}</GyroX><GyroY>{}</GyroY><GyroZ>{}</GyroZ>\
         <AccelX>{}</AccelX><AccelY>{}</AccelY><AccelZ>{}</AccelZ>\
         </Function>",
        timestamp_us,
        wave(20, 500),
        wave(30, 300),
        wave(40, 100),
        wave(16, 2048),
        wave(24, 1024),
        4096 + wave(12, 256),
    )
}
