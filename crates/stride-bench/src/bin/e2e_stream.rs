//! End-to-end stream benchmark for Stridewatch.
//!
//! Drives a running server with synthetic sensor updates over real WebSocket
//! connections and measures re-broadcast throughput.

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stride_protocol::{codec, Frame, RawVector};
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SERVER_URL: &str = "ws://127.0.0.1:3000/stream";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Stridewatch End-to-End Stream Benchmark               ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Make sure the server is running: cargo run --release        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    run_stream_benchmark(num_clients).await;
}

async fn run_stream_benchmark(num_clients: usize) {
    println!("📊 Stream Benchmark: {} clients", num_clients);
    println!("   Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let broadcast_count = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();

    // Spawn client tasks
    for client_id in 0..num_clients {
        let count = Arc::clone(&broadcast_count);
        let barrier = Arc::clone(&barrier);

        let handle = tokio::spawn(async move {
            if let Err(e) = run_client(client_id, count, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        });
        handles.push(handle);
    }

    // Wait for all clients to connect
    barrier.wait().await;
    println!("✓ All {} clients connected", num_clients);

    // Warmup phase
    println!("⏳ Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    // Reset counter and start measurement
    broadcast_count.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("📈 Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total_broadcasts = broadcast_count.load(Ordering::SeqCst);

    let broadcasts_per_sec = total_broadcasts as f64 / elapsed.as_secs_f64();
    let per_client = broadcasts_per_sec / num_clients as f64;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Clients:              {:>10}                           ║",
        num_clients
    );
    println!(
        "║  Duration:             {:>10.2}s                          ║",
        elapsed.as_secs_f64()
    );
    println!(
        "║  Broadcasts Received:  {:>10}                           ║",
        total_broadcasts
    );
    println!(
        "║  Throughput:           {:>10.0} msg/s                    ║",
        broadcasts_per_sec
    );
    println!(
        "║  Per-Client:           {:>10.0} msg/s                    ║",
        per_client
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    // Signal clients to stop
    for handle in handles {
        handle.abort();
    }
}

async fn run_client(
    client_id: usize,
    broadcast_count: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Connect to server
    let (ws, _) = connect_async(SERVER_URL).await?;
    let (mut sender, mut receiver) = ws.split();

    // Wait for Connected frame from server
    if let Some(Ok(_connected)) = receiver.next().await {
        // Got Connected frame
    }

    // Wait for all clients to be ready
    barrier.wait().await;

    // Pre-encode a sensor update; a quiet grounded sample keeps the fall
    // detector out of the measurement.
    let update = Frame::sensor_update(
        Some(serde_json::json!(client_id as f64)),
        RawVector::from_floats(0.1, -0.2, 9.81),
        RawVector::from_floats(0.01, 0.02, 0.03),
    );
    let update_bytes = codec::encode(&update)?;
    let update_msg = Message::Binary(update_bytes.to_vec());

    // Spawn separate receiver task for full-duplex operation
    let recv_count = broadcast_count.clone();
    let recv_task = tokio::spawn(async move {
        let mut recv_buf = BytesMut::with_capacity(65536);

        while let Some(result) = receiver.next().await {
            if let Ok(Message::Binary(data)) = result {
                recv_buf.extend_from_slice(&data);
                // Decode all complete frames
                while let Ok(Some(frame)) = codec::decode_from(&mut recv_buf) {
                    if matches!(frame, Frame::SensorBroadcast { .. }) {
                        recv_count.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    });

    // Send loop - no waiting, just blast samples
    loop {
        if sender.send(update_msg.clone()).await.is_err() {
            break;
        }
        // Small yield to not starve the receiver task
        tokio::task::yield_now().await;
    }

    recv_task.abort();
    Ok(())
}
