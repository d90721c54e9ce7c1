//! Accept endpoint load test
//!
//! Usage: `load-test [port] [requests] [clients]` (defaults: 8080 10000 100)
//!
//! Sends `GET /api/verve/accept?id=<random 0..1000>` from concurrent clients
//! and reports throughput against the 10,000 req/s target.

use rand::Rng;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

const TARGET_RPS: f64 = 10_000.0;

fn arg_or<T: std::str::FromStr>(index: usize, default: T) -> T {
    env::args()
        .nth(index)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let port: u16 = arg_or(1, 8080);
    let num_requests: usize = arg_or(2, 10_000);
    let num_clients: usize = arg_or(3, 100).max(1);
    let url = format!("http://127.0.0.1:{}/api/verve/accept", port);

    println!("Accept Endpoint Load Test\n");
    println!("Configuration:");
    println!("  Target: {}", url);
    println!("  Requests: {}", num_requests);
    println!("  Concurrent clients: {}\n", num_clients);

    let client = reqwest::Client::new();
    let ok = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let latency_us = Arc::new(AtomicU64::new(0));
    let requests_per_client = num_requests / num_clients;

    let start = Instant::now();
    let mut handles = Vec::with_capacity(num_clients);
    for _ in 0..num_clients {
        let client = client.clone();
        let url = url.clone();
        let ok = ok.clone();
        let failed = failed.clone();
        let latency_us = latency_us.clone();

        handles.push(tokio::spawn(async move {
            for _ in 0..requests_per_client {
                let id: u32 = rand::thread_rng().gen_range(0..1000);
                let request_start = Instant::now();
                let response = client
                    .get(&url)
                    .query(&[("id", id.to_string())])
                    .send()
                    .await;
                let body = match response {
                    Ok(r) if r.status().is_success() => r.text().await.ok(),
                    _ => None,
                };
                let elapsed_us = request_start.elapsed().as_micros() as u64;
                latency_us.fetch_add(elapsed_us, Ordering::Relaxed);

                if body.as_deref() == Some("ok") {
                    ok.fetch_add(1, Ordering::Relaxed);
                } else {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for result in futures::future::join_all(handles).await {
        result?;
    }

    let elapsed = start.elapsed();
    let ok = ok.load(Ordering::Relaxed);
    let failed = failed.load(Ordering::Relaxed);
    let total = ok + failed;
    let rps = total as f64 / elapsed.as_secs_f64();
    let avg_latency_ms =
        latency_us.load(Ordering::Relaxed) as f64 / 1000.0 / total.max(1) as f64;

    println!("==== Load Test Results ====");
    println!(
        "  {} requests in {:.2}s ({} ok, {} failed)",
        total,
        elapsed.as_secs_f64(),
        ok,
        failed
    );
    println!("  {:.0} requests per second", rps);
    println!("  {:.3} ms average latency", avg_latency_ms);

    if rps >= TARGET_RPS {
        println!("\nTarget of {:.0} req/s met", TARGET_RPS);
    } else {
        println!("\nBelow target of {:.0} req/s", TARGET_RPS);
    }

    Ok(())
}
