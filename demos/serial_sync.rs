use std::time::Duration;

use clocklink::{SerialChannel, SyncConfig, SyncSession};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clocklink=debug".into()),
        )
        .init();

    let device = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyACM0".to_string());

    println!("Opening {}...", device);
    let channel = match SerialChannel::open(&device, 115_200) {
        Ok(ch) => ch,
        Err(e) => {
            eprintln!("Failed to open {}: {}", device, e);
            std::process::exit(1);
        }
    };

    let config = SyncConfig::default();
    println!("Sync configuration:");
    println!("- Rounds: {}", config.rounds);
    println!("- Receive timeout: {:?}", config.receive_timeout);
    println!(
        "- Pacing: {}..{} us, spread/{}",
        config.pacing.min_sleep_us, config.pacing.max_sleep_us, config.pacing.spread_divisor
    );

    let mut session = SyncSession::new(channel, config).unwrap();

    if let Ok(Some(version)) = session.remote_version() {
        println!("Device firmware version: {}", version);
    }

    match session.link_stats(20) {
        Ok(stats) => println!(
            "Link round trips: min={:?} mean={:?} max={:?} (stddev {:?}, n={})",
            stats.min, stats.mean, stats.max, stats.stddev, stats.samples
        ),
        Err(e) => eprintln!("Link stats failed: {}", e),
    }

    let estimate = match session.full_sync() {
        Ok(est) => est,
        Err(e) => {
            eprintln!("Synchronization failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("Synchronized: {}", estimate);
    println!("Uncertainty window: {} us", estimate.uncertainty());

    // Let the clocks run apart for a bit, then measure the drift without
    // touching the base time.
    println!("\nIdling 10 seconds before the drift check...");
    std::thread::sleep(Duration::from_secs(10));

    match session.refresh_bounds() {
        Ok(refreshed) => {
            println!("Refreshed: {}", refreshed);
            println!(
                "Remote clock delayed between {} and {} us",
                refreshed.min_error, refreshed.max_error
            );
            if refreshed.min_error > estimate.max_error {
                println!("Clocks have drifted; a full re-sync is recommended.");
            }
        }
        Err(e) => eprintln!("Bounds refresh failed: {}", e),
    }
}
