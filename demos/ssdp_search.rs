//! Search the local network for a service type and print every response.
//!
//! Usage: ssdp_search [SERVICE] [TIMEOUT_SECS]
//!
//! SERVICE defaults to `ssdp:all`, TIMEOUT_SECS to 3.

use ssdp_discovery::{Consumer, ConsumerConfig};
use std::time::Duration;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let service = args.next().unwrap_or_else(|| "ssdp:all".to_string());
    let timeout_secs = args.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(3);

    let consumer = Consumer::new(ConsumerConfig::default());
    log::info!("Searching for {} ({}s)...", service, timeout_secs);

    match consumer.find_all(&service, Duration::from_secs(timeout_secs)) {
        Ok(results) if results.is_empty() => println!("No responses for {}", service),
        Ok(results) => {
            for result in &results {
                match serde_json::to_string_pretty(result) {
                    Ok(json) => println!("{}", json),
                    Err(e) => log::error!("Cannot render response from {}: {}", result.source, e),
                }
            }
            println!("{} response(s)", results.len());
        }
        Err(e) => {
            log::error!("Search failed: {}", e);
            std::process::exit(1);
        }
    }
}
