//! Print notifications for the given service types until Ctrl-C.
//!
//! Usage: ssdp_watch TYPE [TYPE...]

use ssdp_discovery::{Consumer, ConsumerConfig, SearchResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::init();

    let types: Vec<String> = std::env::args().skip(1).collect();
    if types.is_empty() {
        eprintln!("usage: ssdp_watch TYPE [TYPE...]");
        std::process::exit(2);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)).ok();

    let mut consumer = Consumer::new(ConsumerConfig::default());
    for service_type in &types {
        let result = consumer.start_watching_type(service_type.as_str(), |notification: &SearchResult| {
            println!(
                "{} {} from {} ({})",
                notification.header("NTS").unwrap_or("?"),
                notification.header("NT").unwrap_or("?"),
                notification.source,
                notification.header("USN").unwrap_or("no USN"),
            );
        });
        if let Err(e) = result {
            log::error!("Cannot watch {}: {}", service_type, e);
            std::process::exit(1);
        }
    }
    log::info!("Watching {:?}", consumer.watched_types());

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
    }
    consumer.stop_watching_all();
}
