//! Advertise one service until Ctrl-C, then say bye-bye.
//!
//! Usage: ssdp_advertise SERVICE LOCATION [CONFIG_JSON]

use ssdp_discovery::logging::{ConsoleLogger, LogLevel};
use ssdp_discovery::{DiscoveryConfig, DiscoveryLogger, Producer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::init();
    let logger = ConsoleLogger::new();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage: ssdp_advertise SERVICE LOCATION [CONFIG_JSON]");
        std::process::exit(2);
    }
    let config = match args.get(2) {
        Some(path) => match DiscoveryConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                logger.log(LogLevel::Error, "Main", &format!("Cannot load {}: {}", path, e));
                std::process::exit(2);
            }
        },
        None => DiscoveryConfig::default(),
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let l = logger.clone();
    ctrlc::set_handler(move || {
        l.log(LogLevel::Info, "Main", "Shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .ok();

    let mut producer = Producer::new(config.producer).with_logger(logger.clone());
    if let Err(e) = producer.add_service(args[0].as_str(), args[1].as_str()).and_then(|_| producer.start()) {
        logger.log(LogLevel::Error, "Main", &format!("Cannot advertise: {}", e));
        std::process::exit(1);
    }
    logger.log(
        LogLevel::Info,
        "Main",
        &format!("Advertising {} at {} as uuid:{}", args[0], args[1], producer.uuid()),
    );

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
    }

    if let Err(e) = producer.stop(true) {
        logger.log(LogLevel::Warn, "Main", &format!("Bye-bye failed: {}", e));
    }
}
