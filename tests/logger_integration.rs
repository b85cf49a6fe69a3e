//! End-to-end scenarios exercising the public `Logger` API against a real
//! (if short-lived) drainer thread and filesystem sink.

use std::path::PathBuf;
use std::time::Duration;

use ignis::config::{Architecture, LoggerConfig};
use ignis::ring::BackpressurePolicy;
use ignis::{Field, Level, Logger};

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ignis-it-{tag}-{}-{}.log", std::process::id(), tag.len()))
}

fn read_lines(path: &PathBuf) -> Vec<String> {
    std::fs::read_to_string(path).unwrap_or_default().lines().map(|s| s.to_string()).collect()
}

#[test]
fn single_producer_delivers_every_record() {
    let path = temp_path("single");
    let config = LoggerConfig {
        output: path.to_string_lossy().into_owned(),
        capacity: 1024,
        batch_size: 64,
        ..LoggerConfig::default()
    };
    let logger = Logger::new(&config).unwrap();
    logger.start().unwrap();

    for i in 0..100_000u64 {
        logger.log(Level::Info, "tick", &[Field::u64("i", i)]);
    }
    logger.sync().unwrap();
    logger.close().unwrap();

    assert_eq!(read_lines(&path).len(), 100_000);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn eight_producers_drop_on_full_never_exceed_claimed_count() {
    let path = temp_path("eight");
    let config = LoggerConfig {
        output: path.to_string_lossy().into_owned(),
        capacity: 256,
        batch_size: 32,
        backpressure_policy: BackpressurePolicy::DropOnFull,
        ..LoggerConfig::default()
    };
    let logger = Logger::new(&config).unwrap();
    logger.start().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|p| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for i in 0..5_000u64 {
                    // simulate a slow encoder by giving the drainer no head start
                    logger.log(Level::Info, "burst", &[Field::u64("producer", p), Field::u64("i", i)]);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    logger.sync().unwrap();
    logger.close().unwrap();

    let delivered = read_lines(&path).len() as u64;
    assert!(delivered <= 40_000);
    assert!(delivered > 0);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn block_on_full_eventually_delivers_every_record_despite_a_paused_consumer() {
    let path = temp_path("blockfull");
    let config = LoggerConfig {
        output: path.to_string_lossy().into_owned(),
        capacity: 8,
        batch_size: 4,
        backpressure_policy: BackpressurePolicy::BlockOnFull,
        ..LoggerConfig::default()
    };
    let logger = Logger::new(&config).unwrap();
    logger.start().unwrap();

    for i in 0..200u64 {
        logger.log(Level::Info, "slow", &[Field::u64("i", i)]);
    }
    logger.sync().unwrap();
    logger.close().unwrap();

    assert_eq!(read_lines(&path).len(), 200);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn level_gating_filters_below_threshold() {
    let path = temp_path("levelgate");
    let config = LoggerConfig {
        output: path.to_string_lossy().into_owned(),
        level: Level::Warn,
        capacity: 64,
        batch_size: 16,
        ..LoggerConfig::default()
    };
    let logger = Logger::new(&config).unwrap();
    logger.start().unwrap();

    assert!(!logger.log(Level::Debug, "ignored", &[]));
    assert!(!logger.log(Level::Info, "ignored", &[]));
    assert!(logger.log(Level::Warn, "kept", &[]));
    assert!(logger.log(Level::Error, "kept", &[]));

    logger.sync().unwrap();
    logger.close().unwrap();

    assert_eq!(read_lines(&path).len(), 2);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn close_races_with_in_flight_writes_without_losing_already_claimed_records() {
    let path = temp_path("closerace");
    let config = LoggerConfig {
        output: path.to_string_lossy().into_owned(),
        capacity: 128,
        batch_size: 16,
        ..LoggerConfig::default()
    };
    let logger = Logger::new(&config).unwrap();
    logger.start().unwrap();

    let writer_logger = logger.clone();
    let writer = std::thread::spawn(move || {
        let mut claimed = 0u64;
        for i in 0..10_000u64 {
            if writer_logger.log(Level::Info, "race", &[Field::u64("i", i)]) {
                claimed += 1;
            }
        }
        claimed
    });

    std::thread::sleep(Duration::from_micros(200));
    logger.close().unwrap();
    let claimed = writer.join().unwrap();

    // everything that was actually claimed before/around close must have
    // been either delivered or accounted for; nothing after close counts.
    assert!(read_lines(&path).len() as u64 <= claimed);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn sharded_architecture_routes_across_shards_and_still_delivers_everything() {
    let path = temp_path("sharded");
    let config = LoggerConfig {
        output: path.to_string_lossy().into_owned(),
        architecture: Architecture::Sharded,
        num_rings: 4,
        capacity: 256,
        batch_size: 32,
        ..LoggerConfig::default()
    };
    let logger = Logger::new(&config).unwrap();
    logger.start().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for i in 0..2_000u64 {
                    logger.log(Level::Info, "sharded", &[Field::u64("i", i)]);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    logger.sync().unwrap();
    logger.close().unwrap();

    assert_eq!(read_lines(&path).len(), 8_000);
    let _ = std::fs::remove_file(&path);
}
