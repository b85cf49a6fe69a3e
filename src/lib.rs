//! ignis: a high-throughput, low-latency structured logging engine built on
//! a lock-free MPSC ring buffer.
//!
//! A [`Logger`](logger::Logger) claims a slot in a [`ring::Ring`] per call,
//! never blocking on a mutex; a single dedicated [`drainer::Drainer`] thread
//! drains, encodes, and ships records to a [`sink::Sink`]. Under sustained
//! load an [`supervisor::AutoScalingSupervisor`] migrates the write path
//! from one shared ring to a sharded set of rings and back, hysteresis-gated
//! so it does not thrash on noisy thresholds.

pub mod buffer_pool;
pub mod config;
pub mod constants;
pub mod context;
pub mod diagnostics;
pub mod dispatcher;
pub mod drainer;
pub mod encoder;
pub mod error;
pub mod idle;
pub mod logger;
pub mod padded;
pub mod record;
pub mod ring;
pub mod sampler;
pub mod sink;
pub mod supervisor;

pub use config::LoggerConfig;
pub use error::{Error, Result};
pub use logger::Logger;
pub use record::{CallerFrame, Field, FieldValue, Level, Record};
