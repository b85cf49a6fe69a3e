//! Operational diagnostics for the logging engine itself.
//!
//! Unified tracing for the engine's own lifecycle: drainer start/stop,
//! supervisor topology transitions, sink/encoder failures. Zero-cost when
//! the `tracing-diagnostics` feature is disabled. This is entirely separate
//! from the `Record`/`Ring` data path the engine transports for callers.
//!
//! ```toml
//! ignis = { version = "0.1", features = ["tracing-diagnostics"] }
//! ```
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```

#[cfg(feature = "tracing-diagnostics")]
#[inline]
pub fn record_drainer_start(name: &str) {
    tracing::info!(logger = name, "drainer started");
}

#[cfg(not(feature = "tracing-diagnostics"))]
#[inline(always)]
pub fn record_drainer_start(_name: &str) {}

#[cfg(feature = "tracing-diagnostics")]
#[inline]
pub fn record_drainer_stop(name: &str, processed: u64, dropped: u64) {
    tracing::info!(logger = name, processed, dropped, "drainer stopped");
}

#[cfg(not(feature = "tracing-diagnostics"))]
#[inline(always)]
pub fn record_drainer_stop(_name: &str, _processed: u64, _dropped: u64) {}

#[cfg(feature = "tracing-diagnostics")]
#[inline]
pub fn record_scale_up(shards: usize) {
    tracing::info!(shards, "auto-scaling supervisor: switching to sharded topology");
}

#[cfg(not(feature = "tracing-diagnostics"))]
#[inline(always)]
pub fn record_scale_up(_shards: usize) {}

#[cfg(feature = "tracing-diagnostics")]
#[inline]
pub fn record_scale_down() {
    tracing::info!("auto-scaling supervisor: switching to single-ring topology");
}

#[cfg(not(feature = "tracing-diagnostics"))]
#[inline(always)]
pub fn record_scale_down() {}

#[cfg(feature = "tracing-diagnostics")]
#[inline]
pub fn record_sink_error(message: &str) {
    tracing::warn!(error = message, "sink write failed");
}

#[cfg(not(feature = "tracing-diagnostics"))]
#[inline(always)]
pub fn record_sink_error(_message: &str) {}

#[cfg(feature = "tracing-diagnostics")]
#[inline]
pub fn record_encode_error(message: &str) {
    tracing::warn!(error = message, "encode failed");
}

#[cfg(not(feature = "tracing-diagnostics"))]
#[inline(always)]
pub fn record_encode_error(_message: &str) {}
