//! The public logger handle: the piece that ties the ring, dispatcher,
//! drainer, encoder, sink, sampler and auto-scaling supervisor together
//! into one thing a caller constructs once and clones cheaply afterward.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::config::{EncoderKind, LoggerConfig};
use crate::context::ContextExtractor;
use crate::diagnostics;
use crate::dispatcher::Dispatcher;
use crate::drainer::Drainer;
use crate::encoder::{BinaryEncoder, Encoder, JsonEncoder, TextEncoder};
use crate::error::{Error, Result};
use crate::idle;
use crate::record::{CallerFrame, Field, Level, Record};
use crate::ring::{BackpressurePolicy, Ring};
use crate::sampler::{self, RecordPreview, Sampler};
use crate::sink::{FileSink, Sink, StdoutSink};
use crate::supervisor::{AutoScalingSupervisor, ScalingThresholds};

fn now_ns() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64
}

fn build_encoder(kind: EncoderKind) -> Arc<dyn Encoder> {
    match kind {
        EncoderKind::Json => Arc::new(JsonEncoder),
        EncoderKind::Text => Arc::new(TextEncoder),
        EncoderKind::Binary => Arc::new(BinaryEncoder),
    }
}

fn build_sink(output: &str) -> Result<Box<dyn Sink>> {
    match output {
        "stdout" => Ok(Box::new(StdoutSink::stdout())),
        "stderr" => Ok(Box::new(StdoutSink::stderr())),
        path => Ok(Box::new(FileSink::open(path)?)),
    }
}

struct Inner {
    dispatcher: Arc<Dispatcher<Record>>,
    drainer: Drainer<Record>,
    supervisor: AutoScalingSupervisor<Record>,
    encoder: Arc<dyn Encoder>,
    sink: Mutex<Box<dyn Sink>>,
    buffer_pool: crate::buffer_pool::BufferPool,
    sampler: Option<Arc<dyn Sampler>>,
    /// Set via [`Logger::set_context_extractor`]; type-erased so `Logger`
    /// itself does not need to be generic over the context type. Consulted
    /// last in field ordering, after `with`-fields and call-site fields.
    context_extractor: Mutex<Option<Arc<dyn Fn(&dyn Any, &mut Record) + Send + Sync>>>,
    /// Caller-registered hook invoked once per encode/sink error, in
    /// addition to (never instead of) the `diagnostics` tracing calls.
    /// Never invoked recursively through the logger's own write path.
    error_hook: Mutex<Option<Arc<dyn Fn(&Error) + Send + Sync>>>,
    level: AtomicU8,
    enable_caller: bool,
    enable_stack_trace: bool,
    idle_kind: idle::IdleStrategyKind,
    capacity: usize,
    batch_size: usize,
    policy: BackpressurePolicy,
    binary_wire: bool,
}

/// A cheaply-clonable handle onto a running logging pipeline.
///
/// Cloning (or calling [`Logger::with`]/[`Logger::named`]) shares the
/// underlying ring/dispatcher/drainer/sink; only the accumulated field set
/// and logger name are per-handle.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
    name: Arc<str>,
    base_fields: Arc<Vec<Field>>,
}

impl Logger {
    /// Builds a logger from a resolved configuration but does not yet start
    /// its drainer or supervisor threads; call [`Logger::start`] for that.
    pub fn new(config: &LoggerConfig) -> Result<Self> {
        let ring = Ring::<Record>::new(config.capacity, config.batch_size, config.backpressure_policy)?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(ring)));

        if config.architecture == crate::config::Architecture::Sharded {
            let shards: Vec<Arc<Ring<Record>>> = (0..config.num_rings)
                .map(|_| {
                    Arc::new(
                        Ring::<Record>::new(config.capacity, config.batch_size, config.backpressure_policy)
                            .expect("validated config capacity/batch_size"),
                    )
                })
                .collect();
            dispatcher.swap(crate::dispatcher::Topology::Sharded(shards));
        }

        let sink = build_sink(&config.output)?;
        let sampler = config.sampler.as_deref().and_then(sampler::parse);
        let supervisor = AutoScalingSupervisor::new(
            Arc::clone(&dispatcher),
            ScalingThresholds { num_shards: config.num_rings, ..ScalingThresholds::default() },
        );

        let inner = Inner {
            drainer: Drainer::new(Arc::clone(&dispatcher)),
            supervisor,
            dispatcher,
            encoder: build_encoder(config.encoder),
            sink: Mutex::new(sink),
            buffer_pool: crate::buffer_pool::BufferPool::new(),
            sampler,
            context_extractor: Mutex::new(None),
            error_hook: Mutex::new(None),
            level: AtomicU8::new(config.level as u8),
            enable_caller: config.enable_caller,
            enable_stack_trace: config.enable_stack_trace,
            idle_kind: config.idle_strategy,
            capacity: config.capacity,
            batch_size: config.batch_size,
            policy: config.backpressure_policy,
            binary_wire: config.encoder == EncoderKind::Binary,
        };

        Ok(Self { inner: Arc::new(inner), name: Arc::from(config.name.as_str()), base_fields: Arc::new(Vec::new()) })
    }

    /// Starts the drainer (encode+sink loop) and the auto-scaling
    /// supervisor. Idempotent: a second call is a no-op on each.
    pub fn start(&self) -> Result<()> {
        if self.inner.binary_wire {
            let mut header = Vec::new();
            crate::encoder::binary_header(&mut header);
            self.inner.sink.lock().write(&header)?;
        }

        diagnostics::record_drainer_start(&self.name);

        let encoder = Arc::clone(&self.inner.encoder);
        let inner_for_processor = Arc::clone(&self.inner);

        self.inner.drainer.start(idle::build(self.inner.idle_kind), move |record: &mut Record| {
            let mut buf = inner_for_processor.buffer_pool.get();
            match encoder.encode(record, &mut buf) {
                Ok(()) => {
                    if let Err(e) = inner_for_processor.sink.lock().write(&buf) {
                        diagnostics::record_sink_error(&e.to_string());
                        if let Some(hook) = inner_for_processor.error_hook.lock().as_ref() {
                            hook(&e);
                        }
                    }
                }
                Err(e) => {
                    diagnostics::record_encode_error(&e.to_string());
                    if let Some(hook) = inner_for_processor.error_hook.lock().as_ref() {
                        hook(&e);
                    }
                }
            }
            inner_for_processor.buffer_pool.put(buf);
        });

        let capacity = self.inner.capacity;
        let batch_size = self.inner.batch_size;
        let policy = self.inner.policy;
        self.inner.supervisor.start(move || {
            Ring::<Record>::new(capacity, batch_size, policy).expect("validated config capacity/batch_size")
        });

        Ok(())
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.inner.level.load(Ordering::Relaxed)).unwrap_or(Level::Info)
    }

    pub fn set_level(&self, level: Level) {
        self.inner.level.store(level as u8, Ordering::Relaxed);
    }

    /// Returns a handle sharing this logger's pipeline but carrying an
    /// extended set of structured fields attached to every subsequent
    /// record it writes.
    pub fn with(&self, fields: &[Field]) -> Self {
        let mut extended = (*self.base_fields).clone();
        extended.extend(fields.iter().cloned());
        Self { inner: Arc::clone(&self.inner), name: Arc::clone(&self.name), base_fields: Arc::new(extended) }
    }

    /// Returns a handle sharing this logger's pipeline under a different
    /// logger name.
    pub fn named(&self, name: impl Into<Arc<str>>) -> Self {
        Self { inner: Arc::clone(&self.inner), name: name.into(), base_fields: Arc::clone(&self.base_fields) }
    }

    /// Registers a hook invoked once per encode or sink error raised while
    /// draining. Runs in addition to the library's own `diagnostics`
    /// tracing, never in place of it, and never re-enters the logger's
    /// write path (it receives the error, nothing more). Shared by every
    /// clone of this logger; replacing it affects all of them.
    pub fn set_error_hook<F>(&self, hook: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        *self.inner.error_hook.lock() = Some(Arc::new(hook));
    }

    /// Registers the context extractor consulted by [`Logger::log_with_context`].
    /// Shared by every clone of this logger (it lives in the pipeline state,
    /// not the per-handle name/field set), and may be replaced at any time.
    pub fn set_context_extractor<C, E>(&self, extractor: E)
    where
        C: 'static,
        E: ContextExtractor<C> + Send + Sync + 'static,
    {
        let extractor = Arc::new(extractor);
        let wrapped: Arc<dyn Fn(&dyn Any, &mut Record) + Send + Sync> =
            Arc::new(move |context, record| {
                if let Some(context) = context.downcast_ref::<C>() {
                    extractor.extract(context, record);
                }
            });
        *self.inner.context_extractor.lock() = Some(wrapped);
    }

    /// Records one entry. Returns `false` if the record was filtered by
    /// level/sampling, or dropped by the ring under `DropOnFull`.
    pub fn log(&self, level: Level, message: &str, fields: &[Field]) -> bool {
        self.log_inner(level, message, fields, None, None)
    }

    /// Like [`Logger::log`], but attaches a caller frame captured by the
    /// call site (e.g. from a wrapping macro using `file!()`/`line!()`).
    /// Ignored unless the logger's config enabled caller capture.
    pub fn log_at(&self, level: Level, message: &str, fields: &[Field], caller: Option<CallerFrame>) -> bool {
        self.log_inner(level, message, fields, caller, None)
    }

    /// Like [`Logger::log`], but also runs `context` through the context
    /// extractor registered via [`Logger::set_context_extractor`] (if any),
    /// appending its fields after `with`-fields and call-site fields. A
    /// `context` whose type does not match the registered extractor's is
    /// silently ignored, same as having no extractor registered.
    pub fn log_with_context<C: 'static>(&self, level: Level, message: &str, fields: &[Field], context: &C) -> bool {
        self.log_inner(level, message, fields, None, Some(context as &dyn Any))
    }

    fn log_inner(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
        caller: Option<CallerFrame>,
        context: Option<&dyn Any>,
    ) -> bool {
        if level < self.level() {
            return false;
        }
        if let Some(sampler) = &self.inner.sampler {
            if !sampler.sample(&RecordPreview { level, message }) {
                return false;
            }
        }

        let timestamp_ns = now_ns();
        let name = Arc::clone(&self.name);
        let base_fields = Arc::clone(&self.base_fields);
        let enable_caller = self.inner.enable_caller;
        let enable_stack_trace = self.inner.enable_stack_trace;
        let message = message.to_string();
        let extra_fields = fields.to_vec();
        let extractor = self.inner.context_extractor.lock().clone();

        self.inner.dispatcher.write(move |record| {
            record.begin(level, name, message, timestamp_ns);
            for field in base_fields.iter() {
                record.push_field(field.clone());
            }
            for field in &extra_fields {
                record.push_field(field.clone());
            }
            if let (Some(extractor), Some(context)) = (&extractor, context) {
                extractor(context, record);
            }
            if enable_caller {
                if let Some(caller) = caller {
                    record.set_caller(caller);
                }
            }
            if enable_stack_trace {
                record.set_stack_trace(std::backtrace::Backtrace::force_capture().to_string());
            }
        })
    }

    /// Blocks until every record claimed before this call has been
    /// resolved (delivered, dropped, or retried), then flushes the sink.
    pub fn sync(&self) -> Result<()> {
        if self.inner.dispatcher.active_rings().iter().any(|r| r.is_closed()) {
            return Err(Error::Closed);
        }
        for ring in self.inner.dispatcher.drain_targets() {
            ring.flush(Duration::from_secs(5))?;
        }
        self.inner.sink.lock().sync()
    }

    /// Stops the supervisor and drainer, flushes, and closes the sink.
    /// Idempotent at the drainer/supervisor level; calling `close` twice
    /// is safe but will flush/sync twice.
    pub fn close(&self) -> Result<()> {
        self.inner.supervisor.stop_and_join();
        for ring in self.inner.dispatcher.active_rings() {
            ring.close();
        }
        self.inner.drainer.stop_and_join();
        diagnostics::record_drainer_stop(
            &self.name,
            self.inner.dispatcher.active_rings().iter().map(|r| r.processed()).sum(),
            self.inner.dispatcher.active_rings().iter().map(|r| r.dropped()).sum(),
        );
        self.inner.sink.lock().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;

    fn test_config(name: &str) -> LoggerConfig {
        LoggerConfig { name: name.to_string(), output: "stdout".to_string(), capacity: 16, batch_size: 4, ..LoggerConfig::default() }
    }

    #[test]
    fn filters_below_configured_level() {
        let logger = Logger::new(&test_config("lvl")).unwrap();
        logger.set_level(Level::Warn);
        assert!(!logger.log(Level::Debug, "quiet", &[]));
        assert!(logger.log(Level::Error, "loud", &[]));
    }

    #[test]
    fn with_accumulates_fields_across_clones() {
        let logger = Logger::new(&test_config("with")).unwrap();
        let child = logger.with(&[Field::str("request_id", "abc")]);
        let grandchild = child.with(&[Field::u64("attempt", 2)]);
        assert_eq!(grandchild.base_fields.len(), 2);
        assert_eq!(logger.base_fields.len(), 0);
    }

    #[test]
    fn context_extractor_fields_follow_with_and_call_site_fields() {
        use crate::context::FnExtractor;

        struct Request {
            trace_id: u64,
        }

        let logger = Logger::new(&test_config("ctx")).unwrap();
        logger.set_context_extractor(FnExtractor::new(|req: &Request, record: &mut Record| {
            record.push_field(Field::u64("trace_id", req.trace_id));
        }));
        let logger = logger.with(&[Field::str("scope", "outer")]);

        assert!(logger.log_with_context(
            Level::Info,
            "handled",
            &[Field::str("route", "/health")],
            &Request { trace_id: 77 },
        ));

        let mut delivered = Vec::new();
        for ring in logger.inner.dispatcher.active_rings() {
            ring.process_batch(|record: &mut Record| {
                delivered.push(record.fields().map(|f| f.key).collect::<Vec<_>>());
            });
        }

        assert_eq!(delivered, vec![vec!["scope", "route", "trace_id"]]);
    }

    #[test]
    fn context_extractor_is_skipped_without_a_matching_context() {
        let logger = Logger::new(&test_config("ctx-none")).unwrap();
        assert!(logger.log(Level::Info, "plain", &[Field::str("a", "1")]));

        let mut delivered = Vec::new();
        for ring in logger.inner.dispatcher.active_rings() {
            ring.process_batch(|record: &mut Record| {
                delivered.push(record.fields().map(|f| f.key).collect::<Vec<_>>());
            });
        }
        assert_eq!(delivered, vec![vec!["a"]]);
    }

    #[test]
    fn start_and_close_round_trip_without_error() {
        let logger = Logger::new(&test_config("lifecycle")).unwrap();
        logger.start().unwrap();
        assert!(logger.log(Level::Info, "hello", &[]));
        logger.sync().unwrap();
        logger.close().unwrap();
    }

    #[test]
    fn error_hook_fires_on_encode_failure() {
        use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

        let logger = Logger::new(&test_config("error-hook")).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = Arc::clone(&seen);
        logger.set_error_hook(move |_err: &Error| {
            seen_in_hook.fetch_add(1, AtomicOrdering::SeqCst);
        });
        logger.start().unwrap();

        // serde_json refuses to serialize NaN/Infinity, so this is a real
        // encode failure reached through the public log path, not a forced one.
        assert!(logger.log(Level::Info, "bad float", &[Field::f64("x", f64::NAN)]));
        logger.sync().unwrap();

        assert_eq!(seen.load(AtomicOrdering::SeqCst), 1);
        logger.close().unwrap();
    }

    #[test]
    fn sync_after_close_returns_closed_error() {
        let logger = Logger::new(&test_config("closed")).unwrap();
        logger.start().unwrap();
        logger.close().unwrap();
        assert!(matches!(logger.sync(), Err(Error::Closed)));
    }
}
