//! Context extraction: pure-function enrichment of a record from a
//! caller-supplied context object (a request, a span, a task handle — the
//! engine does not care what `C` is).

use crate::record::{Field, Record};

/// Enriches a record in place from some ambient context `C`. Implementors
/// must not allocate on paths they expect to be hot; pulling a handful of
/// `&'static str` keys and small values out of `context` is the intended
/// shape.
pub trait ContextExtractor<C>: Send + Sync {
    fn extract(&self, context: &C, record: &mut Record);
}

/// Does nothing. The default when a logger is built without a context type.
#[derive(Default)]
pub struct NoContext;

impl<C> ContextExtractor<C> for NoContext {
    fn extract(&self, _context: &C, _record: &mut Record) {}
}

/// Adapts a plain closure into a [`ContextExtractor`].
pub struct FnExtractor<C, F>
where
    F: Fn(&C, &mut Record) + Send + Sync,
{
    f: F,
    _marker: std::marker::PhantomData<fn(&C)>,
}

impl<C, F> FnExtractor<C, F>
where
    F: Fn(&C, &mut Record) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f, _marker: std::marker::PhantomData }
    }
}

impl<C, F> ContextExtractor<C> for FnExtractor<C, F>
where
    F: Fn(&C, &mut Record) + Send + Sync,
{
    fn extract(&self, context: &C, record: &mut Record) {
        (self.f)(context, record)
    }
}
