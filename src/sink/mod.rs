//! Sinks: where encoded record bytes ultimately land.

mod file;
mod stdout;
mod writer;

pub use file::FileSink;
pub use stdout::StdoutSink;
pub use writer::WriterSink;

use crate::error::Result;

/// A destination for already-encoded bytes. Implementations are called
/// only from the drainer thread, so no internal synchronization is
/// required beyond what the underlying I/O handle itself needs.
pub trait Sink: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flushes any internal buffering to the underlying medium.
    fn sync(&mut self) -> Result<()>;

    /// Releases the underlying handle. Called once, at logger shutdown.
    fn close(&mut self) -> Result<()>;
}
