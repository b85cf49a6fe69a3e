//! Wire encodings for a drained [`Record`](crate::record::Record): the
//! serialization step the drainer applies on its way to a
//! [`Sink`](crate::sink::Sink).

mod binary;
mod json;
mod text;

pub use binary::{
    decode_record, read_header as binary_read_header, write_header as binary_header, BinaryEncoder,
};
pub use json::JsonEncoder;
pub use text::TextEncoder;

use crate::error::Result;
use crate::record::Record;

/// Renders one record into `out`, appending (never clearing first — callers
/// own buffer lifecycle via the shared [`crate::buffer_pool::BufferPool`]).
pub trait Encoder: Send + Sync {
    fn encode(&self, record: &Record, out: &mut Vec<u8>) -> Result<()>;
}
