//! Crate-wide tuning constants.

/// Default ring capacity (must be power of 2).
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default per-drain batch size.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Maximum inline structured fields per record.
pub const MAX_FIELDS: usize = 32;

/// Maximum message length in bytes; `Record::begin` truncates at a char
/// boundary past this point rather than allocating further.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Upper bound on a pooled buffer before it is dropped instead of recycled.
pub const MAX_BUFFER: usize = 1024 * 1024;

/// Default capacity handed out for a freshly allocated pooled buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

/// Binary wire format magic bytes.
pub const WIRE_MAGIC: [u8; 4] = *b"IGN1";

/// Binary wire format version this build writes and accepts.
pub const WIRE_VERSION: u8 = 1;

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "IGNIS_";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_power_of_two() {
        assert!(DEFAULT_CAPACITY.is_power_of_two());
    }

    #[test]
    fn default_batch_size_within_capacity() {
        assert!(DEFAULT_BATCH_SIZE >= 1 && DEFAULT_BATCH_SIZE <= DEFAULT_CAPACITY);
    }
}
