//! Self-describing binary wire format.
//!
//! File layout: a 4-byte magic (`IGN1`) + 1-byte version header, written
//! once by the sink, followed by one variable-length record per entry:
//!
//! ```text
//! i64  timestamp_ns
//! u8   level
//! u16  logger_name_len, then that many bytes
//! u32  message_len, then that many bytes
//! u16  field_count
//!   per field:
//!     u16 key_len, then that many bytes
//!     u8  type tag
//!     <type-specific payload>
//! ```
//!
//! All multi-byte integers are little-endian.

use crate::constants::{WIRE_MAGIC, WIRE_VERSION};
use crate::error::{Error, Result};
use crate::record::{Field, FieldValue, Level, Record};

const TAG_STR: u8 = 0;
const TAG_I8: u8 = 1;
const TAG_I16: u8 = 2;
const TAG_I32: u8 = 3;
const TAG_I64: u8 = 4;
const TAG_U8: u8 = 5;
const TAG_U16: u8 = 6;
const TAG_U32: u8 = 7;
const TAG_U64: u8 = 8;
const TAG_F32: u8 = 9;
const TAG_F64: u8 = 10;
const TAG_BOOL: u8 = 11;
const TAG_TIME: u8 = 12;
const TAG_DURATION: u8 = 13;
const TAG_ERROR: u8 = 14;
const TAG_BYTES: u8 = 15;
const TAG_ANY: u8 = 16;

pub fn write_header(out: &mut Vec<u8>) {
    out.extend_from_slice(&WIRE_MAGIC);
    out.push(WIRE_VERSION);
}

/// Reads and validates the 5-byte file header, returning the remainder.
pub fn read_header(input: &[u8]) -> Result<&[u8]> {
    if input.len() < 5 {
        return Err(Error::malformed("input shorter than the 5-byte header"));
    }
    if input[..4] != WIRE_MAGIC {
        return Err(Error::malformed("bad magic bytes"));
    }
    let version = input[4];
    if version != WIRE_VERSION {
        return Err(Error::UnsupportedVersion { version });
    }
    Ok(&input[5..])
}

fn write_len_prefixed_str(out: &mut Vec<u8>, s: &str, len_bytes: usize) {
    match len_bytes {
        2 => out.extend_from_slice(&(s.len() as u16).to_le_bytes()),
        4 => out.extend_from_slice(&(s.len() as u32).to_le_bytes()),
        _ => unreachable!(),
    }
    out.extend_from_slice(s.as_bytes());
}

fn field_tag(value: &FieldValue) -> u8 {
    match value {
        FieldValue::Str(_) => TAG_STR,
        FieldValue::I8(_) => TAG_I8,
        FieldValue::I16(_) => TAG_I16,
        FieldValue::I32(_) => TAG_I32,
        FieldValue::I64(_) => TAG_I64,
        FieldValue::U8(_) => TAG_U8,
        FieldValue::U16(_) => TAG_U16,
        FieldValue::U32(_) => TAG_U32,
        FieldValue::U64(_) => TAG_U64,
        FieldValue::F32(_) => TAG_F32,
        FieldValue::F64(_) => TAG_F64,
        FieldValue::Bool(_) => TAG_BOOL,
        FieldValue::Time(_) => TAG_TIME,
        FieldValue::Duration(_) => TAG_DURATION,
        FieldValue::Error(_) => TAG_ERROR,
        FieldValue::Bytes(_) => TAG_BYTES,
        FieldValue::Any(_) => TAG_ANY,
    }
}

fn write_field_payload(out: &mut Vec<u8>, value: &FieldValue) {
    match value {
        FieldValue::Str(s) | FieldValue::Error(s) | FieldValue::Any(s) => {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        FieldValue::Bytes(b) => {
            out.extend_from_slice(&(b.len() as u32).to_le_bytes());
            out.extend_from_slice(b);
        }
        FieldValue::I8(v) => out.push(*v as u8),
        FieldValue::U8(v) => out.push(*v),
        FieldValue::Bool(v) => out.push(*v as u8),
        FieldValue::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Time(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Duration(v) => out.extend_from_slice(&v.to_le_bytes()),
    }
}

#[derive(Default)]
pub struct BinaryEncoder;

impl super::Encoder for BinaryEncoder {
    fn encode(&self, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&record.timestamp_ns.to_le_bytes());
        out.push(record.level as u8);
        write_len_prefixed_str(out, &record.logger_name, 2);
        write_len_prefixed_str(out, &record.message, 4);
        out.extend_from_slice(&(record.field_count() as u16).to_le_bytes());
        for field in record.fields() {
            write_len_prefixed_str(out, field.key, 2);
            out.push(field_tag(&field.value));
            write_field_payload(out, &field.value);
        }
        Ok(())
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(Error::malformed("truncated record"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn str(&mut self, len: usize) -> Result<String> {
        String::from_utf8(self.take(len)?.to_vec())
            .map_err(|_| Error::malformed("field was not valid UTF-8"))
    }
}

/// Decodes one record starting at the front of `input`, returning the
/// record and the number of bytes consumed.
pub fn decode_record(input: &[u8]) -> Result<(Record, usize)> {
    let mut cursor = Cursor { bytes: input, pos: 0 };
    let timestamp_ns = cursor.i64()?;
    let level = Level::from_u8(cursor.u8()?).ok_or_else(|| Error::malformed("bad level byte"))?;
    let name_len = cursor.u16()? as usize;
    let logger_name = cursor.str(name_len)?;
    let message_len = cursor.u32()? as usize;
    let message = cursor.str(message_len)?;
    let field_count = cursor.u16()?;

    let mut record = Record::default();
    record.begin(level, std::sync::Arc::from(logger_name.as_str()), message, timestamp_ns);

    for _ in 0..field_count {
        let key_len = cursor.u16()? as usize;
        let key_bytes = cursor.take(key_len)?.to_vec();
        let key: &'static str = Box::leak(String::from_utf8(key_bytes)
            .map_err(|_| Error::malformed("field key was not valid UTF-8"))?
            .into_boxed_str());
        let tag = cursor.u8()?;
        let value = decode_field_payload(&mut cursor, tag)?;
        record.push_field(Field::new(key, value));
    }

    Ok((record, cursor.pos))
}

fn decode_field_payload(cursor: &mut Cursor<'_>, tag: u8) -> Result<FieldValue> {
    Ok(match tag {
        TAG_STR => FieldValue::Str(cursor.str(cursor_u32_len(cursor)?)?),
        TAG_I8 => FieldValue::I8(cursor.u8()? as i8),
        TAG_I16 => FieldValue::I16(i16::from_le_bytes(cursor.take(2)?.try_into().unwrap())),
        TAG_I32 => FieldValue::I32(i32::from_le_bytes(cursor.take(4)?.try_into().unwrap())),
        TAG_I64 => FieldValue::I64(cursor.i64()?),
        TAG_U8 => FieldValue::U8(cursor.u8()?),
        TAG_U16 => FieldValue::U16(cursor.u16()?),
        TAG_U32 => FieldValue::U32(cursor.u32()?),
        TAG_U64 => FieldValue::U64(u64::from_le_bytes(cursor.take(8)?.try_into().unwrap())),
        TAG_F32 => FieldValue::F32(f32::from_le_bytes(cursor.take(4)?.try_into().unwrap())),
        TAG_F64 => FieldValue::F64(f64::from_le_bytes(cursor.take(8)?.try_into().unwrap())),
        TAG_BOOL => FieldValue::Bool(cursor.u8()? != 0),
        TAG_TIME => FieldValue::Time(cursor.i64()?),
        TAG_DURATION => FieldValue::Duration(cursor.i64()?),
        TAG_ERROR => FieldValue::Error(cursor.str(cursor_u32_len(cursor)?)?),
        TAG_BYTES => {
            let len = cursor_u32_len(cursor)?;
            FieldValue::Bytes(cursor.take(len)?.to_vec())
        }
        TAG_ANY => FieldValue::Any(cursor.str(cursor_u32_len(cursor)?)?),
        other => return Err(Error::malformed(format!("unknown field type tag {other}"))),
    })
}

fn cursor_u32_len(cursor: &mut Cursor<'_>) -> Result<usize> {
    Ok(cursor.u32()? as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn header_roundtrips() {
        let mut buf = Vec::new();
        write_header(&mut buf);
        let rest = read_header(&buf).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(read_header(b"XXXX\x01").is_err());
    }

    #[test]
    fn rejects_future_version() {
        let mut buf = WIRE_MAGIC.to_vec();
        buf.push(WIRE_VERSION + 1);
        assert!(matches!(read_header(&buf), Err(Error::UnsupportedVersion { .. })));
    }

    #[test]
    fn record_roundtrips_with_fields() {
        let mut record = Record::default();
        record.begin(Level::Error, Arc::from("svc"), "boom".into(), 99);
        record.push_field(Field::str("reason", "disk full"));
        record.push_field(Field::u64("code", 500));
        record.push_field(Field::new("payload", FieldValue::Bytes(vec![1, 2, 3])));

        let mut buf = Vec::new();
        BinaryEncoder.encode(&record, &mut buf).unwrap();
        let (decoded, consumed) = decode_record(&buf).unwrap();

        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.level, Level::Error);
        assert_eq!(decoded.logger_name.as_ref(), "svc");
        assert_eq!(decoded.message, "boom");
        let values: Vec<_> = decoded.fields().map(|f| f.key).collect();
        assert_eq!(values, vec!["reason", "code", "payload"]);
    }

    proptest::proptest! {
        #[test]
        fn encode_decode_is_identity_on_scalars(
            level_idx in 0u8..7,
            ts in proptest::prelude::any::<i64>(),
            name in "[a-z]{1,16}",
            message in ".{0,64}",
            i in proptest::prelude::any::<i64>(),
            u in proptest::prelude::any::<u64>(),
            f in proptest::prelude::any::<f64>(),
            flag in proptest::prelude::any::<bool>(),
            bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..32),
        ) {
            let level = Level::from_u8(level_idx).unwrap();
            let mut record = Record::default();
            record.begin(level, Arc::from(name.as_str()), message.clone(), ts);
            record.push_field(Field::i64("i", i));
            record.push_field(Field::u64("u", u));
            record.push_field(Field::f64("f", f));
            record.push_field(Field::bool("flag", flag));
            record.push_field(Field::new("raw", FieldValue::Bytes(bytes.clone())));

            let mut buf = Vec::new();
            BinaryEncoder.encode(&record, &mut buf).unwrap();
            let (decoded, consumed) = decode_record(&buf).unwrap();

            prop_assert_eq!(consumed, buf.len());
            prop_assert_eq!(decoded.level, level);
            prop_assert_eq!(decoded.logger_name.as_ref(), name.as_str());
            prop_assert_eq!(decoded.message, message);
            prop_assert_eq!(decoded.timestamp_ns, ts);

            let decoded_fields: Vec<_> = decoded.fields().collect();
            prop_assert_eq!(decoded_fields.len(), 5);
            match &decoded_fields[0].value {
                FieldValue::I64(v) => prop_assert_eq!(*v, i),
                _ => prop_assert!(false, "expected I64"),
            }
            match &decoded_fields[1].value {
                FieldValue::U64(v) => prop_assert_eq!(*v, u),
                _ => prop_assert!(false, "expected U64"),
            }
            match &decoded_fields[2].value {
                FieldValue::F64(v) => prop_assert!(v.to_bits() == f.to_bits() || (v.is_nan() && f.is_nan())),
                _ => prop_assert!(false, "expected F64"),
            }
            match &decoded_fields[3].value {
                FieldValue::Bool(v) => prop_assert_eq!(*v, flag),
                _ => prop_assert!(false, "expected Bool"),
            }
            match &decoded_fields[4].value {
                FieldValue::Bytes(v) => prop_assert_eq!(v, &bytes),
                _ => prop_assert!(false, "expected Bytes"),
            }
        }
    }
}
