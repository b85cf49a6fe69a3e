use std::fmt::Write as _;

use crate::error::Result;
use crate::record::{FieldValue, Record};

/// Human-readable `level logger: message key=value ...` lines, for
/// terminal/development use.
#[derive(Default)]
pub struct TextEncoder;

fn write_field_value(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Str(s) => write_quoted_if_needed(out, s),
        FieldValue::I8(v) => write!(out, "{v}").unwrap(),
        FieldValue::I16(v) => write!(out, "{v}").unwrap(),
        FieldValue::I32(v) => write!(out, "{v}").unwrap(),
        FieldValue::I64(v) => write!(out, "{v}").unwrap(),
        FieldValue::U8(v) => write!(out, "{v}").unwrap(),
        FieldValue::U16(v) => write!(out, "{v}").unwrap(),
        FieldValue::U32(v) => write!(out, "{v}").unwrap(),
        FieldValue::U64(v) => write!(out, "{v}").unwrap(),
        FieldValue::F32(v) => write!(out, "{v}").unwrap(),
        FieldValue::F64(v) => write!(out, "{v}").unwrap(),
        FieldValue::Bool(v) => write!(out, "{v}").unwrap(),
        FieldValue::Time(ns) => write!(out, "{ns}").unwrap(),
        FieldValue::Duration(ns) => write!(out, "{ns}").unwrap(),
        FieldValue::Error(s) => write_quoted_if_needed(out, s),
        FieldValue::Bytes(b) => write!(out, "<{} bytes>", b.len()).unwrap(),
        FieldValue::Any(s) => write_quoted_if_needed(out, s),
    }
}

fn write_quoted_if_needed(out: &mut String, s: &str) {
    if s.contains(char::is_whitespace) || s.is_empty() {
        write!(out, "{s:?}").unwrap();
    } else {
        out.push_str(s);
    }
}

impl super::Encoder for TextEncoder {
    fn encode(&self, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        let mut line = String::with_capacity(128);
        write!(line, "{}\t{}\t{}", record.timestamp_ns, record.level.as_str(), record.logger_name).unwrap();
        line.push('\t');
        line.push_str(&record.message);
        for field in record.fields() {
            line.push(' ');
            line.push_str(field.key);
            line.push('=');
            write_field_value(&mut line, &field.value);
        }
        if let Some(caller) = &record.caller {
            let _ = write!(line, " caller={}:{}", caller.file, caller.line);
        }
        line.push('\n');
        out.extend_from_slice(line.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::record::{Field, Level};
    use std::sync::Arc;

    #[test]
    fn renders_tab_separated_header_and_fields() {
        let mut record = Record::default();
        record.begin(Level::Warn, Arc::from("svc"), "disk low".into(), 42);
        record.push_field(Field::u64("free_bytes", 1024));

        let mut out = Vec::new();
        TextEncoder.encode(&record, &mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("42\twarn\tsvc\tdisk low"));
        assert!(line.trim_end().ends_with("free_bytes=1024"));
    }
}
