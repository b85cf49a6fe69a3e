use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::record::{FieldValue, Record};

/// One JSON object per record, newline-terminated.
#[derive(Default)]
pub struct JsonEncoder;

fn field_value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Str(s) => json!(s),
        FieldValue::I8(v) => json!(v),
        FieldValue::I16(v) => json!(v),
        FieldValue::I32(v) => json!(v),
        FieldValue::I64(v) => json!(v),
        FieldValue::U8(v) => json!(v),
        FieldValue::U16(v) => json!(v),
        FieldValue::U32(v) => json!(v),
        FieldValue::U64(v) => json!(v),
        FieldValue::F32(v) => json!(v),
        FieldValue::F64(v) => json!(v),
        FieldValue::Bool(v) => json!(v),
        FieldValue::Time(ns) => json!(ns),
        FieldValue::Duration(ns) => json!(ns),
        FieldValue::Error(s) => json!(s),
        FieldValue::Bytes(b) => json!(base64_encode(b)),
        FieldValue::Any(s) => json!(s),
    }
}

/// No external base64 crate is in the dependency stack; this is the only
/// place bytes fields need encoding, so a small inline table is cheaper
/// than adding a dependency for one call site.
fn base64_encode(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 { TABLE[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { TABLE[(b2 & 0x3f) as usize] as char } else { '=' });
    }
    out
}

impl super::Encoder for JsonEncoder {
    fn encode(&self, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        let mut obj = Map::new();
        obj.insert("ts".to_string(), json!(record.timestamp_ns));
        obj.insert("level".to_string(), json!(record.level.as_str()));
        obj.insert("logger".to_string(), json!(record.logger_name.as_ref()));
        obj.insert("msg".to_string(), json!(record.message));

        let mut fields = Map::new();
        for field in record.fields() {
            fields.insert(field.key.to_string(), field_value_to_json(&field.value));
        }
        if !fields.is_empty() {
            obj.insert("fields".to_string(), Value::Object(fields));
        }
        if let Some(caller) = &record.caller {
            obj.insert("caller".to_string(), json!(format!("{}:{}", caller.file, caller.line)));
        }
        if let Some(stack) = &record.stack_trace {
            obj.insert("stack".to_string(), json!(stack));
        }

        serde_json::to_writer(&mut *out, &Value::Object(obj))
            .map_err(|e| Error::encode(e.to_string()))?;
        out.push(b'\n');
        Ok(())
    }
}
