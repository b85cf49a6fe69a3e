//! The in-flight log record and its structured field model.

use std::sync::Arc;

use crate::constants::{MAX_FIELDS, MAX_MESSAGE_LEN};

/// Ordered severity level. `Debug < Info < Warn < Error < DPanic < Panic < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    DPanic = 4,
    Panic = 5,
    Fatal = 6,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::DPanic => "dpanic",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "dpanic" => Some(Level::DPanic),
            "panic" => Some(Level::Panic),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Level::Debug),
            1 => Some(Level::Info),
            2 => Some(Level::Warn),
            3 => Some(Level::Error),
            4 => Some(Level::DPanic),
            5 => Some(Level::Panic),
            6 => Some(Level::Fatal),
            _ => None,
        }
    }
}

/// A tagged field value. String/bytes/error/any payloads are owned buffers
/// supplied by the caller; scalar variants are stored inline and copy
/// trivially. The field key is a `&'static str`: call sites name fields with
/// string literals, so no allocation is needed to carry the key itself.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Str(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// Nanoseconds since the Unix epoch.
    Time(i64),
    /// Nanoseconds.
    Duration(i64),
    Error(String),
    Bytes(Vec<u8>),
    /// Anything else, pre-rendered by the caller (e.g. via `Debug`/`Display`).
    Any(String),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub key: &'static str,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: &'static str, value: FieldValue) -> Self {
        Self { key, value }
    }

    pub fn str(key: &'static str, value: impl Into<String>) -> Self {
        Self::new(key, FieldValue::Str(value.into()))
    }

    pub fn i64(key: &'static str, value: i64) -> Self {
        Self::new(key, FieldValue::I64(value))
    }

    pub fn u64(key: &'static str, value: u64) -> Self {
        Self::new(key, FieldValue::U64(value))
    }

    pub fn f64(key: &'static str, value: f64) -> Self {
        Self::new(key, FieldValue::F64(value))
    }

    pub fn bool(key: &'static str, value: bool) -> Self {
        Self::new(key, FieldValue::Bool(value))
    }

    pub fn error(key: &'static str, value: impl std::fmt::Display) -> Self {
        Self::new(key, FieldValue::Error(value.to_string()))
    }
}

/// Caller-site frame, captured only when the logger config enables it.
#[derive(Debug, Clone)]
pub struct CallerFrame {
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

/// The in-flight log entry. One `Record` lives permanently inside each ring
/// slot; producers overwrite it in place via [`Record::begin`] and
/// [`Record::push_field`], so publishing a record never allocates the
/// `Record` itself — only the owned payloads of `Str`/`Bytes`/`Error`/`Any`
/// fields allocate, and only when the caller's data requires it.
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub timestamp_ns: i64,
    pub logger_name: Arc<str>,
    pub message: String,
    fields: [Option<Field>; MAX_FIELDS],
    field_count: usize,
    pub overflowed_fields: u32,
    pub caller: Option<CallerFrame>,
    pub stack_trace: Option<String>,
}

impl Record {
    /// Resets this slot's record in place for a new publication, clearing
    /// any fields left over from whatever previously occupied this slot.
    pub fn begin(&mut self, level: Level, logger_name: Arc<str>, mut message: String, timestamp_ns: i64) {
        for i in 0..self.field_count {
            self.fields[i] = None;
        }
        if message.len() > MAX_MESSAGE_LEN {
            let mut cut = MAX_MESSAGE_LEN;
            while cut > 0 && !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        self.level = level;
        self.logger_name = logger_name;
        self.message = message;
        self.timestamp_ns = timestamp_ns;
        self.field_count = 0;
        self.overflowed_fields = 0;
        self.caller = None;
        self.stack_trace = None;
    }

    /// Appends a field, preserving call order. Bounds-checked against
    /// `MAX_FIELDS`; silently discards and counts overflow past that point.
    pub fn push_field(&mut self, field: Field) -> bool {
        if self.field_count >= MAX_FIELDS {
            self.overflowed_fields += 1;
            return false;
        }
        self.fields[self.field_count] = Some(field);
        self.field_count += 1;
        true
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields[..self.field_count].iter().filter_map(|f| f.as_ref())
    }

    pub fn set_caller(&mut self, caller: CallerFrame) {
        self.caller = Some(caller);
    }

    pub fn set_stack_trace(&mut self, stack: String) {
        self.stack_trace = Some(stack);
    }
}

impl Default for Record {
    fn default() -> Self {
        Self {
            level: Level::Info,
            timestamp_ns: 0,
            logger_name: Arc::from(""),
            message: String::new(),
            fields: std::array::from_fn(|_| None),
            field_count: 0,
            overflowed_fields: 0,
            caller: None,
            stack_trace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn level_parse_roundtrip() {
        for l in [Level::Debug, Level::Info, Level::Warn, Level::Error, Level::DPanic, Level::Panic, Level::Fatal] {
            assert_eq!(Level::parse(l.as_str()), Some(l));
        }
        assert_eq!(Level::parse("bogus"), None);
    }

    #[test]
    fn begin_clears_previous_fields() {
        let mut r = Record::default();
        r.begin(Level::Info, Arc::from("root"), "first".into(), 1);
        r.push_field(Field::str("a", "1"));
        r.push_field(Field::str("b", "2"));
        assert_eq!(r.field_count(), 2);

        r.begin(Level::Warn, Arc::from("root"), "second".into(), 2);
        assert_eq!(r.field_count(), 0);
        assert_eq!(r.fields().count(), 0);
    }

    #[test]
    fn begin_truncates_oversized_messages() {
        let mut r = Record::default();
        let huge = "x".repeat(MAX_MESSAGE_LEN + 100);
        r.begin(Level::Info, Arc::from("root"), huge, 1);
        assert_eq!(r.message.len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn begin_truncates_on_a_char_boundary() {
        let mut r = Record::default();
        // each "é" is 2 bytes, so a naive byte-index truncation at
        // MAX_MESSAGE_LEN would land mid-character if MAX_MESSAGE_LEN is odd
        // relative to the repeat unit; build a message where that would bite.
        let filler = "a".repeat(MAX_MESSAGE_LEN - 1);
        let message = format!("{filler}é");
        r.begin(Level::Info, Arc::from("root"), message, 1);
        assert!(r.message.len() <= MAX_MESSAGE_LEN);
        assert!(std::str::from_utf8(r.message.as_bytes()).is_ok());
    }

    #[test]
    fn push_field_respects_max_fields() {
        let mut r = Record::default();
        r.begin(Level::Info, Arc::from("root"), "m".into(), 1);
        for i in 0..MAX_FIELDS {
            assert!(r.push_field(Field::i64("k", i as i64)));
        }
        assert!(!r.push_field(Field::i64("overflow", 0)));
        assert_eq!(r.overflowed_fields, 1);
        assert_eq!(r.field_count(), MAX_FIELDS);
    }

    #[test]
    fn field_order_is_preserved() {
        let mut r = Record::default();
        r.begin(Level::Info, Arc::from("root"), "m".into(), 1);
        r.push_field(Field::str("a", "1"));
        r.push_field(Field::str("b", "2"));
        r.push_field(Field::str("c", "3"));
        let keys: Vec<_> = r.fields().map(|f| f.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    proptest::proptest! {
        #[test]
        fn field_push_order_matches_observed_order(n in 0usize..MAX_FIELDS) {
            let mut r = Record::default();
            r.begin(Level::Info, Arc::from("root"), "m".into(), 1);
            let keys: Vec<&'static str> = (0..n).map(|i| -> &'static str {
                Box::leak(i.to_string().into_boxed_str())
            }).collect();
            for k in &keys {
                r.push_field(Field::i64(k, 0));
            }
            let observed: Vec<_> = r.fields().map(|f| f.key).collect();
            prop_assert_eq!(observed, keys);
        }
    }
}
