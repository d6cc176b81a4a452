// Typed log attributes

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Bytes(Vec<u8>),
    Duration(Duration),
    Time(DateTime<Utc>),
    List(Vec<String>),
    Group(Vec<Attr>),
    Json(serde_json::Value),
}

/// A single (key, value) pair attached to a log record
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: &'static str,
    pub value: Value,
}

impl Attr {
    pub fn new(key: &'static str, value: Value) -> Self {
        Self { key, value }
    }

    pub fn string(key: &'static str, value: impl Into<String>) -> Self {
        Self::new(key, Value::Str(value.into()))
    }

    /// Path rendered with its display form
    pub fn path(key: &'static str, value: &Path) -> Self {
        Self::string(key, value.display().to_string())
    }

    pub fn int(key: &'static str, value: impl Into<i64>) -> Self {
        Self::new(key, Value::Int(value.into()))
    }

    /// Byte length, saturating at i64::MAX
    pub fn size(key: &'static str, len: usize) -> Self {
        Self::new(key, Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
    }

    pub fn bytes(key: &'static str, value: impl Into<Vec<u8>>) -> Self {
        Self::new(key, Value::Bytes(value.into()))
    }

    /// Optional bytes: `None` is logged as a null value
    pub fn opt_bytes(key: &'static str, value: Option<&[u8]>) -> Self {
        match value {
            Some(bytes) => Self::bytes(key, bytes),
            None => Self::new(key, Value::Null),
        }
    }

    pub fn duration(key: &'static str, value: Duration) -> Self {
        Self::new(key, Value::Duration(value))
    }

    pub fn time(key: &'static str, value: DateTime<Utc>) -> Self {
        Self::new(key, Value::Time(value))
    }

    pub fn list<I, S>(key: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(key, Value::List(values.into_iter().map(Into::into).collect()))
    }

    pub fn group(key: &'static str, attrs: Vec<Attr>) -> Self {
        Self::new(key, Value::Group(attrs))
    }

    pub fn json(key: &'static str, value: serde_json::Value) -> Self {
        Self::new(key, Value::Json(value))
    }

    /// The `err` attribute
    pub fn error(err: &(impl fmt::Display + ?Sized)) -> Self {
        Self::string("err", err.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("<nil>"),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Value::Duration(d) => write!(f, "{:?}", d),
            Value::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{:?}", item)?;
                }
                f.write_str("]")
            }
            Value::Group(attrs) => write!(f, "{{{}}}", Attrs(attrs)),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl Value {
    /// Typed JSON form: integers stay numbers, durations are nanoseconds,
    /// groups nest as objects
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Str(s) => Json::String(s.clone()),
            Value::Int(n) => Json::from(*n),
            Value::Bytes(b) => Json::String(String::from_utf8_lossy(b).into_owned()),
            Value::Duration(d) => Json::from(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            Value::Time(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::List(items) => Json::from(items.clone()),
            Value::Group(attrs) => Attrs(attrs).to_json(),
            Value::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Space-separated `key=value` rendering of an attribute list
pub struct Attrs<'a>(pub &'a [Attr]);

impl fmt::Display for Attrs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", attr)?;
        }
        Ok(())
    }
}

impl Attrs<'_> {
    /// JSON object keyed by attribute name; a repeated key keeps its last value
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|attr| (attr.key.to_string(), attr.value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}
