use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A call-time argument or bound parameter value.
///
/// Scalars bind directly to the execution unit. `Seq` is the element-wise
/// form batch arguments must take. `Record` carries a structured argument
/// whose members a dotted placeholder path can descend into.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Record(Arc<dyn Record>),
}

impl Value {
    /// Wraps a [`Record`] implementation.
    pub fn record(record: impl Record + 'static) -> Value {
        Value::Record(Arc::new(record))
    }

    /// Builds a `Bytes` value; `Vec<u8>` has no `From` impl because it
    /// would overlap with the sequence conversion.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Value {
        Value::Bytes(bytes.into())
    }

    /// Short kind label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Seq(_) => "sequence",
            Value::Record(_) => "record",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Value {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}

/// Named-member lookup over a structured argument.
///
/// The resolver first asks for a direct `field`, then for a `reader` under
/// each name the active [`ReaderConvention`] derives. Implementations only
/// answer by name; the precedence rule lives in the resolver.
pub trait Record: fmt::Debug + Send + Sync {
    /// Type name used in error messages.
    fn type_name(&self) -> &str;

    /// Directly accessible member named exactly `name`.
    fn field(&self, name: &str) -> Option<Value>;

    /// Zero-argument reader named exactly `name` (already in reader form,
    /// e.g. `getUsername`).
    fn reader(&self, name: &str) -> Option<Value>;
}

/// Map-backed [`Record`], for callers that assemble arguments dynamically.
#[derive(Debug, Clone, Default)]
pub struct MapRecord {
    type_name: String,
    fields: BTreeMap<String, Value>,
    readers: BTreeMap<String, Value>,
}

impl MapRecord {
    pub fn new(type_name: impl Into<String>) -> MapRecord {
        MapRecord {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
            readers: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> MapRecord {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_reader(mut self, name: impl Into<String>, value: impl Into<Value>) -> MapRecord {
        self.readers.insert(name.into(), value.into());
        self
    }
}

impl Record for MapRecord {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn reader(&self, name: &str) -> Option<Value> {
        self.readers.get(name).cloned()
    }
}

/// How a path identifier is turned into candidate reader names when no
/// field of that name exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderConvention {
    /// `username` -> `getUsername`, then `isUsername` for boolean readers.
    #[default]
    JavaBean,
    /// The identifier itself names the reader.
    Plain,
}

impl ReaderConvention {
    /// Candidate reader names for `identifier`, in lookup order.
    pub fn reader_names(&self, identifier: &str) -> Vec<String> {
        match self {
            ReaderConvention::JavaBean => {
                let capitalized = capitalize(identifier);
                vec![format!("get{capitalized}"), format!("is{capitalized}")]
            }
            ReaderConvention::Plain => vec![identifier.to_string()],
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
