use serde::{Deserialize, Serialize};

/// Structured form of a compiler reply expression
///
/// The compiler answers every command with a single string which may
/// itself encode nested list/tuple/record literal syntax. `Value` is the
/// decoded shape of such a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    // Primitives
    String(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    /// Bare identifier or dotted path (e.g. `Modelica.Blocks`)
    Ident(String),

    // Collections
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Empty list, the conventional "no answer" value for malformed input
    pub fn empty() -> Self {
        Value::List(Vec::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[Value] {
        match self {
            Value::List(items) | Value::Tuple(items) => items,
            _ => &[],
        }
    }

    /// Number of elements for collections, 0 for primitives
    pub fn len(&self) -> usize {
        match self {
            Value::List(items) | Value::Tuple(items) => items.len(),
            Value::Record(fields) => fields.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field lookup for records
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Render the value back into the reply grammar
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Ident(s) => s.clone(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_text()).collect();
                format!("{{{}}}", inner.join(","))
            }
            Value::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_text()).collect();
                format!("({})", inner.join(","))
            }
            Value::Record(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value.to_text()))
                    .collect();
                format!("record({})", inner.join(","))
            }
        }
    }

    /// Convert value to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"error\": \"JSON serialization failed: {}\"}}", e)
        })
    }
}
