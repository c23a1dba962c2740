//! Typed Values and the Result Tree
//!
//! [`Value`] is what a native connection returns and what a translator
//! renders into command arguments. [`FastoObject`] is the tree handlers
//! append their replies to.
//!
//! ## Display
//!
//! Values print like an interactive client would show them:
//!
//! ```text
//! OK
//! (integer) 3
//! "hello"
//! (nil)
//! 1) "a"
//! 2) "b"
//! ```

use crate::types::key::{command_line_token, is_binary_data, hex_escape};
use bytes::Bytes;
use std::fmt;

/// The semantic type of a value; drives backend verb selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Status,
    Integer,
    Double,
    String,
    Array,
    Set,
    ZSet,
    Hash,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "none",
            ValueType::Status => "status",
            ValueType::Integer => "integer",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Array => "list",
            ValueType::Set => "set",
            ValueType::ZSet => "zset",
            ValueType::Hash => "hash",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Status reply such as `OK`
    Status(String),
    Integer(i64),
    Double(f64),
    String(Bytes),
    /// Ordered list; items may nest (e.g. SCAN replies)
    Array(Vec<Value>),
    Set(Vec<Bytes>),
    /// `(member, score)` pairs in score order
    ZSet(Vec<(Bytes, f64)>),
    /// `(field, value)` pairs
    Hash(Vec<(Bytes, Bytes)>),
}

impl Value {
    /// Shorthand for the `OK` status.
    pub fn ok() -> Self {
        Value::Status("OK".to_string())
    }

    pub fn string(data: impl Into<Bytes>) -> Self {
        Value::String(data.into())
    }

    /// Builds an array of plain strings.
    pub fn string_array<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Value::Array(items.into_iter().map(|b| Value::String(b.into())).collect())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Status(_) => ValueType::Status,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Set(_) => ValueType::Set,
            Value::ZSet(_) => ValueType::ZSet,
            Value::Hash(_) => ValueType::Hash,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value as command-line arguments.
    ///
    /// Collections become space separated tokens: zset members as
    /// `score member`, hash entries as `field value`.
    pub fn for_command_line(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Status(s) => command_line_token(s.as_bytes()),
            Value::Integer(n) => n.to_string(),
            Value::Double(d) => d.to_string(),
            Value::String(b) => command_line_token(b),
            Value::Array(items) => items
                .iter()
                .map(Value::for_command_line)
                .collect::<Vec<_>>()
                .join(" "),
            Value::Set(members) => members
                .iter()
                .map(|m| command_line_token(m))
                .collect::<Vec<_>>()
                .join(" "),
            Value::ZSet(members) => members
                .iter()
                .map(|(m, score)| format!("{} {}", score, command_line_token(m)))
                .collect::<Vec<_>>()
                .join(" "),
            Value::Hash(entries) => entries
                .iter()
                .map(|(f, v)| format!("{} {}", command_line_token(f), command_line_token(v)))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Number of items for collections, 1 for scalars, 0 for null.
    pub fn len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Array(items) => items.len(),
            Value::Set(members) => members.len(),
            Value::ZSet(members) => members.len(),
            Value::Hash(entries) => entries.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for an array holding nulls or nested collections, which have no
    /// single-token command line form.
    pub fn has_nested_items(&self) -> bool {
        match self {
            Value::Array(items) => items.iter().any(|item| {
                matches!(
                    item,
                    Value::Null | Value::Array(_) | Value::Set(_) | Value::ZSet(_) | Value::Hash(_)
                )
            }),
            _ => false,
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    if is_binary_data(data) {
        write!(f, "\"{}\"", hex_escape(data))
    } else {
        write!(f, "\"{}\"", String::from_utf8_lossy(data))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "(nil)"),
            Value::Status(s) => write!(f, "{}", s),
            Value::Integer(n) => write!(f, "(integer) {}", n),
            Value::Double(d) => write!(f, "\"{}\"", d),
            Value::String(data) => write_quoted(f, data),
            Value::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
            Value::Set(members) if members.is_empty() => write!(f, "(empty set)"),
            Value::Set(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) ", i + 1)?;
                    write_quoted(f, m)?;
                }
                Ok(())
            }
            Value::ZSet(members) if members.is_empty() => write!(f, "(empty zset)"),
            Value::ZSet(members) => {
                for (i, (m, score)) in members.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) ", i + 1)?;
                    write_quoted(f, m)?;
                    write!(f, " {}", score)?;
                }
                Ok(())
            }
            Value::Hash(entries) if entries.is_empty() => write!(f, "(empty hash)"),
            Value::Hash(entries) => {
                for (i, (field, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) ", i + 1)?;
                    write_quoted(f, field)?;
                    write!(f, " => ")?;
                    write_quoted(f, value)?;
                }
                Ok(())
            }
        }
    }
}

/// A node of the result tree.
///
/// The root carries no value; each executed command appends one child.
#[derive(Debug, Clone, PartialEq)]
pub struct FastoObject {
    value: Option<Value>,
    delimiter: String,
    children: Vec<FastoObject>,
}

impl Default for FastoObject {
    fn default() -> Self {
        Self::root()
    }
}

impl FastoObject {
    /// Creates an empty root node with a newline delimiter.
    pub fn root() -> Self {
        Self::with_delimiter("\n")
    }

    /// Creates an empty root node with a custom child delimiter.
    pub fn with_delimiter(delimiter: impl Into<String>) -> Self {
        Self {
            value: None,
            delimiter: delimiter.into(),
            children: Vec::new(),
        }
    }

    /// Creates a leaf node.
    pub fn new(value: Value) -> Self {
        Self {
            value: Some(value),
            delimiter: "\n".to_string(),
            children: Vec::new(),
        }
    }

    /// Appends a child holding `value` and returns it.
    pub fn add_child(&mut self, value: Value) -> &mut FastoObject {
        let mut child = FastoObject::new(value);
        child.delimiter = self.delimiter.clone();
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn children(&self) -> &[FastoObject] {
        &self.children
    }

    /// Value of the most recently appended child.
    pub fn last_value(&self) -> Option<&Value> {
        self.children.last().and_then(FastoObject::value)
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn is_root(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Display for FastoObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(value) = &self.value {
            write!(f, "{}", value)?;
            first = false;
        }
        for child in &self.children {
            if !first {
                f.write_str(&self.delimiter)?;
            }
            write!(f, "{}", child)?;
            first = false;
        }
        Ok(())
    }
}
