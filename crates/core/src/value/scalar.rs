//! Scalar runtime datatypes.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::enums::BaseType;

/// A 2-D integer coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Point { x, y }
    }
}

/// An unordered pair of identifiers: `A B` equals `B A`.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub first: String,
    pub second: String,
}

impl Pair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Pair {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        (self.first == other.first && self.second == other.second)
            || (self.first == other.second && self.second == other.first)
    }
}

/// An ordered pair of identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectedPair {
    pub source: String,
    pub target: String,
}

impl DirectedPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        DirectedPair {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// An uploaded file response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QtiFile {
    pub mime_type: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// One scalar value. Identifier, URI and intOrIdentifier values are carried
/// by `String` (and `Integer`); their lexical constraints are checked by
/// base type compliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "baseType", content = "value", rename_all = "camelCase")]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Duration(Duration),
    Point(Point),
    Pair(Pair),
    DirectedPair(DirectedPair),
    File(QtiFile),
}

impl Scalar {
    /// The base type this scalar naturally carries.
    pub fn base_type(&self) -> BaseType {
        match self {
            Scalar::Boolean(_) => BaseType::Boolean,
            Scalar::Integer(_) => BaseType::Integer,
            Scalar::Float(_) => BaseType::Float,
            Scalar::String(_) => BaseType::String,
            Scalar::Duration(_) => BaseType::Duration,
            Scalar::Point(_) => BaseType::Point,
            Scalar::Pair(_) => BaseType::Pair,
            Scalar::DirectedPair(_) => BaseType::DirectedPair,
            Scalar::File(_) => BaseType::File,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or float widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Scalar::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self {
            Scalar::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Integer(_) | Scalar::Float(_))
    }

    /// The empty string is the only scalar considered null.
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::String(s) if s.is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => write!(f, "'{}'", s),
            Scalar::Duration(d) => write!(f, "PT{}S", d.as_seconds_f64()),
            Scalar::Point(p) => write!(f, "{} {}", p.x, p.y),
            Scalar::Pair(p) => write!(f, "{} {}", p.first, p.second),
            Scalar::DirectedPair(p) => write!(f, "{} {}", p.source, p.target),
            Scalar::File(file) => write!(
                f,
                "file({}, {} bytes)",
                file.filename.as_deref().unwrap_or(""),
                file.data.len()
            ),
        }
    }
}

/// Whether `s` is a QTI identifier (an XML NCName without colons).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Whether `s` is acceptable as a URI reference: non-empty, no whitespace.
pub fn is_uri(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}
