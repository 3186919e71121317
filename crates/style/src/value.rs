//! Decoded stylesheet values and numeric formatting.
use std::collections::BTreeSet;
use std::fmt;

use crate::color::Color;
use crate::fontref::FontRef;

/// A typed view of a single stylesheet attribute.
///
/// Stylesheets store everything as text. Field codecs decode the raw text
/// into one of these variants on read and encode it back on write, so
/// callers compare and edit real numbers, flags and sets instead of strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f32),
    Bool(bool),
    Text(String),
    Set(BTreeSet<String>),
    Color(Color),
    Font(FontRef),
}

impl Value {
    pub fn num(&self) -> Option<f32> {
        match self {
            Value::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Num(v) => *v != 0.0,
            Value::Text(t) => !t.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Color(_) | Value::Font(_) => true,
        }
    }

    /// Best-effort numeric coercion, mirroring how loosely typed callers
    /// hand numbers around as strings.
    pub fn coerce_f32(&self) -> f32 {
        match self {
            Value::Num(v) => *v,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Text(t) => t.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Render the value the way it would be stored in a sheet when no codec
    /// claims the key.
    pub fn to_raw_string(&self) -> String {
        match self {
            Value::Text(t) => t.clone(),
            Value::Num(v) => f2s(*v),
            Value::Bool(b) => {
                if *b {
                    String::new()
                } else {
                    "-".to_string()
                }
            }
            Value::Set(s) => {
                let words: Vec<&str> = s.iter().map(String::as_str).collect();
                words.join(" ")
            }
            Value::Color(c) => c.to_tex(),
            Value::Font(f) => f.family.clone(),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Num(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw_string())
    }
}

/// Format a float with at most three decimal places and no trailing zeros,
/// so round-tripped sheets stay diff-stable.
pub fn f2s(v: f32) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}
