//! JSON-safe numeric sanitization.
//!
//! Every result leaving the engine passes through [`Sanitize`]. Floating-point
//! NaN and ±Infinity become `0.0`; maps and sequences are walked recursively;
//! every other value passes through unchanged.
//!
//! Typed result records implement the trait field by field, and [`Value`]
//! covers dynamically shaped data such as table cells.

use polars::prelude::AnyValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Replace non-finite floats with `0.0`, recursively.
pub trait Sanitize {
    fn sanitize(self) -> Self;
}

/// Convenience wrapper around [`Sanitize::sanitize`].
pub fn sanitize<T: Sanitize>(value: T) -> T {
    value.sanitize()
}

impl Sanitize for f64 {
    #[inline]
    fn sanitize(self) -> Self {
        if self.is_finite() { self } else { 0.0 }
    }
}

impl Sanitize for f32 {
    #[inline]
    fn sanitize(self) -> Self {
        if self.is_finite() { self } else { 0.0 }
    }
}

macro_rules! sanitize_passthrough {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Sanitize for $ty {
                #[inline]
                fn sanitize(self) -> Self {
                    self
                }
            }
        )*
    };
}

sanitize_passthrough!(bool, u8, u32, u64, usize, i32, i64, String, std::path::PathBuf);

impl<T: Sanitize> Sanitize for Option<T> {
    fn sanitize(self) -> Self {
        self.map(Sanitize::sanitize)
    }
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize(self) -> Self {
        self.into_iter().map(Sanitize::sanitize).collect()
    }
}

impl<K: Ord, V: Sanitize> Sanitize for BTreeMap<K, V> {
    fn sanitize(self) -> Self {
        self.into_iter().map(|(k, v)| (k, v.sanitize())).collect()
    }
}

impl<K: Eq + Hash, V: Sanitize> Sanitize for HashMap<K, V> {
    fn sanitize(self) -> Self {
        self.into_iter().map(|(k, v)| (k, v.sanitize())).collect()
    }
}

/// Implement [`Sanitize`] for a record by sanitizing each listed field.
///
/// Fields not listed are moved through untouched, so only list the ones
/// that can carry floats.
macro_rules! sanitize_fields {
    ($ty:ty {}) => {
        impl $crate::sanitize::Sanitize for $ty {
            #[inline]
            fn sanitize(self) -> Self {
                self
            }
        }
    };
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::sanitize::Sanitize for $ty {
            fn sanitize(mut self) -> Self {
                $( self.$field = $crate::sanitize::Sanitize::sanitize(self.$field); )*
                self
            }
        }
    };
}
pub(crate) use sanitize_fields;

/// A dynamically typed, JSON-shaped value.
///
/// Used for table cells in row previews and for free-form maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Convert a polars cell into a [`Value`].
    ///
    /// Dates, datetimes and other logical types are rendered through their
    /// `Display` implementation.
    pub fn from_any(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Value::Null,
            AnyValue::Boolean(b) => Value::Bool(b),

            AnyValue::Int8(i) => Value::Int(i.into()),
            AnyValue::Int16(i) => Value::Int(i.into()),
            AnyValue::Int32(i) => Value::Int(i.into()),
            AnyValue::Int64(i) => Value::Int(i),

            AnyValue::UInt8(u) => Value::Int(u.into()),
            AnyValue::UInt16(u) => Value::Int(u.into()),
            AnyValue::UInt32(u) => Value::Int(u.into()),
            AnyValue::UInt64(u) => match i64::try_from(u) {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Float(u as f64),
            },

            AnyValue::Float32(f) => Value::Float(f as f64),
            AnyValue::Float64(f) => Value::Float(f),

            AnyValue::String(s) => Value::Text(s.to_string()),
            AnyValue::StringOwned(s) => Value::Text(s.to_string()),

            other => Value::Text(format!("{}", other)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl Sanitize for Value {
    fn sanitize(self) -> Self {
        match self {
            Value::Float(f) => Value::Float(f.sanitize()),
            Value::List(items) => Value::List(items.sanitize()),
            Value::Map(map) => Value::Map(map.sanitize()),
            other => other,
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
