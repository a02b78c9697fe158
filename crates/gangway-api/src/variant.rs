//! The host-neutral dynamic value type.
//!
//! [`Variant`] is the lingua franca for everything that crosses the
//! host/plugin boundary: method arguments, property values, event payloads.
//! Exactly one kind is active at a time; conversion between kinds is
//! explicit via [`Variant::convert_cast`] and may fail with a typed error.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::api::{ApiRef, same_api};
use crate::error::{BridgeError, BridgeResult};

/// An ordered list of variants.
pub type VariantList = Vec<Variant>;

/// An ordered map from member name to variant.
pub type VariantMap = IndexMap<String, Variant>;

/// The closed set of kinds a [`Variant`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum VariantKind {
    Null,
    Void,
    Bool,
    Int,
    Double,
    String,
    Object,
    List,
    Map,
}

/// A dynamic value that can be passed between the host and the plugin.
///
/// Scalars are value-semantic; `Object`, `List` and `Map` payloads are
/// shared references, so cloning a variant never deep-copies an object
/// graph.
#[derive(Clone)]
pub enum Variant {
    /// JavaScript `null`.
    Null,

    /// Absence of a value (`undefined`).
    Void,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Int(i64),

    /// Floating point value.
    Double(f64),

    /// String value. Embedded NUL bytes are preserved across the boundary.
    String(String),

    /// Reference to a scriptable object (plugin-owned or a host proxy).
    Object(ApiRef),

    /// Array value.
    List(Arc<VariantList>),

    /// Object/map value with named members.
    Map(Arc<VariantMap>),
}

impl Variant {
    /// Get the active kind.
    pub fn kind(&self) -> VariantKind {
        match self {
            Self::Null => VariantKind::Null,
            Self::Void => VariantKind::Void,
            Self::Bool(_) => VariantKind::Bool,
            Self::Int(_) => VariantKind::Int,
            Self::Double(_) => VariantKind::Double,
            Self::String(_) => VariantKind::String,
            Self::Object(_) => VariantKind::Object,
            Self::List(_) => VariantKind::List,
            Self::Map(_) => VariantKind::Map,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value is void/undefined.
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Try to get this value as a boolean without coercion.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an integer without coercion.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string slice without coercion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an object reference.
    pub fn as_object(&self) -> Option<&ApiRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Try to get this value as a list.
    pub fn as_list(&self) -> Option<&VariantList> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Try to get this value as a map.
    pub fn as_map(&self) -> Option<&VariantMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Attempt a typed extraction, coercing where the kind allows it.
    ///
    /// Numeric widening succeeds; `String` parses to numbers only when the
    /// full string is a valid literal; `String` to `bool` accepts only the
    /// canonical `"true"`/`"false"`; an object reference never converts to
    /// a string.
    pub fn convert_cast<T: FromVariant>(&self) -> BridgeResult<T> {
        T::from_variant(self)
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::Void
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Void => write!(f, "Void"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Double(d) => write!(f, "Double({d})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Object(_) => write!(f, "Object(..)"),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Map(m) => write!(f, "Map({} entries)", m.len()),
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Void, Self::Void) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            // Two references to one object are equal even when the wrappers
            // are distinct proxies around the same foreign handle.
            (Self::Object(a), Self::Object(b)) => same_api(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// Conversion from a [`Variant`] into a concrete Rust type.
///
/// Implemented for the types plugin method bodies typically bind their
/// arguments to; failures carry the source kind and target type name.
pub trait FromVariant: Sized {
    fn from_variant(v: &Variant) -> BridgeResult<Self>;
}

impl FromVariant for bool {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        match v {
            Variant::Bool(b) => Ok(*b),
            Variant::Int(i) => Ok(*i != 0),
            Variant::Double(d) => Ok(*d != 0.0),
            Variant::String(s) if s == "true" => Ok(true),
            Variant::String(s) if s == "false" => Ok(false),
            _ => Err(BridgeError::conversion(v.kind(), "bool")),
        }
    }
}

impl FromVariant for i64 {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        match v {
            Variant::Int(i) => Ok(*i),
            Variant::Bool(b) => Ok(i64::from(*b)),
            Variant::Double(d) if d.fract() == 0.0 && d.abs() < (i64::MAX as f64) => {
                Ok(*d as i64)
            }
            Variant::String(s) => s
                .parse()
                .map_err(|_| BridgeError::conversion(VariantKind::String, "i64")),
            _ => Err(BridgeError::conversion(v.kind(), "i64")),
        }
    }
}

impl FromVariant for i32 {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        let wide: i64 = i64::from_variant(v)?;
        i32::try_from(wide).map_err(|_| BridgeError::conversion(v.kind(), "i32"))
    }
}

impl FromVariant for f64 {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        match v {
            Variant::Double(d) => Ok(*d),
            Variant::Int(i) => Ok(*i as f64),
            Variant::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Variant::String(s) => s
                .parse()
                .map_err(|_| BridgeError::conversion(VariantKind::String, "f64")),
            _ => Err(BridgeError::conversion(v.kind(), "f64")),
        }
    }
}

impl FromVariant for String {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        match v {
            Variant::String(s) => Ok(s.clone()),
            Variant::Int(i) => Ok(i.to_string()),
            Variant::Double(d) => Ok(d.to_string()),
            Variant::Bool(b) => Ok(b.to_string()),
            _ => Err(BridgeError::conversion(v.kind(), "String")),
        }
    }
}

impl FromVariant for ApiRef {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        match v {
            Variant::Object(o) => Ok(o.clone()),
            _ => Err(BridgeError::conversion(v.kind(), "object")),
        }
    }
}

impl FromVariant for VariantList {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        match v {
            Variant::List(l) => Ok(l.as_ref().clone()),
            _ => Err(BridgeError::conversion(v.kind(), "list")),
        }
    }
}

impl FromVariant for VariantMap {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        match v {
            Variant::Map(m) => Ok(m.as_ref().clone()),
            _ => Err(BridgeError::conversion(v.kind(), "map")),
        }
    }
}

impl FromVariant for Variant {
    fn from_variant(v: &Variant) -> BridgeResult<Self> {
        Ok(v.clone())
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for Variant {
    fn from(u: u32) -> Self {
        Self::Int(i64::from(u))
    }
}

impl From<f64> for Variant {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<ApiRef> for Variant {
    fn from(o: ApiRef) -> Self {
        Self::Object(o)
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(list: Vec<T>) -> Self {
        Self::List(Arc::new(list.into_iter().map(Into::into).collect()))
    }
}

impl From<VariantMap> for Variant {
    fn from(map: VariantMap) -> Self {
        Self::Map(Arc::new(map))
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
