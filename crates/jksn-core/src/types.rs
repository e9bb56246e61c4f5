//! The JKSN value model.
//!
//! [`Value`] is a closed sum type over the twelve JKSN variants. Heap payloads
//! (strings, blobs, arrays, objects) sit behind `Arc`, so cloning a value is
//! O(1) and mutation goes through `Arc::make_mut`: a handle that shares its
//! payload with another copies it before writing.
//!
//! Values are totally ordered across variants (first by [`Kind`] rank, then by
//! payload) so any value can be an object key, and the structural hash
//! ([`Value::hash_code`]) agrees with that order's equality.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::error::{JksnError, Result};
use crate::long_double::LongDouble;

/// Object payload: keys are kept in canonical (total) order.
pub type Map = BTreeMap<Value, Value>;

/// Variant tag of a [`Value`]. The discriminant is the canonical rank used by
/// the cross-variant total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Kind {
    Undefined = 0,
    Null = 1,
    Bool = 2,
    Int = 3,
    Float = 4,
    Double = 5,
    LongDouble = 6,
    String = 7,
    Blob = 8,
    Array = 9,
    Object = 10,
    Unspecified = 11,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Undefined => "undefined",
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Double => "double",
            Kind::LongDouble => "long double",
            Kind::String => "string",
            Kind::Blob => "blob",
            Kind::Array => "array",
            Kind::Object => "object",
            Kind::Unspecified => "unspecified",
        }
    }

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Kind::Int | Kind::Float | Kind::Double | Kind::LongDouble
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JKSN value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    LongDouble(LongDouble),
    String(Arc<String>),
    Blob(Arc<Vec<u8>>),
    Array(Arc<Vec<Value>>),
    Object(Arc<Map>),
    /// Placeholder for a slot intentionally left unfilled (for example a
    /// missing column in a row/column swapped array).
    Unspecified,
}

// ============================================================================
// Construction
// ============================================================================

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Arc::new(s.into()))
    }

    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Blob(Arc::new(bytes.into()))
    }

    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Build an object; a repeated key keeps the last value.
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Object(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn empty_array() -> Self {
        Value::Array(Arc::new(Vec::new()))
    }

    pub fn empty_object() -> Self {
        Value::Object(Arc::new(Map::new()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<LongDouble> for Value {
    fn from(l: LongDouble) -> Self {
        Value::LongDouble(l)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(Arc::new(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// Inspection and conversion
// ============================================================================

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Undefined => Kind::Undefined,
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Double(_) => Kind::Double,
            Value::LongDouble(_) => Kind::LongDouble,
            Value::String(_) => Kind::String,
            Value::Blob(_) => Kind::Blob,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
            Value::Unspecified => Kind::Unspecified,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    pub fn is_long_double(&self) -> bool {
        matches!(self, Value::LongDouble(_))
    }

    pub fn is_number(&self) -> bool {
        self.kind().is_numeric()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, Value::Blob(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Value::Unspecified)
    }

    fn mismatch(&self, wanted: &str) -> JksnError {
        JksnError::type_error(format!("cannot convert {} to {wanted}", self.kind()))
    }

    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Exact integer value. Floating-point variants convert only when they
    /// hold an integral value inside the `i64` range.
    pub fn to_int(&self) -> Result<i64> {
        let wide = self.to_i128_exact("int")?;
        i64::try_from(wide)
            .map_err(|_| JksnError::type_error(format!("{self} overflows a 64-bit signed integer")))
    }

    /// Like [`Value::to_int`] for an unsigned target; negative values fail.
    pub fn to_uint(&self) -> Result<u64> {
        let wide = self.to_i128_exact("unsigned int")?;
        u64::try_from(wide).map_err(|_| {
            JksnError::type_error(format!("{self} does not fit a 64-bit unsigned integer"))
        })
    }

    fn to_i128_exact(&self, wanted: &str) -> Result<i128> {
        let long = match self {
            Value::Int(i) => return Ok(*i as i128),
            Value::Float(f) => LongDouble::from(*f),
            Value::Double(d) => LongDouble::from_f64(*d),
            Value::LongDouble(l) => *l,
            _ => return Err(self.mismatch(wanted)),
        };
        long.to_i128_exact()
            .ok_or_else(|| JksnError::type_error(format!("{self} is not an integral {wanted}")))
    }

    /// Numeric value as `f32`. Narrowing a finite value that overflows fails.
    pub fn to_float(&self) -> Result<f32> {
        let out = match self {
            Value::Float(f) => return Ok(*f),
            Value::Int(i) => return Ok(*i as f32),
            Value::Double(d) => *d as f32,
            Value::LongDouble(l) => l.to_f64() as f32,
            _ => return Err(self.mismatch("float")),
        };
        self.check_narrowing(out.is_infinite(), "float")?;
        Ok(out)
    }

    /// Numeric value as `f64`. Narrowing a finite long double that overflows fails.
    pub fn to_double(&self) -> Result<f64> {
        match self {
            Value::Double(d) => Ok(*d),
            Value::Float(f) => Ok(*f as f64),
            Value::Int(i) => Ok(*i as f64),
            Value::LongDouble(l) => {
                let out = l.to_f64();
                self.check_narrowing(out.is_infinite(), "double")?;
                Ok(out)
            }
            _ => Err(self.mismatch("double")),
        }
    }

    /// Numeric value as [`LongDouble`]; always exact.
    pub fn to_long_double(&self) -> Result<LongDouble> {
        match self {
            Value::LongDouble(l) => Ok(*l),
            Value::Double(d) => Ok(LongDouble::from_f64(*d)),
            Value::Float(f) => Ok(LongDouble::from(*f)),
            Value::Int(i) => Ok(LongDouble::from_i64(*i)),
            _ => Err(self.mismatch("long double")),
        }
    }

    fn check_narrowing(&self, overflowed: bool, wanted: &str) -> Result<()> {
        let source_finite = match self {
            Value::Double(d) => d.is_finite(),
            Value::LongDouble(l) => l.is_finite(),
            _ => true,
        };
        if overflowed && source_finite {
            return Err(JksnError::type_error(format!("{self} overflows a {wanted}")));
        }
        Ok(())
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            Value::Blob(b) => Ok(b.as_slice()),
            _ => Err(self.mismatch("blob")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value]> {
        match self {
            Value::Array(a) => Ok(a.as_slice()),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn as_object(&self) -> Result<&Map> {
        match self {
            Value::Object(o) => Ok(o),
            _ => Err(self.mismatch("object")),
        }
    }

    /// Mutable access to the array payload, unsharing it first if needed.
    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Ok(Arc::make_mut(a)),
            _ => Err(self.mismatch("array")),
        }
    }

    /// Mutable access to the object payload, unsharing it first if needed.
    pub fn as_object_mut(&mut self) -> Result<&mut Map> {
        match self {
            Value::Object(o) => Ok(Arc::make_mut(o)),
            _ => Err(self.mismatch("object")),
        }
    }
}

// ============================================================================
// Indexing
// ============================================================================

impl Value {
    /// Element count for strings (UTF-8 bytes), blobs, arrays and objects.
    pub fn len(&self) -> Result<usize> {
        match self {
            Value::String(s) => Ok(s.len()),
            Value::Blob(b) => Ok(b.len()),
            Value::Array(a) => Ok(a.len()),
            Value::Object(o) => Ok(o.len()),
            _ => Err(JksnError::type_error(format!("{} has no length", self.kind()))),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Array element by `Int` index, or object value by key equality.
    pub fn at(&self, key: &Value) -> Result<&Value> {
        match self {
            Value::Array(items) => {
                let index = array_index(key, items.len())?;
                Ok(&items[index])
            }
            Value::Object(map) => map
                .get(key)
                .ok_or_else(|| JksnError::type_error(format!("object has no key {key}"))),
            _ => Err(JksnError::type_error(format!(
                "cannot index into {}",
                self.kind()
            ))),
        }
    }

    /// Mutable counterpart of [`Value::at`]. Indexing an object with a missing
    /// key inserts `Undefined` under it, like a map subscript.
    pub fn at_mut(&mut self, key: &Value) -> Result<&mut Value> {
        match self {
            Value::Array(items) => {
                let index = array_index(key, items.len())?;
                Ok(&mut Arc::make_mut(items)[index])
            }
            Value::Object(map) => Ok(Arc::make_mut(map).entry(key.clone()).or_default()),
            _ => Err(JksnError::type_error(format!(
                "cannot index into {}",
                self.kind()
            ))),
        }
    }

    /// Non-failing lookup: `None` for a missing key, an out-of-range index or
    /// a non-container.
    pub fn get(&self, key: impl Into<Value>) -> Option<&Value> {
        self.at(&key.into()).ok()
    }

    pub fn push(&mut self, item: impl Into<Value>) -> Result<()> {
        self.as_array_mut()?.push(item.into());
        Ok(())
    }

    /// Insert into an object, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        Ok(self.as_object_mut()?.insert(key.into(), value.into()))
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>> {
        match self {
            Value::Array(items) => {
                let index = array_index(key, items.len())?;
                Ok(Some(Arc::make_mut(items).remove(index)))
            }
            Value::Object(map) => Ok(Arc::make_mut(map).remove(key)),
            _ => Err(JksnError::type_error(format!(
                "cannot remove from {}",
                self.kind()
            ))),
        }
    }
}

fn array_index(key: &Value, len: usize) -> Result<usize> {
    let Value::Int(raw) = key else {
        return Err(JksnError::type_error(format!(
            "array index must be an int, got {}",
            key.kind()
        )));
    };
    usize::try_from(*raw)
        .ok()
        .filter(|index| *index < len)
        .ok_or_else(|| {
            JksnError::type_error(format!("array index {raw} out of range for length {len}"))
        })
}

// ============================================================================
// Ordering, equality, hashing
// ============================================================================

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = self.kind().cmp(&other.kind());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::LongDouble(a), Value::LongDouble(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                a.as_bytes().cmp(b.as_bytes())
            }
            (Value::Blob(a), Value::Blob(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                a.as_slice().cmp(b.as_slice())
            }
            (Value::Array(a), Value::Array(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                a.iter().cmp(b.iter())
            }
            (Value::Object(a), Value::Object(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                a.keys()
                    .cmp(b.keys())
                    .then_with(|| a.values().cmp(b.values()))
            }
            // Same rank, payload-free variants.
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Value {
    /// Structural 64-bit hash, stable across runs and platforms.
    ///
    /// Leaves hash their canonical bytes seeded by the variant rank; arrays
    /// and objects XOR-fold their elements, so equal values always hash alike
    /// while differently shaped containers may collide.
    pub fn hash_code(&self) -> u64 {
        let seed = self.kind().rank() as u64;
        match self {
            Value::Undefined | Value::Null | Value::Unspecified => xxh3_64_with_seed(&[], seed),
            Value::Bool(b) => xxh3_64_with_seed(&[*b as u8], seed),
            Value::Int(i) => xxh3_64_with_seed(&i.to_be_bytes(), seed),
            Value::Float(f) => xxh3_64_with_seed(&f.to_bits().to_be_bytes(), seed),
            Value::Double(d) => xxh3_64_with_seed(&d.to_bits().to_be_bytes(), seed),
            Value::LongDouble(l) => xxh3_64_with_seed(&l.to_be_bytes(), seed),
            Value::String(s) => xxh3_64_with_seed(s.as_bytes(), seed),
            Value::Blob(b) => xxh3_64_with_seed(b, seed),
            Value::Array(items) => items.iter().fold(
                xxh3_64_with_seed(&(items.len() as u64).to_be_bytes(), seed),
                |acc, item| acc ^ item.hash_code(),
            ),
            Value::Object(map) => map.iter().fold(
                xxh3_64_with_seed(&(map.len() as u64).to_be_bytes(), seed),
                |acc, (k, v)| acc ^ k.hash_code() ^ v.hash_code().rotate_left(29),
            ),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::LongDouble(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{:?}", s.as_str()),
            Value::Blob(b) => {
                f.write_str("<")?;
                for byte in b.iter() {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str(">")
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Unspecified => f.write_str("unspecified"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::Double(x) => write!(f, "Double({x:?})"),
            Value::LongDouble(x) => write!(f, "{x:?}"),
            Value::Int(i) => write!(f, "Int({i})"),
            _ => fmt::Display::fmt(self, f),
        }
    }
}
