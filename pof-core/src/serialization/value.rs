//! The dynamic value model decoded from and encoded to the wire.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::constants::*;
use super::temporal::{DayTimeInterval, PofDateTime, PofTime, TimeInterval, YearMonthInterval};
use crate::error::{PofError, Result};

/// Shared, mutable handle to a user type instance.
///
/// Instances are shared so an object graph can point at the same instance
/// from several places, including from inside the instance itself.
pub type Shared<T> = Arc<RwLock<T>>;

/// A type-erased user type instance.
///
/// Equality is identity: two `PofObject`s are equal when they point at the
/// same allocation.
#[derive(Clone)]
pub struct PofObject(Arc<dyn Any + Send + Sync>);

impl PofObject {
    /// Wraps a value in a new [`Shared`] handle.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_shared(Arc::new(RwLock::new(value)))
    }

    /// Wraps an existing shared handle without copying the instance.
    pub fn from_shared<T: Any + Send + Sync>(handle: Shared<T>) -> Self {
        Self(handle)
    }

    /// Wraps an arbitrary reference-counted value.
    ///
    /// Custom serializers that do not use [`Shared`] handles register the
    /// native type of the value passed here.
    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(value)
    }

    /// Returns the shared handle if the instance is a `Shared<T>`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Shared<T>> {
        Arc::clone(&self.0).downcast::<RwLock<T>>().ok()
    }

    /// Returns the instance if it was wrapped with [`from_arc`](Self::from_arc).
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// Native type descriptor used for registry lookups.
    pub fn native_type(&self) -> TypeId {
        Any::type_id(&*self.0)
    }

    /// Returns true if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the instance, stable for the lifetime of the handle.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T: Any + Send + Sync> From<Shared<T>> for PofObject {
    fn from(handle: Shared<T>) -> Self {
        Self::from_shared(handle)
    }
}

impl PartialEq for PofObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for PofObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PofObject({:#x})", self.addr())
    }
}

/// An array in which only some positions hold values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseArray {
    /// Logical length of the array.
    pub len: usize,
    /// Populated positions, all below `len`.
    pub entries: BTreeMap<usize, PofValue>,
}

impl SparseArray {
    /// Creates an empty sparse array of the given length.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            entries: BTreeMap::new(),
        }
    }

    /// Sets a position, growing the logical length if needed.
    pub fn insert(&mut self, index: usize, value: PofValue) {
        self.len = self.len.max(index + 1);
        self.entries.insert(index, value);
    }
}

/// A decoded POF value.
#[derive(Debug, Clone, Default)]
pub enum PofValue {
    /// The single null value.
    #[default]
    Null,
    /// Boolean.
    Boolean(bool),
    /// Single byte.
    Octet(u8),
    /// Character.
    Char(char),
    /// 16-bit integer.
    Int16(i16),
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
    /// 128-bit integer.
    Int128(i128),
    /// 32-bit float. Compared by bit pattern.
    Float32(f32),
    /// 64-bit float. Compared by bit pattern.
    Float64(f64),
    /// Decimal.
    Decimal(Decimal),
    /// Character string.
    String(String),
    /// Byte string.
    Binary(Bytes),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(PofTime),
    /// Date and time.
    DateTime(PofDateTime),
    /// Year/month interval.
    YearMonthInterval(YearMonthInterval),
    /// Time interval.
    TimeInterval(TimeInterval),
    /// Day/time interval.
    DayTimeInterval(DayTimeInterval),
    /// Array, order preserved.
    Array(Vec<PofValue>),
    /// Collection, order preserved.
    Collection(Vec<PofValue>),
    /// Sparse array.
    SparseArray(SparseArray),
    /// Map as ordered key/value pairs.
    Map(Vec<(PofValue, PofValue)>),
    /// User type instance.
    Object(PofObject),
}

impl PartialEq for PofValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Octet(a), Self::Octet(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Int128(a), Self::Int128(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::Decimal(a), Self::Decimal(b)) => a == b && a.scale() == b.scale(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Binary(a), Self::Binary(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::YearMonthInterval(a), Self::YearMonthInterval(b)) => a == b,
            (Self::TimeInterval(a), Self::TimeInterval(b)) => a == b,
            (Self::DayTimeInterval(a), Self::DayTimeInterval(b)) => a == b,
            (Self::Array(a), Self::Array(b)) | (Self::Collection(a), Self::Collection(b)) => a == b,
            (Self::SparseArray(a), Self::SparseArray(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// Element type shared by all members of a uniform container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// 16-bit integers.
    Int16,
    /// 32-bit integers.
    Int32,
    /// 64-bit integers.
    Int64,
    /// 128-bit integers.
    Int128,
    /// 32-bit floats.
    Float32,
    /// 64-bit floats.
    Float64,
    /// Decimals, written in their widest form.
    Decimal,
    /// Booleans.
    Boolean,
    /// Single bytes.
    Octet,
    /// Byte strings.
    OctetString,
    /// Characters.
    Char,
    /// Character strings.
    CharString,
    /// Dates.
    Date,
    /// Year/month intervals.
    YearMonthInterval,
    /// Times.
    Time,
    /// Time intervals.
    TimeInterval,
    /// Date-times.
    DateTime,
    /// Day/time intervals.
    DayTimeInterval,
    /// Non-uniform collections.
    Collection,
    /// Non-uniform arrays.
    Array,
    /// Non-uniform sparse arrays.
    SparseArray,
    /// Non-uniform maps.
    Map,
    /// Instances of one user type.
    User(i32),
}

impl TypeCode {
    /// Wire code written in a uniform header.
    pub fn wire_code(self) -> i32 {
        match self {
            Self::Int16 => T_INT16,
            Self::Int32 => T_INT32,
            Self::Int64 => T_INT64,
            Self::Int128 => T_INT128,
            Self::Float32 => T_FLOAT32,
            Self::Float64 => T_FLOAT64,
            Self::Decimal => T_DECIMAL128,
            Self::Boolean => T_BOOLEAN,
            Self::Octet => T_OCTET,
            Self::OctetString => T_OCTET_STRING,
            Self::Char => T_CHAR,
            Self::CharString => T_CHAR_STRING,
            Self::Date => T_DATE,
            Self::YearMonthInterval => T_YEAR_MONTH_INTERVAL,
            Self::Time => T_TIME,
            Self::TimeInterval => T_TIME_INTERVAL,
            Self::DateTime => T_DATETIME,
            Self::DayTimeInterval => T_DAY_TIME_INTERVAL,
            Self::Collection => T_COLLECTION,
            Self::Array => T_ARRAY,
            Self::SparseArray => T_SPARSE_ARRAY,
            Self::Map => T_MAP,
            Self::User(type_id) => type_id,
        }
    }

    /// Returns true if `value` can be written as an element of this type.
    pub fn accepts(self, value: &PofValue) -> bool {
        matches!(
            (self, value),
            (Self::Int16, PofValue::Int16(_))
                | (Self::Int32, PofValue::Int32(_))
                | (Self::Int64, PofValue::Int64(_))
                | (Self::Int128, PofValue::Int128(_))
                | (Self::Float32, PofValue::Float32(_))
                | (Self::Float64, PofValue::Float64(_))
                | (Self::Decimal, PofValue::Decimal(_))
                | (Self::Boolean, PofValue::Boolean(_))
                | (Self::Octet, PofValue::Octet(_))
                | (Self::OctetString, PofValue::Binary(_))
                | (Self::Char, PofValue::Char(_))
                | (Self::CharString, PofValue::String(_))
                | (Self::Date, PofValue::Date(_))
                | (Self::YearMonthInterval, PofValue::YearMonthInterval(_))
                | (Self::Time, PofValue::Time(_))
                | (Self::TimeInterval, PofValue::TimeInterval(_))
                | (Self::DateTime, PofValue::DateTime(_))
                | (Self::DayTimeInterval, PofValue::DayTimeInterval(_))
                | (Self::Collection, PofValue::Collection(_))
                | (Self::Array, PofValue::Array(_))
                | (Self::SparseArray, PofValue::SparseArray(_))
                | (Self::Map, PofValue::Map(_))
                | (Self::User(_), PofValue::Object(_))
        )
    }
}

/// Requests the uniform wire form for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformHint {
    /// Elements of an array, collection or sparse array share one type.
    Elements(TypeCode),
    /// Keys of a map share one type.
    Keys(TypeCode),
    /// Keys and values of a map each share one type.
    Entries(TypeCode, TypeCode),
}

impl PofValue {
    /// Short name of the value's shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Octet(_) => "octet",
            Self::Char(_) => "char",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Int128(_) => "int128",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "char string",
            Self::Binary(_) => "octet string",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::YearMonthInterval(_) => "year-month interval",
            Self::TimeInterval(_) => "time interval",
            Self::DayTimeInterval(_) => "day-time interval",
            Self::Array(_) => "array",
            Self::Collection(_) => "collection",
            Self::SparseArray(_) => "sparse array",
            Self::Map(_) => "map",
            Self::Object(_) => "user type",
        }
    }

    /// Returns true for [`PofValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn mismatch(&self, expected: &'static str) -> PofError {
        PofError::Conversion {
            expected,
            found: self.kind(),
        }
    }

    /// Converts to a boolean. Null reads as `false`.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Null => Ok(false),
            Self::Boolean(b) => Ok(*b),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Converts any integer to `i128`. Null reads as 0.
    pub fn as_i128(&self) -> Result<i128> {
        match self {
            Self::Null => Ok(0),
            Self::Octet(v) => Ok(i128::from(*v)),
            Self::Int16(v) => Ok(i128::from(*v)),
            Self::Int32(v) => Ok(i128::from(*v)),
            Self::Int64(v) => Ok(i128::from(*v)),
            Self::Int128(v) => Ok(*v),
            other => Err(other.mismatch("integer")),
        }
    }

    /// Converts to `i16` when the integer fits.
    pub fn as_i16(&self) -> Result<i16> {
        i16::try_from(self.as_i128()?).map_err(|_| self.mismatch("int16"))
    }

    /// Converts to `i32` when the integer fits.
    pub fn as_i32(&self) -> Result<i32> {
        i32::try_from(self.as_i128()?).map_err(|_| self.mismatch("int32"))
    }

    /// Converts to `i64` when the integer fits.
    pub fn as_i64(&self) -> Result<i64> {
        i64::try_from(self.as_i128()?).map_err(|_| self.mismatch("int64"))
    }

    /// Converts to a byte. Null reads as 0.
    pub fn as_octet(&self) -> Result<u8> {
        u8::try_from(self.as_i128()?).map_err(|_| self.mismatch("octet"))
    }

    /// Converts to `f32`. Null reads as 0.
    pub fn as_f32(&self) -> Result<f32> {
        match self {
            Self::Null => Ok(0.0),
            Self::Float32(v) => Ok(*v),
            Self::Float64(v) => Ok(*v as f32),
            other => Err(other.mismatch("float32")),
        }
    }

    /// Converts to `f64`. Null reads as 0.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::Null => Ok(0.0),
            Self::Float32(v) => Ok(f64::from(*v)),
            Self::Float64(v) => Ok(*v),
            other => Err(other.mismatch("float64")),
        }
    }

    /// Converts to a decimal. Integers convert exactly; null reads as zero.
    pub fn as_decimal(&self) -> Result<Decimal> {
        match self {
            Self::Decimal(d) => Ok(*d),
            Self::Float32(_) | Self::Float64(_) => Err(self.mismatch("decimal")),
            other => {
                let v = other.as_i128().map_err(|_| other.mismatch("decimal"))?;
                Decimal::try_from_i128_with_scale(v, 0)
                    .map_err(|e| PofError::DecimalOverflow(e.to_string()))
            }
        }
    }

    /// Converts to a character. Null reads as `'\0'`.
    pub fn as_char(&self) -> Result<char> {
        match self {
            Self::Null => Ok('\0'),
            Self::Char(c) => Ok(*c),
            other => Err(other.mismatch("char")),
        }
    }

    /// Borrows a character string. `None` for null.
    pub fn as_str(&self) -> Result<Option<&str>> {
        match self {
            Self::Null => Ok(None),
            Self::String(s) => Ok(Some(s)),
            other => Err(other.mismatch("char string")),
        }
    }

    /// Returns a byte string. `None` for null.
    pub fn as_binary(&self) -> Result<Option<Bytes>> {
        match self {
            Self::Null => Ok(None),
            Self::Binary(b) => Ok(Some(b.clone())),
            other => Err(other.mismatch("octet string")),
        }
    }

    /// Returns the user type instance. `None` for null.
    pub fn as_object(&self) -> Result<Option<PofObject>> {
        match self {
            Self::Null => Ok(None),
            Self::Object(o) => Ok(Some(o.clone())),
            other => Err(other.mismatch("user type")),
        }
    }

    /// Consumes the value into its elements if it is an array or collection.
    ///
    /// A sparse array is expanded with nulls in its empty positions, and
    /// refused with [`PofError::UnsupportedShape`] when its length exceeds
    /// [`MAX_DENSE_SPARSE_LEN`].
    pub fn into_elements(self) -> Result<Vec<PofValue>> {
        match self {
            Self::Null => Ok(Vec::new()),
            Self::Array(v) | Self::Collection(v) => Ok(v),
            Self::SparseArray(sparse) => {
                if sparse.len > MAX_DENSE_SPARSE_LEN {
                    return Err(PofError::UnsupportedShape(format!(
                        "sparse array of length {} is too long to expand",
                        sparse.len
                    )));
                }
                let mut out = vec![PofValue::Null; sparse.len];
                for (index, value) in sparse.entries {
                    if let Some(slot) = out.get_mut(index) {
                        *slot = value;
                    }
                }
                Ok(out)
            }
            other => Err(other.mismatch("array")),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PofValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar!(
    bool => Boolean,
    u8 => Octet,
    char => Char,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    Bytes => Binary,
    NaiveDate => Date,
    PofTime => Time,
    PofDateTime => DateTime,
    YearMonthInterval => YearMonthInterval,
    TimeInterval => TimeInterval,
    DayTimeInterval => DayTimeInterval,
    PofObject => Object,
);

impl From<&str> for PofValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Any + Send + Sync> From<Shared<T>> for PofValue {
    fn from(handle: Shared<T>) -> Self {
        Self::Object(PofObject::from_shared(handle))
    }
}
