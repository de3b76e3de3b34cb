//! Conversions between Rust field types and [`PofValue`].

use std::any::type_name;

use bytes::Bytes;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::temporal::{DayTimeInterval, PofDateTime, PofTime, TimeInterval, YearMonthInterval};
use super::value::{PofObject, PofValue, Shared, TypeCode, UniformHint};
use crate::error::{PofError, Result};

/// A type that can be stored in one property of a user type.
///
/// Used by [`PofReader::read`](super::PofReader::read) and
/// [`PofWriter::write`](super::PofWriter::write), and by the derive macro.
pub trait PofField: Sized {
    /// Converts the field into a value.
    fn to_pof(&self) -> PofValue;

    /// Converts a decoded value back into the field type. Null converts to
    /// the type's default.
    fn from_pof(value: PofValue) -> Result<Self>;

    /// Uniform wire form to use when writing this field, if any.
    fn uniform_hint() -> Option<UniformHint> {
        None
    }
}

/// A field type whose values all share one intrinsic type code, allowing
/// `Vec<Self>` to be written as a uniform array.
pub trait UniformElement: PofField {
    /// Code written once in the uniform array header.
    const TYPE_CODE: TypeCode;
}

macro_rules! impl_pof_field {
    ($($ty:ty => $variant:ident, $accessor:ident, $code:ident;)*) => {
        $(
            impl PofField for $ty {
                fn to_pof(&self) -> PofValue {
                    PofValue::$variant(*self)
                }

                fn from_pof(value: PofValue) -> Result<Self> {
                    value.$accessor()
                }
            }

            impl UniformElement for $ty {
                const TYPE_CODE: TypeCode = TypeCode::$code;
            }
        )*
    };
}

impl_pof_field! {
    bool => Boolean, as_bool, Boolean;
    u8 => Octet, as_octet, Octet;
    char => Char, as_char, Char;
    i16 => Int16, as_i16, Int16;
    i32 => Int32, as_i32, Int32;
    i64 => Int64, as_i64, Int64;
    i128 => Int128, as_i128, Int128;
    f32 => Float32, as_f32, Float32;
    f64 => Float64, as_f64, Float64;
    Decimal => Decimal, as_decimal, Decimal;
}

impl PofField for String {
    fn to_pof(&self) -> PofValue {
        PofValue::String(self.clone())
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        match value {
            PofValue::String(s) => Ok(s),
            PofValue::Null => Ok(String::new()),
            other => Err(conversion::<Self>(&other)),
        }
    }
}

impl UniformElement for String {
    const TYPE_CODE: TypeCode = TypeCode::CharString;
}

impl PofField for Option<String> {
    fn to_pof(&self) -> PofValue {
        self.as_ref()
            .map_or(PofValue::Null, |s| PofValue::String(s.clone()))
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        match value {
            PofValue::Null => Ok(None),
            other => String::from_pof(other).map(Some),
        }
    }
}

impl PofField for Bytes {
    fn to_pof(&self) -> PofValue {
        PofValue::Binary(self.clone())
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        Ok(value.as_binary()?.unwrap_or_default())
    }
}

impl PofField for Option<Bytes> {
    fn to_pof(&self) -> PofValue {
        self.as_ref()
            .map_or(PofValue::Null, |b| PofValue::Binary(b.clone()))
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        value.as_binary()
    }
}

macro_rules! impl_optional_temporal {
    ($($ty:ty => $variant:ident;)*) => {
        $(
            impl PofField for Option<$ty> {
                fn to_pof(&self) -> PofValue {
                    self.map_or(PofValue::Null, PofValue::$variant)
                }

                fn from_pof(value: PofValue) -> Result<Self> {
                    match value {
                        PofValue::Null => Ok(None),
                        PofValue::$variant(v) => Ok(Some(v)),
                        other => Err(conversion::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

impl_optional_temporal! {
    NaiveDate => Date;
    PofTime => Time;
    PofDateTime => DateTime;
}

macro_rules! impl_interval {
    ($($ty:ty => $variant:ident;)*) => {
        $(
            impl PofField for $ty {
                fn to_pof(&self) -> PofValue {
                    PofValue::$variant(*self)
                }

                fn from_pof(value: PofValue) -> Result<Self> {
                    match value {
                        PofValue::Null => Ok(Self::default()),
                        PofValue::$variant(v) => Ok(v),
                        other => Err(conversion::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

impl_interval! {
    YearMonthInterval => YearMonthInterval;
    TimeInterval => TimeInterval;
    DayTimeInterval => DayTimeInterval;
}

impl PofField for PofValue {
    fn to_pof(&self) -> PofValue {
        self.clone()
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        Ok(value)
    }
}

impl PofField for Option<PofObject> {
    fn to_pof(&self) -> PofValue {
        self.clone().map_or(PofValue::Null, PofValue::Object)
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        value.as_object()
    }
}

impl<T: Send + Sync + 'static> PofField for Option<Shared<T>> {
    fn to_pof(&self) -> PofValue {
        self.as_ref().map_or(PofValue::Null, |handle| {
            PofValue::Object(PofObject::from_shared(handle.clone()))
        })
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        match value.as_object()? {
            None => Ok(None),
            Some(object) => object
                .downcast::<T>()
                .map(Some)
                .ok_or_else(|| PofError::Conversion {
                    expected: type_name::<T>(),
                    found: "object",
                }),
        }
    }
}

impl<T: UniformElement> PofField for Vec<T> {
    fn to_pof(&self) -> PofValue {
        PofValue::Array(self.iter().map(PofField::to_pof).collect())
    }

    fn from_pof(value: PofValue) -> Result<Self> {
        value.into_elements()?.into_iter().map(T::from_pof).collect()
    }

    fn uniform_hint() -> Option<UniformHint> {
        Some(UniformHint::Elements(T::TYPE_CODE))
    }
}

fn conversion<T>(found: &PofValue) -> PofError {
    PofError::Conversion {
        expected: type_name::<T>(),
        found: found.kind(),
    }
}
