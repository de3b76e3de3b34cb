use tracing::trace;

use super::references::Assignment;
use super::{lookup_failed, WriteState};
use crate::error::{PofError, Result};
use crate::serialization::constants::*;
use crate::serialization::data_output::{decimal_width, DataOutput};
use crate::serialization::pof::PofWriter;
use crate::serialization::value::{PofObject, PofValue, SparseArray, TypeCode, UniformHint};

/// Writes a type code followed by the payload of `value`.
///
/// With a hint, containers take their uniform wire form and the element
/// codes are written once in the header.
pub(crate) fn encode_value(
    state: &mut WriteState,
    value: &PofValue,
    hint: Option<UniformHint>,
) -> Result<()> {
    match hint {
        Some(hint) if !value.is_null() => {
            if state.tracking() && names_user_type(hint) {
                trace!(?hint, "user type hint ignored while tracking references");
                encode_plain(state, value)
            } else {
                encode_uniform(state, value, hint)
            }
        }
        _ => encode_plain(state, value),
    }
}

fn names_user_type(hint: UniformHint) -> bool {
    match hint {
        UniformHint::Elements(code) | UniformHint::Keys(code) => matches!(code, TypeCode::User(_)),
        UniformHint::Entries(key, value) => {
            matches!(key, TypeCode::User(_)) || matches!(value, TypeCode::User(_))
        }
    }
}

fn encode_plain(state: &mut WriteState, value: &PofValue) -> Result<()> {
    if state.compact {
        if let Some(code) = compact_code(value) {
            return state.out.write_packed_i32(code);
        }
    }
    match value {
        PofValue::Null => state.out.write_packed_i32(V_REFERENCE_NULL),
        PofValue::Object(object) => encode_object(state, object),
        _ => {
            state.out.write_packed_i32(intrinsic_code(value))?;
            encode_payload(state, value)
        }
    }
}

/// Single-code encoding of `value`, if it has one.
fn compact_code(value: &PofValue) -> Option<i32> {
    match value {
        PofValue::Boolean(false) => Some(V_BOOLEAN_FALSE),
        PofValue::Boolean(true) => Some(V_BOOLEAN_TRUE),
        PofValue::Int32(n) => small_int_code(*n),
        PofValue::String(s) if s.is_empty() => Some(V_STRING_ZERO_LENGTH),
        PofValue::Collection(items) if items.is_empty() => Some(V_COLLECTION_EMPTY),
        _ => None,
    }
}

fn intrinsic_code(value: &PofValue) -> i32 {
    match value {
        PofValue::Null | PofValue::Object(_) => V_REFERENCE_NULL,
        PofValue::Boolean(_) => T_BOOLEAN,
        PofValue::Octet(_) => T_OCTET,
        PofValue::Char(_) => T_CHAR,
        PofValue::Int16(_) => T_INT16,
        PofValue::Int32(_) => T_INT32,
        PofValue::Int64(_) => T_INT64,
        PofValue::Int128(_) => T_INT128,
        PofValue::Float32(_) => T_FLOAT32,
        PofValue::Float64(_) => T_FLOAT64,
        PofValue::Decimal(d) => match decimal_width(d) {
            32 => T_DECIMAL32,
            64 => T_DECIMAL64,
            _ => T_DECIMAL128,
        },
        PofValue::String(_) => T_CHAR_STRING,
        PofValue::Binary(_) => T_OCTET_STRING,
        PofValue::Date(_) => T_DATE,
        PofValue::Time(_) => T_TIME,
        PofValue::DateTime(_) => T_DATETIME,
        PofValue::YearMonthInterval(_) => T_YEAR_MONTH_INTERVAL,
        PofValue::TimeInterval(_) => T_TIME_INTERVAL,
        PofValue::DayTimeInterval(_) => T_DAY_TIME_INTERVAL,
        PofValue::Array(_) => T_ARRAY,
        PofValue::Collection(_) => T_COLLECTION,
        PofValue::SparseArray(_) => T_SPARSE_ARRAY,
        PofValue::Map(_) => T_MAP,
    }
}

/// Writes the payload of a non-null value whose code is already known to
/// the reader.
fn encode_payload(state: &mut WriteState, value: &PofValue) -> Result<()> {
    match value {
        PofValue::Null => Err(PofError::UnsupportedShape(
            "null has no payload".to_string(),
        )),
        PofValue::Boolean(b) => state.out.write_packed_i32(i32::from(*b)),
        PofValue::Octet(b) => state.out.write_u8(*b),
        PofValue::Char(c) => state.out.write_char(*c),
        PofValue::Int16(n) => state.out.write_packed_i32(i32::from(*n)),
        PofValue::Int32(n) => state.out.write_packed_i32(*n),
        PofValue::Int64(n) => state.out.write_packed_i64(*n),
        PofValue::Int128(n) => state.out.write_packed_i128(*n),
        PofValue::Float32(f) => state.out.write_f32(*f),
        PofValue::Float64(f) => state.out.write_f64(*f),
        PofValue::Decimal(d) => state.out.write_decimal(d),
        PofValue::String(s) => state.out.write_utf(s),
        PofValue::Binary(b) => state.out.write_octet_string(b),
        PofValue::Date(d) => state.out.write_date(*d),
        PofValue::Time(t) => state.out.write_time(t),
        PofValue::DateTime(dt) => state.out.write_datetime(dt),
        PofValue::YearMonthInterval(v) => state.out.write_year_month_interval(v),
        PofValue::TimeInterval(v) => state.out.write_time_interval(v),
        PofValue::DayTimeInterval(v) => state.out.write_day_time_interval(v),
        PofValue::Array(items) | PofValue::Collection(items) => {
            state.enter()?;
            state.out.write_size(items.len())?;
            for item in items {
                encode_plain(state, item)?;
            }
            state.leave();
            Ok(())
        }
        PofValue::SparseArray(sparse) => {
            state.enter()?;
            state.out.write_size(sparse.len)?;
            for (index, item) in sparse_entries(sparse)? {
                state.out.write_packed_i32(index)?;
                encode_plain(state, item)?;
            }
            state.out.write_packed_i32(END_OF_PROPERTIES)?;
            state.leave();
            Ok(())
        }
        PofValue::Map(entries) => {
            state.enter()?;
            state.out.write_size(entries.len())?;
            for (key, item) in entries {
                encode_plain(state, key)?;
                encode_plain(state, item)?;
            }
            state.leave();
            Ok(())
        }
        PofValue::Object(object) => {
            let type_id = resolve_type_id(state, object)?;
            encode_object_body(state, type_id, object)
        }
    }
}

fn encode_uniform(state: &mut WriteState, value: &PofValue, hint: UniformHint) -> Result<()> {
    match (value, hint) {
        (PofValue::Array(items), UniformHint::Elements(code)) => {
            encode_uniform_sequence(state, T_UNIFORM_ARRAY, items, code)
        }
        (PofValue::Collection(items), UniformHint::Elements(code)) => {
            encode_uniform_sequence(state, T_UNIFORM_COLLECTION, items, code)
        }
        (PofValue::SparseArray(sparse), UniformHint::Elements(code)) => {
            let entries = sparse_entries(sparse)?;
            state.enter()?;
            state.out.write_packed_i32(T_UNIFORM_SPARSE_ARRAY)?;
            state.out.write_packed_i32(code.wire_code())?;
            state.out.write_size(sparse.len)?;
            for (index, item) in entries {
                state.out.write_packed_i32(index)?;
                encode_element(state, code, item)?;
            }
            state.out.write_packed_i32(END_OF_PROPERTIES)?;
            state.leave();
            Ok(())
        }
        (PofValue::Map(entries), UniformHint::Keys(key_code)) => {
            state.enter()?;
            state.out.write_packed_i32(T_UNIFORM_KEYS_MAP)?;
            state.out.write_packed_i32(key_code.wire_code())?;
            state.out.write_size(entries.len())?;
            for (key, item) in entries {
                encode_element(state, key_code, key)?;
                encode_plain(state, item)?;
            }
            state.leave();
            Ok(())
        }
        (PofValue::Map(entries), UniformHint::Entries(key_code, value_code)) => {
            state.enter()?;
            state.out.write_packed_i32(T_UNIFORM_MAP)?;
            state.out.write_packed_i32(key_code.wire_code())?;
            state.out.write_packed_i32(value_code.wire_code())?;
            state.out.write_size(entries.len())?;
            for (key, item) in entries {
                encode_element(state, key_code, key)?;
                encode_element(state, value_code, item)?;
            }
            state.leave();
            Ok(())
        }
        (value, hint) => Err(PofError::UnsupportedShape(format!(
            "{hint:?} does not apply to {}",
            value.kind()
        ))),
    }
}

fn encode_uniform_sequence(
    state: &mut WriteState,
    container: i32,
    items: &[PofValue],
    code: TypeCode,
) -> Result<()> {
    state.enter()?;
    state.out.write_packed_i32(container)?;
    state.out.write_packed_i32(code.wire_code())?;
    state.out.write_size(items.len())?;
    for item in items {
        encode_element(state, code, item)?;
    }
    state.leave();
    Ok(())
}

/// Writes one element of a uniform container: payload only, no code.
fn encode_element(state: &mut WriteState, code: TypeCode, value: &PofValue) -> Result<()> {
    if !code.accepts(value) {
        return Err(PofError::UnsupportedShape(format!(
            "{} element in a uniform {code:?} container",
            value.kind()
        )));
    }
    if let (TypeCode::User(expected), PofValue::Object(object)) = (code, value) {
        let type_id = resolve_type_id(state, object)?;
        if type_id != expected {
            return Err(PofError::UnsupportedShape(format!(
                "user type {type_id} element in a uniform container of type {expected}"
            )));
        }
        return encode_object_body(state, type_id, object);
    }
    encode_payload(state, value)
}

fn sparse_entries(sparse: &SparseArray) -> Result<Vec<(i32, &PofValue)>> {
    sparse
        .entries
        .iter()
        .map(|(&index, item)| {
            if index >= sparse.len {
                return Err(PofError::UnsupportedShape(format!(
                    "sparse index {index} is outside length {}",
                    sparse.len
                )));
            }
            let index = i32::try_from(index).map_err(|_| {
                PofError::UnsupportedShape(format!("sparse index {index} exceeds i32"))
            })?;
            Ok((index, item))
        })
        .collect()
}

fn resolve_type_id(state: &WriteState, object: &PofObject) -> Result<i32> {
    state
        .context
        .user_type_id(object.native_type())
        .map_err(lookup_failed)
}

/// Writes a user type instance with its identity marker when tracking.
fn encode_object(state: &mut WriteState, object: &PofObject) -> Result<()> {
    let type_id = resolve_type_id(state, object)?;
    if let Some(references) = state.references.as_mut() {
        match references.assign(object)? {
            Assignment::Existing(id) => {
                state.out.write_packed_i32(T_REFERENCE)?;
                return state.out.write_packed_i32(id);
            }
            Assignment::New(id) => {
                state.out.write_packed_i32(T_IDENTITY)?;
                state.out.write_packed_i32(id)?;
            }
        }
    }
    state.out.write_packed_i32(type_id)?;
    encode_object_body(state, type_id, object)
}

/// Writes the version and properties of a user type instance.
fn encode_object_body(
    state: &mut WriteState,
    type_id: i32,
    object: &PofObject,
) -> Result<()> {
    let serializer = state.context.serializer(type_id).map_err(lookup_failed)?;
    state.enter()?;
    let mut writer = PofWriter::new(state, type_id, false);
    serializer.serialize(&mut writer, object)?;
    writer.finish()?;
    state.leave();
    Ok(())
}
