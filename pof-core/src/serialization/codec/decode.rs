use tracing::trace;

use super::references::{Definition, Target};
use super::{lookup_failed, ReadState};
use crate::error::{PofError, Result};
use crate::serialization::constants::*;
use crate::serialization::data_input::DataInput;
use crate::serialization::pof::PofReader;
use crate::serialization::value::{PofValue, SparseArray};

/// Reads one complete value: type code, then payload.
pub(crate) fn decode_value(state: &mut ReadState) -> Result<PofValue> {
    state.input.ensure_open()?;
    let code = state.input.read_packed_i32()?;
    decode_with_code(state, code, None)
}

/// Decodes a value whose type code was already read.
///
/// `identity` is the reference id reserved for this value, if a definition
/// marker preceded it.
pub(crate) fn decode_with_code(
    state: &mut ReadState,
    code: i32,
    identity: Option<i32>,
) -> Result<PofValue> {
    match code {
        T_IDENTITY => {
            let id = state.input.read_packed_i32()?;
            match state.references.begin(id)? {
                Definition::Existing(value) => {
                    skip_value(state)?;
                    Ok(value)
                }
                Definition::Decode => {
                    let inner = state.input.read_packed_i32()?;
                    if inner == T_IDENTITY || inner == T_REFERENCE {
                        return Err(PofError::Malformed(format!(
                            "identity {id} wraps another reference marker"
                        )));
                    }
                    let value = decode_with_code(state, inner, Some(id))?;
                    state.references.complete(id, &value)?;
                    Ok(value)
                }
            }
        }
        T_REFERENCE => {
            let id = state.input.read_packed_i32()?;
            match state.references.resolve(id)? {
                Target::Value(value) => Ok(value),
                Target::Skipped(offset) => materialize(state, id, offset),
            }
        }
        V_BOOLEAN_FALSE => Ok(PofValue::Boolean(false)),
        V_BOOLEAN_TRUE => Ok(PofValue::Boolean(true)),
        V_STRING_ZERO_LENGTH => Ok(PofValue::String(String::new())),
        V_COLLECTION_EMPTY => Ok(PofValue::Collection(Vec::new())),
        V_REFERENCE_NULL => Ok(PofValue::Null),
        V_FP_POS_INFINITY => Ok(PofValue::Float64(f64::INFINITY)),
        V_FP_NEG_INFINITY => Ok(PofValue::Float64(f64::NEG_INFINITY)),
        V_FP_NAN => Ok(PofValue::Float64(f64::NAN)),
        _ => match small_int_value(code) {
            Some(n) => Ok(PofValue::Int32(n)),
            None => decode_payload(state, code, identity),
        },
    }
}

/// Decodes a definition that was skipped earlier, then returns to the
/// current position.
fn materialize(state: &mut ReadState, id: i32, offset: usize) -> Result<PofValue> {
    trace!(id, offset, "materializing skipped reference");
    let resume = state.input.position();
    state.input.seek(offset)?;
    let definition = state.references.begin(id)?;
    let value = match definition {
        Definition::Existing(value) => value,
        Definition::Decode => {
            let code = state.input.read_packed_i32()?;
            let value = decode_with_code(state, code, Some(id))?;
            state.references.complete(id, &value)?;
            value
        }
    };
    state.input.seek(resume)?;
    Ok(value)
}

/// Decodes the payload that follows `code`.
///
/// Also used for the elements of uniform containers, where the code comes
/// from the container header.
fn decode_payload(state: &mut ReadState, code: i32, identity: Option<i32>) -> Result<PofValue> {
    let input = &mut state.input;
    let value = match code {
        type_id if type_id >= 0 => return decode_object(state, type_id, identity),
        T_INT16 => {
            let n = input.read_packed_i32()?;
            let n = i16::try_from(n)
                .map_err(|_| PofError::Malformed(format!("int16 value {n} out of range")))?;
            PofValue::Int16(n)
        }
        T_INT32 => PofValue::Int32(input.read_packed_i32()?),
        T_INT64 => PofValue::Int64(input.read_packed_i64()?),
        T_INT128 => PofValue::Int128(input.read_packed_i128()?),
        T_FLOAT32 => PofValue::Float32(input.read_f32()?),
        T_FLOAT64 => PofValue::Float64(input.read_f64()?),
        T_FLOAT128 => {
            return Err(PofError::UnsupportedShape(
                "float128 has no native representation".to_string(),
            ))
        }
        T_DECIMAL32 => PofValue::Decimal(input.read_decimal(32)?),
        T_DECIMAL64 => PofValue::Decimal(input.read_decimal(64)?),
        T_DECIMAL128 => PofValue::Decimal(input.read_decimal(128)?),
        T_BOOLEAN => PofValue::Boolean(input.read_packed_i32()? != 0),
        T_OCTET => PofValue::Octet(input.read_u8()?),
        T_OCTET_STRING => PofValue::Binary(input.read_octet_string()?),
        T_CHAR => PofValue::Char(input.read_char()?),
        T_CHAR_STRING => PofValue::String(input.read_utf()?),
        T_DATE => PofValue::Date(input.read_date()?),
        T_YEAR_MONTH_INTERVAL => PofValue::YearMonthInterval(input.read_year_month_interval()?),
        T_TIME => PofValue::Time(input.read_time()?),
        T_TIME_INTERVAL => PofValue::TimeInterval(input.read_time_interval()?),
        T_DATETIME => PofValue::DateTime(input.read_datetime()?),
        T_DAY_TIME_INTERVAL => PofValue::DayTimeInterval(input.read_day_time_interval()?),
        T_COLLECTION | T_ARRAY => {
            state.enter()?;
            let size = state.input.read_size()?;
            let mut items = Vec::with_capacity(size.min(state.input.remaining()));
            for _ in 0..size {
                items.push(decode_value(state)?);
            }
            state.leave();
            sequence(code == T_ARRAY, items)
        }
        T_UNIFORM_COLLECTION | T_UNIFORM_ARRAY => {
            state.enter()?;
            let element = read_element_code(state)?;
            let size = state.input.read_size()?;
            let mut items = Vec::with_capacity(size.min(state.input.remaining()));
            for _ in 0..size {
                items.push(decode_payload(state, element, None)?);
            }
            state.leave();
            sequence(code == T_UNIFORM_ARRAY, items)
        }
        T_SPARSE_ARRAY | T_UNIFORM_SPARSE_ARRAY => {
            state.enter()?;
            let element = if code == T_UNIFORM_SPARSE_ARRAY {
                Some(read_element_code(state)?)
            } else {
                None
            };
            let len = state.input.read_size()?;
            let mut sparse = SparseArray::new(len);
            let mut previous = -1;
            loop {
                let index = state.input.read_packed_i32()?;
                if index == END_OF_PROPERTIES {
                    break;
                }
                let position = usize::try_from(index)
                    .ok()
                    .filter(|&i| index > previous && i < len)
                    .ok_or_else(|| {
                        PofError::Malformed(format!(
                            "sparse index {index} after {previous} in array of length {len}"
                        ))
                    })?;
                previous = index;
                let item = match element {
                    Some(element) => decode_payload(state, element, None)?,
                    None => decode_value(state)?,
                };
                sparse.entries.insert(position, item);
            }
            state.leave();
            PofValue::SparseArray(sparse)
        }
        T_MAP | T_UNIFORM_KEYS_MAP | T_UNIFORM_MAP => {
            state.enter()?;
            let key_code = if code == T_MAP {
                None
            } else {
                Some(read_element_code(state)?)
            };
            let value_code = if code == T_UNIFORM_MAP {
                Some(read_element_code(state)?)
            } else {
                None
            };
            let size = state.input.read_size()?;
            let mut entries = Vec::with_capacity(size.min(state.input.remaining()));
            for _ in 0..size {
                let key = match key_code {
                    Some(key_code) => decode_payload(state, key_code, None)?,
                    None => decode_value(state)?,
                };
                let item = match value_code {
                    Some(value_code) => decode_payload(state, value_code, None)?,
                    None => decode_value(state)?,
                };
                entries.push((key, item));
            }
            state.leave();
            PofValue::Map(entries)
        }
        other => {
            return Err(PofError::Malformed(format!("unknown type code {other}")));
        }
    };
    Ok(value)
}

fn sequence(array: bool, items: Vec<PofValue>) -> PofValue {
    if array {
        PofValue::Array(items)
    } else {
        PofValue::Collection(items)
    }
}

/// Reads the element code of a uniform container header.
fn read_element_code(state: &mut ReadState) -> Result<i32> {
    let code = state.input.read_packed_i32()?;
    if code >= 0 || (T_UNIFORM_MAP..=T_INT16).contains(&code) {
        Ok(code)
    } else {
        Err(PofError::Malformed(format!(
            "{} is not a valid uniform element code",
            type_code_name(code)
        )))
    }
}

/// Decodes the version and properties of a user type through its serializer.
fn decode_object(state: &mut ReadState, type_id: i32, identity: Option<i32>) -> Result<PofValue> {
    let serializer = state.context.serializer(type_id).map_err(lookup_failed)?;
    let version = state.input.read_packed_i32()?;
    if version < 0 {
        return Err(PofError::Malformed(format!(
            "negative version {version} for type {type_id}"
        )));
    }
    state.enter()?;
    let mut reader = PofReader::new(state, type_id, version, identity);
    let object = serializer.deserialize(&mut reader)?;
    reader.finish()?;
    state.leave();
    Ok(PofValue::Object(object))
}

/// Skips one complete value without decoding it.
pub(crate) fn skip_value(state: &mut ReadState) -> Result<()> {
    state.input.ensure_open()?;
    let code = state.input.read_packed_i32()?;
    skip_with_code(state, code)
}

fn skip_with_code(state: &mut ReadState, code: i32) -> Result<()> {
    match code {
        T_IDENTITY => {
            let id = state.input.read_packed_i32()?;
            if let Some(tail) = state.tail_references.as_mut() {
                tail.record_identity(id);
            }
            state.references.record_skipped(id, state.input.position())?;
            skip_value(state)
        }
        T_REFERENCE => {
            let id = state.input.read_packed_i32()?;
            if let Some(tail) = state.tail_references.as_mut() {
                tail.record_reference(id);
            }
            Ok(())
        }
        V_INT_22..=V_BOOLEAN_FALSE => Ok(()),
        _ => skip_payload(state, code),
    }
}

fn skip_payload(state: &mut ReadState, code: i32) -> Result<()> {
    let input = &mut state.input;
    match code {
        type_id if type_id >= 0 => {
            let version = input.read_packed_i32()?;
            trace!(type_id, version, "skipping user type");
            state.enter()?;
            while state.input.read_packed_i32()? != END_OF_PROPERTIES {
                skip_value(state)?;
            }
            state.leave();
        }
        T_INT16 | T_INT32 | T_BOOLEAN => {
            input.read_packed_i32()?;
        }
        T_INT64 => {
            input.read_packed_i64()?;
        }
        T_INT128 => {
            input.read_packed_i128()?;
        }
        T_FLOAT32 => skip_fixed(input, 4)?,
        T_FLOAT64 => skip_fixed(input, 8)?,
        T_FLOAT128 => skip_fixed(input, 16)?,
        T_DECIMAL32 | T_DECIMAL64 | T_DECIMAL128 => {
            input.read_packed_i128()?;
            input.read_packed_i32()?;
        }
        T_OCTET => skip_fixed(input, 1)?,
        T_CHAR => {
            input.read_char()?;
        }
        T_OCTET_STRING | T_CHAR_STRING => {
            let len = input.read_size()?;
            skip_fixed(input, len)?;
        }
        T_DATE => skip_packed(input, 3)?,
        T_YEAR_MONTH_INTERVAL => skip_packed(input, 2)?,
        T_TIME => skip_time(input)?,
        T_TIME_INTERVAL => skip_packed(input, 4)?,
        T_DATETIME => {
            skip_packed(input, 3)?;
            skip_time(input)?;
        }
        T_DAY_TIME_INTERVAL => skip_packed(input, 5)?,
        T_COLLECTION | T_ARRAY => {
            state.enter()?;
            let size = state.input.read_size()?;
            for _ in 0..size {
                skip_value(state)?;
            }
            state.leave();
        }
        T_UNIFORM_COLLECTION | T_UNIFORM_ARRAY => {
            state.enter()?;
            let element = read_element_code(state)?;
            let size = state.input.read_size()?;
            for _ in 0..size {
                skip_payload(state, element)?;
            }
            state.leave();
        }
        T_SPARSE_ARRAY | T_UNIFORM_SPARSE_ARRAY => {
            state.enter()?;
            let element = if code == T_UNIFORM_SPARSE_ARRAY {
                Some(read_element_code(state)?)
            } else {
                None
            };
            state.input.read_size()?;
            while state.input.read_packed_i32()? != END_OF_PROPERTIES {
                match element {
                    Some(element) => skip_payload(state, element)?,
                    None => skip_value(state)?,
                }
            }
            state.leave();
        }
        T_MAP | T_UNIFORM_KEYS_MAP | T_UNIFORM_MAP => {
            state.enter()?;
            let key_code = if code == T_MAP {
                None
            } else {
                Some(read_element_code(state)?)
            };
            let value_code = if code == T_UNIFORM_MAP {
                Some(read_element_code(state)?)
            } else {
                None
            };
            let size = state.input.read_size()?;
            for _ in 0..size {
                match key_code {
                    Some(key_code) => skip_payload(state, key_code)?,
                    None => skip_value(state)?,
                }
                match value_code {
                    Some(value_code) => skip_payload(state, value_code)?,
                    None => skip_value(state)?,
                }
            }
            state.leave();
        }
        other => {
            return Err(PofError::Malformed(format!("unknown type code {other}")));
        }
    }
    Ok(())
}

fn skip_fixed<I: DataInput>(input: &mut I, len: usize) -> Result<()> {
    input.read_slice(len).map(drop)
}

fn skip_packed<I: DataInput>(input: &mut I, count: usize) -> Result<()> {
    for _ in 0..count {
        input.read_packed_i32()?;
    }
    Ok(())
}

fn skip_time<I: DataInput>(input: &mut I) -> Result<()> {
    skip_packed(input, 4)?;
    if input.read_packed_i32()? == 2 {
        skip_packed(input, 2)?;
    }
    Ok(())
}
