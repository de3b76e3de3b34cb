use bytes::Bytes;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{PofError, Result};
use crate::serialization::codec::{encode_value, WriteState};
use crate::serialization::constants::END_OF_PROPERTIES;
use crate::serialization::data_input::{BufferInput, DataInput};
use crate::serialization::data_output::DataOutput;
use crate::serialization::evolvable::FutureData;
use crate::serialization::temporal::{
    DayTimeInterval, PofDateTime, PofTime, TimeInterval, YearMonthInterval,
};
use crate::serialization::traits::PofField;
use crate::serialization::value::{PofObject, PofValue, UniformHint};

/// Writes the indexed properties of one user type instance.
///
/// Property indices must strictly increase, so writing the same index
/// twice fails with [`PofError::OutOfOrderIndex`]. The stream is finished by
/// [`write_remainder`](Self::write_remainder), after which every indexed
/// write fails. A nested writer borrows its parent, and the parent refuses
/// to continue until the nested writer has written its remainder.
pub struct PofWriter<'a> {
    state: &'a mut WriteState,
    type_id: i32,
    version_id: i32,
    nested: bool,
    header_written: bool,
    level: usize,
    last_index: i32,
    closed: bool,
}

impl<'a> PofWriter<'a> {
    pub(crate) fn new(state: &'a mut WriteState, type_id: i32, nested: bool) -> Self {
        state.open_level += 1;
        let level = state.open_level;
        Self {
            state,
            type_id,
            version_id: 0,
            nested,
            header_written: false,
            level,
            last_index: -1,
            closed: false,
        }
    }

    /// Returns the user type id of the instance being written.
    pub fn user_type_id(&self) -> i32 {
        self.type_id
    }

    /// Returns the version id that will be written for this instance.
    pub fn version_id(&self) -> i32 {
        self.version_id
    }

    /// Sets the version id of the instance.
    ///
    /// Allowed only on a top-level writer and only before the first property.
    pub fn set_version_id(&mut self, version_id: i32) -> Result<()> {
        self.ensure_open()?;
        if self.nested {
            return Err(PofError::InvalidState(
                "a nested writer has no version id".to_string(),
            ));
        }
        if version_id < 0 {
            return Err(PofError::InvalidState(format!(
                "negative version id {version_id}"
            )));
        }
        if self.header_written {
            return Err(PofError::InvalidState(
                "version id must be set before the first property".to_string(),
            ));
        }
        self.version_id = version_id;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.out.is_closed() {
            return Err(PofError::Closed);
        }
        if self.closed {
            return Err(PofError::InvalidState(format!(
                "remainder of type {} was already written",
                self.type_id
            )));
        }
        if self.state.open_level != self.level {
            return Err(PofError::InvalidState(
                "a nested writer is still open".to_string(),
            ));
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        if !self.header_written {
            self.state.out.write_packed_i32(self.version_id)?;
            self.header_written = true;
        }
        Ok(())
    }

    fn begin_property(&mut self, index: i32) -> Result<()> {
        self.ensure_open()?;
        if index < 0 {
            return Err(PofError::InvalidState(format!(
                "negative property index {index}"
            )));
        }
        if index <= self.last_index {
            return Err(PofError::OutOfOrderIndex {
                index,
                previous: self.last_index,
            });
        }
        self.write_header()?;
        self.state.out.write_packed_i32(index)?;
        self.last_index = index;
        Ok(())
    }

    /// Writes any value at `index`.
    pub fn write_value(&mut self, index: i32, value: &PofValue) -> Result<()> {
        self.begin_property(index)?;
        encode_value(self.state, value, None)
    }

    /// Writes a container at `index` in its uniform wire form.
    pub fn write_value_with_hint(
        &mut self,
        index: i32,
        value: &PofValue,
        hint: UniformHint,
    ) -> Result<()> {
        self.begin_property(index)?;
        encode_value(self.state, value, Some(hint))
    }

    /// Writes a typed field at `index`.
    pub fn write<T: PofField>(&mut self, index: i32, value: &T) -> Result<()> {
        self.begin_property(index)?;
        encode_value(self.state, &value.to_pof(), T::uniform_hint())
    }

    /// Writes a boolean at `index`.
    pub fn write_bool(&mut self, index: i32, value: bool) -> Result<()> {
        self.write_value(index, &PofValue::Boolean(value))
    }

    /// Writes a single byte at `index`.
    pub fn write_u8(&mut self, index: i32, value: u8) -> Result<()> {
        self.write_value(index, &PofValue::Octet(value))
    }

    /// Writes a character at `index`.
    pub fn write_char(&mut self, index: i32, value: char) -> Result<()> {
        self.write_value(index, &PofValue::Char(value))
    }

    /// Writes a 16-bit integer at `index`.
    pub fn write_i16(&mut self, index: i32, value: i16) -> Result<()> {
        self.write_value(index, &PofValue::Int16(value))
    }

    /// Writes a 32-bit integer at `index`.
    pub fn write_i32(&mut self, index: i32, value: i32) -> Result<()> {
        self.write_value(index, &PofValue::Int32(value))
    }

    /// Writes a 64-bit integer at `index`.
    pub fn write_i64(&mut self, index: i32, value: i64) -> Result<()> {
        self.write_value(index, &PofValue::Int64(value))
    }

    /// Writes a 128-bit integer at `index`.
    pub fn write_i128(&mut self, index: i32, value: i128) -> Result<()> {
        self.write_value(index, &PofValue::Int128(value))
    }

    /// Writes a 32-bit float at `index`.
    pub fn write_f32(&mut self, index: i32, value: f32) -> Result<()> {
        self.write_value(index, &PofValue::Float32(value))
    }

    /// Writes a 64-bit float at `index`.
    pub fn write_f64(&mut self, index: i32, value: f64) -> Result<()> {
        self.write_value(index, &PofValue::Float64(value))
    }

    /// Writes a decimal at `index`.
    pub fn write_decimal(&mut self, index: i32, value: Decimal) -> Result<()> {
        self.write_value(index, &PofValue::Decimal(value))
    }

    /// Writes a character string. Use [`write_value`](Self::write_value)
    /// with [`PofValue::Null`] for a null string.
    pub fn write_string(&mut self, index: i32, value: &str) -> Result<()> {
        self.write_value(index, &PofValue::String(value.to_string()))
    }

    /// Writes a byte string at `index`.
    pub fn write_binary(&mut self, index: i32, value: &[u8]) -> Result<()> {
        self.write_value(index, &PofValue::Binary(Bytes::copy_from_slice(value)))
    }

    /// Writes a calendar date at `index`.
    pub fn write_date(&mut self, index: i32, value: NaiveDate) -> Result<()> {
        self.write_value(index, &PofValue::Date(value))
    }

    /// Writes a time of day at `index`.
    pub fn write_time(&mut self, index: i32, value: PofTime) -> Result<()> {
        self.write_value(index, &PofValue::Time(value))
    }

    /// Writes a date-time at `index`.
    pub fn write_datetime(&mut self, index: i32, value: PofDateTime) -> Result<()> {
        self.write_value(index, &PofValue::DateTime(value))
    }

    /// Writes a year/month interval at `index`.
    pub fn write_year_month_interval(&mut self, index: i32, value: YearMonthInterval) -> Result<()> {
        self.write_value(index, &PofValue::YearMonthInterval(value))
    }

    /// Writes a time interval at `index`.
    pub fn write_time_interval(&mut self, index: i32, value: TimeInterval) -> Result<()> {
        self.write_value(index, &PofValue::TimeInterval(value))
    }

    /// Writes a day/time interval at `index`.
    pub fn write_day_time_interval(&mut self, index: i32, value: DayTimeInterval) -> Result<()> {
        self.write_value(index, &PofValue::DayTimeInterval(value))
    }

    /// Writes a user type instance, or null.
    pub fn write_object(&mut self, index: i32, value: Option<&PofObject>) -> Result<()> {
        match value {
            Some(object) => self.write_value(index, &PofValue::Object(object.clone())),
            None => self.write_value(index, &PofValue::Null),
        }
    }

    /// Opens a nested structure at `index`.
    ///
    /// The nested writer must be finished with
    /// [`write_remainder`](Self::write_remainder) before this writer accepts
    /// further properties.
    pub fn create_nested_writer(&mut self, index: i32) -> Result<PofWriter<'_>> {
        self.begin_property(index)?;
        self.state.out.write_packed_i32(self.type_id)?;
        Ok(PofWriter::new(self.state, self.type_id, true))
    }

    /// Appends opaque trailing properties, then the end marker, and closes
    /// the writer.
    ///
    /// The tail must hold index/value pairs captured by
    /// [`PofReader::read_remainder`](super::PofReader::read_remainder), and
    /// its first index must come after the last property written.
    pub fn write_remainder(&mut self, remainder: Option<&[u8]>) -> Result<()> {
        self.ensure_open()?;
        self.write_header()?;
        if let Some(tail) = remainder.filter(|tail| !tail.is_empty()) {
            let first = BufferInput::from_slice(tail).read_packed_i32()?;
            if first <= self.last_index {
                return Err(PofError::OutOfOrderIndex {
                    index: first,
                    previous: self.last_index,
                });
            }
            self.state.out.write_bytes(tail)?;
        }
        self.state.out.write_packed_i32(END_OF_PROPERTIES)?;
        self.closed = true;
        self.state.open_level -= 1;
        Ok(())
    }

    /// Appends future data captured by an older reader, then the end
    /// marker, and closes the writer.
    ///
    /// Fails with [`PofError::InvalidState`] when the captured bytes hold
    /// reference markers that would not resolve in this stream: the call
    /// does not track references, the bytes refer to an instance outside
    /// them, or their ids are already taken by this call.
    pub fn write_future_data(&mut self, data: Option<&FutureData>) -> Result<()> {
        let Some(data) = data else {
            return self.write_remainder(None);
        };
        self.ensure_open()?;
        self.state.check_replay(&data.references)?;
        self.write_remainder(Some(data.bytes.as_ref()))?;
        self.state.reserve_replayed(&data.references);
        Ok(())
    }

    /// Closes the writer if the serializer left it open.
    pub(crate) fn finish(mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.write_remainder(None)
    }
}
