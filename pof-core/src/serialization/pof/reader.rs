use bytes::Bytes;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::trace;

use crate::error::{PofError, Result};
use crate::serialization::codec::{decode_value, skip_value, ReadState};
use crate::serialization::constants::{END_OF_PROPERTIES, V_REFERENCE_NULL};
use crate::serialization::data_input::DataInput;
use crate::serialization::evolvable::TailReferences;
use crate::serialization::temporal::{
    DayTimeInterval, PofDateTime, PofTime, TimeInterval, YearMonthInterval,
};
use crate::serialization::traits::PofField;
use crate::serialization::value::{PofObject, PofValue};

/// Reads the indexed properties of one user type instance.
///
/// Requested indices must strictly increase: asking for an index at or
/// below the last one, the same index included, fails with
/// [`PofError::OutOfOrderIndex`], since each property is consumed once.
/// Properties the caller never asks for are skipped; an index the writer did
/// not write reads as null, which the typed accessors turn into the type's
/// default.
pub struct PofReader<'a> {
    state: &'a mut ReadState,
    type_id: i32,
    version_id: i32,
    level: usize,
    last_index: i32,
    stream_index: i32,
    /// Property index read from the stream but not consumed yet, with the
    /// position of that index.
    pending: Option<(i32, usize)>,
    /// Position of the end marker once it has been read.
    end: Option<usize>,
    absent: bool,
    closed: bool,
    identity: Option<i32>,
    remainder_references: TailReferences,
}

impl<'a> PofReader<'a> {
    pub(crate) fn new(
        state: &'a mut ReadState,
        type_id: i32,
        version_id: i32,
        identity: Option<i32>,
    ) -> Self {
        state.open_level += 1;
        let level = state.open_level;
        Self {
            state,
            type_id,
            version_id,
            level,
            last_index: -1,
            stream_index: -1,
            pending: None,
            end: None,
            absent: false,
            closed: false,
            identity,
            remainder_references: TailReferences::default(),
        }
    }

    fn absent(state: &'a mut ReadState, type_id: i32) -> Self {
        let mut reader = Self::new(state, type_id, 0, None);
        reader.absent = true;
        reader
    }

    /// Returns the user type id of the instance being read.
    pub fn user_type_id(&self) -> i32 {
        self.type_id
    }

    /// Returns the version id the writer recorded.
    pub fn version_id(&self) -> i32 {
        self.version_id
    }

    /// Makes a partially constructed instance visible to back-references
    /// from its own properties.
    ///
    /// Call this before reading properties that may refer back to the
    /// instance. Calling it for an instance that carries no identity is a
    /// no-op.
    pub fn register_identity(&mut self, object: PofObject) -> Result<()> {
        match self.identity.take() {
            Some(id) => self.state.references.fill(id, PofValue::Object(object)),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        self.state.input.ensure_open()?;
        if self.closed {
            return Err(PofError::InvalidState(format!(
                "remainder of type {} was already read",
                self.type_id
            )));
        }
        if self.state.open_level != self.level {
            return Err(PofError::InvalidState(
                "a nested reader is still open".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the next property index in the stream without consuming it.
    fn peek(&mut self) -> Result<Option<i32>> {
        if self.end.is_some() {
            return Ok(None);
        }
        if let Some((index, _)) = self.pending {
            return Ok(Some(index));
        }
        let position = self.state.input.position();
        let index = self.state.input.read_packed_i32()?;
        if index == END_OF_PROPERTIES {
            self.end = Some(position);
            return Ok(None);
        }
        if index <= self.stream_index {
            return Err(PofError::Malformed(format!(
                "property index {index} follows {} in type {}",
                self.stream_index, self.type_id
            )));
        }
        self.stream_index = index;
        self.pending = Some((index, position));
        Ok(Some(index))
    }

    /// Positions the stream at the value of `index`, returning false if the
    /// writer did not write it.
    fn advance_to(&mut self, index: i32) -> Result<bool> {
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
        self.last_index = index;
        if self.absent {
            return Ok(false);
        }
        while let Some(next) = self.peek()? {
            if next > index {
                return Ok(false);
            }
            self.pending = None;
            if next == index {
                return Ok(true);
            }
            trace!(type_id = self.type_id, index = next, "skipping unread property");
            skip_value(self.state)?;
        }
        Ok(false)
    }

    /// Reads the value at `index`, or null if it was not written.
    pub fn read_value(&mut self, index: i32) -> Result<PofValue> {
        if self.advance_to(index)? {
            decode_value(self.state)
        } else {
            Ok(PofValue::Null)
        }
    }

    /// Reads a typed field at `index`.
    pub fn read<T: PofField>(&mut self, index: i32) -> Result<T> {
        T::from_pof(self.read_value(index)?)
    }

    /// Reads a boolean at `index`.
    pub fn read_bool(&mut self, index: i32) -> Result<bool> {
        self.read_value(index)?.as_bool()
    }

    /// Reads a single byte at `index`.
    pub fn read_u8(&mut self, index: i32) -> Result<u8> {
        self.read_value(index)?.as_octet()
    }

    /// Reads a character at `index`.
    pub fn read_char(&mut self, index: i32) -> Result<char> {
        self.read_value(index)?.as_char()
    }

    /// Reads a 16-bit integer at `index`.
    pub fn read_i16(&mut self, index: i32) -> Result<i16> {
        self.read_value(index)?.as_i16()
    }

    /// Reads a 32-bit integer at `index`.
    pub fn read_i32(&mut self, index: i32) -> Result<i32> {
        self.read_value(index)?.as_i32()
    }

    /// Reads a 64-bit integer at `index`.
    pub fn read_i64(&mut self, index: i32) -> Result<i64> {
        self.read_value(index)?.as_i64()
    }

    /// Reads a 128-bit integer at `index`.
    pub fn read_i128(&mut self, index: i32) -> Result<i128> {
        self.read_value(index)?.as_i128()
    }

    /// Reads a 32-bit float at `index`.
    pub fn read_f32(&mut self, index: i32) -> Result<f32> {
        self.read_value(index)?.as_f32()
    }

    /// Reads a 64-bit float at `index`.
    pub fn read_f64(&mut self, index: i32) -> Result<f64> {
        self.read_value(index)?.as_f64()
    }

    /// Reads a decimal at `index`.
    pub fn read_decimal(&mut self, index: i32) -> Result<Decimal> {
        self.read_value(index)?.as_decimal()
    }

    /// Reads a character string at `index`; null when absent.
    pub fn read_string(&mut self, index: i32) -> Result<Option<String>> {
        Ok(self.read_value(index)?.as_str()?.map(str::to_string))
    }

    /// Reads a byte string at `index`; null when absent.
    pub fn read_binary(&mut self, index: i32) -> Result<Option<Bytes>> {
        self.read_value(index)?.as_binary()
    }

    /// Reads a calendar date at `index`; a date-time yields its date.
    pub fn read_date(&mut self, index: i32) -> Result<Option<NaiveDate>> {
        match self.read_value(index)? {
            PofValue::Null => Ok(None),
            PofValue::Date(v) => Ok(Some(v)),
            PofValue::DateTime(v) => Ok(Some(v.date)),
            other => Err(mismatch("date", &other)),
        }
    }

    /// Reads a time of day at `index`.
    pub fn read_time(&mut self, index: i32) -> Result<Option<PofTime>> {
        match self.read_value(index)? {
            PofValue::Null => Ok(None),
            PofValue::Time(v) => Ok(Some(v)),
            other => Err(mismatch("time", &other)),
        }
    }

    /// Reads a date-time at `index`.
    pub fn read_datetime(&mut self, index: i32) -> Result<Option<PofDateTime>> {
        match self.read_value(index)? {
            PofValue::Null => Ok(None),
            PofValue::DateTime(v) => Ok(Some(v)),
            other => Err(mismatch("datetime", &other)),
        }
    }

    /// Reads a year/month interval at `index`.
    pub fn read_year_month_interval(&mut self, index: i32) -> Result<YearMonthInterval> {
        match self.read_value(index)? {
            PofValue::Null => Ok(YearMonthInterval::default()),
            PofValue::YearMonthInterval(v) => Ok(v),
            other => Err(mismatch("year/month interval", &other)),
        }
    }

    /// Reads a time interval at `index`.
    pub fn read_time_interval(&mut self, index: i32) -> Result<TimeInterval> {
        match self.read_value(index)? {
            PofValue::Null => Ok(TimeInterval::default()),
            PofValue::TimeInterval(v) => Ok(v),
            other => Err(mismatch("time interval", &other)),
        }
    }

    /// Reads a day/time interval at `index`.
    pub fn read_day_time_interval(&mut self, index: i32) -> Result<DayTimeInterval> {
        match self.read_value(index)? {
            PofValue::Null => Ok(DayTimeInterval::default()),
            PofValue::DayTimeInterval(v) => Ok(v),
            other => Err(mismatch("day/time interval", &other)),
        }
    }

    /// Reads a user type instance at `index`; null when absent.
    pub fn read_object(&mut self, index: i32) -> Result<Option<PofObject>> {
        self.read_value(index)?.as_object()
    }

    /// Opens the nested structure at `index`.
    ///
    /// When nothing was written at `index` the nested reader is empty and
    /// every read from it yields a default. The nested reader must be
    /// finished with [`read_remainder`](Self::read_remainder) before this
    /// reader accepts further reads.
    pub fn create_nested_reader(&mut self, index: i32) -> Result<PofReader<'_>> {
        if !self.advance_to(index)? {
            return Ok(PofReader::absent(self.state, self.type_id));
        }
        let code = self.state.input.read_packed_i32()?;
        if code == V_REFERENCE_NULL {
            return Ok(PofReader::absent(self.state, self.type_id));
        }
        if code < 0 {
            return Err(PofError::Malformed(format!(
                "property {index} does not hold a nested structure"
            )));
        }
        let version = self.state.input.read_packed_i32()?;
        if version < 0 {
            return Err(PofError::Malformed(format!(
                "negative version {version} for type {code}"
            )));
        }
        Ok(PofReader::new(self.state, code, version, None))
    }

    /// Consumes every unread property and the end marker, returning the
    /// unread properties as opaque bytes, and closes the reader.
    ///
    /// The bytes can be handed unchanged to
    /// [`PofWriter::write_remainder`](super::PofWriter::write_remainder).
    pub fn read_remainder(&mut self) -> Result<Bytes> {
        self.ensure_open()?;
        let remainder = if self.absent {
            Bytes::new()
        } else {
            let start = match self.pending {
                Some((_, position)) => position,
                None => self.state.input.position(),
            };
            self.state.tail_references = Some(TailReferences::default());
            let skipped = self.skip_to_end();
            self.remainder_references = self.state.tail_references.take().unwrap_or_default();
            skipped?;
            let end = self.end.unwrap_or(start);
            if end > start {
                self.state.input.slice(start, end)
            } else {
                Bytes::new()
            }
        };
        self.closed = true;
        self.state.open_level -= 1;
        Ok(remainder)
    }

    fn skip_to_end(&mut self) -> Result<()> {
        while self.peek()?.is_some() {
            self.pending = None;
            skip_value(self.state)?;
        }
        Ok(())
    }

    /// Reference markers found in the bytes returned by
    /// [`read_remainder`](Self::read_remainder).
    pub fn remainder_references(&self) -> TailReferences {
        self.remainder_references
    }

    /// Drains and closes the reader if the serializer left it open.
    pub(crate) fn finish(mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.read_remainder().map(drop)
    }
}

fn mismatch(expected: &'static str, found: &PofValue) -> PofError {
    PofError::Conversion {
        expected,
        found: found.kind(),
    }
}
