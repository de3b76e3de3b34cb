//! Data input traits and implementations for POF decoding.

use bytes::Bytes;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use super::data_output::CloseHandle;
use super::mutf8::{self, Decoded};
use super::temporal::{DayTimeInterval, PofDateTime, PofTime, TimeInterval, YearMonthInterval, ZoneState};
use crate::error::{PofError, Result};

/// Largest scale the native decimal type supports.
const MAX_DECIMAL_SCALE: i32 = 28;

/// Builds a decimal from an unscaled significand and a possibly out-of-range scale.
///
/// Negative scales are multiplied out. Scales above the native maximum are
/// reduced only when the significand has enough trailing zeros.
pub fn decimal_from_parts(mut mantissa: i128, mut scale: i32) -> Result<Decimal> {
    if mantissa == 0 {
        return Ok(Decimal::new(0, scale.clamp(0, MAX_DECIMAL_SCALE) as u32));
    }
    while scale < 0 {
        mantissa = mantissa.checked_mul(10).ok_or_else(|| {
            PofError::DecimalOverflow(format!("significand overflows at scale {scale}"))
        })?;
        scale += 1;
    }
    while scale > MAX_DECIMAL_SCALE {
        if mantissa % 10 != 0 {
            return Err(PofError::DecimalOverflow(format!(
                "scale {scale} exceeds the maximum of {MAX_DECIMAL_SCALE}"
            )));
        }
        mantissa /= 10;
        scale -= 1;
    }
    Decimal::try_from_i128_with_scale(mantissa, scale as u32)
        .map_err(|e| PofError::DecimalOverflow(e.to_string()))
}

/// Trait for reading POF primitive encodings.
///
/// Implementors supply raw byte input; everything else is provided on top of it.
pub trait DataInput {
    /// Reads a single raw byte.
    fn read_u8(&mut self) -> Result<u8>;

    /// Fills `dst` with the next bytes of the stream.
    fn read_into(&mut self, dst: &mut [u8]) -> Result<()>;

    /// Reads `len` bytes without copying where the implementation allows it.
    fn read_slice(&mut self, len: usize) -> Result<Bytes>;

    /// Returns the number of bytes remaining to be read.
    fn remaining(&self) -> usize;

    /// Reads a packed integer whose value must fit in `bits` bits.
    ///
    /// Fails with [`PofError::MalformedVarint`] when the encoding runs longer
    /// than the width allows or its magnitude overflows the width.
    fn read_packed(&mut self, bits: u32) -> Result<i128> {
        let malformed = PofError::MalformedVarint { bits };
        let max_bytes = 1 + (bits - 7).div_ceil(7);
        let mut b = self.read_u8()?;
        let negative = b & 0x40 != 0;
        let mut magnitude = u128::from(b & 0x3F);
        let mut shift = 6u32;
        let mut count = 1u32;
        while b & 0x80 != 0 {
            if count == max_bytes {
                return Err(malformed);
            }
            b = self.read_u8()?;
            count += 1;
            let group = u128::from(b & 0x7F);
            let allowed = bits - 1 - shift;
            if allowed < 7 && group >> allowed != 0 {
                return Err(malformed);
            }
            magnitude |= group << shift;
            shift += 7;
        }
        let n = magnitude as i128;
        Ok(if negative { !n } else { n })
    }

    /// Reads a packed 32-bit integer.
    fn read_packed_i32(&mut self) -> Result<i32> {
        let v = self.read_packed(32)?;
        i32::try_from(v).map_err(|_| PofError::MalformedVarint { bits: 32 })
    }

    /// Reads a packed 64-bit integer. Values written as 32-bit sign-extend.
    fn read_packed_i64(&mut self) -> Result<i64> {
        let v = self.read_packed(64)?;
        i64::try_from(v).map_err(|_| PofError::MalformedVarint { bits: 64 })
    }

    /// Reads a packed 128-bit integer.
    fn read_packed_i128(&mut self) -> Result<i128> {
        self.read_packed(128)
    }

    /// Reads a non-negative packed length.
    fn read_size(&mut self) -> Result<usize> {
        let len = self.read_packed_i32()?;
        usize::try_from(len).map_err(|_| PofError::Malformed(format!("negative length {len}")))
    }

    /// Reads an IEEE-754 bit pattern, big-endian.
    fn read_f32(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        Ok(f32::from_bits(u32::from_be_bytes(buf)))
    }

    /// Reads an IEEE-754 bit pattern, big-endian.
    fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_into(&mut buf)?;
        Ok(f64::from_bits(u64::from_be_bytes(buf)))
    }

    /// Reads a length-prefixed byte string.
    fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.read_size()?;
        self.read_slice(len)
    }

    /// Reads a length-prefixed modified UTF-8 string.
    fn read_utf(&mut self) -> Result<String> {
        let len = self.read_size()?;
        let bytes = self.read_slice(len)?;
        mutf8::decode(&bytes)
    }

    /// Reads one character in either supplementary form.
    fn read_char(&mut self) -> Result<char> {
        let first = read_sequence(self)?;
        let scalar = match first {
            Decoded::Scalar(scalar) => scalar,
            Decoded::Unit(high @ 0xD800..=0xDBFF) => match read_sequence(self)? {
                Decoded::Unit(low @ 0xDC00..=0xDFFF) => {
                    0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00)
                }
                _ => {
                    return Err(PofError::Malformed(
                        "high surrogate not followed by a low surrogate".to_string(),
                    ))
                }
            },
            Decoded::Unit(unit) => u32::from(unit),
        };
        char::from_u32(scalar)
            .ok_or_else(|| PofError::Malformed(format!("invalid character U+{scalar:X}")))
    }

    /// Reads a decimal whose significand must fit in `bits` bits.
    fn read_decimal(&mut self, bits: u32) -> Result<Decimal> {
        let mantissa = self.read_packed(bits).map_err(|e| match e {
            PofError::MalformedVarint { bits } => {
                PofError::DecimalOverflow(format!("significand exceeds {bits} bits"))
            }
            other => other,
        })?;
        let scale = self.read_packed_i32()?;
        decimal_from_parts(mantissa, scale)
    }

    /// Reads a calendar date.
    fn read_date(&mut self) -> Result<NaiveDate> {
        let year = self.read_packed_i32()?;
        let month = self.read_packed_i32()?;
        let day = self.read_packed_i32()?;
        u32::try_from(month)
            .ok()
            .zip(u32::try_from(day).ok())
            .and_then(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
            .ok_or_else(|| PofError::Malformed(format!("invalid date {year}-{month}-{day}")))
    }

    /// Reads a time of day and its zone state.
    fn read_time(&mut self) -> Result<PofTime> {
        let hour = self.read_packed_i32()?;
        let minute = self.read_packed_i32()?;
        let second = self.read_packed_i32()?;
        let fraction = self.read_packed_i32()?;
        let nanos = if fraction >= 0 {
            fraction.checked_mul(1_000_000)
        } else {
            fraction.checked_neg()
        };
        let time = nanos
            .and_then(|n| {
                NaiveTime::from_hms_nano_opt(
                    u32::try_from(hour).ok()?,
                    u32::try_from(minute).ok()?,
                    u32::try_from(second).ok()?,
                    u32::try_from(n).ok()?,
                )
            })
            .ok_or_else(|| {
                PofError::Malformed(format!(
                    "invalid time {hour}:{minute}:{second} fraction {fraction}"
                ))
            })?;
        let zone = match self.read_packed_i32()? {
            ZoneState::UNZONED => ZoneState::Unzoned,
            ZoneState::UTC => ZoneState::Utc,
            ZoneState::OFFSET => ZoneState::Offset {
                hours: self.read_packed_i32()?,
                minutes: self.read_packed_i32()?,
            },
            other => {
                return Err(PofError::Malformed(format!("invalid zone marker {other}")));
            }
        };
        Ok(PofTime { time, zone })
    }

    /// Reads a date followed by a time.
    fn read_datetime(&mut self) -> Result<PofDateTime> {
        let date = self.read_date()?;
        let time = self.read_time()?;
        Ok(PofDateTime { date, time })
    }

    /// Reads a year/month interval.
    fn read_year_month_interval(&mut self) -> Result<YearMonthInterval> {
        Ok(YearMonthInterval {
            years: self.read_packed_i32()?,
            months: self.read_packed_i32()?,
        })
    }

    /// Reads a time interval.
    fn read_time_interval(&mut self) -> Result<TimeInterval> {
        Ok(TimeInterval {
            hours: self.read_packed_i32()?,
            minutes: self.read_packed_i32()?,
            seconds: self.read_packed_i32()?,
            nanos: self.read_packed_i32()?,
        })
    }

    /// Reads a day/time interval.
    fn read_day_time_interval(&mut self) -> Result<DayTimeInterval> {
        Ok(DayTimeInterval {
            days: self.read_packed_i32()?,
            hours: self.read_packed_i32()?,
            minutes: self.read_packed_i32()?,
            seconds: self.read_packed_i32()?,
            nanos: self.read_packed_i32()?,
        })
    }
}

fn read_sequence<I: DataInput + ?Sized>(input: &mut I) -> Result<Decoded> {
    let mut buf = [0u8; 4];
    buf[0] = input.read_u8()?;
    let len = mutf8::sequence_len(buf[0])?;
    input.read_into(&mut buf[1..len])?;
    mutf8::decode_sequence(&buf[..len])
}

/// A buffer-based implementation of `DataInput`.
///
/// Holds a reference-counted buffer, so slices handed out by
/// [`read_slice`](DataInput::read_slice) share memory with the input.
#[derive(Debug, Clone)]
pub struct BufferInput {
    data: Bytes,
    pos: usize,
    closed: CloseHandle,
}

impl BufferInput {
    /// Creates a new `BufferInput` over the given bytes.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            closed: CloseHandle::new(),
        }
    }

    /// Creates a new `BufferInput` from a copy of the given slice.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the read position. Used to revisit skipped values.
    pub(crate) fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(PofError::Malformed(format!(
                "position {pos} is past the end of the stream"
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Returns the bytes between two positions already read.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Bytes {
        self.data.slice(start..end)
    }

    /// Returns a handle that closes this stream.
    pub fn close_handle(&self) -> CloseHandle {
        self.closed.clone()
    }

    /// Returns true if the stream was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_closed()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.is_closed() {
            Err(PofError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        self.ensure_open()?;
        let available = self.data.len() - self.pos;
        if available < n {
            Err(PofError::Truncated {
                needed: n,
                available,
            })
        } else {
            Ok(())
        }
    }
}

impl From<Bytes> for BufferInput {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for BufferInput {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

impl DataInput for BufferInput {
    fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        self.ensure_remaining(dst.len())?;
        dst.copy_from_slice(&self.data[self.pos..self.pos + dst.len()]);
        self.pos += dst.len();
        Ok(())
    }

    fn read_slice(&mut self, len: usize) -> Result<Bytes> {
        self.ensure_remaining(len)?;
        let slice = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(slice)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}
