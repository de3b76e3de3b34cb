//! Data output traits and implementations for POF encoding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, NaiveDate, Timelike};
use rust_decimal::Decimal;

use super::mutf8;
use super::temporal::{DayTimeInterval, PofDateTime, PofTime, TimeInterval, YearMonthInterval, ZoneState};
use crate::error::{PofError, Result};

/// Largest encoded size of a packed integer (a full-width `i128`).
pub const MAX_PACKED_LEN: usize = 19;

/// Shared flag through which the owner of a stream closes it.
///
/// Streams check the flag before every operation, so a close made while an
/// encode or decode is in progress fails the next operation with
/// [`PofError::Closed`].
#[derive(Debug, Clone, Default)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    /// Creates an open handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the stream closed.
    pub fn close(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Encodes `v` into `buf` and returns the number of bytes used.
///
/// The first byte holds a continuation bit, a sign bit and six magnitude bits;
/// every following byte holds a continuation bit and seven magnitude bits.
/// Negative values store the complement of their magnitude.
pub fn encode_packed(v: i128, buf: &mut [u8; MAX_PACKED_LEN]) -> usize {
    let (sign, mut n) = if v < 0 { (0x40u8, !v) } else { (0u8, v) };
    let mut b = sign | (n & 0x3F) as u8;
    n >>= 6;
    let mut len = 0;
    while n != 0 {
        buf[len] = b | 0x80;
        len += 1;
        b = (n & 0x7F) as u8;
        n >>= 7;
    }
    buf[len] = b;
    len + 1
}

/// Number of bytes the packed encoding of `v` occupies.
pub fn packed_len(v: i128) -> usize {
    let magnitude = if v < 0 { !v } else { v };
    let bits = 128 - magnitude.leading_zeros() as usize;
    1 + bits.saturating_sub(6).div_ceil(7)
}

/// Width in bits of the narrowest decimal form that holds the significand of `v`.
pub fn decimal_width(v: &Decimal) -> u32 {
    let mantissa = v.mantissa();
    if i32::try_from(mantissa).is_ok() {
        32
    } else if i64::try_from(mantissa).is_ok() {
        64
    } else {
        128
    }
}

/// Trait for writing POF primitive encodings.
///
/// Implementors supply raw byte output; the packed, floating point, string and
/// temporal encodings are provided on top of it.
pub trait DataOutput {
    /// Writes a single raw byte.
    fn write_u8(&mut self, v: u8) -> Result<()>;

    /// Writes raw bytes without a length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a packed 32-bit integer.
    fn write_packed_i32(&mut self, v: i32) -> Result<()> {
        self.write_packed_i128(i128::from(v))
    }

    /// Writes a packed 64-bit integer.
    fn write_packed_i64(&mut self, v: i64) -> Result<()> {
        self.write_packed_i128(i128::from(v))
    }

    /// Writes a packed 128-bit integer.
    fn write_packed_i128(&mut self, v: i128) -> Result<()> {
        let mut buf = [0u8; MAX_PACKED_LEN];
        let len = encode_packed(v, &mut buf);
        self.write_bytes(&buf[..len])
    }

    /// Writes a length as a packed integer.
    fn write_size(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len).map_err(|_| {
            PofError::UnsupportedShape(format!("length {len} exceeds the 32-bit size field"))
        })?;
        self.write_packed_i32(len)
    }

    /// Writes the IEEE-754 bit pattern of `v`, big-endian.
    fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_bytes(&v.to_bits().to_be_bytes())
    }

    /// Writes the IEEE-754 bit pattern of `v`, big-endian.
    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_bytes(&v.to_bits().to_be_bytes())
    }

    /// Writes a length-prefixed byte string.
    fn write_octet_string(&mut self, v: &[u8]) -> Result<()> {
        self.write_size(v.len())?;
        self.write_bytes(v)
    }

    /// Writes a length-prefixed modified UTF-8 string.
    fn write_utf(&mut self, v: &str) -> Result<()> {
        let encoded = mutf8::encode(v);
        self.write_size(encoded.len())?;
        self.write_bytes(&encoded)
    }

    /// Writes one character without a length prefix.
    fn write_char(&mut self, v: char) -> Result<()> {
        self.write_bytes(&mutf8::encode_char(v))
    }

    /// Writes a decimal as packed significand and packed scale.
    fn write_decimal(&mut self, v: &Decimal) -> Result<()> {
        self.write_packed_i128(v.mantissa())?;
        self.write_packed_i32(v.scale() as i32)
    }

    /// Writes a calendar date.
    fn write_date(&mut self, v: NaiveDate) -> Result<()> {
        self.write_packed_i32(v.year())?;
        self.write_packed_i32(v.month() as i32)?;
        self.write_packed_i32(v.day() as i32)
    }

    /// Writes a time of day and its zone state.
    ///
    /// The fraction is written as 0 when absent, as positive milliseconds when
    /// the nanoseconds are a whole number of milliseconds, and as negative
    /// nanoseconds otherwise.
    fn write_time(&mut self, v: &PofTime) -> Result<()> {
        self.write_packed_i32(v.time.hour() as i32)?;
        self.write_packed_i32(v.time.minute() as i32)?;
        self.write_packed_i32(v.time.second() as i32)?;
        let nanos = v.time.nanosecond() as i32;
        let fraction = if nanos % 1_000_000 == 0 {
            nanos / 1_000_000
        } else {
            -nanos
        };
        self.write_packed_i32(fraction)?;
        match v.zone {
            ZoneState::Unzoned => self.write_packed_i32(ZoneState::UNZONED),
            ZoneState::Utc => self.write_packed_i32(ZoneState::UTC),
            ZoneState::Offset { hours, minutes } => {
                self.write_packed_i32(ZoneState::OFFSET)?;
                self.write_packed_i32(hours)?;
                self.write_packed_i32(minutes)
            }
        }
    }

    /// Writes a date followed by a time.
    fn write_datetime(&mut self, v: &PofDateTime) -> Result<()> {
        self.write_date(v.date)?;
        self.write_time(&v.time)
    }

    /// Writes a year/month interval.
    fn write_year_month_interval(&mut self, v: &YearMonthInterval) -> Result<()> {
        self.write_packed_i32(v.years)?;
        self.write_packed_i32(v.months)
    }

    /// Writes a time interval.
    fn write_time_interval(&mut self, v: &TimeInterval) -> Result<()> {
        self.write_packed_i32(v.hours)?;
        self.write_packed_i32(v.minutes)?;
        self.write_packed_i32(v.seconds)?;
        self.write_packed_i32(v.nanos)
    }

    /// Writes a day/time interval.
    fn write_day_time_interval(&mut self, v: &DayTimeInterval) -> Result<()> {
        self.write_packed_i32(v.days)?;
        self.write_packed_i32(v.hours)?;
        self.write_packed_i32(v.minutes)?;
        self.write_packed_i32(v.seconds)?;
        self.write_packed_i32(v.nanos)
    }
}

/// A buffer-based implementation of `DataOutput`.
#[derive(Debug)]
pub struct BufferOutput {
    buffer: BytesMut,
    closed: CloseHandle,
}

impl BufferOutput {
    /// Creates a new `BufferOutput` with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new `BufferOutput` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            closed: CloseHandle::new(),
        }
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Discards everything written after the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.buffer.truncate(len);
    }

    /// Returns a handle that closes this stream.
    pub fn close_handle(&self) -> CloseHandle {
        self.closed.clone()
    }

    /// Returns true if the stream was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.is_closed() {
            Err(PofError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for BufferOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DataOutput for BufferOutput {
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.ensure_open()?;
        self.buffer.put_u8(v);
        Ok(())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.buffer.put_slice(v);
        Ok(())
    }
}
