//! Modified UTF-8 used for character strings.
//!
//! Writers encode every UTF-16 code unit on its own: NUL as `C0 80`, units up
//! to `U+07FF` in two bytes, everything else in three bytes, so supplementary
//! characters become two three-byte surrogate sequences. Readers additionally
//! accept a raw `00` byte and standard four-byte sequences.

use crate::error::{PofError, Result};

/// A decoded byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoded {
    /// A single UTF-16 code unit, possibly half of a surrogate pair.
    Unit(u16),
    /// A supplementary scalar value read from a four-byte sequence.
    Scalar(u32),
}

/// Returns the number of bytes in the sequence starting with `lead`.
pub(crate) fn sequence_len(lead: u8) -> Result<usize> {
    match lead {
        0x00..=0x7F => Ok(1),
        0xC0..=0xDF => Ok(2),
        0xE0..=0xEF => Ok(3),
        0xF0..=0xF7 => Ok(4),
        _ => Err(PofError::Malformed(format!(
            "invalid modified UTF-8 lead byte 0x{lead:02X}"
        ))),
    }
}

/// Decodes one complete sequence whose length matches [`sequence_len`].
pub(crate) fn decode_sequence(bytes: &[u8]) -> Result<Decoded> {
    let cont = |b: u8| -> Result<u32> {
        if b & 0xC0 == 0x80 {
            Ok(u32::from(b & 0x3F))
        } else {
            Err(PofError::Malformed(format!(
                "invalid modified UTF-8 continuation byte 0x{b:02X}"
            )))
        }
    };
    match *bytes {
        [b0] => Ok(Decoded::Unit(u16::from(b0))),
        [b0, b1] => Ok(Decoded::Unit(
            ((u32::from(b0 & 0x1F) << 6) | cont(b1)?) as u16,
        )),
        [b0, b1, b2] => Ok(Decoded::Unit(
            ((u32::from(b0 & 0x0F) << 12) | (cont(b1)? << 6) | cont(b2)?) as u16,
        )),
        [b0, b1, b2, b3] => {
            let scalar = (u32::from(b0 & 0x07) << 18)
                | (cont(b1)? << 12)
                | (cont(b2)? << 6)
                | cont(b3)?;
            if !(0x10000..=0x10FFFF).contains(&scalar) {
                return Err(PofError::Malformed(format!(
                    "four-byte sequence encodes U+{scalar:X} outside the supplementary planes"
                )));
            }
            Ok(Decoded::Scalar(scalar))
        }
        _ => Err(PofError::Malformed("empty modified UTF-8 sequence".to_string())),
    }
}

/// Appends the canonical encoding of one UTF-16 code unit.
fn push_unit(unit: u16, out: &mut Vec<u8>) {
    match unit {
        0x0001..=0x007F => out.push(unit as u8),
        0x0000 | 0x0080..=0x07FF => {
            out.push(0xC0 | (unit >> 6) as u8);
            out.push(0x80 | (unit & 0x3F) as u8);
        }
        _ => {
            out.push(0xE0 | (unit >> 12) as u8);
            out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
            out.push(0x80 | (unit & 0x3F) as u8);
        }
    }
}

/// Number of bytes [`encode`] produces for `s`.
pub fn encoded_len(s: &str) -> usize {
    s.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Encodes `s` in the canonical modified UTF-8 form.
pub fn encode(s: &str) -> Vec<u8> {
    if s.bytes().all(|b| (0x01..=0x7F).contains(&b)) {
        return s.as_bytes().to_vec();
    }
    let mut out = Vec::with_capacity(encoded_len(s));
    for unit in s.encode_utf16() {
        push_unit(unit, &mut out);
    }
    out
}

/// Encodes a single character in the canonical form.
pub fn encode_char(c: char) -> Vec<u8> {
    let mut units = [0u16; 2];
    let mut out = Vec::with_capacity(6);
    for unit in c.encode_utf16(&mut units).iter() {
        push_unit(*unit, &mut out);
    }
    out
}

/// Decodes modified UTF-8, accepting both supplementary-character forms.
pub fn decode(bytes: &[u8]) -> Result<String> {
    if bytes.is_ascii() {
        return String::from_utf8(bytes.to_vec())
            .map_err(|e| PofError::Malformed(format!("invalid string bytes: {e}")));
    }
    let mut units = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        let len = sequence_len(bytes[pos])?;
        let end = pos + len;
        if end > bytes.len() {
            return Err(PofError::Malformed(
                "modified UTF-8 sequence runs past the end of the string".to_string(),
            ));
        }
        match decode_sequence(&bytes[pos..end])? {
            Decoded::Unit(unit) => units.push(unit),
            Decoded::Scalar(scalar) => {
                let c = char::from_u32(scalar).ok_or_else(|| {
                    PofError::Malformed(format!("invalid scalar value U+{scalar:X}"))
                })?;
                let mut pair = [0u16; 2];
                units.extend_from_slice(c.encode_utf16(&mut pair));
            }
        }
        pos = end;
    }
    String::from_utf16(&units).map_err(|_| {
        PofError::Malformed("unpaired surrogate in modified UTF-8 string".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_unchanged() {
        assert_eq!(encode("hello"), b"hello".to_vec());
        assert_eq!(decode(b"hello").unwrap(), "hello");
    }

    #[test]
    fn test_nul_uses_two_bytes() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
        assert_eq!(decode(&[b'a', 0x00, b'b']).unwrap(), "a\0b");
    }

    #[test]
    fn test_two_and_three_byte_units() {
        let s = "é€";
        let encoded = encode(s);
        assert_eq!(encoded, vec![0xC3, 0xA9, 0xE2, 0x82, 0xAC]);
        assert_eq!(encoded.len(), encoded_len(s));
        assert_eq!(decode(&encoded).unwrap(), s);
    }

    #[test]
    fn test_supplementary_emits_surrogate_pair_form() {
        let s = "\u{1F600}";
        let encoded = encode(s);
        assert_eq!(encoded, vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(encoded_len(s), 6);
    }

    #[test]
    fn test_supplementary_accepts_both_forms() {
        let legacy = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        let standard = "\u{1F600}".as_bytes();
        assert_eq!(standard.len(), 4);
        assert_eq!(decode(&legacy).unwrap(), "\u{1F600}");
        assert_eq!(decode(standard).unwrap(), "\u{1F600}");
    }

    #[test]
    fn test_unpaired_surrogate_is_malformed() {
        let err = decode(&[0xED, 0xA0, 0xBD]).unwrap_err();
        assert!(matches!(err, PofError::Malformed(_)));
    }

    #[test]
    fn test_bad_continuation_is_malformed() {
        assert!(decode(&[0xC3, 0x41]).is_err());
        assert!(decode(&[0xE2, 0x82]).is_err());
        assert!(decode(&[0xFF]).is_err());
    }

    #[test]
    fn test_encode_char() {
        assert_eq!(encode_char('A'), vec![0x41]);
        assert_eq!(encode_char('\0'), vec![0xC0, 0x80]);
        assert_eq!(encode_char('\u{1F600}').len(), 6);
    }
}
