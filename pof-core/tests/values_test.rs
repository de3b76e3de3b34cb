//! Wire forms and round trips of intrinsic values.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveTime};
use common::*;
use pof_core::serialization::{
    DayTimeInterval, PofDateTime, PofTime, SparseArray, TimeInterval, TypeCode, UniformHint,
    YearMonthInterval,
};
use pof_core::{PofConfig, PofError, PofField, PofService, PofValue, SimplePofContext};
use rust_decimal::Decimal;

fn plain_service() -> PofService {
    PofService::new(Arc::new(SimplePofContext::new()))
}

fn round_trip(value: &PofValue) -> PofValue {
    let service = plain_service();
    let bytes = service.serialize(value).unwrap();
    service.deserialize(&bytes).unwrap()
}

fn encode(value: &PofValue) -> Vec<u8> {
    plain_service().serialize(value).unwrap().to_vec()
}

// ============================================================================
// Integers
// ============================================================================

#[test]
fn test_packed_sequence_round_trip() {
    let value = PofValue::Collection(vec![
        PofValue::Int64(100),
        PofValue::Int64(100_000),
        PofValue::Int64(0),
        PofValue::Int64(-1),
        PofValue::Int64(i64::MIN),
        PofValue::Int64(i64::MAX),
    ]);
    assert_eq!(round_trip(&value), value);

    let value = PofValue::Collection(
        [100, 100_000, 0, -1, i32::MIN, i32::MAX]
            .into_iter()
            .map(PofValue::Int32)
            .collect(),
    );
    assert_eq!(round_trip(&value), value);
}

#[test]
fn test_integer_wire_forms() {
    // T_INT64, then 100 as A4 01
    assert_eq!(encode(&PofValue::Int64(100)), vec![0x42, 0xA4, 0x01]);
    // small Int32 values take a single code
    assert_eq!(encode(&PofValue::Int32(-1)), vec![0x68]);
    assert_eq!(encode(&PofValue::Int32(0)), vec![0x69]);
    assert_eq!(encode(&PofValue::Int32(22)), vec![0x7F]);
    // just outside the single-code range
    assert_eq!(encode(&PofValue::Int32(23)), vec![0x41, 0x17]);
    assert_eq!(encode(&PofValue::Int32(-2)), vec![0x41, 0x41]);
}

#[test]
fn test_integer_extremes_round_trip() {
    for value in [
        PofValue::Int16(i16::MIN),
        PofValue::Int16(i16::MAX),
        PofValue::Int32(i32::MIN),
        PofValue::Int32(i32::MAX),
        PofValue::Int128(i128::MIN),
        PofValue::Int128(i128::MAX),
        PofValue::Octet(0xFF),
    ] {
        assert_eq!(round_trip(&value), value);
    }
}

#[test]
fn test_compact_values_can_be_disabled() {
    let config = PofConfig::builder().compact_values(false).build().unwrap();
    let service = PofService::with_config(Arc::new(SimplePofContext::new()), config);

    let bytes = service.serialize(&PofValue::Int32(0)).unwrap();
    assert_eq!(bytes.as_ref(), &[0x41, 0x00]);
    let bytes = service.serialize(&PofValue::Boolean(true)).unwrap();
    assert_eq!(bytes.as_ref(), &[0x4A, 0x01]);
    let bytes = service.serialize(&PofValue::from("")).unwrap();
    assert_eq!(bytes.as_ref(), &[0x4E, 0x00]);
    // null has only one form
    let bytes = service.serialize(&PofValue::Null).unwrap();
    assert_eq!(bytes.as_ref(), &[0x64]);

    assert_eq!(service.deserialize(&[0x41, 0x00]).unwrap(), PofValue::Int32(0));
}

// ============================================================================
// Floating point
// ============================================================================

#[test]
fn test_float_specials_keep_their_bits() {
    let quiet_nan = f64::from_bits(0x7FF8_0000_0000_0001);
    for f in [quiet_nan, f64::INFINITY, f64::NEG_INFINITY, -0.0, f64::MIN_POSITIVE] {
        let back = round_trip(&PofValue::Float64(f)).as_f64().unwrap();
        assert_eq!(back.to_bits(), f.to_bits());
    }
    for f in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -0.0f32] {
        let back = round_trip(&PofValue::Float32(f)).as_f32().unwrap();
        assert_eq!(back.to_bits(), f.to_bits());
    }
}

#[test]
fn test_infinity_is_written_raw() {
    assert_eq!(
        encode(&PofValue::Float64(f64::INFINITY)),
        vec![0x45, 0x7F, 0xF0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_single_code_floats_decode() {
    let service = plain_service();
    let nan = service.deserialize(&[0x67]).unwrap().as_f64().unwrap();
    assert!(nan.is_nan());
    let inf = service.deserialize(&[0x65]).unwrap().as_f64().unwrap();
    assert_eq!(inf, f64::INFINITY);
    let neg = service.deserialize(&[0x66]).unwrap().as_f64().unwrap();
    assert_eq!(neg, f64::NEG_INFINITY);
}

// ============================================================================
// Decimals
// ============================================================================

#[test]
fn test_decimal_extremes_round_trip() {
    for d in [
        Decimal::MAX,
        Decimal::MIN,
        Decimal::ZERO,
        Decimal::new(1, 28),
        Decimal::new(-123_456_789, 4),
    ] {
        let back = round_trip(&PofValue::Decimal(d)).as_decimal().unwrap();
        assert_eq!(back, d);
        assert_eq!(back.scale(), d.scale());
    }
}

#[test]
fn test_decimal_uses_narrowest_code() {
    // T_DECIMAL32, significand 12345, scale 2
    let bytes = encode(&PofValue::Decimal(Decimal::new(12345, 2)));
    assert_eq!(bytes[0], 0x47);
    let bytes = encode(&PofValue::Decimal(Decimal::MAX));
    assert_eq!(bytes[0], 0x49);
}

// ============================================================================
// Strings and characters
// ============================================================================

#[test]
fn test_strings_round_trip() {
    for s in ["", "plain", "a\0b", "h\u{e9}llo", "\u{1F600} grin", "\u{FFFF}"] {
        let back = round_trip(&PofValue::from(s));
        assert_eq!(back.as_str().unwrap(), Some(s));
    }
}

#[test]
fn test_nul_uses_two_bytes() {
    assert_eq!(
        encode(&PofValue::from("a\0b")),
        vec![0x4E, 0x04, b'a', 0xC0, 0x80, b'b']
    );
}

#[test]
fn test_supplementary_character_as_surrogates() {
    assert_eq!(
        encode(&PofValue::from("\u{1F600}")),
        vec![0x4E, 0x06, 0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
    );
}

#[test]
fn test_four_byte_sequence_accepted_on_read() {
    let value = plain_service()
        .deserialize(&[0x4E, 0x04, 0xF0, 0x9F, 0x98, 0x80])
        .unwrap();
    assert_eq!(value.as_str().unwrap(), Some("\u{1F600}"));
}

#[test]
fn test_empty_string_single_code() {
    assert_eq!(encode(&PofValue::from("")), vec![0x62]);
}

#[test]
fn test_chars_round_trip() {
    for c in ['a', '\0', '\u{e9}', '\u{20AC}', '\u{1F600}'] {
        assert_eq!(round_trip(&PofValue::Char(c)), PofValue::Char(c));
    }
}

#[test]
fn test_truncated_string_fails() {
    let err = plain_service().deserialize(&[0x4E, 0x05, b'a']).unwrap_err();
    assert!(matches!(err, PofError::Truncated { .. }));
}

// ============================================================================
// Binary and temporal values
// ============================================================================

#[test]
fn test_binary_round_trip() {
    let value = PofValue::Binary(Bytes::from_static(&[0, 1, 2, 0xFF]));
    assert_eq!(round_trip(&value), value);
    let empty = PofValue::Binary(Bytes::new());
    assert_eq!(round_trip(&empty), empty);
}

#[test]
fn test_temporal_round_trip() {
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let millis = NaiveTime::from_hms_milli_opt(13, 45, 10, 250).unwrap();
    let nanos = NaiveTime::from_hms_nano_opt(1, 2, 3, 123_456_789).unwrap();

    let values = [
        PofValue::Date(date),
        PofValue::Time(PofTime::unzoned(millis)),
        PofValue::Time(PofTime::utc(nanos)),
        PofValue::Time(PofTime::with_offset(millis, -5, -30)),
        PofValue::DateTime(PofDateTime {
            date,
            time: PofTime::with_offset(nanos, 9, 0),
        }),
        PofValue::YearMonthInterval(YearMonthInterval {
            years: 2,
            months: -3,
        }),
        PofValue::TimeInterval(TimeInterval {
            hours: 1,
            minutes: 2,
            seconds: 3,
            nanos: 4,
        }),
        PofValue::DayTimeInterval(DayTimeInterval {
            days: 10,
            hours: 0,
            minutes: 0,
            seconds: 1,
            nanos: 500,
        }),
    ];
    for value in values {
        assert_eq!(round_trip(&value), value);
    }
}

#[test]
fn test_invalid_date_is_malformed() {
    // T_DATE 2023-02-30
    let err = plain_service()
        .deserialize(&[0x4F, 0xA7, 0x1F, 0x02, 0x1E])
        .unwrap_err();
    assert!(matches!(err, PofError::Malformed(_)));
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn test_containers_round_trip() {
    let mut sparse = SparseArray::new(10);
    sparse.insert(1, PofValue::from("one"));
    sparse.insert(7, PofValue::Int64(7));

    let value = PofValue::Array(vec![
        PofValue::Collection(vec![]),
        PofValue::Array(vec![]),
        PofValue::SparseArray(sparse),
        PofValue::Map(vec![
            (PofValue::from("k"), PofValue::Boolean(false)),
            (PofValue::Int32(3), PofValue::Null),
        ]),
    ]);
    assert_eq!(round_trip(&value), value);
}

#[test]
fn test_empty_collection_single_code() {
    assert_eq!(encode(&PofValue::Collection(vec![])), vec![0x63]);
    // arrays keep their code and size
    assert_eq!(encode(&PofValue::Array(vec![])), vec![0x57, 0x00]);
}

#[test]
fn test_sparse_entry_outside_length_refused() {
    let mut entries = BTreeMap::new();
    entries.insert(5, PofValue::Int32(1));
    let sparse = SparseArray { len: 3, entries };
    let err = plain_service()
        .serialize(&PofValue::SparseArray(sparse))
        .unwrap_err();
    assert!(matches!(err, PofError::UnsupportedShape(_)));
}

#[test]
fn test_decreasing_sparse_index_is_malformed() {
    // T_SPARSE_ARRAY len 4: [2] = 0, [1] = 0, end
    let err = plain_service()
        .deserialize(&[0x59, 0x04, 0x02, 0x69, 0x01, 0x69, 0x40])
        .unwrap_err();
    assert!(matches!(err, PofError::Malformed(_)));
}

#[test]
fn test_huge_empty_sparse_array_refuses_dense_conversion() {
    // T_SPARSE_ARRAY len i32::MAX, no entries
    let value = plain_service()
        .deserialize(&[0x59, 0xBF, 0xFF, 0xFF, 0xFF, 0x0F, 0x40])
        .unwrap();
    match &value {
        PofValue::SparseArray(sparse) => {
            assert_eq!(sparse.len, i32::MAX as usize);
            assert!(sparse.entries.is_empty());
        }
        other => panic!("expected a sparse array, got {other:?}"),
    }

    let err = Vec::<i32>::from_pof(value).unwrap_err();
    assert!(matches!(err, PofError::UnsupportedShape(_)));
}

// ============================================================================
// Uniform forms
// ============================================================================

#[test]
fn test_vec_field_written_as_uniform_array() {
    let ctx = probe_context(FnSerializer::write_only(|writer, _| {
        writer.write(0, &vec![1i32, 2, 3])
    }));
    let bytes = service(ctx).serialize(&PofValue::Object(probe())).unwrap();
    // type 3000, version 0, [0] = T_UNIFORM_ARRAY of T_INT32, 3 elements
    assert_eq!(
        bytes.as_ref(),
        &[0xB8, 0x2E, 0x00, 0x00, 0x58, 0x41, 0x03, 0x01, 0x02, 0x03, 0x40]
    );
}

#[test]
fn test_uniform_forms_round_trip() {
    let ctx = probe_context(FnSerializer::new(
        |writer, _| {
            writer.write_value_with_hint(
                0,
                &PofValue::Collection(vec![PofValue::from("a"), PofValue::from("")]),
                UniformHint::Elements(TypeCode::CharString),
            )?;
            writer.write_value_with_hint(
                1,
                &PofValue::Map(vec![(PofValue::Int64(1), PofValue::from("x"))]),
                UniformHint::Keys(TypeCode::Int64),
            )?;
            writer.write_value_with_hint(
                2,
                &PofValue::Map(vec![(PofValue::Int16(4), PofValue::Boolean(true))]),
                UniformHint::Entries(TypeCode::Int16, TypeCode::Boolean),
            )
        },
        |reader| {
            let strings = reader.read_value(0)?;
            let keys = reader.read_value(1)?;
            let entries = reader.read_value(2)?;
            Ok(pof_core::PofObject::new(vec![strings, keys, entries]))
        },
    ));
    let service = service(ctx);
    let decoded = service
        .deserialize(&service.serialize(&PofValue::Object(probe())).unwrap())
        .unwrap();
    let handle = decoded
        .as_object()
        .unwrap()
        .unwrap()
        .downcast::<Vec<PofValue>>()
        .unwrap();
    let values = handle.read().unwrap();
    assert_eq!(
        values[0],
        PofValue::Collection(vec![PofValue::from("a"), PofValue::from("")])
    );
    assert_eq!(
        values[1],
        PofValue::Map(vec![(PofValue::Int64(1), PofValue::from("x"))])
    );
    assert_eq!(
        values[2],
        PofValue::Map(vec![(PofValue::Int16(4), PofValue::Boolean(true))])
    );
}

#[test]
fn test_uniform_element_mismatch_refused() {
    let ctx = probe_context(FnSerializer::write_only(|writer, _| {
        writer.write_value_with_hint(
            0,
            &PofValue::Array(vec![PofValue::Int32(1), PofValue::from("no")]),
            UniformHint::Elements(TypeCode::Int32),
        )
    }));
    let err = service(ctx)
        .serialize(&PofValue::Object(probe()))
        .unwrap_err();
    assert!(matches!(err, PofError::UnsupportedShape(_)));
}

#[test]
fn test_hint_on_wrong_container_refused() {
    let ctx = probe_context(FnSerializer::write_only(|writer, _| {
        writer.write_value_with_hint(
            0,
            &PofValue::Array(vec![]),
            UniformHint::Keys(TypeCode::Int32),
        )
    }));
    let err = service(ctx)
        .serialize(&PofValue::Object(probe()))
        .unwrap_err();
    assert!(matches!(err, PofError::UnsupportedShape(_)));
}

#[test]
fn test_user_type_hint_falls_back_while_tracking() {
    let ctx = graph_context();
    let friends = PofValue::Array(vec![PofValue::from(friend("x"))]);
    let hint = UniformHint::Elements(TypeCode::User(FRIEND_TYPE));

    ctx.register_serializer::<Probe>(
        PROBE_TYPE,
        Arc::new(FnSerializer::write_only(move |writer, _| {
            writer.write_value_with_hint(0, &friends, hint)
        })),
    )
    .unwrap();

    // untracked: uniform array of user type 1001
    let plain = service(Arc::clone(&ctx))
        .serialize(&PofValue::Object(probe()))
        .unwrap();
    assert_eq!(&plain[4..8], &[0x58, 0xA9, 0x0F, 0x01]);

    // tracked: ordinary array so each element can carry an identity
    let tracked_bytes = tracking_service(ctx)
        .serialize(&PofValue::Object(probe()))
        .unwrap();
    // identity 0 for the probe, then type 3000, version 0, index 0
    assert_eq!(&tracked_bytes[..7], &[0x5E, 0x00, 0xB8, 0x2E, 0x00, 0x00, 0x57]);
}
