//! Wire type codes of the Portable Object Format.
//!
//! Every value on the wire begins with a packed-integer type code. Negative
//! codes are intrinsic types and single-code values; non-negative codes are
//! user type ids.

/// 16-bit integer.
pub const T_INT16: i32 = -1;
/// 32-bit integer.
pub const T_INT32: i32 = -2;
/// 64-bit integer.
pub const T_INT64: i32 = -3;
/// 128-bit integer.
pub const T_INT128: i32 = -4;
/// 32-bit IEEE-754 float.
pub const T_FLOAT32: i32 = -5;
/// 64-bit IEEE-754 float.
pub const T_FLOAT64: i32 = -6;
/// 128-bit float. Skippable but never decoded.
pub const T_FLOAT128: i32 = -7;
/// Decimal with a significand that fits 32 bits.
pub const T_DECIMAL32: i32 = -8;
/// Decimal with a significand that fits 64 bits.
pub const T_DECIMAL64: i32 = -9;
/// Decimal with a significand that fits 128 bits.
pub const T_DECIMAL128: i32 = -10;
/// Boolean written as a packed 0 or 1.
pub const T_BOOLEAN: i32 = -11;
/// Single raw byte.
pub const T_OCTET: i32 = -12;
/// Length-prefixed byte string.
pub const T_OCTET_STRING: i32 = -13;
/// Single character.
pub const T_CHAR: i32 = -14;
/// Length-prefixed modified UTF-8 string.
pub const T_CHAR_STRING: i32 = -15;
/// Calendar date.
pub const T_DATE: i32 = -16;
/// Year/month interval.
pub const T_YEAR_MONTH_INTERVAL: i32 = -17;
/// Time of day with optional zone.
pub const T_TIME: i32 = -18;
/// Hour/minute/second interval.
pub const T_TIME_INTERVAL: i32 = -19;
/// Date followed by time.
pub const T_DATETIME: i32 = -20;
/// Day/hour/minute/second interval.
pub const T_DAY_TIME_INTERVAL: i32 = -21;
/// Collection of typed values.
pub const T_COLLECTION: i32 = -22;
/// Collection whose elements share one type code.
pub const T_UNIFORM_COLLECTION: i32 = -23;
/// Array of typed values.
pub const T_ARRAY: i32 = -24;
/// Array whose elements share one type code.
pub const T_UNIFORM_ARRAY: i32 = -25;
/// Sparse array of indexed typed values.
pub const T_SPARSE_ARRAY: i32 = -26;
/// Sparse array whose elements share one type code.
pub const T_UNIFORM_SPARSE_ARRAY: i32 = -27;
/// Map of typed keys to typed values.
pub const T_MAP: i32 = -28;
/// Map whose keys share one type code.
pub const T_UNIFORM_KEYS_MAP: i32 = -29;
/// Map whose keys and values each share one type code.
pub const T_UNIFORM_MAP: i32 = -30;
/// First occurrence of a tracked value.
pub const T_IDENTITY: i32 = -31;
/// Back-reference to a tracked value.
pub const T_REFERENCE: i32 = -32;

/// Boolean `false`.
pub const V_BOOLEAN_FALSE: i32 = -33;
/// Boolean `true`.
pub const V_BOOLEAN_TRUE: i32 = -34;
/// Empty string.
pub const V_STRING_ZERO_LENGTH: i32 = -35;
/// Empty collection.
pub const V_COLLECTION_EMPTY: i32 = -36;
/// The null value.
pub const V_REFERENCE_NULL: i32 = -37;
/// Positive infinity.
pub const V_FP_POS_INFINITY: i32 = -38;
/// Negative infinity.
pub const V_FP_NEG_INFINITY: i32 = -39;
/// Not-a-number.
pub const V_FP_NAN: i32 = -40;
/// Integer -1.
pub const V_INT_NEG_1: i32 = -41;
/// Integer 0.
pub const V_INT_0: i32 = -42;
/// Integer 22, the largest single-code integer.
pub const V_INT_22: i32 = -64;

/// Property index that terminates a user type's property stream.
pub const END_OF_PROPERTIES: i32 = -1;

/// Smallest integer with a single-code encoding.
pub const SMALL_INT_MIN: i32 = -1;
/// Largest integer with a single-code encoding.
pub const SMALL_INT_MAX: i32 = 22;

/// Largest sparse array length that is expanded into a dense one.
pub const MAX_DENSE_SPARSE_LEN: usize = 1 << 20;

/// Returns the single-code encoding of `n`, if it has one.
pub fn small_int_code(n: i32) -> Option<i32> {
    (SMALL_INT_MIN..=SMALL_INT_MAX)
        .contains(&n)
        .then(|| V_INT_0 - n)
}

/// Returns the integer a single-code value stands for, if `code` is one.
pub fn small_int_value(code: i32) -> Option<i32> {
    (V_INT_22..=V_INT_NEG_1)
        .contains(&code)
        .then(|| V_INT_0 - code)
}

/// Returns the name of an intrinsic type code, for diagnostics.
pub fn type_code_name(code: i32) -> &'static str {
    match code {
        T_INT16 => "int16",
        T_INT32 => "int32",
        T_INT64 => "int64",
        T_INT128 => "int128",
        T_FLOAT32 => "float32",
        T_FLOAT64 => "float64",
        T_FLOAT128 => "float128",
        T_DECIMAL32 | T_DECIMAL64 | T_DECIMAL128 => "decimal",
        T_BOOLEAN | V_BOOLEAN_FALSE | V_BOOLEAN_TRUE => "boolean",
        T_OCTET => "octet",
        T_OCTET_STRING => "octet string",
        T_CHAR => "char",
        T_CHAR_STRING | V_STRING_ZERO_LENGTH => "char string",
        T_DATE => "date",
        T_YEAR_MONTH_INTERVAL => "year-month interval",
        T_TIME => "time",
        T_TIME_INTERVAL => "time interval",
        T_DATETIME => "datetime",
        T_DAY_TIME_INTERVAL => "day-time interval",
        T_COLLECTION | T_UNIFORM_COLLECTION | V_COLLECTION_EMPTY => "collection",
        T_ARRAY | T_UNIFORM_ARRAY => "array",
        T_SPARSE_ARRAY | T_UNIFORM_SPARSE_ARRAY => "sparse array",
        T_MAP | T_UNIFORM_KEYS_MAP | T_UNIFORM_MAP => "map",
        T_IDENTITY => "identity",
        T_REFERENCE => "reference",
        V_REFERENCE_NULL => "null",
        V_FP_POS_INFINITY | V_FP_NEG_INFINITY | V_FP_NAN => "float64",
        c if small_int_value(c).is_some() => "int32",
        c if c >= 0 => "user type",
        _ => "unknown",
    }
}
