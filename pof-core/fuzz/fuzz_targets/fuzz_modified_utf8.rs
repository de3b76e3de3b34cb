#![no_main]

use libfuzzer_sys::fuzz_target;

use pof_core::serialization::mutf8;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = mutf8::decode(data) {
        let encoded = mutf8::encode(&s);
        assert_eq!(encoded.len(), mutf8::encoded_len(&s));
        assert_eq!(mutf8::decode(&encoded).unwrap(), s);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        assert_eq!(mutf8::decode(&mutf8::encode(s)).unwrap(), s);
    }
});
