#![no_main]

use libfuzzer_sys::fuzz_target;

use pof_core::serialization::{packed_len, BufferInput, BufferOutput, DataInput, DataOutput};

fuzz_target!(|data: &[u8]| {
    let mut input = BufferInput::from_slice(data);
    if let Ok(n) = input.read_packed_i128() {
        let mut output = BufferOutput::new();
        output.write_packed_i128(n).unwrap();
        assert_eq!(output.len(), packed_len(n));

        let mut again = BufferInput::new(output.into_bytes());
        assert_eq!(again.read_packed_i128().unwrap(), n);
    }

    let mut input = BufferInput::from_slice(data);
    let _ = input.read_packed_i32();
    let _ = input.read_packed_i64();
});
