#![no_main]

use std::sync::Arc;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use pof_core::serialization::BufferInput;
use pof_core::{PofConfig, PofService, SimplePofContext};

fuzz_target!(|data: &[u8]| {
    let config = PofConfig::builder().max_depth(64).build().unwrap();
    let service = PofService::with_config(Arc::new(SimplePofContext::new()), config);

    let mut input = BufferInput::new(Bytes::copy_from_slice(data));
    while input.position() < data.len() {
        match service.deserialize_from(&mut input) {
            Ok(value) => {
                let _ = value.kind();
                let _ = service.serialize(&value);
            }
            Err(_) => break,
        }
    }
});
