#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(dataset) = vectorlake::codec::decode(data) {
        let encoded = vectorlake::codec::encode(&dataset).unwrap();
        assert_eq!(encoded.as_ref(), data);
    }
});
