#![no_main]
use libfuzzer_sys::fuzz_target;
use vectorlake::index::{IndexBackend, NativeBackend};
use vectorlake::IndexVariant;

fuzz_target!(|data: &[u8]| {
    let backend = NativeBackend::default();
    for variant in IndexVariant::ALL {
        if let Ok(handle) = backend.deserialize(variant, data) {
            assert_eq!(handle.index().variant(), variant);
        }
    }
});
