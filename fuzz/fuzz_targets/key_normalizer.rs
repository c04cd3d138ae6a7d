#![no_main]

use auditgate::diff::{identity_key, normalize_nondeterministic};
use auditgate::report::Item;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Arbitrary strings must normalize without panicking
        let _ = normalize_nondeterministic(input);

        // Arbitrary JSON rows must produce a key without panicking
        if let Ok(item) = serde_json::from_str::<Item>(input) {
            let _ = identity_key(&item);
        }
    }
});
