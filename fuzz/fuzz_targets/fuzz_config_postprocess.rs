//! Fuzz target for postprocess.json configuration parsing.
//!
//! Parsing and validation must handle arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ns_config::{validate_config, PostprocessConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = PostprocessConfig::from_json(text) {
        let _ = validate_config(&config);
    }
});
