//! Fuzz target for particle lines in particles.jsonl.
//!
//! Parsing must never panic, and whatever parses must serialize back to a
//! line that parses to the same record.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ns_common::Particle;
use ns_core::store::jsonl::parse_line;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(particle) = parse_line::<Particle>(line) else {
        return;
    };
    let text = serde_json::to_string(&particle).expect("parsed particle serializes");
    let back: Particle = parse_line(&text).expect("serialized particle parses");
    assert_eq!(back.id, particle.id);
    assert_eq!(back.parameters, particle.parameters);
});
