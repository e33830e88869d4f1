#![no_main]

use arbitrary::Arbitrary;
use aura_bus::{covers, matches, streams_alias, validate_pattern, validate_topic};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    pattern: String,
    topic: String,
}

fuzz_target!(|input: FuzzInput| {
    let FuzzInput { pattern, topic } = input;

    let matched = matches(&pattern, &topic);
    assert_eq!(
        streams_alias(&pattern, &topic),
        streams_alias(&topic, &pattern)
    );

    if validate_pattern(&pattern).is_ok() && validate_topic(&topic).is_ok() {
        assert_eq!(matched, covers(&pattern, &topic), "{pattern:?} vs {topic:?}");
        if !pattern.contains(['+', '#']) {
            assert_eq!(matched, pattern == topic);
        }
    }
});
