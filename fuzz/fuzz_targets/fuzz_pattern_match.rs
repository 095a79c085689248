#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use permission_engine::iam::{Action, PatternMatcher};

#[derive(Arbitrary, Debug)]
struct Input {
    pattern: String,
    value: String,
}

fuzz_target!(|input: Input| {
    let matched = PatternMatcher::matches(&input.pattern, &input.value);

    // The universal pattern always matches, a literal only matches itself
    if input.pattern == "*" {
        assert!(matched);
    } else if PatternMatcher::is_literal(&input.pattern) {
        assert_eq!(matched, input.pattern == input.value);
    }

    // Parsed actions must agree with raw matching
    if let (Ok(pattern), Ok(value)) = (Action::parse(&input.pattern), Action::parse(&input.value)) {
        assert_eq!(pattern.matches(&value), matched);
    }
});
