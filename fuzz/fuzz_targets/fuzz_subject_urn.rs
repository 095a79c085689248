#![no_main]
use libfuzzer_sys::fuzz_target;
use permission_engine::iam::Subject;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Anything that parses must survive a round trip through its URN
    if let Ok(subject) = Subject::from_urn(raw) {
        let urn = subject.to_urn();
        assert_eq!(Subject::from_urn(&urn).ok(), Some(subject));
    }
});
