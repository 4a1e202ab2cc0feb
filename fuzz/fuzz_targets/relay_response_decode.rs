#![no_main]

use libfuzzer_sys::fuzz_target;
use phishguard_core::protocol::RelayResponse;
use phishguard_core::verdict::MAX_RISK_SCORE;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(verdict) = RelayResponse::decode(raw) {
        assert!(verdict.risk_score <= MAX_RISK_SCORE);
    }
});
