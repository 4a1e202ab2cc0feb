#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use phishguard_core::error::RelayError;
use phishguard_core::session::{Resolution, SessionId, SessionRegistry};
use phishguard_core::verdict::{Classification, Verdict};
use tokio::time::Instant;

fn outcome(tag: u8, score: u8) -> Result<Verdict, RelayError> {
    match tag % 6 {
        0 => Ok(Verdict::new(Classification::Safe, f64::from(score), vec![])),
        1 => Ok(Verdict::new(Classification::Suspicious, f64::from(score), vec![])),
        2 => Ok(Verdict::new(Classification::Phishing, f64::from(score), vec![])),
        3 => Err(RelayError::Timeout(Duration::from_secs(10))),
        4 => Err(RelayError::MissingField("verdict")),
        _ => Err(RelayError::ReplyLost),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() > 65_536 {
        return;
    }

    let mut registry = SessionRegistry::with_max_lifecycle_events(1_024);
    let now = Instant::now();
    let mut issued: Vec<SessionId> = Vec::new();
    let mut last_rendered: Option<SessionId> = None;

    for chunk in data.chunks(3) {
        let [op_tag, pick, score] = match chunk {
            [a, b, c] => [*a, *b, *c],
            _ => break,
        };

        match op_tag % 3 {
            0 => {
                let ticket = registry.create_session(format!("https://{pick}.test/"), now);
                registry.dispatch(ticket.id);
                issued.push(ticket.id);
            }
            _ => {
                if issued.is_empty() {
                    continue;
                }
                let id = issued[usize::from(pick) % issued.len()];
                if let Resolution::Render { id, .. } = registry.resolve(id, outcome(op_tag, score)) {
                    assert!(
                        last_rendered.is_none_or(|prev| prev < id),
                        "rendered {id} after {last_rendered:?}"
                    );
                    assert_eq!(Some(id), registry.current_id());
                    last_rendered = Some(id);
                }
            }
        }

        let violations = registry.invariant_violations();
        assert!(violations.is_empty(), "session invariant violation: {violations:?}");
    }

    for id in issued.clone() {
        if let Resolution::Render { id, .. } = registry.resolve(id, outcome(0, 0)) {
            assert!(last_rendered.is_none_or(|prev| prev < id));
            last_rendered = Some(id);
        }
    }
    assert_eq!(registry.unresolved(), 0);
    assert_eq!(last_rendered, issued.last().copied());
});
