// crates/paddock-core/tests/name_codec.rs
// ============================================================================
// Module: Name Codec Tests
// Description: Property tests for identifiers, job names, and timestamps.
// Purpose: Pin down the reversibility of every string codec in the domain.
// ============================================================================

//! Property tests: any identifier the validator admits must survive the job
//! name round trip, and the timestamp wire form must order like the values.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use paddock_core::JobKind;
use paddock_core::JobName;
use paddock_core::ResourceId;
use paddock_core::Timestamp;
use proptest::prelude::*;
use proptest::sample::select;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn job_names_round_trip_for_every_valid_identifier(
        raw in "[0-9A-Za-z]{1,64}",
        kind in select(vec![JobKind::Training, JobKind::Evaluation, JobKind::Submission]),
    ) {
        let id = ResourceId::new(raw).expect("generator emits valid identifiers");
        let name = JobName::compose(kind, &id);
        let parsed = JobName::parse(name.as_str()).expect("composed names must parse");
        prop_assert_eq!(parsed.kind(), kind);
        prop_assert_eq!(parsed.resource_id(), &id);
    }

    #[test]
    fn identifiers_reject_anything_outside_the_alphabet(
        raw in "[0-9A-Za-z]{0,5}[-_#/ ][0-9A-Za-z]{0,5}",
    ) {
        prop_assert!(ResourceId::new(raw).is_err());
    }

    #[test]
    fn timestamp_wire_form_orders_like_the_values(
        earlier in 0i64..=4_102_444_800_000,
        delta in 1i64..=86_400_000,
    ) {
        let a = Timestamp::from_unix_millis(earlier);
        let b = Timestamp::from_unix_millis(earlier + delta);
        let a_wire = a.to_iso8601().expect("in range");
        let b_wire = b.to_iso8601().expect("in range");
        prop_assert!(a_wire < b_wire, "{a_wire} must sort before {b_wire}");
    }

    #[test]
    fn identifier_serde_is_transparent_and_validating(raw in "[0-9A-Za-z]{1,64}") {
        let id = ResourceId::new(raw.clone()).expect("valid identifier");
        let json = serde_json::to_string(&id).expect("serialize");
        prop_assert_eq!(&json, &format!("\"{raw}\""));
        let back: ResourceId = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, id);
    }
}

proptest! {
    #[test]
    fn generated_identifiers_always_compose_parseable_names(_seed in prop::num::u8::ANY) {
        let id = ResourceId::generate();
        for kind in [JobKind::Training, JobKind::Evaluation, JobKind::Submission] {
            let name = JobName::compose(kind, &id);
            prop_assert!(JobName::parse(name.as_str()).is_ok());
        }
    }
}
