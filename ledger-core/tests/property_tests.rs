//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Canonical encoding: key order never changes the bytes
//! - Deterministic replay: same payloads → same hashes
//! - Linkage: every entry points at its predecessor's chain hash
//! - Exactly-once: rejected commits leave the ledger untouched
//! - Optimizer: input order never changes the plan

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::io::Cursor;
use yield_ledger_core::{
    audit_log, canonical_encode, BasisBudget, Error, ForensicLedger, Payload, RuleResult,
    YieldOptimizer,
};

/// Strategy for generating finite floats across the whole exponent range
fn finite_f64() -> impl Strategy<Value = f64> {
    use prop::num::f64::{NEGATIVE, NORMAL, POSITIVE, SUBNORMAL, ZERO};
    POSITIVE | NEGATIVE | NORMAL | SUBNORMAL | ZERO
}

/// Strategy for generating scalar JSON values
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        finite_f64().prop_map(Value::from),
        "[a-zA-Z0-9 _\\-\"\\\\é✓😀\u{7f}]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for generating scalars, arrays and nested objects
fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy for generating payloads as key/value pairs (order matters to the caller)
fn pairs_strategy() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z_]{1,8}", value_strategy(), 0..8)
        .prop_map(|map| map.into_iter().collect())
}

fn payload_from(pairs: &[(String, Value)]) -> Payload {
    pairs.iter().cloned().collect::<Map<String, Value>>()
}

/// Strategy for generating rule results in a few shared categories
fn results_strategy() -> impl Strategy<Value = Vec<RuleResult>> {
    prop::collection::vec(
        (
            0u64..2_000,
            any::<bool>(),
            prop_oneof![Just(None), Just(Some("EQUIPMENT")), Just(Some("LABOR"))],
        ),
        0..12,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (amount, eligible, category))| {
                let result = RuleResult::new(format!("R{:02}", i), eligible, amount, "");
                match category {
                    Some(c) => result.with_basis_category(c),
                    None => result,
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_encoding_ignores_insertion_order(pairs in pairs_strategy()) {
        let forward = payload_from(&pairs);
        let mut reversed_pairs = pairs.clone();
        reversed_pairs.reverse();
        let reversed = payload_from(&reversed_pairs);

        let bytes = canonical_encode(&forward);
        prop_assert_eq!(&bytes, &canonical_encode(&reversed));

        // Canonical form is itself valid JSON describing the same object
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(parsed, Value::Object(forward));
    }

    #[test]
    fn prop_identical_sequences_identical_hashes(
        payloads in prop::collection::vec(pairs_strategy(), 1..10)
    ) {
        let mut first = ForensicLedger::new();
        let mut second = ForensicLedger::new();

        for (i, pairs) in payloads.iter().enumerate() {
            let key = format!("req-{}", i);
            let a = first.commit(payload_from(pairs), &key, None).unwrap();

            let mut reversed = pairs.clone();
            reversed.reverse();
            let b = second.commit(payload_from(&reversed), &key, None).unwrap();

            prop_assert_eq!(a.entry_hash(), b.entry_hash());
            prop_assert_eq!(a.chain_hash(), b.chain_hash());
        }

        prop_assert_eq!(first.chain_head(), second.chain_head());
    }

    #[test]
    fn prop_chain_linkage(payloads in prop::collection::vec(pairs_strategy(), 1..10)) {
        let mut ledger = ForensicLedger::new();
        for (i, pairs) in payloads.iter().enumerate() {
            ledger.commit(payload_from(pairs), &format!("req-{}", i), None).unwrap();
        }

        let entries = ledger.entries();
        prop_assert!(entries[0].prev_hash().is_none());
        for pair in entries.windows(2) {
            prop_assert_eq!(pair[1].prev_hash(), Some(pair[0].chain_hash()));
        }
        prop_assert!(ledger.verify().is_ok());
    }

    #[test]
    fn prop_rejections_leave_ledger_untouched(
        payloads in prop::collection::vec(pairs_strategy(), 2..10),
        reuse in any::<prop::sample::Index>(),
    ) {
        let mut ledger = ForensicLedger::new();
        for (i, pairs) in payloads.iter().enumerate() {
            let adc = format!("scope-{}", i);
            ledger.commit(payload_from(pairs), &format!("req-{}", i), Some(&adc)).unwrap();
        }

        let before = ledger.entries().to_vec();
        let i = reuse.index(payloads.len());

        let err = ledger
            .commit(Payload::new(), &format!("req-{}", i), None)
            .unwrap_err();
        prop_assert!(matches!(err, Error::IdempotencyViolation(_)), "unexpected error");

        let adc = format!("scope-{}", i);
        let err = ledger.commit(Payload::new(), "fresh", Some(&adc)).unwrap_err();
        prop_assert!(matches!(err, Error::DoubleCountViolation(_)), "unexpected error");

        prop_assert_eq!(ledger.entries(), before.as_slice());
        prop_assert!(!ledger.contains_idempotency_key("fresh"));
    }

    #[test]
    fn prop_audit_log_round_trip(payloads in prop::collection::vec(pairs_strategy(), 0..8)) {
        let mut ledger = ForensicLedger::new();
        for (i, pairs) in payloads.iter().enumerate() {
            let adc = (i % 2 == 0).then(|| format!("scope-{}", i));
            ledger
                .commit(payload_from(pairs), &format!("req-{}", i), adc.as_deref())
                .unwrap();
        }

        let mut buf = Vec::new();
        audit_log::write_records(&mut buf, &ledger).unwrap();
        let replayed = audit_log::replay(Cursor::new(buf)).unwrap();

        prop_assert_eq!(replayed.entries(), ledger.entries());
    }

    #[test]
    fn prop_optimizer_order_invariant(
        results in results_strategy(),
        equipment in 0u64..5_000,
        labor in 0u64..5_000,
        general in 0u64..5_000,
    ) {
        let budget: BasisBudget = [
            ("EQUIPMENT".to_string(), equipment),
            ("LABOR".to_string(), labor),
            ("GENERAL".to_string(), general),
        ]
        .into_iter()
        .collect();

        let optimizer = YieldOptimizer::new();
        let plan = optimizer.optimize(&results, &budget);

        let mut reversed = results.clone();
        reversed.reverse();
        prop_assert_eq!(&plan, &optimizer.optimize(&reversed, &budget));

        // Budget conservation per category
        for (category, start) in &budget {
            let spent: u64 = plan
                .chosen_incentives
                .iter()
                .filter(|r| optimizer.category_of(r) == category)
                .map(|r| r.amount)
                .sum();
            prop_assert_eq!(start - plan.remaining_basis[category], spent);
        }

        let total: u64 = plan.chosen_incentives.iter().map(|r| r.amount).sum();
        prop_assert_eq!(plan.total_yield, total);
        prop_assert!(plan.chosen_incentives.iter().all(|r| r.eligible));
    }
}
