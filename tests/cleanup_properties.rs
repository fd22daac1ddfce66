//! Property-based tests for the exactly-once cleanup guarantee
//!
//! Random interleavings of creation, explicit release and drop must still
//! produce one creation and one cleanup notice per resource.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use heapstack::config::DispatchMode;
use heapstack::memory_management::TrackedResource;
use heapstack::test_utils::recording_coordinator;

#[derive(Debug, Clone)]
enum Op {
    Create,
    Release(usize),
    ReleaseTwice(usize),
    Drop(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        2 => any::<usize>().prop_map(Op::Release),
        1 => any::<usize>().prop_map(Op::ReleaseTwice),
        2 => any::<usize>().prop_map(Op::Drop),
    ]
}

fn arb_dispatch() -> impl Strategy<Value = DispatchMode> {
    prop_oneof![Just(DispatchMode::Inline), Just(DispatchMode::Background)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_resource_is_cleaned_exactly_once(
        ops in prop::collection::vec(arb_op(), 1..200),
        dispatch in arb_dispatch(),
    ) {
        let (coordinator, sink) = recording_coordinator(dispatch);
        let mut live: Vec<TrackedResource<usize>> = Vec::new();
        let mut created = 0usize;

        for op in ops {
            match op {
                Op::Create => {
                    live.push(TrackedResource::new(&coordinator, created));
                    created += 1;
                }
                Op::Release(index) if !live.is_empty() => {
                    let len = live.len();
                    live[index % len].release();
                }
                Op::ReleaseTwice(index) if !live.is_empty() => {
                    let len = live.len();
                    let resource = &live[index % len];
                    resource.release();
                    prop_assert!(!resource.release());
                }
                Op::Drop(index) if !live.is_empty() => {
                    let len = live.len();
                    live.swap_remove(index % len);
                }
                _ => {}
            }
        }

        drop(live);
        coordinator.request_reclamation();
        prop_assert_eq!(coordinator.await_quiescence(Duration::from_secs(10)), Ok(true));

        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in sink.cleaned_values() {
            *counts.entry(value).or_default() += 1;
        }
        prop_assert_eq!(counts.len(), created);
        prop_assert!(counts.values().all(|&count| count == 1));
        prop_assert_eq!(sink.created_values().len(), created);

        let stats = coordinator.stats();
        prop_assert_eq!(stats.total_executed, created);
        prop_assert_eq!(stats.explicit_releases + stats.reclaimed, created);
        prop_assert_eq!(stats.currently_registered, 0);
    }
}
