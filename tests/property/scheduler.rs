// tests/property/scheduler.rs

use std::collections::HashMap;

use proptest::prelude::*;
use jobwright_test_utils::builders::{job_spec, scheduler};

#[derive(Debug, Clone)]
enum Op {
    Schedule { load: u32 },
    Release { pick: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u32..=4).prop_map(|load| Op::Schedule { load }),
        1 => any::<usize>().prop_map(|pick| Op::Release { pick }),
    ]
}

proptest! {
    #[test]
    fn load_never_exceeds_capacity(
        capacities in proptest::collection::vec(1u32..=6, 1..=4),
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let names: Vec<String> = (0..capacities.len()).map(|i| format!("node-{i}")).collect();
        let nodes: Vec<(&str, u32)> = names
            .iter()
            .map(String::as_str)
            .zip(capacities.iter().copied())
            .collect();
        let ids: Vec<&str> = names.iter().map(String::as_str).collect();
        let sched = scheduler(&nodes, &[("q", ids.as_slice())]);

        let mut held: Vec<String> = Vec::new();
        for (i, op) in ops.into_iter().enumerate() {
            match op {
                Op::Schedule { load } => {
                    let spec = job_spec(&format!("job-{i}"), "q", load);
                    if sched.schedule(&spec).unwrap() {
                        held.push(spec.id().to_string());
                    }
                }
                Op::Release { pick } => {
                    if !held.is_empty() {
                        let job = held.remove(pick % held.len());
                        prop_assert!(sched.release(&job).unwrap().is_some());
                    }
                }
            }

            let mut expected: HashMap<String, u32> = HashMap::new();
            for job in held.iter() {
                let a = sched.assignment_of(job).unwrap();
                *expected.entry(a.node_id).or_default() += a.load;
            }
            for n in sched.monitor().snapshot() {
                prop_assert!(n.load <= n.node.capacity);
                prop_assert_eq!(n.load, expected.get(&n.node.node_id).copied().unwrap_or(0));
            }
        }
    }
}
