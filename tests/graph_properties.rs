//! Property tests for abstract graph generation.
//!
//! For any seed the generator must produce a graph whose goals are all
//! reached, whose locks pair with exactly one key on another branch, whose
//! security levels never decrease away from the start, and which is
//! solvable by collecting keys.

use proptest::prelude::*;
use std::collections::BTreeSet;
use worldweave::{
    GenerationContext, Generator, GraphGenerator, GraphParams, IdCounter, Position, OPEN_PASSAGE,
};

fn gated(width: i32, height: i32, levels: u32, tiles: u32) -> GraphParams {
    GraphParams {
        width,
        height,
        goals: vec![Position::new(0, height / 2), Position::new(width - 1, height / 2)],
        num_security_levels: levels,
        tiles_per_security_level: tiles,
        branch_limit_per_level: 3,
        directness: 2,
        branch_chance_percent: 40,
    }
}

fn ctx() -> GenerationContext {
    GenerationContext::new(Some(100_000))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_graph_meets_its_constraints(seed in any::<u64>(), levels in 1u32..=3) {
        let generator = GraphGenerator::new(gated(7, 7, levels, 7));
        let graph = generator.generate(&mut ctx(), seed).unwrap();

        for goal in &graph.goals {
            prop_assert!(graph.contains(*goal), "goal {:?} unreached", goal);
        }
        prop_assert!(graph.check_invariants().is_ok(), "{:?}", graph.check_invariants());
        prop_assert!(graph.is_solvable());
        let top = graph.nodes().map(|n| n.security_level).max().unwrap_or(0);
        prop_assert_eq!(top, levels - 1);
    }

    #[test]
    fn prop_locks_pair_with_one_key(seed in any::<u64>()) {
        let generator = GraphGenerator::new(gated(7, 7, 3, 6));
        let graph = generator.generate(&mut ctx(), seed).unwrap();

        let locks: Vec<u32> = graph.lock_edges().iter().map(|&(_, _, lock)| lock).collect();
        let keys: BTreeSet<u32> = graph.key_nodes().iter().map(|n| n.key_id).collect();
        prop_assert_eq!(locks.len(), 2);
        prop_assert_eq!(locks.iter().copied().collect::<BTreeSet<_>>(), keys);

        for (low, high, lock) in graph.lock_edges() {
            let key = graph.nodes().find(|n| n.key_id == lock).unwrap();
            let low = graph.get(low).unwrap();
            let high = graph.get(high).unwrap();
            prop_assert_eq!(high.security_level, low.security_level + 1);
            prop_assert_ne!(key.branch_id, low.branch_id);
            prop_assert!(key.security_level <= low.security_level);
            prop_assert_eq!(key.degree(), 1);
        }
    }

    #[test]
    fn prop_security_never_decreases_from_start(seed in any::<u64>()) {
        let generator = GraphGenerator::new(gated(6, 6, 3, 5));
        let graph = generator.generate(&mut ctx(), seed).unwrap();

        for node in graph.nodes() {
            let chain = graph.ancestry(node.position);
            prop_assert_eq!(*chain.last().unwrap(), graph.start());
            for pair in chain.windows(2) {
                let child = graph.get(pair[0]).unwrap();
                let parent = graph.get(pair[1]).unwrap();
                prop_assert!(child.security_level >= parent.security_level);
                let lock = child.links.get(&parent.position).copied().unwrap();
                prop_assert_eq!(
                    lock == OPEN_PASSAGE,
                    child.security_level == parent.security_level
                );
            }
        }
    }

    #[test]
    fn prop_same_seed_same_graph(seed in any::<u64>()) {
        let generator = GraphGenerator::new(gated(7, 7, 2, 8));
        let a = generator.generate(&mut ctx(), seed).unwrap();
        let b = generator.generate(&mut ctx(), seed).unwrap();
        prop_assert_eq!(a.seed, b.seed);
        prop_assert_eq!(a.order(), b.order());
        for node in a.nodes() {
            prop_assert_eq!(Some(node), b.get(node.position));
        }
    }

    #[test]
    fn prop_failed_attempts_leave_no_ids(seed in any::<u64>()) {
        let generator = GraphGenerator::new(gated(7, 7, 3, 6));
        let mut ids = IdCounter::new();
        match generator.try_generate(seed, &mut ids) {
            Ok(graph) => prop_assert_eq!(ids.peek(), 1 + graph.lock_edges().len() as u32),
            Err(_) => prop_assert_eq!(ids.peek(), 1),
        }
    }
}

#[test]
fn test_shared_counter_keeps_ids_disjoint() {
    let generator = GraphGenerator::new(gated(7, 7, 3, 6));
    let mut ctx = ctx();
    let first = generator.generate(&mut ctx, 10).unwrap();
    let second = generator.generate(&mut ctx, 10).unwrap();

    let ids = |graph: &worldweave::AbstractGraph| -> BTreeSet<u32> {
        graph.lock_edges().iter().map(|&(_, _, lock)| lock).collect()
    };
    assert!(ids(&first).is_disjoint(&ids(&second)));
    assert_eq!(ctx.lock_ids.peek(), 5);
}
