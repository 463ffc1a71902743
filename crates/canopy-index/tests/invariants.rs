//! Randomized invariant tests: interleaved inserts and erases mirrored
//! against `std::collections::BTreeSet`, with the structural checker run
//! after every mutation.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use canopy_index::BPlusTreeSet;

const KEY_SPACE: i32 = 200;

fn random_workout(order: usize, ops: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tree = BPlusTreeSet::new(order).unwrap();
    let mut oracle: BTreeSet<i32> = BTreeSet::new();

    for step in 0..ops {
        let key = rng.gen_range(0..KEY_SPACE);

        if rng.gen_bool(0.6) || oracle.is_empty() {
            let (cursor, inserted) = tree.insert(key);
            assert_eq!(
                inserted,
                oracle.insert(key),
                "insert {key} disagreed at step {step} (order {order})"
            );
            assert_eq!(tree.key(cursor), Some(&key));
        } else {
            let cursor = tree.find(&key);
            if oracle.remove(&key) {
                assert!(!cursor.is_end(), "present key {key} not found");
                let next = tree.erase(cursor).unwrap();
                match oracle.range(key..).next() {
                    Some(successor) => assert_eq!(tree.key(next), Some(successor)),
                    None => assert!(next.is_end()),
                }
            } else {
                assert!(cursor.is_end(), "absent key {key} found");
            }
        }

        tree.check_invariants()
            .unwrap_or_else(|e| panic!("step {step} (order {order}, seed {seed}): {e}"));
        assert_eq!(tree.len(), oracle.len());
        assert!(
            tree.iter().copied().eq(oracle.iter().copied()),
            "traversal diverged at step {step} (order {order}, seed {seed})"
        );
    }

    assert!(tree.iter().rev().copied().eq(oracle.iter().rev().copied()));
}

#[test]
fn random_workout_order_2() {
    random_workout(2, 600, 0xC0FFEE);
}

#[test]
fn random_workout_order_3() {
    random_workout(3, 600, 42);
}

#[test]
fn random_workout_order_4() {
    random_workout(4, 600, 7);
}

#[test]
fn random_workout_order_7() {
    random_workout(7, 600, 1234);
}

#[test]
fn sequential_fill_and_drain() {
    for order in [2, 3, 4] {
        let mut tree = BPlusTreeSet::new(order).unwrap();

        for key in 1..=120 {
            tree.insert(key);
            tree.check_invariants()
                .unwrap_or_else(|e| panic!("insert {key} (order {order}): {e}"));
        }
        assert_eq!(tree.len(), 120);

        // Drain ascending, then refill and drain descending.
        for key in 1..=120 {
            let cursor = tree.find(&key);
            tree.erase(cursor).unwrap();
            tree.check_invariants()
                .unwrap_or_else(|e| panic!("erase {key} (order {order}): {e}"));
        }
        assert!(tree.is_empty());

        for key in 1..=60 {
            tree.insert(key);
        }
        for key in (1..=60).rev() {
            let cursor = tree.find(&key);
            let next = tree.erase(cursor).unwrap();
            assert!(next.is_end(), "erasing the maximum must return end");
            tree.check_invariants()
                .unwrap_or_else(|e| panic!("reverse erase {key} (order {order}): {e}"));
        }
        assert!(tree.is_empty());
    }
}

#[test]
fn interleaved_growth_keeps_leaf_chain_sorted() {
    // Alternating low/high inserts stress the rightmost-routing overwrite
    // and the split chain wiring at once.
    let mut tree = BPlusTreeSet::new(3).unwrap();
    for i in 0..50 {
        tree.insert(i);
        tree.insert(1000 - i);
        tree.check_invariants().unwrap();
    }
    let keys: Vec<i32> = tree.iter().copied().collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(keys, sorted);
    assert_eq!(tree.len(), 100);
}
