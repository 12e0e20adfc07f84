//! Universal invariants from the design spec, checked as property tests
//! plus a few concrete round-trip/keyed tests.

use flowset::operator::{count, key_by, map, unkey};
use flowset::zset::MultiSet;
use flowset::Graph;
use proptest::prelude::*;

fn small_zset() -> impl Strategy<Value = Vec<(i32, i64)>> {
    prop::collection::vec((any::<i32>(), -5i64..=5i64), 0..20)
}

proptest! {
    #[test]
    fn consolidate_is_idempotent(pairs in small_zset()) {
        let m: MultiSet<i32> = pairs.into();
        let once = m.consolidate();
        let twice = once.consolidate();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn negate_is_involutive(pairs in small_zset()) {
        let m: MultiSet<i32> = pairs.into();
        prop_assert_eq!(m.negate().negate(), m);
    }

    #[test]
    fn map_filter_fusion(pairs in small_zset()) {
        let m: MultiSet<i32> = pairs.into();
        let p = |x: &i32| x % 2 == 0;
        let f = |x: &i32| x.wrapping_mul(10);

        let a = m.filter(p).map(f);
        let b = m.map(f).filter(|y: &i32| (y / 10) % 2 == 0);

        prop_assert_eq!(a.consolidate(), b.consolidate());
    }

    /// Delta-correctness: splitting an input into several deltas and
    /// summing `map`'s output deltas equals running `map` once over the
    /// combined sum.
    #[test]
    fn map_is_delta_correct(a in small_zset(), b in small_zset()) {
        let f = |x: &i32| x.wrapping_add(1);

        let combined: MultiSet<i32> = a.iter().chain(b.iter()).cloned().collect();
        let expected = combined.map(f).consolidate();

        let mut graph = Graph::new();
        let input = graph.new_input::<i32>().unwrap();
        let output = map(&mut graph, input.clone(), f);
        let reader = output.connect_reader();
        graph.finalize().unwrap();

        input.send_data(a);
        graph.run().unwrap();
        input.send_data(b);
        graph.run().unwrap();

        let mut actual = MultiSet::new();
        for zset in reader.drain() {
            actual.extend(zset);
        }
        prop_assert_eq!(actual.consolidate(), expected);
    }

    /// `topKWithFractionalIndex`-style invariant generalised to `count`:
    /// for any key not mentioned in a step's input delta, no output
    /// message in that step carries that key.
    #[test]
    fn count_never_mentions_untouched_keys(
        first in prop::collection::vec((0i32..5, -3i64..=3i64), 0..10),
        second_key in 0i32..5,
        second_weight in -3i64..=3i64,
    ) {
        let mut graph = Graph::new();
        let input = graph.new_input::<(i32, ())>().unwrap();
        let output = count(&mut graph, input.clone());
        let reader = output.connect_reader();
        graph.finalize().unwrap();

        input.send_data(first.iter().map(|(k, w)| ((*k, ()), *w)).collect::<Vec<_>>());
        graph.run().unwrap();
        reader.drain();

        input.send_data(vec![((second_key, ()), second_weight)]);
        graph.run().unwrap();
        let step = reader.drain();

        for zset in step {
            for ((key, _count), _w) in zset.into_pairs() {
                prop_assert_eq!(key, second_key);
            }
        }
    }
}

#[test]
fn key_by_then_unkey_is_identity() {
    let mut graph = Graph::new();
    let input = graph.new_input::<i32>().unwrap();
    let keyed = key_by(&mut graph, input.clone(), |v: &i32| v % 3);
    let output = unkey(&mut graph, keyed);
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    input.send_data(vec![(1, 1), (2, 1), (3, 1), (4, -1)]);
    graph.run().unwrap();

    let mut materialised = MultiSet::new();
    for zset in reader.drain() {
        materialised.extend(zset);
    }
    let mut pairs = materialised.consolidate().into_pairs();
    pairs.sort();
    assert_eq!(pairs, vec![(1, 1), (2, 1), (3, 1), (4, -1)]);
}

#[test]
fn insert_then_delete_same_step_yields_no_output() {
    let mut graph = Graph::new();
    let input = graph.new_input::<&'static str>().unwrap();
    let output = map(&mut graph, input.clone(), |s: &&str| s.to_uppercase());
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    input.send_data(vec![("x", 1), ("x", -1)]);
    graph.run().unwrap();

    let mut materialised = MultiSet::new();
    for zset in reader.drain() {
        materialised.extend(zset);
    }
    assert!(materialised.consolidate().is_empty());
}
