//! Table-driven coverage of the four join kinds.

use flowset::operator::{join, JoinKind};
use flowset::zset::MultiSet;
use flowset::Graph;
use rstest::rstest;

#[rstest]
#[case(JoinKind::Inner, vec![(1, (Some("a"), Some("x")), 1)])]
#[case(
    JoinKind::Left,
    vec![(1, (Some("a"), Some("x")), 1), (2, (Some("b"), None), 1)]
)]
#[case(
    JoinKind::Right,
    vec![(1, (Some("a"), Some("x")), 1), (3, (None, Some("y")), 1)]
)]
#[case(
    JoinKind::Full,
    vec![
        (1, (Some("a"), Some("x")), 1),
        (2, (Some("b"), None), 1),
        (3, (None, Some("y")), 1),
    ]
)]
fn join_kind_materialises_expected_rows(
    #[case] kind: JoinKind,
    #[case] expected: Vec<(i64, (Option<&'static str>, Option<&'static str>), i64)>,
) {
    let mut graph = Graph::new();
    let left = graph.new_input::<(i64, &'static str)>().unwrap();
    let right = graph.new_input::<(i64, &'static str)>().unwrap();
    let output = join(&mut graph, left.clone(), right.clone(), kind);
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    left.send_data(vec![((1, "a"), 1), ((2, "b"), 1)]);
    right.send_data(vec![((1, "x"), 1), ((3, "y"), 1)]);
    graph.run().unwrap();

    let mut materialised = MultiSet::new();
    for zset in reader.drain() {
        materialised.extend(zset);
    }
    let mut actual = materialised.consolidate().into_pairs();
    actual.sort_by_key(|((k, _), _)| *k);

    let mut expected: Vec<_> = expected.into_iter().map(|(k, v, w)| ((k, v), w)).collect();
    expected.sort_by_key(|((k, _), _)| *k);

    assert_eq!(actual, expected);
}
