//! Concrete end-to-end scenarios exercised against the public `Graph` /
//! `StreamBuilder` API.

use flowset::operator::{count, filter_by, group_by, order_by_with_fractional_index, top_k, AggregateSpec, AggregateValue, TopKOptions};
use flowset::zset::MultiSet;
use flowset::Graph;

fn drain_all<T: Clone>(reader: &flowset::graph::StreamReader<T>) -> MultiSet<T> {
    let mut combined = MultiSet::new();
    for zset in reader.drain() {
        combined.extend(zset);
    }
    combined
}

#[derive(Clone, Debug, PartialEq)]
struct RankedItem {
    id: i64,
    value: String,
}

#[test]
fn s1_top_k_inner_key_groups() {
    let mut graph = Graph::new();
    let input = graph.new_input::<(&'static str, RankedItem)>().unwrap();
    let options = TopKOptions::with_comparator(|a: &RankedItem, b: &RankedItem| a.value.cmp(&b.value)).limit(3);
    let output = top_k(&mut graph, input.clone(), options);
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    let one = |id, value: &str| RankedItem { id, value: value.to_string() };
    input.send_data(vec![
        (("one", one(1, "9")), 1),
        (("one", one(2, "8")), 1),
        (("one", one(3, "7")), 1),
        (("one", one(4, "6")), 1),
        (("one", one(5, "5")), 1),
        (("two", one(6, "4")), 1),
        (("two", one(7, "3")), 1),
        (("two", one(8, "2")), 1),
        (("two", one(9, "1")), 1),
        (("two", one(10, "0")), 1),
    ]);
    graph.run().unwrap();

    let materialised = drain_all(&reader).consolidate();
    let mut pairs = materialised.into_pairs();
    pairs.sort_by(|a, b| (a.0).0.cmp(&(b.0).0).then((a.0).1.value.cmp(&(b.0).1.value)));

    let expected = vec![
        (("one", one(5, "5")), 1),
        (("one", one(4, "6")), 1),
        (("one", one(3, "7")), 1),
        (("two", one(10, "0")), 1),
        (("two", one(9, "1")), 1),
        (("two", one(8, "2")), 1),
    ];
    let mut expected = expected;
    expected.sort_by(|a, b| (a.0).0.cmp(&(b.0).0).then((a.0).1.value.cmp(&(b.0).1.value)));
    assert_eq!(pairs, expected);
}

#[test]
fn s2_top_k_incremental_retraction() {
    let mut graph = Graph::new();
    let input = graph.new_input::<(&'static str, &'static str)>().unwrap();
    let options = TopKOptions::with_comparator(|a: &&str, b: &&str| a.cmp(b)).limit(3);
    let output = top_k(&mut graph, input.clone(), options);
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    input.send_data(vec![(("/", "a"), 1), (("/", "b"), 1), (("/", "c"), 1), (("/", "d"), 1)]);
    graph.run().unwrap();
    let first = drain_all(&reader).consolidate();
    let mut first_pairs = first.into_pairs();
    first_pairs.sort();
    assert_eq!(first_pairs, vec![(("/", "a"), 1), (("/", "b"), 1), (("/", "c"), 1)]);

    input.send_data(vec![(("/", "b"), -1)]);
    graph.run().unwrap();
    let second = drain_all(&reader).consolidate();
    let mut second_pairs = second.into_pairs();
    second_pairs.sort();
    assert_eq!(second_pairs, vec![(("/", "b"), -1), (("/", "d"), 1)]);
}

#[test]
fn s3_count_incremental() {
    let mut graph = Graph::new();
    let input = graph.new_input::<(i64, &'static str)>().unwrap();
    let output = count(&mut graph, input.clone());
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    input.send_data(vec![
        ((1, "a"), 2),
        ((2, "b"), 1),
        ((2, "c"), 1),
        ((2, "d"), 1),
        ((3, "x"), 1),
        ((3, "y"), -1),
    ]);
    graph.run().unwrap();
    input.send_data(vec![((3, "z"), 1)]);
    graph.run().unwrap();

    let materialised = drain_all(&reader).consolidate();
    let mut pairs = materialised.into_pairs();
    pairs.sort();
    assert_eq!(pairs, vec![(1, 2), (2, 3), (3, 1)]);
}

#[test]
fn s4_filter_by() {
    let mut graph = Graph::new();
    let left = graph.new_input::<(i64, &'static str)>().unwrap();
    let right = graph.new_input::<(i64, bool)>().unwrap();
    let output = filter_by(&mut graph, left.clone(), right.clone());
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    left.send_data(vec![((1, "apple"), 1), ((2, "banana"), 1), ((3, "cherry"), 1)]);
    right.send_data(vec![((2, true), 1), ((3, false), 1)]);
    graph.run().unwrap();

    let materialised = drain_all(&reader).consolidate();
    let mut pairs = materialised.into_pairs();
    pairs.sort();
    assert_eq!(pairs, vec![((2, "banana"), 1), ((3, "cherry"), 1)]);
}

#[test]
fn s5_fractional_index_insertion_at_start() {
    let mut graph = Graph::new();
    let input = graph.new_input::<&'static str>().unwrap();
    let options = TopKOptions::with_comparator(|a: &&str, b: &&str| a.cmp(b));
    let output = order_by_with_fractional_index(&mut graph, input.clone(), options);
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    input.send_data(vec![("b", 1), ("c", 1), ("d", 1), ("e", 1)]);
    graph.run().unwrap();

    let mut strings: std::collections::HashMap<&str, String> = std::collections::HashMap::new();
    for (value, weight) in drain_all(&reader).into_pairs() {
        apply_delta(&mut strings, value, weight);
    }
    let mut sorted: Vec<&str> = strings.keys().copied().collect();
    sorted.sort_by(|a, b| strings[a].cmp(&strings[b]));
    assert_eq!(sorted, vec!["b", "c", "d", "e"]);
    let b_string = strings["b"].clone();

    input.send_data(vec![("a", 1)]);
    graph.run().unwrap();
    let second = drain_all(&reader).into_pairs();
    assert_eq!(second.len(), 1);
    let ((value, s), weight) = &second[0];
    assert_eq!(*value, "a");
    assert_eq!(*weight, 1);
    assert!(s.as_str() < b_string.as_str());

    for (value, weight) in second {
        apply_delta(&mut strings, value, weight);
    }
    let mut sorted: Vec<&str> = strings.keys().copied().collect();
    sorted.sort_by(|a, b| strings[a].cmp(&strings[b]));
    assert_eq!(sorted, vec!["a", "b", "c", "d", "e"]);
}

fn apply_delta(strings: &mut std::collections::HashMap<&'static str, String>, value: &'static str, weight: i64) {
    if weight > 0 {
        strings.insert(value, String::new());
    } else if weight < 0 {
        strings.remove(value);
    }
}

#[derive(Clone)]
struct Sale {
    product_id: i64,
    amount: f64,
    quantity: f64,
}

#[test]
fn s6_group_by_multiple_aggregates() {
    let mut graph = Graph::new();
    let input = graph.new_input::<Sale>().unwrap();
    let output = group_by(
        &mut graph,
        input.clone(),
        |s: &Sale| s.product_id,
        vec![
            ("total_amount".to_string(), AggregateSpec::sum(|s: &Sale| s.amount)),
            ("total_quantity".to_string(), AggregateSpec::sum(|s: &Sale| s.quantity)),
            ("avg_amount".to_string(), AggregateSpec::avg(|s: &Sale| s.amount)),
            ("sale_count".to_string(), AggregateSpec::count()),
        ],
    );
    let reader = output.connect_reader();
    graph.finalize().unwrap();

    let sale = |product_id, amount, quantity| Sale { product_id, amount, quantity };
    input.send_data(vec![
        (sale(101, 100.0, 2.0), 1),
        (sale(101, 125.0, 3.0), 1),
        (sale(101, 100.0, 1.0), 1),
        (sale(102, 300.0, 2.0), 1),
        (sale(102, 200.0, 1.0), 1),
        (sale(103, 50.0, 1.0), 1),
    ]);
    graph.run().unwrap();

    let mut rows: std::collections::HashMap<i64, flowset::operator::AggregateRow> =
        std::collections::HashMap::new();
    for (key, row) in drain_all(&reader).into_pairs().into_iter().map(|(kv, w)| {
        assert_eq!(w, 1, "single step: no prior row to retract");
        kv
    }) {
        rows.insert(key, row);
    }

    let row101 = &rows[&101];
    assert_eq!(row101["total_amount"], AggregateValue::Float(325.0));
    assert_eq!(row101["total_quantity"], AggregateValue::Float(6.0));
    assert_eq!(row101["sale_count"], AggregateValue::Int(3));
    assert_eq!(row101["avg_amount"], AggregateValue::Float(325.0 / 3.0));

    let row102 = &rows[&102];
    assert_eq!(row102["total_amount"], AggregateValue::Float(500.0));
    assert_eq!(row102["total_quantity"], AggregateValue::Float(3.0));
    assert_eq!(row102["avg_amount"], AggregateValue::Float(250.0));
    assert_eq!(row102["sale_count"], AggregateValue::Int(2));

    let row103 = &rows[&103];
    assert_eq!(row103["total_amount"], AggregateValue::Float(50.0));
    assert_eq!(row103["total_quantity"], AggregateValue::Float(1.0));
    assert_eq!(row103["avg_amount"], AggregateValue::Float(50.0));
    assert_eq!(row103["sale_count"], AggregateValue::Int(1));
}
