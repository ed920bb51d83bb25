use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scribe_editor::{transform, transform_sets, Operation, TransformContext};
use scribe_model::{Node, Position, Range};
use serde_json::json;

fn pos(path: &[usize]) -> Position {
    Position::new("main", path.to_vec())
}

fn range(start: &[usize], end: &[usize]) -> Range {
    Range::new(pos(start), pos(end)).expect("same root")
}

fn transform_insert_pair(c: &mut Criterion) {
    let a = Operation::insert(0, pos(&[0, 3]), vec![Node::text("foo")]);
    let b = Operation::insert(0, pos(&[0, 3]), vec![Node::text("bar")]);

    c.bench_function("transform_insert_pair", |bench| {
        bench.iter(|| transform(black_box(&a), black_box(&b), TransformContext::new(true)))
    });
}

fn transform_overlapping_moves(c: &mut Criterion) {
    let a = Operation::move_range(0, &range(&[0, 1], &[0, 6]), pos(&[2, 0])).expect("flat range");
    let b = Operation::remove(0, &range(&[0, 3], &[0, 9])).expect("flat range");

    c.bench_function("transform_overlapping_moves", |bench| {
        bench.iter(|| transform(black_box(&a), black_box(&b), TransformContext::new(false)))
    });
}

fn transform_attribute_by_split(c: &mut Criterion) {
    let a = Operation::attribute(0, range(&[0, 0], &[0, 8]), "bold", None, Some(json!(true)));
    let b = Operation::split(0, pos(&[0, 4]), 6, None);

    c.bench_function("transform_attribute_by_split", |bench| {
        bench.iter(|| transform(black_box(&a), black_box(&b), TransformContext::new(true)))
    });
}

fn transform_typing_sessions(c: &mut Criterion) {
    // Two users typing 50 characters each into different paragraphs
    let left: Vec<Operation> = (0..50)
        .map(|i| Operation::insert(i, pos(&[0, i as usize]), vec![Node::text("a")]))
        .collect();
    let right: Vec<Operation> = (0..50)
        .map(|i| Operation::insert(i, pos(&[1, i as usize]), vec![Node::text("b")]))
        .collect();

    c.bench_function("transform_sets_50x50", |bench| {
        bench.iter(|| transform_sets(black_box(&left), black_box(&right), true))
    });
}

criterion_group!(
    benches,
    transform_insert_pair,
    transform_overlapping_moves,
    transform_attribute_by_split,
    transform_typing_sessions
);
criterion_main!(benches);
