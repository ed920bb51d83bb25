//! # Operational Transformation
//!
//! `transform(a, b, context)` rewrites operation `a` so that it keeps its
//! intent when applied after `b`, where both were created against the same
//! document version.
//!
//! ## Rules
//!
//! Rules are organized by the kind of `a` (one submodule each) and matched
//! on the kind of `b`. Every pair has a rule; the fallback is to transform
//! the positions `a` holds and otherwise pass it through.
//!
//! - Transforming a NoOp yields a NoOp, transforming by a NoOp yields `a`
//! - Identical conflicts are broken by [`TransformContext::a_is_strong`]
//! - Conflicts never fail: a rule with nothing left to do yields a NoOp
//!
//! Results keep the base version of `a`; callers renumber them once they
//! know where the results are applied.

mod attribute;
mod insert;
mod marker;
mod merge;
mod moves;
mod rename;
mod split;

use crate::operation::{MoveOperation, Operation, OperationKind};
use scribe_model::{Position, Range, Stickiness};
use tracing::trace;

/// Per-call tie breaking between the two operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformContext {
    /// `a` wins identical conflicts (inserted first, its value kept)
    pub a_is_strong: bool,
}

impl TransformContext {
    pub fn new(a_is_strong: bool) -> Self {
        Self { a_is_strong }
    }

    /// Context for transforming `b` by `a`
    pub fn flipped(self) -> Self {
        Self {
            a_is_strong: !self.a_is_strong,
        }
    }
}

/// Transform `a` so it can be applied after `b`
pub fn transform(a: &Operation, b: &Operation, context: TransformContext) -> Vec<Operation> {
    if a.is_no_op() || b.is_no_op() || is_in_place_move(&b.kind) {
        return vec![a.clone()];
    }
    if is_in_place_move(&a.kind) {
        return vec![Operation::no_op(a.base_version)];
    }

    let kinds = match &a.kind {
        OperationKind::Insert(op) => insert::transform(op, &b.kind, context),
        OperationKind::Move(op) => moves::transform(op, &b.kind, context),
        OperationKind::Split(op) => split::transform(op, &b.kind, context),
        OperationKind::Merge(op) => merge::transform(op, &b.kind, context),
        OperationKind::Rename(op) => rename::transform(op, &b.kind, context),
        OperationKind::Attribute(op) => attribute::transform(op, &b.kind, context),
        OperationKind::Marker(op) => marker::transform(op, &b.kind, context),
        OperationKind::NoOp => vec![OperationKind::NoOp],
    };

    let mut result: Vec<Operation> = kinds
        .into_iter()
        .filter(|kind| !is_in_place_move(kind))
        .map(|kind| Operation::new(a.base_version, kind))
        .collect();

    if result.is_empty() {
        result.push(Operation::no_op(a.base_version));
    }
    if result.iter().all(Operation::is_no_op) {
        trace!(a = a.kind_name(), b = b.kind_name(), "Operation degraded to no-op");
    }
    result
}

/// A move that leaves the tree as it is and shifts nothing
fn is_in_place_move(kind: &OperationKind) -> bool {
    matches!(kind, OperationKind::Move(op) if op.is_in_place())
}

/// Transform two sequences created against the same version by each other.
///
/// Returns `(a', b')`: `a'` applies after `b`, `b'` applies after `a`.
/// Base versions are renumbered to follow the sequence they are applied after.
pub fn transform_sets(
    a: &[Operation],
    b: &[Operation],
    a_is_strong: bool,
) -> (Vec<Operation>, Vec<Operation>) {
    let context = TransformContext::new(a_is_strong);
    let (mut a_result, mut b_result) = transform_lists(a.to_vec(), b.to_vec(), context);

    if let (Some(first_a), Some(first_b)) = (a.first(), b.first()) {
        renumber(&mut a_result, first_b.base_version + b.len() as u64);
        renumber(&mut b_result, first_a.base_version + a.len() as u64);
    }
    (a_result, b_result)
}

fn transform_lists(
    a: Vec<Operation>,
    b: Vec<Operation>,
    context: TransformContext,
) -> (Vec<Operation>, Vec<Operation>) {
    if a.is_empty() || b.is_empty() {
        return (a, b);
    }

    if a.len() > 1 {
        let mut a = a;
        let rest = a.split_off(1);
        let (first, b) = transform_lists(a, b, context);
        let (rest, b) = transform_lists(rest, b, context);
        let mut result = first;
        result.extend(rest);
        return (result, b);
    }

    if b.len() > 1 {
        let mut b = b;
        let rest = b.split_off(1);
        let (a, first) = transform_lists(a, b, context);
        let (a, rest) = transform_lists(a, rest, context);
        let mut result = first;
        result.extend(rest);
        return (a, result);
    }

    let a_transformed = transform(&a[0], &b[0], context);
    let b_transformed = transform(&b[0], &a[0], context.flipped());
    (a_transformed, b_transformed)
}

/// Give consecutive base versions starting at `base_version`
pub fn renumber(operations: &mut [Operation], base_version: u64) {
    for (index, operation) in operations.iter_mut().enumerate() {
        operation.base_version = base_version + index as u64;
    }
}

/// Where `position` ends up after `operation` is applied
pub fn transform_position(position: &Position, operation: &OperationKind, stickiness: Stickiness) -> Position {
    match operation {
        OperationKind::Insert(op) => {
            position.transformed_by_insertion_with(&op.position, op.how_many, stickiness)
        }
        OperationKind::Move(op) => position.transformed_by_move_with(
            &op.source_position,
            &op.target_position,
            op.how_many,
            stickiness,
        ),
        OperationKind::Split(op) => position.transformed_by_split_with(
            &op.split_position,
            &op.insertion_position,
            op.graveyard_position.as_ref(),
            stickiness,
        ),
        OperationKind::Merge(op) => position.transformed_by_merge_with(
            &op.source_position,
            &op.target_position,
            &op.graveyard_position,
            stickiness,
        ),
        OperationKind::Rename(_)
        | OperationKind::Attribute(_)
        | OperationKind::Marker(_)
        | OperationKind::NoOp => position.clone(),
    }
}

/// Pieces of `range` after `operation` is applied
pub fn transform_range(range: &Range, operation: &OperationKind) -> Vec<Range> {
    match operation {
        OperationKind::Insert(op) => range.transformed_by_insertion(&op.position, op.how_many, false),
        OperationKind::Move(op) => {
            range.transformed_by_move(&op.source_position, &op.target_position, op.how_many, false)
        }
        OperationKind::Split(op) => vec![range.transformed_by_split(
            &op.split_position,
            &op.insertion_position,
            op.graveyard_position.as_ref(),
        )],
        OperationKind::Merge(op) => vec![range.transformed_by_merge(
            &op.source_position,
            &op.target_position,
            &op.graveyard_position,
        )],
        OperationKind::Rename(_)
        | OperationKind::Attribute(_)
        | OperationKind::Marker(_)
        | OperationKind::NoOp => vec![range.clone()],
    }
}

/// Single range following `range` through `operation`; a range broken
/// into pieces keeps the first piece and whatever touches it
pub fn transform_live_range(range: &Range, operation: &OperationKind) -> Range {
    let pieces = transform_range(range, operation);
    Range::glued(&pieces).unwrap_or_else(|| range.clone())
}

/// Moves bringing `ranges`, in order, to `target`. Every move shifts the
/// ranges and target of the moves after it.
pub(crate) fn make_move_operations(mut ranges: Vec<Range>, mut target: Position) -> Vec<OperationKind> {
    let mut operations = Vec::new();

    for index in 0..ranges.len() {
        let range = ranges[index].clone();
        let how_many = range.end.offset().saturating_sub(range.start.offset());
        if how_many == 0 {
            continue;
        }
        let op = MoveOperation {
            source_position: range.start,
            how_many,
            target_position: target.clone(),
        };
        if op.is_in_place() {
            continue;
        }

        for later in ranges.iter_mut().skip(index + 1) {
            let moved = later.transformed_by_move(&op.source_position, &op.target_position, op.how_many, false);
            if let Some(first) = moved.into_iter().next() {
                *later = first;
            }
        }
        target = target.transformed_by_move(&op.source_position, &op.target_position, op.how_many);
        operations.push(OperationKind::Move(op));
    }

    operations
}
