use super::TransformContext;
use crate::operation::{
    AttributeOperation, MergeOperation, MoveOperation, OperationKind, SplitOperation,
};
use scribe_model::Range;

pub(super) fn transform(
    a: &AttributeOperation,
    b: &OperationKind,
    context: TransformContext,
) -> Vec<OperationKind> {
    let ranges = match b {
        OperationKind::Insert(b) => {
            let spread = a.range.start.has_same_parent_as(&b.position)
                && a.range.contains_position(&b.position);
            a.range.transformed_by_insertion(&b.position, b.how_many, spread)
        }
        OperationKind::Move(b) => by_move(a, b),
        OperationKind::Split(b) => by_split(a, b),
        OperationKind::Merge(b) => by_merge(a, b),
        OperationKind::Attribute(b) => return by_attribute(a, b, context),
        OperationKind::Rename(_) | OperationKind::Marker(_) | OperationKind::NoOp => {
            vec![a.range.clone()]
        }
    };

    with_ranges(a, ranges)
}

fn with_ranges(a: &AttributeOperation, ranges: Vec<Range>) -> Vec<OperationKind> {
    let operations: Vec<OperationKind> = ranges
        .into_iter()
        .filter(|range| !range.is_collapsed())
        .map(|range| {
            OperationKind::Attribute(AttributeOperation {
                range,
                ..a.clone()
            })
        })
        .collect();

    if operations.is_empty() {
        return vec![OperationKind::NoOp];
    }
    operations
}

/// Attribute changes only follow content that stays out of the graveyard
fn by_move(a: &AttributeOperation, b: &MoveOperation) -> Vec<Range> {
    let move_range = b.source_range();
    let insertion = b.insertion_position();

    let (differences, common) = if move_range.contains_range(&a.range) {
        (Vec::new(), Some(a.range.clone()))
    } else if a.range.start.has_same_parent_as(&b.source_position) {
        (a.range.difference(&move_range), a.range.intersection(&move_range))
    } else {
        (vec![a.range.clone()], None)
    };

    let mut ranges = Vec::new();
    for difference in differences {
        let start = difference
            .start
            .transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| b.source_position.clone());
        let end = difference
            .end
            .transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| b.source_position.clone());
        let difference = Range::spanning(start, end);

        let spread = difference.start.has_same_parent_as(&insertion);
        ranges.extend(difference.transformed_by_insertion(&insertion, b.how_many, spread));
    }

    if let Some(common) = common {
        ranges.extend(common.transformed_by_move(
            &b.source_position,
            &b.target_position,
            b.how_many,
            false,
        ));
    }

    if !a.range.start.is_in_graveyard() {
        ranges.retain(|range| !range.start.is_in_graveyard());
    }
    ranges
}

fn by_split(a: &AttributeOperation, b: &SplitOperation) -> Vec<Range> {
    let graveyard = b.graveyard_position.as_ref();

    // The range ended right where the new element appears
    if a.range.end == b.insertion_position {
        let mut range = a.range.clone();
        if graveyard.is_none() {
            range.end = range.end.shifted_by(1);
        }
        return vec![range];
    }

    if a.range.start.has_same_parent_as(&b.split_position)
        && a.range.contains_position(&b.split_position)
    {
        let head = Range::spanning(a.range.start.clone(), b.split_position.clone());
        let move_target = b.move_target_position();
        let tail = Range::spanning(
            move_target.clone(),
            a.range.end.combined(&b.split_position, &move_target),
        );
        return vec![head, tail];
    }

    vec![a.range.transformed_by_split(&b.split_position, &b.insertion_position, graveyard)]
}

fn by_merge(a: &AttributeOperation, b: &MergeOperation) -> Vec<Range> {
    let deletion = b.deletion_position();
    let mut ranges = Vec::new();

    // The merged element was in the range: it keeps the change in the graveyard
    if a.range.start == deletion || a.range.contains_position(&deletion) {
        ranges.push(Range::from_position_and_shift(b.graveyard_position.clone(), 1));
    }

    let range = a.range.transformed_by_merge(
        &b.source_position,
        &b.target_position,
        &b.graveyard_position,
    );
    ranges.push(range);
    ranges
}

fn by_attribute(
    a: &AttributeOperation,
    b: &AttributeOperation,
    context: TransformContext,
) -> Vec<OperationKind> {
    if a.key != b.key || !a.range.start.has_same_parent_as(&b.range.start) {
        return vec![OperationKind::Attribute(a.clone())];
    }

    let mut operations: Vec<OperationKind> = a
        .range
        .difference(&b.range)
        .into_iter()
        .filter(|range| !range.is_collapsed())
        .map(|range| {
            OperationKind::Attribute(AttributeOperation {
                range,
                ..a.clone()
            })
        })
        .collect();

    if context.a_is_strong {
        if let Some(common) = a.range.intersection(&b.range) {
            if !common.is_collapsed() {
                operations.push(OperationKind::Attribute(AttributeOperation {
                    range: common,
                    key: a.key.clone(),
                    old_value: b.new_value.clone(),
                    new_value: a.new_value.clone(),
                }));
            }
        }
    }

    if operations.is_empty() {
        return vec![OperationKind::NoOp];
    }
    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::transform::{transform as transform_op, TransformContext};
    use scribe_model::{Node, Position};
    use serde_json::json;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end)).unwrap()
    }

    fn bold(start: &[usize], end: &[usize]) -> Operation {
        Operation::attribute(0, range(start, end), "bold", None, Some(json!(true)))
    }

    fn ranges_of(ops: &[Operation]) -> Vec<Range> {
        ops.iter()
            .map(|op| match &op.kind {
                OperationKind::Attribute(op) => op.range.clone(),
                other => panic!("Expected attribute, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_attribute_on_removed_text_becomes_no_op() {
        let a = bold(&[0, 1], &[0, 2]);
        let b = Operation::remove(0, &range(&[0, 0], &[0, 3])).unwrap();

        let result = transform_op(&a, &b, TransformContext::new(true));
        assert_eq!(result.len(), 1);
        assert!(result[0].is_no_op());
    }

    #[test]
    fn test_attribute_loses_removed_part() {
        let a = bold(&[0, 1], &[0, 5]);
        let b = Operation::remove(0, &range(&[0, 3], &[0, 6])).unwrap();

        let result = ranges_of(&transform_op(&a, &b, TransformContext::new(true)));
        assert_eq!(result, vec![range(&[0, 1], &[0, 3])]);
    }

    #[test]
    fn test_attribute_skips_inserted_text() {
        let a = bold(&[0, 1], &[0, 5]);
        let b = Operation::insert(0, pos(&[0, 3]), vec![Node::text("xy")]);

        let result = ranges_of(&transform_op(&a, &b, TransformContext::new(true)));
        assert_eq!(result, vec![range(&[0, 1], &[0, 3]), range(&[0, 5], &[0, 7])]);
    }

    #[test]
    fn test_attribute_split_across_halves() {
        let a = bold(&[0, 1], &[0, 5]);
        let b = Operation::split(0, pos(&[0, 3]), 3, None);

        let result = ranges_of(&transform_op(&a, &b, TransformContext::new(true)));
        assert_eq!(result, vec![range(&[0, 1], &[0, 3]), range(&[1, 0], &[1, 2])]);
    }

    #[test]
    fn test_conflicting_attribute_values() {
        let a = bold(&[0, 0], &[0, 4]);
        let b = Operation::attribute(0, range(&[0, 2], &[0, 6]), "bold", None, Some(json!(false)));

        let strong = transform_op(&a, &b, TransformContext::new(true));
        assert_eq!(strong.len(), 2);
        match &strong[1].kind {
            OperationKind::Attribute(op) => {
                assert_eq!(op.range, range(&[0, 2], &[0, 4]));
                assert_eq!(op.old_value, Some(json!(false)));
                assert_eq!(op.new_value, Some(json!(true)));
            }
            other => panic!("Expected attribute, got {:?}", other),
        }

        let weak = ranges_of(&transform_op(&a, &b, TransformContext::new(false)));
        assert_eq!(weak, vec![range(&[0, 0], &[0, 2])]);
    }

    #[test]
    fn test_different_keys_do_not_conflict() {
        let a = bold(&[0, 0], &[0, 4]);
        let b = Operation::attribute(0, range(&[0, 0], &[0, 4]), "italic", None, Some(json!(true)));

        let result = transform_op(&a, &b, TransformContext::new(false));
        assert_eq!(result, vec![a]);
    }
}
