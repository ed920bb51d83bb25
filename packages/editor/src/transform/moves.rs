use super::{make_move_operations, TransformContext};
use crate::operation::{
    InsertOperation, MergeOperation, MoveOperation, OperationKind, SplitOperation,
};
use scribe_model::{Position, Range};

pub(super) fn transform(
    a: &MoveOperation,
    b: &OperationKind,
    context: TransformContext,
) -> Vec<OperationKind> {
    match b {
        OperationKind::Insert(b) => by_insert(a, b),
        OperationKind::Move(b) => by_move(a, b, context),
        OperationKind::Split(b) => by_split(a, b),
        OperationKind::Merge(b) => by_merge(a, b),
        OperationKind::Rename(_)
        | OperationKind::Attribute(_)
        | OperationKind::Marker(_)
        | OperationKind::NoOp => vec![OperationKind::Move(a.clone())],
    }
}

fn by_insert(a: &MoveOperation, b: &InsertOperation) -> Vec<OperationKind> {
    let mut a = a.clone();
    let moved = a.source_range().transformed_by_insertion(&b.position, b.how_many, false);
    if let Some(range) = moved.into_iter().next() {
        a.how_many = range.how_many();
        a.source_position = range.start;
    }

    if a.target_position != b.position {
        a.target_position = a.target_position.transformed_by_insertion(&b.position, b.how_many);
    }
    vec![OperationKind::Move(a)]
}

fn by_move(a: &MoveOperation, b: &MoveOperation, context: TransformContext) -> Vec<OperationKind> {
    let range_a = a.source_range();
    let range_b = b.source_range();
    let b_insertion = b.insertion_position();

    let insert_before = !context.a_is_strong;
    let mut new_target = if a.target_position == b.target_position && insert_before {
        a.target_position
            .transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| a.target_position.clone())
    } else {
        a.target_position
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many)
    };

    // Each operation moves its nodes into the other's nodes: undo `b`
    // so that neither set ends up detached from the tree
    let a_into_b = a
        .target_position
        .transformed_by_deletion(&b.source_position, b.how_many)
        .is_none();
    let b_into_a = b
        .target_position
        .transformed_by_deletion(&a.source_position, a.how_many)
        .is_none();
    if a_into_b && b_into_a {
        return vec![reversed(b)];
    }

    if range_a.contains_position(&b.target_position) && range_a.contains_range(&range_b) {
        let start = range_a
            .start
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        let end = range_a
            .end
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        return make_move_operations(vec![Range::spanning(start, end)], new_target);
    }

    if range_b.contains_position(&a.target_position) && range_b.contains_range(&range_a) {
        let start = range_a.start.combined(&b.source_position, &b_insertion);
        let end = range_a.end.combined(&b.source_position, &b_insertion);
        return make_move_operations(vec![Range::spanning(start, end)], new_target);
    }

    if is_nested(&a.source_position, &b.source_position) {
        let start = range_a
            .start
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        let end = range_a
            .end
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        return make_move_operations(vec![Range::spanning(start, end)], new_target);
    }

    // A remove always beats a move of the same nodes
    let a_is_strong = match (a.is_remove(), b.is_remove()) {
        (true, false) => true,
        (false, true) => false,
        _ => context.a_is_strong,
    };

    // `b` spreads around nodes moved between its own: they stay where `b` detached
    if a.target_position.has_same_parent_as(&b.source_position)
        && range_b.contains_position(&a.target_position)
    {
        new_target = b
            .source_position
            .transformed_by_insertion(&b_insertion, b.how_many);
    }

    let mut ranges = Vec::new();
    for difference in range_a.difference(&range_b) {
        let start = difference
            .start
            .transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| b.source_position.clone());
        let end = difference
            .end
            .transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| b.source_position.clone());
        let difference = Range::spanning(start, end);

        let spread = difference.start.has_same_parent_as(&b_insertion);
        ranges.extend(difference.transformed_by_insertion(&b_insertion, b.how_many, spread));
    }

    if let Some(common) = range_a.intersection(&range_b) {
        if a_is_strong {
            let common = Range::spanning(
                common.start.combined(&b.source_position, &b_insertion),
                common.end.combined(&b.source_position, &b_insertion),
            );
            match ranges.len() {
                0 => ranges.push(common),
                1 if !range_b.start.is_after(&range_a.start) => ranges.insert(0, common),
                1 => ranges.push(common),
                _ => ranges.insert(1, common),
            }
        }
    }

    if ranges.is_empty() {
        return vec![OperationKind::NoOp];
    }
    make_move_operations(ranges, new_target)
}

/// Parents of the two sources sit on one branch at different depths
fn is_nested(a: &Position, b: &Position) -> bool {
    if a.root != b.root {
        return false;
    }
    let a_parent = a.parent_path();
    let b_parent = b.parent_path();
    a_parent.len() != b_parent.len()
        && (a_parent.starts_with(b_parent) || b_parent.starts_with(a_parent))
}

fn reversed(b: &MoveOperation) -> OperationKind {
    let insertion = b.insertion_position();
    OperationKind::Move(MoveOperation {
        source_position: insertion.clone(),
        how_many: b.how_many,
        target_position: b
            .source_position
            .transformed_by_insertion(&insertion, b.how_many),
    })
}

fn by_split(a: &MoveOperation, b: &SplitOperation) -> Vec<OperationKind> {
    let move_range = a.source_range();
    let graveyard = b.graveyard_position.as_ref();
    let new_target = a.target_position.transformed_by_split(
        &b.split_position,
        &b.insertion_position,
        graveyard,
    );

    // The moved range ended where the new element appears: take it too
    if move_range.end == b.insertion_position {
        let mut a = a.clone();
        if graveyard.is_none() {
            a.how_many += 1;
        }
        a.target_position = new_target;
        return vec![OperationKind::Move(a)];
    }

    if move_range.start.has_same_parent_as(&b.split_position)
        && move_range.contains_position(&b.split_position)
    {
        let head = Range::spanning(move_range.start.clone(), b.split_position.clone());
        let tail = Range::spanning(b.split_position.clone(), move_range.end.clone())
            .transformed_by_split(&b.split_position, &b.insertion_position, graveyard);
        return make_move_operations(vec![head, tail], new_target);
    }

    let mut ranges = vec![move_range.transformed_by_split(
        &b.split_position,
        &b.insertion_position,
        graveyard,
    )];

    // The element the split resurrected was among the moved nodes
    if let Some(graveyard) = graveyard {
        if a.how_many > 1
            && (move_range.start == *graveyard || move_range.contains_position(graveyard))
        {
            ranges.push(Range::from_position_and_shift(b.insertion_position.clone(), 1));
        }
    }

    make_move_operations(ranges, new_target)
}

fn by_merge(a: &MoveOperation, b: &MergeOperation) -> Vec<OperationKind> {
    let move_range = a.source_range();
    let deletion = b.deletion_position();

    if deletion.has_same_parent_as(&a.source_position)
        && move_range.contains_range(&Range::from_position_and_shift(deletion.clone(), 1))
    {
        if a.is_remove() {
            return remove_merged_elements(a, b, &deletion);
        }
        if a.how_many == 1 {
            return vec![OperationKind::NoOp];
        }
    }

    let range = move_range.transformed_by_merge(
        &b.source_position,
        &b.target_position,
        &b.graveyard_position,
    );
    let mut a = a.clone();
    a.how_many = range.how_many();
    a.source_position = range.start;
    a.target_position = a.target_position.transformed_by_merge(
        &b.source_position,
        &b.target_position,
        &b.graveyard_position,
    );
    vec![OperationKind::Move(a)]
}

/// `a` removes both elements `b` merged: remove what is left in the tree,
/// bring the merged element back out of the graveyard next to it and give
/// it its content back
fn remove_merged_elements(
    a: &MoveOperation,
    b: &MergeOperation,
    deletion: &Position,
) -> Vec<OperationKind> {
    let mut results = Vec::new();

    if a.how_many > 1 {
        results.push(OperationKind::Move(MoveOperation {
            source_position: a.source_position.clone(),
            how_many: a.how_many - 1,
            target_position: a.target_position.clone(),
        }));
    }

    let graveyard_source = b
        .graveyard_position
        .transformed_by_move(&a.source_position, &a.target_position, a.how_many.saturating_sub(1));
    let graveyard_target = deletion.combined(&a.source_position, &a.target_position);
    let resurrect = MoveOperation {
        source_position: graveyard_source,
        how_many: 1,
        target_position: graveyard_target,
    };

    let mut content_source = b.target_position.clone();
    if let Some(OperationKind::Move(first)) = results.first() {
        content_source = content_source.transformed_by_move(
            &first.source_position,
            &first.target_position,
            first.how_many,
        );
    }
    content_source = content_source.transformed_by_move(
        &resurrect.source_position,
        &resurrect.target_position,
        1,
    );
    let content_target = resurrect.insertion_position().child(0);

    results.push(OperationKind::Move(resurrect));
    results.push(OperationKind::Move(MoveOperation {
        source_position: content_source,
        how_many: b.how_many,
        target_position: content_target,
    }));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::transform::{transform as transform_op, TransformContext};
    use scribe_model::Node;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end)).unwrap()
    }

    fn moves(ops: &[Operation]) -> Vec<MoveOperation> {
        ops.iter()
            .map(|op| match &op.kind {
                OperationKind::Move(op) => op.clone(),
                other => panic!("Expected move, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_move_grows_with_insert_inside() {
        let a = Operation::move_range(0, &range(&[0, 1], &[0, 4]), pos(&[1, 0])).unwrap();
        let b = Operation::insert(0, pos(&[0, 2]), vec![Node::text("xy")]);

        let result = moves(&transform_op(&a, &b, TransformContext::new(true)));
        assert_eq!(result[0].source_position, pos(&[0, 1]));
        assert_eq!(result[0].how_many, 5);
        assert_eq!(result[0].target_position, pos(&[1, 0]));
    }

    #[test]
    fn test_same_range_removed_twice() {
        let a = Operation::remove(0, &range(&[0, 0], &[0, 3])).unwrap();
        let b = Operation::remove(0, &range(&[0, 0], &[0, 3])).unwrap();

        // Either way the nodes are already where `a` puts them
        for strong in [true, false] {
            let result = transform_op(&a, &b, TransformContext::new(strong));
            assert!(result.iter().all(Operation::is_no_op));
        }
    }

    #[test]
    fn test_remove_beats_move() {
        let a = Operation::remove(0, &range(&[0, 0], &[0, 3])).unwrap();
        let b = Operation::move_range(0, &range(&[0, 0], &[0, 3]), pos(&[1, 0])).unwrap();

        let result = moves(&transform_op(&a, &b, TransformContext::new(false)));
        assert_eq!(result[0].source_position, pos(&[1, 0]));
        assert_eq!(result[0].how_many, 3);
    }

    #[test]
    fn test_partially_overlapping_remove() {
        let a = Operation::remove(0, &range(&[0, 2], &[0, 6])).unwrap();
        let b = Operation::remove(0, &range(&[0, 0], &[0, 4])).unwrap();

        let result = moves(&transform_op(&a, &b, TransformContext::new(false)));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_position, pos(&[0, 0]));
        assert_eq!(result[0].how_many, 2);
    }

    #[test]
    fn test_move_split_in_the_middle() {
        let a = Operation::move_range(0, &range(&[0, 1], &[0, 5]), pos(&[2, 0])).unwrap();
        let b = Operation::split(0, pos(&[0, 3]), 3, None);

        let result = moves(&transform_op(&a, &b, TransformContext::new(true)));
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].source_position, pos(&[0, 1]));
        assert_eq!(result[0].how_many, 2);
        assert_eq!(result[0].target_position, pos(&[3, 0]));
        assert_eq!(result[1].source_position, pos(&[1, 0]));
        assert_eq!(result[1].how_many, 2);
        assert_eq!(result[1].target_position, pos(&[3, 2]));
    }

    #[test]
    fn test_moving_merged_element_alone_is_dropped() {
        let a = Operation::move_range(0, &range(&[1], &[2]), pos(&[3])).unwrap();
        let b = Operation::merge(0, pos(&[1, 0]), 3, pos(&[0, 3]), Position::graveyard(0));

        let result = transform_op(&a, &b, TransformContext::new(true));
        assert!(result[0].is_no_op());
    }

    #[test]
    fn test_remove_of_both_merged_elements() {
        let a = Operation::remove(0, &range(&[0], &[2])).unwrap();
        let b = Operation::merge(0, pos(&[1, 0]), 3, pos(&[0, 3]), Position::graveyard(0));

        // The merged element already sits next to the removed one in the graveyard
        let result = moves(&transform_op(&a, &b, TransformContext::new(true)));
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].source_position, pos(&[0]));
        assert_eq!(result[0].how_many, 1);
        assert_eq!(result[1].source_position, Position::new("$graveyard", vec![0, 3]));
        assert_eq!(result[1].how_many, 3);
        assert_eq!(result[1].target_position, Position::new("$graveyard", vec![1, 0]));
    }

    #[test]
    fn test_move_into_removed_range_lands_at_removal_point() {
        let a = Operation::move_range(0, &range(&[3], &[4]), pos(&[1])).unwrap();
        let b = Operation::remove(0, &range(&[0], &[2])).unwrap();

        for strong in [true, false] {
            let result = moves(&transform_op(&a, &b, TransformContext::new(strong)));
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].source_position, pos(&[1]));
            assert_eq!(result[0].how_many, 1);
            assert_eq!(result[0].target_position, pos(&[0]));
        }
    }

    #[test]
    fn test_move_next_to_removed_paragraph_is_dropped() {
        let a = Operation::move_range(0, &range(&[0], &[1]), pos(&[2])).unwrap();
        let b = Operation::remove(0, &range(&[1], &[3])).unwrap();

        let result = transform_op(&a, &b, TransformContext::new(true));
        assert!(result.iter().all(Operation::is_no_op));
    }

    #[test]
    fn test_in_place_move_changes_nothing() {
        let in_place = Operation::move_range(0, &range(&[1], &[2]), pos(&[2])).unwrap();
        let insert = Operation::insert(0, pos(&[1, 1]), vec![Node::text("x")]);

        let result = transform_op(&insert, &in_place, TransformContext::new(true));
        assert_eq!(result, vec![insert.clone()]);

        let result = transform_op(&in_place, &insert, TransformContext::new(true));
        assert!(result.iter().all(Operation::is_no_op));
    }
}
