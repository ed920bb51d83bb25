use super::TransformContext;
use crate::operation::{
    InsertOperation, MergeOperation, MoveOperation, OperationKind, SplitOperation,
};
use scribe_model::{Range, Stickiness};

pub(super) fn transform(
    a: &MergeOperation,
    b: &OperationKind,
    context: TransformContext,
) -> Vec<OperationKind> {
    match b {
        OperationKind::Insert(b) => by_insert(a, b),
        OperationKind::Move(b) => by_move(a, b),
        OperationKind::Split(b) => by_split(a, b),
        OperationKind::Merge(b) => by_merge(a, b, context),
        OperationKind::Rename(_)
        | OperationKind::Attribute(_)
        | OperationKind::Marker(_)
        | OperationKind::NoOp => vec![OperationKind::Merge(a.clone())],
    }
}

fn by_insert(a: &MergeOperation, b: &InsertOperation) -> Vec<OperationKind> {
    let mut a = a.clone();
    if a.source_position.has_same_parent_as(&b.position) {
        a.how_many += b.how_many;
    }
    a.source_position =
        a.source_position
            .transformed_by_insertion_with(&b.position, b.how_many, Stickiness::ToPrevious);
    a.target_position =
        a.target_position
            .transformed_by_insertion_with(&b.position, b.how_many, Stickiness::ToNext);
    vec![OperationKind::Merge(a)]
}

fn by_move(a: &MergeOperation, b: &MoveOperation) -> Vec<OperationKind> {
    let mut a = a.clone();
    let removed = b.source_range();

    // The merged element itself was removed
    if b.is_remove()
        && a.deletion_position().has_same_parent_as(&b.source_position)
        && removed.contains_range(&Range::from_position_and_shift(a.deletion_position(), 1))
    {
        return vec![OperationKind::NoOp];
    }

    if a.source_position.has_same_parent_as(&b.target_position) {
        a.how_many += b.how_many;
    }
    if a.source_position.has_same_parent_as(&b.source_position) {
        a.how_many = a.how_many.saturating_sub(b.how_many);
    }

    a.source_position = a.source_position.transformed_by_move_with(
        &b.source_position,
        &b.target_position,
        b.how_many,
        Stickiness::ToPrevious,
    );
    a.target_position = a.target_position.transformed_by_move_with(
        &b.source_position,
        &b.target_position,
        b.how_many,
        Stickiness::ToNext,
    );
    if a.graveyard_position != b.target_position {
        a.graveyard_position =
            a.graveyard_position
                .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
    }
    vec![OperationKind::Merge(a)]
}

fn by_split(a: &MergeOperation, b: &SplitOperation) -> Vec<OperationKind> {
    let mut a = a.clone();
    let graveyard = b.graveyard_position.as_ref();

    // The target element was split at the merge target: the merge goes
    // into the part still holding the original element's end
    if a.target_position == b.split_position {
        let merge_inside = b.how_many != 0;
        let resurrected_merged = graveyard == Some(&a.deletion_position());
        if merge_inside || resurrected_merged {
            a.source_position = a.source_position.transformed_by_split(
                &b.split_position,
                &b.insertion_position,
                graveyard,
            );
            return vec![OperationKind::Merge(a)];
        }
    }

    // The merged element was split: merge its second half instead
    if a.source_position == b.split_position {
        let split_inside = b.split_position.offset() > 0;
        if split_inside {
            a.source_position = b.move_target_position();
            a.target_position = a.target_position.transformed_by_split(
                &b.split_position,
                &b.insertion_position,
                graveyard,
            );
            return vec![OperationKind::Merge(a)];
        }
    }

    if a.source_position.has_same_parent_as(&b.split_position) {
        a.how_many = b.split_position.offset();
    }
    a.source_position =
        a.source_position
            .transformed_by_split(&b.split_position, &b.insertion_position, graveyard);
    a.target_position =
        a.target_position
            .transformed_by_split(&b.split_position, &b.insertion_position, graveyard);
    vec![OperationKind::Merge(a)]
}

fn by_merge(a: &MergeOperation, b: &MergeOperation, context: TransformContext) -> Vec<OperationKind> {
    let mut a = a.clone();

    if a.source_position == b.source_position {
        if a.target_position == b.target_position {
            return vec![OperationKind::NoOp];
        }

        // Same element merged into different targets: the strong side moves
        // the content over to its own target
        if context.a_is_strong {
            let source = b.target_position.transformed_by_merge(
                &b.source_position,
                &b.target_position,
                &b.graveyard_position,
            );
            let target = a.target_position.transformed_by_merge(
                &b.source_position,
                &b.target_position,
                &b.graveyard_position,
            );
            return vec![OperationKind::Move(MoveOperation {
                source_position: source,
                how_many: a.how_many,
                target_position: target,
            })];
        }
        return vec![OperationKind::NoOp];
    }

    if a.source_position.has_same_parent_as(&b.target_position) {
        a.how_many += b.how_many;
    }

    a.source_position = a.source_position.transformed_by_merge(
        &b.source_position,
        &b.target_position,
        &b.graveyard_position,
    );
    a.target_position = a.target_position.transformed_by_merge(
        &b.source_position,
        &b.target_position,
        &b.graveyard_position,
    );
    if a.graveyard_position != b.graveyard_position || !context.a_is_strong {
        a.graveyard_position = a.graveyard_position.transformed_by_merge(
            &b.source_position,
            &b.target_position,
            &b.graveyard_position,
        );
    }
    vec![OperationKind::Merge(a)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::transform::{transform as transform_op, TransformContext};
    use scribe_model::{Node, Position};

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn merge_of(ops: &[Operation]) -> MergeOperation {
        match &ops[0].kind {
            OperationKind::Merge(op) => op.clone(),
            other => panic!("Expected merge, got {:?}", other),
        }
    }

    fn merge() -> Operation {
        Operation::merge(0, pos(&[1, 0]), 3, pos(&[0, 3]), Position::graveyard(0))
    }

    #[test]
    fn test_merge_grows_with_insert_into_merged_element() {
        let b = Operation::insert(0, pos(&[1, 0]), vec![Node::text("xy")]);

        let result = merge_of(&transform_op(&merge(), &b, TransformContext::new(true)));
        assert_eq!(result.source_position, pos(&[1, 0]));
        assert_eq!(result.how_many, 5);
        assert_eq!(result.target_position, pos(&[0, 3]));
    }

    #[test]
    fn test_merge_target_follows_insert_at_end_of_target() {
        let b = Operation::insert(0, pos(&[0, 3]), vec![Node::text("xy")]);

        let result = merge_of(&transform_op(&merge(), &b, TransformContext::new(true)));
        assert_eq!(result.target_position, pos(&[0, 5]));
        assert_eq!(result.how_many, 3);
    }

    #[test]
    fn test_merge_of_removed_element_is_no_op() {
        let range = Range::new(pos(&[1]), pos(&[2])).unwrap();
        let b = Operation::remove(0, &range).unwrap();

        let result = transform_op(&merge(), &b, TransformContext::new(true));
        assert!(result[0].is_no_op());
    }

    #[test]
    fn test_merge_after_split_of_merged_element() {
        let b = Operation::split(0, pos(&[1, 1]), 2, None);

        let result = merge_of(&transform_op(&merge(), &b, TransformContext::new(true)));
        assert_eq!(result.source_position, pos(&[1, 0]));
        assert_eq!(result.how_many, 1);
        assert_eq!(result.target_position, pos(&[0, 3]));
    }

    #[test]
    fn test_same_merge_twice_is_no_op() {
        let result = transform_op(&merge(), &merge(), TransformContext::new(false));
        assert!(result[0].is_no_op());
    }

    #[test]
    fn test_chained_merges() {
        // a merges [2] into [1], b merges [1] into [0]
        let a = Operation::merge(0, pos(&[2, 0]), 2, pos(&[1, 3]), Position::graveyard(0));
        let b = merge();

        let result = merge_of(&transform_op(&a, &b, TransformContext::new(true)));
        assert_eq!(result.source_position, pos(&[1, 0]));
        assert_eq!(result.target_position, pos(&[0, 6]));
    }
}
