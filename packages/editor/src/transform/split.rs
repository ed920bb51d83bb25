use super::{transform_position, TransformContext};
use crate::operation::{
    InsertOperation, MergeOperation, MoveOperation, OperationKind, SplitOperation,
};
use scribe_model::{Position, Stickiness};

pub(super) fn transform(
    a: &SplitOperation,
    b: &OperationKind,
    context: TransformContext,
) -> Vec<OperationKind> {
    match b {
        OperationKind::Insert(b) => by_insert(a, b),
        OperationKind::Move(b) => by_move(a, b),
        OperationKind::Split(b) => by_split(a, b, context),
        OperationKind::Merge(b) => by_merge(a, b),
        OperationKind::Rename(_)
        | OperationKind::Attribute(_)
        | OperationKind::Marker(_)
        | OperationKind::NoOp => vec![OperationKind::Split(a.clone())],
    }
}

/// Move the split position through `b`. An insertion position right after
/// the split element stays right after it; any other one is transformed.
fn reposition(a: &mut SplitOperation, b: &OperationKind, split_stickiness: Stickiness) {
    let adjacent = a.insertion_position == Position::split_insertion_position(&a.split_position);
    a.split_position = transform_position(&a.split_position, b, split_stickiness);
    a.insertion_position = if adjacent {
        Position::split_insertion_position(&a.split_position)
    } else {
        transform_position(&a.insertion_position, b, Stickiness::ToNone)
    };
}

fn by_insert(a: &SplitOperation, b: &InsertOperation) -> Vec<OperationKind> {
    let mut a = a.clone();
    if a.split_position.has_same_parent_as(&b.position)
        && a.split_position.offset() < b.position.offset()
    {
        a.how_many += b.how_many;
    }
    if let Some(graveyard) = &a.graveyard_position {
        a.graveyard_position = Some(graveyard.transformed_by_insertion(&b.position, b.how_many));
    }
    reposition(&mut a, &OperationKind::Insert(b.clone()), Stickiness::ToNext);
    vec![OperationKind::Split(a)]
}

fn by_move(a: &SplitOperation, b: &MoveOperation) -> Vec<OperationKind> {
    let mut a = a.clone();
    let range_to_move = b.source_range();

    if let Some(graveyard) = a.graveyard_position.clone() {
        // The element this split would resurrect was moved elsewhere:
        // move the content into it wherever it now is
        if range_to_move.start == graveyard || range_to_move.contains_position(&graveyard) {
            let source = a.split_position.transformed_by_move_with(
                &b.source_position,
                &b.target_position,
                b.how_many,
                Stickiness::ToNext,
            );
            let element = graveyard.transformed_by_move(&b.source_position, &b.target_position, b.how_many);
            return vec![OperationKind::Move(MoveOperation {
                source_position: source,
                how_many: a.how_many,
                target_position: element.child(0),
            })];
        }
        a.graveyard_position =
            Some(graveyard.transformed_by_move(&b.source_position, &b.target_position, b.how_many));
    }

    // Split inside the moved nodes: split where they used to start
    if a.split_position.has_same_parent_as(&b.source_position)
        && range_to_move.contains_position(&a.split_position)
    {
        let moved_after_split = b.how_many - (a.split_position.offset() - b.source_position.offset());
        a.how_many = a.how_many.saturating_sub(moved_after_split);
        if a.split_position.has_same_parent_as(&b.target_position)
            && a.split_position.offset() < b.target_position.offset()
        {
            a.how_many += b.how_many;
        }
        a.split_position = b
            .source_position
            .transformed_by_insertion(&b.insertion_position(), b.how_many);
        a.insertion_position = Position::split_insertion_position(&a.split_position);
        return vec![OperationKind::Split(a)];
    }

    if b.source_position != b.target_position {
        if a.split_position.has_same_parent_as(&b.source_position)
            && a.split_position.offset() <= b.source_position.offset()
        {
            a.how_many = a.how_many.saturating_sub(b.how_many);
        }
        if a.split_position.has_same_parent_as(&b.target_position)
            && a.split_position.offset() < b.target_position.offset()
        {
            a.how_many += b.how_many;
        }
    }

    reposition(&mut a, &OperationKind::Move(b.clone()), Stickiness::ToNone);
    vec![OperationKind::Split(a)]
}

fn by_split(a: &SplitOperation, b: &SplitOperation, context: TransformContext) -> Vec<OperationKind> {
    let mut a = a.clone();

    if a.split_position == b.split_position {
        let same_source = match (&a.graveyard_position, &b.graveyard_position) {
            (None, None) => true,
            (Some(left), Some(right)) => left == right,
            _ => false,
        };
        if same_source {
            return vec![OperationKind::NoOp];
        }
    }

    if let (Some(left), Some(right)) = (&a.graveyard_position, &b.graveyard_position) {
        if left == right {
            // Both resurrect the same element from different places
            let a_in_graveyard = a.split_position.is_in_graveyard();
            let b_in_graveyard = b.split_position.is_in_graveyard();
            let a_is_weak = a_in_graveyard && !b_in_graveyard;
            let b_is_weak = b_in_graveyard && !a_in_graveyard;
            let force_move = b_is_weak || (!a_is_weak && context.a_is_strong);

            if !force_move {
                return vec![OperationKind::NoOp];
            }

            let mut result = Vec::new();
            if b.how_many > 0 {
                result.push(OperationKind::Move(MoveOperation {
                    source_position: b.move_target_position(),
                    how_many: b.how_many,
                    target_position: b.split_position.clone(),
                }));
            }
            if a.how_many > 0 {
                result.push(OperationKind::Move(MoveOperation {
                    source_position: a.split_position.clone(),
                    how_many: a.how_many,
                    target_position: a.move_target_position(),
                }));
            }
            return result;
        }
    }

    if let Some(graveyard) = &a.graveyard_position {
        a.graveyard_position = Some(graveyard.transformed_by_split(
            &b.split_position,
            &b.insertion_position,
            b.graveyard_position.as_ref(),
        ));
    }

    if a.split_position.has_same_parent_as(&b.split_position)
        && a.split_position.offset() < b.split_position.offset()
    {
        a.how_many = a.how_many.saturating_sub(b.how_many);
    }

    reposition(&mut a, &OperationKind::Split(b.clone()), Stickiness::ToNext);
    vec![OperationKind::Split(a)]
}

fn by_merge(a: &SplitOperation, b: &MergeOperation) -> Vec<OperationKind> {
    let mut a = a.clone();

    // Split at the end of the merge target: it stays after the merged content
    if a.split_position == b.target_position {
        a.split_position = b
            .target_position
            .transformed_by_merge(&b.source_position, &b.target_position, &b.graveyard_position)
            .shifted_by(b.how_many as isize);
        a.insertion_position = Position::split_insertion_position(&a.split_position);
        if let Some(graveyard) = &a.graveyard_position {
            a.graveyard_position = Some(graveyard.transformed_by_merge(
                &b.source_position,
                &b.target_position,
                &b.graveyard_position,
            ));
        }
        return vec![OperationKind::Split(a)];
    }

    // Splitting the element `b` merged away: first resurrect an empty
    // element from the graveyard copy so both sites can reuse it
    if a.graveyard_position.is_none() && a.split_position.has_same_parent_as(&b.source_position) {
        let split_position = b.graveyard_position.child(0);
        let insertion_position = Position::split_insertion_position(&split_position);
        let additional = SplitOperation {
            split_position,
            how_many: 0,
            insertion_position: insertion_position.clone(),
            graveyard_position: None,
        };

        a.split_position = a.split_position.transformed_by_merge_with(
            &b.source_position,
            &b.target_position,
            &b.graveyard_position,
            Stickiness::ToNext,
        );
        a.insertion_position = Position::split_insertion_position(&a.split_position);
        a.graveyard_position = Some(insertion_position);

        return vec![OperationKind::Split(additional), OperationKind::Split(a)];
    }

    let deletion = b.deletion_position();
    if a.split_position.has_same_parent_as(&deletion) && !a.split_position.is_after(&deletion) {
        a.how_many = a.how_many.saturating_sub(1);
    }
    if a.split_position.has_same_parent_as(&b.target_position) {
        a.how_many += b.how_many;
    }
    if let Some(graveyard) = &a.graveyard_position {
        a.graveyard_position = Some(graveyard.transformed_by_merge(
            &b.source_position,
            &b.target_position,
            &b.graveyard_position,
        ));
    }

    a.split_position = a.split_position.transformed_by_merge_with(
        &b.source_position,
        &b.target_position,
        &b.graveyard_position,
        Stickiness::ToNext,
    );
    a.insertion_position = Position::split_insertion_position(&a.split_position);
    vec![OperationKind::Split(a)]
}
