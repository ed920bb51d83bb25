use super::{transform_position, TransformContext};
use crate::operation::{OperationKind, RenameOperation};
use scribe_model::Stickiness;

pub(super) fn transform(
    a: &RenameOperation,
    b: &OperationKind,
    context: TransformContext,
) -> Vec<OperationKind> {
    let mut a = a.clone();

    match b {
        OperationKind::Rename(b) if a.position == b.position => {
            if !context.a_is_strong {
                return vec![OperationKind::NoOp];
            }
            a.old_name = b.new_name.clone();
        }

        // Both halves of a split element get the new name
        OperationKind::Split(b)
            if b.graveyard_position.is_none() && a.position == b.split_element_position() =>
        {
            let mut second_half = a.clone();
            second_half.position = b.insertion_position.clone();
            return vec![OperationKind::Rename(a), OperationKind::Rename(second_half)];
        }

        // The renamed element was merged: rename it in the graveyard
        OperationKind::Merge(b) if a.position == b.deletion_position() => {
            a.position = b.graveyard_position.clone();
        }

        _ => {
            a.position = transform_position(&a.position, b, Stickiness::ToNext);
        }
    }

    vec![OperationKind::Rename(a)]
}
