use super::TransformContext;
use crate::operation::{InsertOperation, OperationKind};

pub(super) fn transform(
    a: &InsertOperation,
    b: &OperationKind,
    context: TransformContext,
) -> Vec<OperationKind> {
    let mut a = a.clone();

    match b {
        OperationKind::Insert(b) => {
            if a.position != b.position || !context.a_is_strong {
                a.position = a.position.transformed_by_insertion(&b.position, b.how_many);
            }
        }

        OperationKind::Move(b) => {
            let position = a
                .position
                .transformed_by_move(&b.source_position, &b.target_position, b.how_many);

            // Inserting strictly inside removed content: the content is gone
            if b.is_remove()
                && !a.position.is_in_graveyard()
                && position.is_in_graveyard()
                && position.path.len() == 1
            {
                return vec![OperationKind::NoOp];
            }
            a.position = position;
        }

        OperationKind::Split(b) => {
            a.position = a.position.transformed_by_split(
                &b.split_position,
                &b.insertion_position,
                b.graveyard_position.as_ref(),
            );
        }

        OperationKind::Merge(b) => {
            a.position = a.position.transformed_by_merge(
                &b.source_position,
                &b.target_position,
                &b.graveyard_position,
            );
        }

        OperationKind::Rename(_)
        | OperationKind::Attribute(_)
        | OperationKind::Marker(_)
        | OperationKind::NoOp => {}
    }

    vec![OperationKind::Insert(a)]
}
