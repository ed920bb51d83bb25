use super::{transform_live_range, TransformContext};
use crate::operation::{MarkerOperation, OperationKind};

pub(super) fn transform(
    a: &MarkerOperation,
    b: &OperationKind,
    context: TransformContext,
) -> Vec<OperationKind> {
    let mut a = a.clone();

    match b {
        OperationKind::Marker(b) if a.name == b.name => {
            if !context.a_is_strong {
                return vec![OperationKind::NoOp];
            }
            a.old_range = b.new_range.clone();
        }
        OperationKind::Marker(_) => {}
        _ => {
            a.old_range = a.old_range.map(|range| transform_live_range(&range, b));
            a.new_range = a.new_range.map(|range| transform_live_range(&range, b));
        }
    }

    vec![OperationKind::Marker(a)]
}
