use crate::operation::Operation;
use serde::{Deserialize, Serialize};

/// How a batch takes part in undo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchType {
    /// A user action, recorded for undo
    #[default]
    Default,
    /// Not recorded for undo (remote changes, undo steps themselves)
    Transparent,
}

/// Operations forming one atomic change, in application order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub batch_type: BatchType,
    operations: Vec<Operation>,
}

impl Batch {
    pub fn new(batch_type: BatchType) -> Self {
        Self {
            batch_type,
            operations: Vec::new(),
        }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Version the first operation was applied at
    pub fn base_version(&self) -> Option<u64> {
        self.operations.first().map(|operation| operation.base_version)
    }

    pub(crate) fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_base_version() {
        let mut batch = Batch::new(BatchType::Default);
        assert!(batch.is_empty());
        assert_eq!(batch.base_version(), None);

        batch.push(Operation::no_op(4));
        batch.push(Operation::no_op(5));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.base_version(), Some(4));
    }
}
