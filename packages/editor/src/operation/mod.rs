//! # Operations
//!
//! Atomic, invertible mutations of the document tree.
//!
//! ## Design Principles
//!
//! 1. **Values only**: Operations hold positions, never references into the tree
//! 2. **Invertible**: Every operation has an exact inverse ([`Operation::reversed`])
//! 3. **Versioned**: An operation applies only at the version it was built against
//!
//! ## Operation Semantics
//!
//! ### Move
//! - `target_position` is expressed before the moved nodes are detached
//! - A move into the graveyard root is a remove; a move out of it is a restore
//!
//! ### Split
//! - Everything after `split_position` moves into a new sibling element
//! - With `graveyard_position`, the sibling is resurrected from the graveyard
//!   instead of cloned, so that split can undo a merge
//!
//! ### Merge
//! - All children of the merged element move to `target_position`
//! - The emptied element goes to `graveyard_position`

mod apply;

pub(crate) use apply::{apply, validate};

use crate::errors::{EditorError, EditorResult};
use scribe_model::{Node, Position, Range};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A versioned operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Document version this operation was created against
    pub base_version: u64,

    #[serde(flatten)]
    pub kind: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OperationKind {
    Insert(InsertOperation),
    Move(MoveOperation),
    Split(SplitOperation),
    Merge(MergeOperation),
    Rename(RenameOperation),
    Attribute(AttributeOperation),
    Marker(MarkerOperation),
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOperation {
    pub position: Position,
    pub nodes: Vec<Node>,
    /// Total offset size of `nodes`
    pub how_many: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOperation {
    pub source_position: Position,
    pub how_many: usize,
    pub target_position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOperation {
    pub split_position: Position,
    /// Offsets moved into the new element (everything after `split_position`)
    pub how_many: usize,
    /// Where the new element is inserted, right after the split one unless
    /// the split reverses a merge of non-adjacent elements
    pub insertion_position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graveyard_position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOperation {
    /// Always at offset 0 of the merged element
    pub source_position: Position,
    pub how_many: usize,
    pub target_position: Position,
    pub graveyard_position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOperation {
    /// Position right before the renamed element
    pub position: Position,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOperation {
    /// Flat range; every node in it has `old_value` for `key`
    pub range: Range,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerOperation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_range: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_range: Option<Range>,
    #[serde(default)]
    pub affects_data: bool,
}

impl InsertOperation {
    pub fn new(position: Position, nodes: Vec<Node>) -> Self {
        let how_many = nodes.iter().map(Node::offset_size).sum();
        Self {
            position,
            nodes,
            how_many,
        }
    }
}

impl MoveOperation {
    pub fn source_range(&self) -> Range {
        Range::from_position_and_shift(self.source_position.clone(), self.how_many)
    }

    /// Where the nodes land once detached
    pub fn insertion_position(&self) -> Position {
        self.target_position
            .transformed_by_deletion(&self.source_position, self.how_many)
            .unwrap_or_else(|| self.source_position.clone())
    }

    pub fn is_remove(&self) -> bool {
        self.target_position.is_in_graveyard() && !self.source_position.is_in_graveyard()
    }

    /// The nodes land where they already are
    pub fn is_in_place(&self) -> bool {
        self.how_many == 0 || self.insertion_position() == self.source_position
    }
}

impl SplitOperation {
    /// First position inside the new element
    pub fn move_target_position(&self) -> Position {
        self.insertion_position.child(0)
    }

    /// Position right before the split element
    pub fn split_element_position(&self) -> Position {
        self.split_position.parent()
    }
}

impl MergeOperation {
    /// Position of the merged element
    pub fn deletion_position(&self) -> Position {
        self.source_position.parent()
    }
}

impl Operation {
    pub fn new(base_version: u64, kind: OperationKind) -> Self {
        Self { base_version, kind }
    }

    pub fn insert(base_version: u64, position: Position, nodes: Vec<Node>) -> Self {
        Self::new(
            base_version,
            OperationKind::Insert(InsertOperation::new(position, nodes)),
        )
    }

    /// Move the nodes of a flat `range` to `target`
    pub fn move_range(base_version: u64, range: &Range, target: Position) -> EditorResult<Self> {
        if !range.is_flat() {
            return Err(scribe_model::ModelError::invalid_range("moved range must be flat").into());
        }
        Ok(Self::new(
            base_version,
            OperationKind::Move(MoveOperation {
                source_position: range.start.clone(),
                how_many: range.how_many(),
                target_position: target,
            }),
        ))
    }

    /// Move the nodes of a flat `range` to the start of the graveyard
    pub fn remove(base_version: u64, range: &Range) -> EditorResult<Self> {
        Self::move_range(base_version, range, Position::graveyard(0))
    }

    pub fn split(
        base_version: u64,
        split_position: Position,
        how_many: usize,
        graveyard_position: Option<Position>,
    ) -> Self {
        let insertion_position = Position::split_insertion_position(&split_position);
        Self::new(
            base_version,
            OperationKind::Split(SplitOperation {
                split_position,
                how_many,
                insertion_position,
                graveyard_position,
            }),
        )
    }

    pub fn merge(
        base_version: u64,
        source_position: Position,
        how_many: usize,
        target_position: Position,
        graveyard_position: Position,
    ) -> Self {
        Self::new(
            base_version,
            OperationKind::Merge(MergeOperation {
                source_position,
                how_many,
                target_position,
                graveyard_position,
            }),
        )
    }

    pub fn rename(
        base_version: u64,
        position: Position,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        Self::new(
            base_version,
            OperationKind::Rename(RenameOperation {
                position,
                old_name: old_name.into(),
                new_name: new_name.into(),
            }),
        )
    }

    pub fn attribute(
        base_version: u64,
        range: Range,
        key: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self::new(
            base_version,
            OperationKind::Attribute(AttributeOperation {
                range,
                key: key.into(),
                old_value,
                new_value,
            }),
        )
    }

    pub fn marker(
        base_version: u64,
        name: impl Into<String>,
        old_range: Option<Range>,
        new_range: Option<Range>,
        affects_data: bool,
    ) -> Self {
        Self::new(
            base_version,
            OperationKind::Marker(MarkerOperation {
                name: name.into(),
                old_range,
                new_range,
                affects_data,
            }),
        )
    }

    pub fn no_op(base_version: u64) -> Self {
        Self::new(base_version, OperationKind::NoOp)
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self.kind, OperationKind::NoOp)
    }

    /// Same kind and fields, different base version
    pub fn with_base_version(mut self, base_version: u64) -> Self {
        self.base_version = base_version;
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            OperationKind::Insert(_) => "insert",
            OperationKind::Move(op) if op.is_remove() => "remove",
            OperationKind::Move(op) if op.source_position.is_in_graveyard() => "reinsert",
            OperationKind::Move(_) => "move",
            OperationKind::Split(_) => "split",
            OperationKind::Merge(_) => "merge",
            OperationKind::Rename(_) => "rename",
            OperationKind::Attribute(_) => "attribute",
            OperationKind::Marker(_) => "marker",
            OperationKind::NoOp => "noOp",
        }
    }

    /// The operation that undoes this one, based on the version right after it
    pub fn reversed(&self) -> Operation {
        let base_version = self.base_version + 1;
        let kind = match &self.kind {
            OperationKind::Insert(op) => OperationKind::Move(MoveOperation {
                source_position: op.position.clone(),
                how_many: op.how_many,
                target_position: Position::graveyard(0),
            }),

            OperationKind::Move(op) => {
                let insertion = op.insertion_position();
                OperationKind::Move(MoveOperation {
                    source_position: insertion.clone(),
                    how_many: op.how_many,
                    target_position: op
                        .source_position
                        .transformed_by_insertion(&insertion, op.how_many),
                })
            }

            OperationKind::Split(op) => OperationKind::Merge(MergeOperation {
                source_position: op.move_target_position(),
                how_many: op.how_many,
                target_position: op
                    .split_position
                    .transformed_by_insertion(&op.insertion_position, 1),
                graveyard_position: Position::graveyard(0),
            }),

            OperationKind::Merge(op) => {
                let split_position = op.target_position.transformed_by_merge(
                    &op.source_position,
                    &op.target_position,
                    &op.graveyard_position,
                );
                let insertion_position = op.deletion_position().transformed_by_merge(
                    &op.source_position,
                    &op.target_position,
                    &op.graveyard_position,
                );
                OperationKind::Split(SplitOperation {
                    split_position,
                    how_many: op.how_many,
                    insertion_position,
                    graveyard_position: Some(op.graveyard_position.clone()),
                })
            }

            OperationKind::Rename(op) => OperationKind::Rename(RenameOperation {
                position: op.position.clone(),
                old_name: op.new_name.clone(),
                new_name: op.old_name.clone(),
            }),

            OperationKind::Attribute(op) => OperationKind::Attribute(AttributeOperation {
                range: op.range.clone(),
                key: op.key.clone(),
                old_value: op.new_value.clone(),
                new_value: op.old_value.clone(),
            }),

            OperationKind::Marker(op) => OperationKind::Marker(MarkerOperation {
                name: op.name.clone(),
                old_range: op.new_range.clone(),
                new_range: op.old_range.clone(),
                affects_data: op.affects_data,
            }),

            OperationKind::NoOp => OperationKind::NoOp,
        };
        Operation::new(base_version, kind)
    }

    /// Checks that need no tree: declared lengths and range shapes
    pub fn validate(&self) -> EditorResult<()> {
        match &self.kind {
            OperationKind::Insert(op) => {
                let computed: usize = op.nodes.iter().map(Node::offset_size).sum();
                if computed != op.how_many {
                    return Err(EditorError::invalid_operation(format!(
                        "insert declares {} offsets but its nodes take {}",
                        op.how_many, computed
                    )));
                }
                Ok(())
            }
            OperationKind::Move(op) => {
                let moved = op.source_range();
                let target = &op.target_position;
                if target.path.len() > op.source_position.path.len()
                    && (moved.contains_position(target) || *target == op.source_position)
                {
                    return Err(EditorError::invalid_operation(
                        "trying to move a range of nodes into one of the moved nodes",
                    ));
                }
                Ok(())
            }
            OperationKind::Merge(op) => {
                if op.source_position.offset() != 0 {
                    return Err(EditorError::invalid_operation(
                        "merge source must be at the start of the merged element",
                    ));
                }
                Ok(())
            }
            OperationKind::Attribute(op) => {
                if !op.range.is_flat() {
                    return Err(scribe_model::ModelError::invalid_range(
                        "attribute range must be flat",
                    )
                    .into());
                }
                Ok(())
            }
            OperationKind::Split(_)
            | OperationKind::Rename(_)
            | OperationKind::Marker(_)
            | OperationKind::NoOp => Ok(()),
        }
    }

    pub fn to_json(&self) -> EditorResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a serialized operation
    pub fn from_json(json: &str) -> EditorResult<Self> {
        let operation: Operation = serde_json::from_str(json)?;
        operation.validate()?;
        Ok(operation)
    }
}
