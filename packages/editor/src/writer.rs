//! # Writer
//!
//! High-level edit helpers available inside [`Document::change`].
//!
//! Each helper reads the current tree, builds primitive operations against
//! the current version, applies them one at a time and records them in the
//! batch. Nothing is computed ahead: the second operation of a helper is
//! built after the first one has been applied.

use crate::batch::{Batch, BatchType};
use crate::document::Document;
use crate::errors::{EditorError, EditorResult};
use crate::operation::{Operation, OperationKind};
use crate::transform::make_move_operations;
use scribe_model::{Element, ModelError, Node, Position, Range};
use serde_json::Value;

pub struct Writer<'a> {
    document: &'a mut Document,
    batch: Batch,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(document: &'a mut Document, batch_type: BatchType) -> Self {
        Self {
            document,
            batch: Batch::new(batch_type),
        }
    }

    pub(crate) fn into_batch(self) -> Batch {
        self.batch
    }

    /// The document as of the last applied operation
    pub fn document(&self) -> &Document {
        &*self.document
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Apply a prebuilt operation and record it in the batch
    pub fn apply(&mut self, operation: Operation) -> EditorResult<()> {
        self.document.apply_operation(operation.clone())?;
        self.batch.push(operation);
        Ok(())
    }

    fn apply_kind(&mut self, kind: OperationKind) -> EditorResult<()> {
        let operation = Operation::new(self.document.version(), kind);
        self.apply(operation)
    }

    pub fn insert(&mut self, position: &Position, nodes: Vec<Node>) -> EditorResult<()> {
        if nodes.iter().all(|node| node.offset_size() == 0) {
            return Ok(());
        }
        let operation = Operation::insert(self.document.version(), position.clone(), nodes);
        self.apply(operation)
    }

    pub fn insert_text(&mut self, position: &Position, text: &str) -> EditorResult<()> {
        self.insert(position, vec![Node::text(text)])
    }

    pub fn insert_element(&mut self, position: &Position, element: Element) -> EditorResult<()> {
        self.insert(position, vec![Node::element(element)])
    }

    /// Remove everything in `range`, which may span several levels
    pub fn remove(&mut self, range: &Range) -> EditorResult<()> {
        let flat_ranges = self.document.tree().flat_ranges(range)?;

        // Later ranges first so earlier ones keep their offsets
        for flat in flat_ranges.iter().rev().filter(|flat| !flat.is_collapsed()) {
            let operation = Operation::remove(self.document.version(), flat)?;
            self.apply(operation)?;
        }
        Ok(())
    }

    /// Move a flat range; `target` is addressed before the range is detached
    pub fn move_range(&mut self, range: &Range, target: &Position) -> EditorResult<()> {
        if range.is_collapsed() {
            return Ok(());
        }
        if target.root == range.start.root
            && range.contains_position(target)
            && *target != range.start
        {
            return Err(EditorError::invalid_operation(
                "cannot move a range into itself",
            ));
        }
        if *target == range.start || *target == range.end {
            return Ok(());
        }
        let operation = Operation::move_range(self.document.version(), range, target.clone())?;
        self.apply(operation)
    }

    /// Move several ranges, in order, to one target
    pub fn move_ranges(&mut self, ranges: Vec<Range>, target: &Position) -> EditorResult<()> {
        for kind in make_move_operations(ranges, target.clone()) {
            self.apply_kind(kind)?;
        }
        Ok(())
    }

    /// Rename the element right after `position`
    pub fn rename(&mut self, position: &Position, new_name: &str) -> EditorResult<()> {
        let old_name = self.element_after(position)?.name.clone();
        if old_name == new_name {
            return Ok(());
        }
        let operation = Operation::rename(self.document.version(), position.clone(), old_name, new_name);
        self.apply(operation)
    }

    /// Split the element containing `position`; returns the position
    /// between the two halves
    pub fn split(&mut self, position: &Position) -> EditorResult<Position> {
        if position.path.len() < 2 {
            return Err(EditorError::invalid_operation("cannot split a root element"));
        }
        let max_offset = self.document.tree().parent_of(position)?.max_offset();
        let how_many = max_offset.saturating_sub(position.offset());

        let operation = Operation::split(self.document.version(), position.clone(), how_many, None);
        let between = match &operation.kind {
            OperationKind::Split(split) => split.insertion_position.clone(),
            _ => Position::split_insertion_position(position),
        };
        self.apply(operation)?;
        Ok(between)
    }

    /// Merge the element after `position` into the element before it
    pub fn merge(&mut self, position: &Position) -> EditorResult<()> {
        if position.offset() == 0 {
            return Err(EditorError::invalid_operation("nothing to merge into"));
        }
        let before_position = position.shifted_by(-1);
        let target_offset = self.element_after(&before_position)?.max_offset();
        let how_many = self.element_after(position)?.max_offset();

        let operation = Operation::merge(
            self.document.version(),
            position.child(0),
            how_many,
            before_position.child(target_offset),
            Position::graveyard(0),
        );
        self.apply(operation)
    }

    /// Wrap a flat range in a new element; returns the wrapper's position
    pub fn wrap(&mut self, range: &Range, wrapper: Element) -> EditorResult<Position> {
        if !range.is_flat() || range.is_collapsed() {
            return Err(ModelError::invalid_range("wrapped range must be flat and non-empty").into());
        }
        if !wrapper.children().is_empty() {
            return Err(EditorError::invalid_operation("wrapper element must be empty"));
        }

        self.insert_element(&range.end, wrapper)?;
        self.move_range(range, &range.end.child(0))?;
        Ok(range.start.clone())
    }

    /// Replace the element after `position` with its children
    pub fn unwrap(&mut self, position: &Position) -> EditorResult<()> {
        let how_many = self.element_after(position)?.max_offset();

        if how_many > 0 {
            let children = Range::from_position_and_shift(position.child(0), how_many);
            self.move_range(&children, position)?;
        }

        let element = Range::from_position_and_shift(position.shifted_by(how_many as isize), 1);
        let operation = Operation::remove(self.document.version(), &element)?;
        self.apply(operation)
    }

    /// Set `key` to `value` on every node in `range`
    pub fn set_attribute(&mut self, range: &Range, key: &str, value: Value) -> EditorResult<()> {
        self.change_attribute(range, key, Some(value))
    }

    pub fn remove_attribute(&mut self, range: &Range, key: &str) -> EditorResult<()> {
        self.change_attribute(range, key, None)
    }

    fn change_attribute(&mut self, range: &Range, key: &str, value: Option<Value>) -> EditorResult<()> {
        let mut runs = Vec::new();
        for flat in self.document.tree().flat_ranges(range)? {
            if flat.is_collapsed() {
                continue;
            }
            runs.extend(self.document.tree().attribute_runs(&flat, key)?);
        }

        for (run, old_value) in runs {
            if old_value == value {
                continue;
            }
            let operation =
                Operation::attribute(self.document.version(), run, key, old_value, value.clone());
            self.apply(operation)?;
        }
        Ok(())
    }

    pub fn add_marker(&mut self, name: &str, range: Range, affects_data: bool) -> EditorResult<()> {
        if self.document.markers().has(name) {
            return Err(EditorError::MarkerExists(name.to_string()));
        }
        let operation = Operation::marker(self.document.version(), name, None, Some(range), affects_data);
        self.apply(operation)
    }

    pub fn update_marker(&mut self, name: &str, range: Range) -> EditorResult<()> {
        let marker = self
            .document
            .markers()
            .get(name)
            .ok_or_else(|| EditorError::MarkerNotFound(name.to_string()))?;
        let operation = Operation::marker(
            self.document.version(),
            name,
            Some(marker.range.clone()),
            Some(range),
            marker.affects_data,
        );
        self.apply(operation)
    }

    pub fn remove_marker(&mut self, name: &str) -> EditorResult<()> {
        let marker = self
            .document
            .markers()
            .get(name)
            .ok_or_else(|| EditorError::MarkerNotFound(name.to_string()))?;
        let operation = Operation::marker(
            self.document.version(),
            name,
            Some(marker.range.clone()),
            None,
            marker.affects_data,
        );
        self.apply(operation)
    }

    fn element_after(&self, position: &Position) -> EditorResult<&Element> {
        match self.document.tree().node_after(position) {
            Some(Node::Element(element)) => Ok(element),
            _ => Err(ModelError::NotAnElement {
                root: position.root.clone(),
                path: position.path.clone(),
            }
            .into()),
        }
    }
}
