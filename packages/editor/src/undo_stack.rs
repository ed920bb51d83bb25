//! # Undo/Redo Stack
//!
//! Tracks user batches and reverts them on demand.
//!
//! ## Design
//!
//! - Only `Default` batches are recorded; `Transparent` ones (remote changes,
//!   undo steps themselves) are not
//! - Undo builds the reversed operations of a batch, last first, and
//!   transforms them over everything applied since the batch, so undoing
//!   an old step keeps later edits by other sessions intact
//! - The undo batch goes to the redo stack; redo undoes it the same way
//! - New batches clear the redo stack
//!
//! ## Example
//!
//! ```rust
//! use scribe_editor::{Document, UndoStack};
//! use scribe_model::Position;
//!
//! let mut document = Document::new();
//! let mut stack = UndoStack::new();
//!
//! stack.change(&mut document, |writer| writer.insert_text(&Position::new("main", vec![0]), "hi")).unwrap();
//! stack.undo(&mut document).unwrap();
//! assert_eq!(document.main_root().unwrap().max_offset(), 0);
//!
//! stack.redo(&mut document).unwrap();
//! assert_eq!(document.main_root().unwrap().text(), "hi");
//! ```

use crate::batch::{Batch, BatchType};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::errors::{EditorError, EditorResult};
use crate::operation::Operation;
use crate::transform::renumber;
use crate::writer::Writer;
use tracing::debug;

/// A batch that is undone/redone as a whole
#[derive(Debug, Clone)]
pub struct UndoStep {
    pub batch: Batch,

    /// Optional description of this step
    pub description: Option<String>,
}

impl UndoStep {
    pub fn new(batch: Batch) -> Self {
        Self {
            batch,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Operations that revert this step, as a sequence based on the version
    /// right after the step
    fn reversed_operations(&self) -> Vec<Operation> {
        let operations = self.batch.operations();
        let Some(last) = operations.last() else {
            return Vec::new();
        };

        let mut reversed: Vec<Operation> = operations.iter().rev().map(Operation::reversed).collect();
        renumber(&mut reversed, last.base_version + 1);
        reversed
    }
}

#[derive(Debug)]
pub struct UndoStack {
    /// Most recent last
    undo_stack: Vec<UndoStep>,

    /// Most recent last
    redo_stack: Vec<UndoStep>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl UndoStack {
    /// Create a new undo stack with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::with_max_levels(config.undo_levels)
    }

    /// Run a user change on `document` and record it
    pub fn change<F>(&mut self, document: &mut Document, edit: F) -> EditorResult<Batch>
    where
        F: FnOnce(&mut Writer<'_>) -> EditorResult<()>,
    {
        let batch = document.change(BatchType::Default, edit)?;
        self.record(batch.clone());
        Ok(batch)
    }

    /// Record an applied batch; transparent and empty batches are ignored
    pub fn record(&mut self, batch: Batch) {
        self.record_step(UndoStep::new(batch));
    }

    pub fn record_step(&mut self, step: UndoStep) {
        if step.batch.batch_type == BatchType::Transparent || step.batch.is_empty() {
            return;
        }
        self.push_step(step);

        // New action invalidates the future
        self.redo_stack.clear();
    }

    fn push_step(&mut self, step: UndoStep) {
        self.undo_stack.push(step);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Revert the most recent step; returns the batch that did it
    pub fn undo(&mut self, document: &mut Document) -> EditorResult<Batch> {
        let step = self.undo_stack.pop().ok_or(EditorError::NothingToUndo)?;

        match revert(document, &step) {
            Ok(batch) => {
                debug!(
                    operations = batch.len(),
                    version = document.version(),
                    "Undid step"
                );
                self.redo_stack.push(UndoStep {
                    batch: batch.clone(),
                    description: step.description,
                });
                Ok(batch)
            }
            Err(error) => {
                self.undo_stack.push(step);
                Err(error)
            }
        }
    }

    /// Revert the most recent undo; returns the batch that did it
    pub fn redo(&mut self, document: &mut Document) -> EditorResult<Batch> {
        let step = self.redo_stack.pop().ok_or(EditorError::NothingToRedo)?;

        match revert(document, &step) {
            Ok(batch) => {
                debug!(
                    operations = batch.len(),
                    version = document.version(),
                    "Redid step"
                );
                self.push_step(UndoStep {
                    batch: batch.clone(),
                    description: step.description,
                });
                Ok(batch)
            }
            Err(error) => {
                self.redo_stack.push(step);
                Err(error)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get description of the next undo step
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|step| step.description.as_deref())
    }

    /// Get description of the next redo step
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|step| step.description.as_deref())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the reverse of `step`, transformed over everything applied after it
fn revert(document: &mut Document, step: &UndoStep) -> EditorResult<Batch> {
    let reversed = step.reversed_operations();
    let operations = document.transformed_operations_to_apply(&reversed, true)?;

    document.change(BatchType::Transparent, |writer| {
        for operation in operations {
            writer.apply(operation)?;
        }
        Ok(())
    })
}
