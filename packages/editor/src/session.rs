//! # Edit Session
//!
//! One client's view of a shared document.
//!
//! A session applies local changes immediately and queues them as
//! outgoing operations. Operations received from another session are
//! transformed over everything applied locally since their base version
//! and then applied as a transparent batch.
//!
//! Two sessions exchanging their outgoing operations from a common version
//! end with equal main roots, provided exactly one of them is strong.

use crate::batch::{Batch, BatchType};
use crate::document::Document;
use crate::errors::{EditorError, EditorResult};
use crate::operation::Operation;
use crate::transform::transform_live_range;
use crate::undo_stack::UndoStack;
use crate::writer::Writer;
use scribe_model::Range;
use tracing::{debug, info};

pub struct EditSession {
    /// Unique session identifier
    pub id: String,

    pub document: Document,

    pub undo_stack: UndoStack,

    /// Current selection, kept in place across local and remote changes
    selection: Option<Range>,

    /// Local operations not yet sent
    outgoing: Vec<Operation>,

    /// Whether local operations win ties against remote ones
    is_strong: bool,
}

impl EditSession {
    pub fn new(id: impl Into<String>, document: Document, is_strong: bool) -> Self {
        let undo_stack = UndoStack::from_config(document.config());
        Self {
            id: id.into(),
            document,
            undo_stack,
            selection: None,
            outgoing: Vec::new(),
            is_strong,
        }
    }

    /// Apply a local change immediately and queue it for sending
    pub fn change<F>(&mut self, edit: F) -> EditorResult<Batch>
    where
        F: FnOnce(&mut Writer<'_>) -> EditorResult<()>,
    {
        let batch = self.undo_stack.change(&mut self.document, edit)?;
        self.after_local(&batch);
        Ok(batch)
    }

    pub fn undo(&mut self) -> EditorResult<Batch> {
        let batch = self.undo_stack.undo(&mut self.document)?;
        self.after_local(&batch);
        Ok(batch)
    }

    pub fn redo(&mut self) -> EditorResult<Batch> {
        let batch = self.undo_stack.redo(&mut self.document)?;
        self.after_local(&batch);
        Ok(batch)
    }

    fn after_local(&mut self, batch: &Batch) {
        self.follow_selection(batch.operations());
        self.outgoing.extend(batch.operations().iter().cloned());
    }

    /// Drain the operations to send to other sessions
    pub fn take_outgoing(&mut self) -> Vec<Operation> {
        debug!(session = %self.id, operations = self.outgoing.len(), "Sending operations");
        std::mem::take(&mut self.outgoing)
    }

    pub fn outgoing_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Integrate operations another session applied from one of our versions
    ///
    /// Outgoing operations must be sent first: the other session transforms
    /// them from their own base version, so they have to stay consecutive.
    pub fn receive_remote(&mut self, operations: &[Operation]) -> EditorResult<Vec<Operation>> {
        if !self.outgoing.is_empty() {
            return Err(EditorError::invalid_operation(
                "outgoing operations must be sent before receiving remote ones",
            ));
        }

        let transformed = self
            .document
            .transformed_operations_to_apply(operations, !self.is_strong)?;

        let batch = self.document.change(BatchType::Transparent, |writer| {
            for operation in transformed {
                writer.apply(operation)?;
            }
            Ok(())
        })?;

        info!(
            session = %self.id,
            received = operations.len(),
            applied = batch.len(),
            version = self.document.version(),
            "Integrated remote operations"
        );

        let applied = batch.into_operations();
        self.follow_selection(&applied);
        Ok(applied)
    }

    pub fn set_selection(&mut self, selection: Option<Range>) {
        self.selection = selection;
    }

    pub fn selection(&self) -> Option<&Range> {
        self.selection.as_ref()
    }

    fn follow_selection(&mut self, operations: &[Operation]) {
        if let Some(selection) = &mut self.selection {
            for operation in operations {
                *selection = transform_live_range(selection, &operation.kind);
            }
        }
    }
}
