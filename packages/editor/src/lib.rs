//! # Scribe Editor
//!
//! Operation-based editing engine for Scribe documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: tree of roots, positions, ranges     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: versioned document + operations     │
//! │  - Apply operations at an exact version     │
//! │  - Transform concurrent operations          │
//! │  - Batches, undo/redo, live markers         │
//! │  - Differ: change entries per batch         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ observers: ChangeEvent per outermost change │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Operations are the only way to mutate**: observers read the tree,
//!    they never write it
//! 2. **Versions are exact**: a stale operation is an error, never adjusted
//! 3. **Transformation never fails**: conflicts resolve through a strength
//!    flag or by degrading to a no-op
//! 4. **Removal is a move**: removed content goes to the graveyard root, so
//!    undo is a move back
//!
//! ## Usage
//!
//! ### Single-user editing
//!
//! ```rust
//! use scribe_editor::{BatchType, Document};
//! use scribe_model::{Element, Position};
//!
//! let mut document = Document::new();
//! let start = Position::new("main", vec![0]);
//!
//! document
//!     .change(BatchType::Default, |writer| {
//!         writer.insert_element(&start, Element::new("paragraph"))?;
//!         writer.insert_text(&Position::new("main", vec![0, 0]), "Hello")?;
//!         writer.rename(&start, "heading1")
//!     })
//!     .unwrap();
//!
//! assert_eq!(document.version(), 3);
//! ```
//!
//! ### Collaborative editing
//!
//! ```rust
//! use scribe_editor::{Document, EditSession};
//! use scribe_model::Position;
//!
//! let mut left = EditSession::new("left", Document::new(), true);
//! let mut right = EditSession::new("right", Document::new(), false);
//! let start = Position::new("main", vec![0]);
//!
//! left.change(|writer| writer.insert_text(&start, "foo")).unwrap();
//! right.change(|writer| writer.insert_text(&start, "bar")).unwrap();
//!
//! let from_left = left.take_outgoing();
//! let from_right = right.take_outgoing();
//! left.receive_remote(&from_right).unwrap();
//! right.receive_remote(&from_left).unwrap();
//!
//! assert_eq!(left.document.main_root().unwrap().text(), "foobar");
//! assert_eq!(right.document.main_root().unwrap().text(), "foobar");
//! ```

mod batch;
mod config;
mod differ;
mod document;
mod errors;
mod markers;
mod operation;
mod session;
mod transform;
mod undo_stack;
mod writer;

pub use batch::{Batch, BatchType};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use differ::{DiffEntry, Differ};
pub use document::{ChangeEvent, Document, SubscriptionId};
pub use errors::{EditorError, EditorResult};
pub use markers::{Marker, MarkerChange, MarkerCollection};
pub use operation::{
    AttributeOperation, InsertOperation, MarkerOperation, MergeOperation, MoveOperation,
    Operation, OperationKind, RenameOperation, SplitOperation,
};
pub use session::EditSession;
pub use transform::{
    renumber, transform, transform_live_range, transform_position, transform_range,
    transform_sets, TransformContext,
};
pub use undo_stack::{UndoStack, UndoStep};
pub use writer::Writer;
