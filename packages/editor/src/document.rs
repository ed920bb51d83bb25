//! # Document
//!
//! The versioned tree every edit goes through.
//!
//! A document owns the tree of roots, the list of applied operations and the
//! live markers. Operations are applied strictly in sequence: an operation
//! built against version `v` applies only when the document is at `v`, and
//! applying it moves the document to `v + 1`.
//!
//! ## Lifecycle of a change
//!
//! ```text
//! change() ─→ Writer helpers ─→ apply_operation() ×N ─→ flush
//!   depth+1      primitive ops     validate, differ,       once, when the
//!                                  tree, markers, history  outermost change ends
//! ```
//!
//! Observers registered with [`Document::subscribe`] receive one
//! [`ChangeEvent`] per outermost change, never a partially applied batch.

use crate::batch::{Batch, BatchType};
use crate::config::EditorConfig;
use crate::differ::{DiffEntry, Differ};
use crate::errors::{EditorError, EditorResult};
use crate::markers::{MarkerChange, MarkerCollection};
use crate::operation::{self, Operation, OperationKind};
use crate::transform::{renumber, transform_sets};
use crate::writer::Writer;
use scribe_model::{Element, Tree};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace, warn};

/// Everything that changed during one outermost change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub batch_type: BatchType,
    /// Version before the first operation
    pub from_version: u64,
    /// Version after the last operation
    pub to_version: u64,
    pub operations: Vec<Operation>,
    pub entries: Vec<DiffEntry>,
    pub markers: Vec<MarkerChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ChangeEvent)>;

pub struct Document {
    version: u64,
    tree: Tree,
    /// Applied operations from `history_start` on
    history: Vec<Operation>,
    history_start: u64,
    markers: MarkerCollection,
    differ: Differ,
    config: EditorConfig,

    /// Open `change` calls
    depth: usize,
    pending: Vec<Operation>,
    pending_type: BatchType,
    pending_from: u64,

    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("tree", &self.tree)
            .field("markers", &self.markers)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with the default main root
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        let main_root = Element::new(config.main_root.clone());
        Self::from_roots(config, vec![main_root])
    }

    /// Document at version 0 holding `roots`; each root is named after its element
    pub fn from_roots(config: EditorConfig, roots: Vec<Element>) -> Self {
        let mut tree = Tree::new();
        for root in roots {
            tree.add_root(root);
        }

        Self {
            version: 0,
            tree,
            history: Vec::new(),
            history_start: 0,
            markers: MarkerCollection::new(),
            differ: Differ::new(),
            config,
            depth: 0,
            pending: Vec::new(),
            pending_type: BatchType::Default,
            pending_from: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The configured main root
    pub fn main_root(&self) -> Option<&Element> {
        self.tree.root(&self.config.main_root)
    }

    /// Retained operations; the first one was applied at [`Document::history_start`]
    pub fn history(&self) -> &[Operation] {
        &self.history
    }

    /// Version of the oldest retained operation
    pub fn history_start(&self) -> u64 {
        self.history_start
    }

    /// `None` for versions not applied yet or dropped by `historyLimit`
    pub fn operation_at(&self, version: u64) -> Option<&Operation> {
        let index = version.checked_sub(self.history_start)?;
        usize::try_from(index)
            .ok()
            .and_then(|index| self.history.get(index))
    }

    pub fn markers(&self) -> &MarkerCollection {
        &self.markers
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Apply one operation built against the current version.
    ///
    /// The operation is checked against the tree before anything changes,
    /// so on error the tree, version, history and markers are untouched.
    pub fn apply_operation(&mut self, operation: Operation) -> EditorResult<()> {
        if operation.base_version != self.version {
            warn!(
                expected = self.version,
                actual = operation.base_version,
                kind = operation.kind_name(),
                "Rejected operation with stale base version"
            );
            return Err(EditorError::VersionMismatch {
                expected: self.version,
                actual: operation.base_version,
            });
        }

        operation::validate(&self.tree, &operation)?;

        self.begin(BatchType::Default);
        self.differ.buffer_operation(&operation, &self.tree);
        let result = operation::apply(&mut self.tree, &operation);
        if result.is_ok() {
            self.update_markers(&operation.kind);

            debug!(
                kind = operation.kind_name(),
                base_version = operation.base_version,
                "Applied operation"
            );
            self.version += 1;
            self.history.push(operation.clone());
            self.pending.push(operation);
            self.trim_history();
        }
        self.end();
        result
    }

    /// Keep at most `historyLimit` operations
    fn trim_history(&mut self) {
        let Some(limit) = self.config.history_limit else {
            return;
        };
        let excess = self.history.len().saturating_sub(limit);
        if excess > 0 {
            self.history.drain(..excess);
            self.history_start += excess as u64;
            trace!(history_start = self.history_start, "Dropped old history");
        }
    }

    fn update_markers(&mut self, kind: &OperationKind) {
        match kind {
            OperationKind::Marker(op) => {
                if let Some(change) =
                    self.markers
                        .set(&op.name, op.new_range.clone(), op.affects_data)
                {
                    self.differ.buffer_marker_change(change);
                }
            }
            _ => {
                for change in self.markers.transform_all(kind) {
                    self.differ.buffer_marker_change(change);
                }
            }
        }
    }

    /// Run `edit` as one batch. Observers are notified once, after the
    /// outermost change completes, even if `edit` fails part way.
    pub fn change<F>(&mut self, batch_type: BatchType, edit: F) -> EditorResult<Batch>
    where
        F: FnOnce(&mut Writer<'_>) -> EditorResult<()>,
    {
        self.begin(batch_type);
        let mut writer = Writer::new(self, batch_type);
        let result = edit(&mut writer);
        let batch = writer.into_batch();
        self.end();

        result.map(|()| batch)
    }

    fn begin(&mut self, batch_type: BatchType) {
        if self.depth == 0 {
            self.pending_type = batch_type;
            self.pending_from = self.version;
        }
        self.depth += 1;
    }

    fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() && self.differ.is_empty() {
            return;
        }

        let event = ChangeEvent {
            batch_type: self.pending_type,
            from_version: self.pending_from,
            to_version: self.version,
            operations: std::mem::take(&mut self.pending),
            entries: self.differ.changes(&self.tree),
            markers: self.differ.marker_changes(),
        };
        self.differ.reset();

        debug!(
            operations = event.operations.len(),
            entries = event.entries.len(),
            markers = event.markers.len(),
            version = self.version,
            "Flushed change"
        );

        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    /// Bring operations built against an older version up to date.
    ///
    /// `operations` must be consecutive and start at a version this document
    /// has already passed and still keeps in its history. Each one is transformed over every operation
    /// applied since, and the result is numbered from the current version.
    pub fn transformed_operations_to_apply(
        &self,
        operations: &[Operation],
        is_strong: bool,
    ) -> EditorResult<Vec<Operation>> {
        let Some(first) = operations.first() else {
            return Ok(Vec::new());
        };

        let base = first.base_version;
        if base > self.version {
            return Err(EditorError::VersionMismatch {
                expected: self.version,
                actual: base,
            });
        }

        if base < self.history_start {
            warn!(
                oldest = self.history_start,
                requested = base,
                "Operations are older than the retained history"
            );
            return Err(EditorError::HistoryUnavailable {
                oldest: self.history_start,
                requested: base,
            });
        }

        let applied = &self.history[(base - self.history_start) as usize..];
        let mut result = if applied.is_empty() {
            operations.to_vec()
        } else {
            transform_sets(operations, applied, is_strong).0
        };
        renumber(&mut result, self.version);

        debug!(
            base_version = base,
            version = self.version,
            incoming = operations.len(),
            transformed = result.len(),
            "Transformed operations to apply"
        );
        Ok(result)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_model::{Node, Position};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn paragraph_document(text: &str) -> Document {
        let main = Element::new("main").with_children(vec![Node::element(
            Element::new("paragraph").with_children(vec![Node::text(text)]),
        )]);
        Document::from_roots(EditorConfig::default(), vec![main])
    }

    fn text_of(document: &Document) -> String {
        document.tree().element_at("main", &[0]).unwrap().text()
    }

    #[test]
    fn test_document_creation() {
        let document = Document::new();
        assert_eq!(document.version(), 0);
        assert!(document.history().is_empty());
        assert!(document.main_root().is_some());
    }

    #[test]
    fn test_apply_increments_version() {
        let mut document = paragraph_document("foo");
        document
            .apply_operation(Operation::insert(0, pos(&[0, 3]), vec![Node::text("bar")]))
            .unwrap();

        assert_eq!(document.version(), 1);
        assert_eq!(text_of(&document), "foobar");
        assert_eq!(document.operation_at(0).unwrap().kind_name(), "insert");
    }

    #[test]
    fn test_stale_operation_rejected() {
        let mut document = paragraph_document("foo");
        document
            .apply_operation(Operation::insert(0, pos(&[0, 0]), vec![Node::text("a")]))
            .unwrap();

        let error = document
            .apply_operation(Operation::insert(0, pos(&[0, 0]), vec![Node::text("b")]))
            .unwrap_err();

        assert!(matches!(
            error,
            EditorError::VersionMismatch {
                expected: 1,
                actual: 0
            }
        ));
        assert_eq!(document.version(), 1);
        assert_eq!(text_of(&document), "afoo");
    }

    #[test]
    fn test_invalid_operation_leaves_document_untouched() {
        let mut document = paragraph_document("foo");
        let before = document.tree().clone();

        let result =
            document.apply_operation(Operation::insert(0, pos(&[0, 9]), vec![Node::text("x")]));

        assert!(result.is_err());
        assert_eq!(document.tree(), &before);
        assert_eq!(document.version(), 0);
        assert!(document.history().is_empty());
    }

    #[test]
    fn test_history_limit_drops_oldest_operations() {
        let config = EditorConfig {
            history_limit: Some(2),
            ..EditorConfig::default()
        };
        let paragraph = Node::element(Element::new("paragraph"));
        let main = Element::new("main").with_children(vec![paragraph]);
        let mut document = Document::from_roots(config, vec![main]);

        for (version, text) in ["a", "b", "c"].into_iter().enumerate() {
            let insert = Operation::insert(version as u64, pos(&[0, version]), vec![Node::text(text)]);
            document.apply_operation(insert).unwrap();
        }

        assert_eq!(text_of(&document), "abc");
        assert_eq!(document.history().len(), 2);
        assert_eq!(document.history_start(), 1);
        assert!(document.operation_at(0).is_none());
        assert!(document.operation_at(2).is_some());

        let late = Operation::insert(1, pos(&[0, 0]), vec![Node::text("x")]);
        assert_eq!(document.transformed_operations_to_apply(&[late], true).unwrap().len(), 1);

        let too_late = Operation::insert(0, pos(&[0, 0]), vec![Node::text("x")]);
        assert!(matches!(
            document.transformed_operations_to_apply(&[too_late], true),
            Err(EditorError::HistoryUnavailable {
                oldest: 1,
                requested: 0
            })
        ));
    }

    #[test]
    fn test_one_event_per_change() {
        let mut document = paragraph_document("foo");
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        document.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        document
            .change(BatchType::Default, |writer| {
                writer.insert_text(&pos(&[0, 3]), "bar")?;
                writer.insert_text(&pos(&[0, 0]), ">")?;
                Ok(())
            })
            .unwrap();

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from_version, 0);
        assert_eq!(events[0].to_version, 2);
        assert_eq!(events[0].operations.len(), 2);
        assert_eq!(events[0].entries.len(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_events() {
        let mut document = paragraph_document("foo");
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let id = document.subscribe(move |_| *sink.borrow_mut() += 1);

        document
            .apply_operation(Operation::insert(0, pos(&[0, 0]), vec![Node::text("a")]))
            .unwrap();
        assert!(document.unsubscribe(id));
        assert!(!document.unsubscribe(id));
        document
            .apply_operation(Operation::insert(1, pos(&[0, 0]), vec![Node::text("b")]))
            .unwrap();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_transformed_operations_to_apply() {
        let mut document = paragraph_document("abcdef");
        document
            .apply_operation(Operation::insert(0, pos(&[0, 0]), vec![Node::text("xy")]))
            .unwrap();

        let remote = vec![Operation::insert(0, pos(&[0, 3]), vec![Node::text("!")])];
        let transformed = document.transformed_operations_to_apply(&remote, false).unwrap();

        assert_eq!(transformed.len(), 1);
        assert_eq!(transformed[0].base_version, 1);
        for operation in transformed {
            document.apply_operation(operation).unwrap();
        }
        assert_eq!(text_of(&document), "xyabc!def");
    }

    #[test]
    fn test_operations_from_the_future_rejected() {
        let document = paragraph_document("abc");
        let remote = vec![Operation::no_op(3)];
        assert!(document.transformed_operations_to_apply(&remote, true).is_err());
    }
}
