//! # Differ
//!
//! Buffers what applied operations did to each parent element and turns it
//! into a short list of change entries when the outermost change ends.
//!
//! ## Offsets
//!
//! Entries are grouped by parent (ordered by root, then path) and sorted by
//! offset within a parent. Replaying them in order is always valid: a remove
//! entry's offset counts the children before it as they are after the
//! previous entries, an insert entry's offset is its final offset.
//!
//! Changes inside elements that were inserted in the same change, and
//! anything in the graveyard, are covered by the entries of their ancestors
//! and are not reported.

use crate::markers::MarkerChange;
use crate::operation::{Operation, OperationKind};
use crate::transform::transform_position;
use scribe_model::{Node, Position, Range, Stickiness, Tree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One change to the children of a parent element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiffEntry {
    #[serde(rename_all = "camelCase")]
    Insert {
        position: Position,
        length: usize,
        /// Element name, or `$text` for characters
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    Remove { position: Position, length: usize },
    #[serde(rename_all = "camelCase")]
    Attribute {
        range: Range,
        attribute_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_value: Option<Value>,
    },
}

type AttributeChanges = BTreeMap<String, (Option<Value>, Option<Value>)>;

/// A run of children in the current offset space of a parent
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Kept(usize),
    Inserted(usize),
    /// Zero width: the children are no longer there
    Removed(usize),
    Changed(usize, AttributeChanges),
}

impl Segment {
    fn width(&self) -> usize {
        match self {
            Segment::Kept(count) | Segment::Inserted(count) | Segment::Changed(count, _) => *count,
            Segment::Removed(_) => 0,
        }
    }

    fn split(&self, at: usize) -> (Segment, Segment) {
        match self {
            Segment::Kept(count) => (Segment::Kept(at), Segment::Kept(count - at)),
            Segment::Inserted(count) => (Segment::Inserted(at), Segment::Inserted(count - at)),
            Segment::Changed(count, changes) => (
                Segment::Changed(at, changes.clone()),
                Segment::Changed(count - at, changes.clone()),
            ),
            Segment::Removed(count) => (Segment::Removed(*count), Segment::Removed(0)),
        }
    }

    /// Same kind as `other`, so the two can be one segment
    fn joins(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Kept(_), Segment::Kept(_))
            | (Segment::Inserted(_), Segment::Inserted(_))
            | (Segment::Removed(_), Segment::Removed(_)) => true,
            (Segment::Changed(_, left), Segment::Changed(_, right)) => left == right,
            _ => false,
        }
    }

    fn grow(&mut self, by: usize) {
        match self {
            Segment::Kept(count)
            | Segment::Inserted(count)
            | Segment::Removed(count)
            | Segment::Changed(count, _) => *count += by,
        }
    }

    fn count(&self) -> usize {
        match self {
            Segment::Kept(count)
            | Segment::Inserted(count)
            | Segment::Removed(count)
            | Segment::Changed(count, _) => *count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ParentChanges {
    /// Position of the parent element itself (an empty path for a root)
    parent: Position,
    segments: Vec<Segment>,
}

impl ParentChanges {
    fn new(parent: Position, max_offset: usize) -> Self {
        let segments = if max_offset > 0 {
            vec![Segment::Kept(max_offset)]
        } else {
            Vec::new()
        };
        Self { parent, segments }
    }

    /// Index of the first segment starting at `offset`, past zero width
    /// segments there, splitting the segment that spans it
    fn split_at(&mut self, offset: usize) -> usize {
        let mut cursor = 0;
        let mut index = 0;
        while index < self.segments.len() {
            let width = self.segments[index].width();
            if cursor == offset && width > 0 {
                return index;
            }
            if cursor < offset && offset < cursor + width {
                let (left, right) = self.segments[index].split(offset - cursor);
                self.segments[index] = left;
                self.segments.insert(index + 1, right);
                return index + 1;
            }
            cursor += width;
            index += 1;
        }
        index
    }

    fn span(&mut self, offset: usize, how_many: usize) -> (usize, usize) {
        let start = self.split_at(offset);
        let end = self.split_at(offset + how_many);
        (start, end)
    }

    fn insert(&mut self, offset: usize, how_many: usize) {
        if how_many == 0 {
            return;
        }
        let index = self.split_at(offset);
        self.segments.insert(index, Segment::Inserted(how_many));
    }

    fn remove(&mut self, offset: usize, how_many: usize) {
        if how_many == 0 {
            return;
        }
        let (start, end) = self.span(offset, how_many);
        let replaced: Vec<Segment> = self
            .segments
            .drain(start..end)
            .filter_map(|segment| match segment {
                Segment::Inserted(_) => None,
                Segment::Kept(count) | Segment::Changed(count, _) => Some(Segment::Removed(count)),
                removed @ Segment::Removed(_) => Some(removed),
            })
            .collect();
        self.segments.splice(start..start, replaced);
    }

    fn attribute(&mut self, offset: usize, how_many: usize, key: &str, old: &Option<Value>, new: &Option<Value>) {
        if how_many == 0 {
            return;
        }
        let (start, end) = self.span(offset, how_many);
        for segment in &mut self.segments[start..end] {
            *segment = match std::mem::replace(segment, Segment::Kept(0)) {
                Segment::Kept(count) => {
                    let mut changes = AttributeChanges::new();
                    changes.insert(key.to_string(), (old.clone(), new.clone()));
                    Segment::Changed(count, changes)
                }
                Segment::Changed(count, mut changes) => {
                    let original = changes
                        .remove(key)
                        .map(|(original, _)| original)
                        .unwrap_or_else(|| old.clone());
                    if original != *new {
                        changes.insert(key.to_string(), (original, new.clone()));
                    }
                    if changes.is_empty() {
                        Segment::Kept(count)
                    } else {
                        Segment::Changed(count, changes)
                    }
                }
                other => other,
            };
        }
    }

    /// Whether the child at `offset` was inserted during this change
    fn is_inserted_at(&self, offset: usize) -> bool {
        let mut cursor = 0;
        for segment in &self.segments {
            let width = segment.width();
            if offset >= cursor && offset < cursor + width {
                return matches!(segment, Segment::Inserted(_));
            }
            cursor += width;
        }
        false
    }

    fn compacted(&self) -> Vec<Segment> {
        let mut result: Vec<Segment> = Vec::new();
        for segment in &self.segments {
            if segment.count() == 0 {
                continue;
            }
            match result.last_mut() {
                Some(last) if last.joins(segment) => last.grow(segment.count()),
                _ => result.push(segment.clone()),
            }
        }
        result
    }
}

/// Buffer of changes made since the last flush
#[derive(Debug, Clone, Default)]
pub struct Differ {
    parents: Vec<ParentChanges>,
    markers: BTreeMap<String, MarkerChange>,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.markers.is_empty()
    }

    /// Record `operation`; `tree` is the tree right before it is applied
    pub(crate) fn buffer_operation(&mut self, operation: &Operation, tree: &Tree) {
        match &operation.kind {
            OperationKind::Insert(op) => {
                self.mark_insert(tree, &op.position, op.how_many);
            }
            OperationKind::Move(op) => {
                self.mark_remove(tree, &op.source_position, op.how_many);
                // The target parent, addressed before the source is detached
                let mut target = op.target_position.clone();
                target.set_offset(op.insertion_position().offset());
                self.mark_insert(tree, &target, op.how_many);
            }
            OperationKind::Split(op) => {
                self.mark_remove(tree, &op.split_position, op.how_many);
                self.mark_insert(tree, &op.insertion_position, 1);
            }
            OperationKind::Merge(op) => {
                self.mark_insert(tree, &op.target_position, op.how_many);
                let deletion = op
                    .deletion_position()
                    .transformed_by_insertion(&op.target_position, op.how_many);
                self.mark_remove(tree, &deletion, 1);
            }
            OperationKind::Rename(op) => {
                self.mark_remove(tree, &op.position, 1);
                self.mark_insert(tree, &op.position, 1);
            }
            OperationKind::Attribute(op) => {
                if let Some(changes) = self.parent_changes(tree, &op.range.start) {
                    changes.attribute(
                        op.range.start.offset(),
                        op.range.how_many(),
                        &op.key,
                        &op.old_value,
                        &op.new_value,
                    );
                }
            }
            OperationKind::Marker(_) | OperationKind::NoOp => {}
        }

        for changes in &mut self.parents {
            changes.parent = transform_parent(&changes.parent, &operation.kind);
        }
    }

    /// Record a marker change; the first old range and the last new range win
    pub(crate) fn buffer_marker_change(&mut self, change: MarkerChange) {
        match self.markers.get_mut(&change.name) {
            Some(buffered) => {
                buffered.new_range = change.new_range;
                buffered.affects_data |= change.affects_data;
            }
            None => {
                self.markers.insert(change.name.clone(), change);
            }
        }
    }

    /// Pending change entries, in replay order
    pub fn changes(&self, tree: &Tree) -> Vec<DiffEntry> {
        let mut parents: Vec<&ParentChanges> = self
            .parents
            .iter()
            .filter(|changes| !changes.parent.is_in_graveyard())
            .filter(|changes| !self.is_inside_inserted(&changes.parent))
            .collect();
        parents.sort_by(|a, b| {
            (&a.parent.root, &a.parent.path).cmp(&(&b.parent.root, &b.parent.path))
        });

        let mut entries = Vec::new();
        for changes in parents {
            let mut offset = 0;
            for segment in changes.compacted() {
                let position = changes.parent.child(offset);
                match segment {
                    Segment::Kept(count) => offset += count,
                    Segment::Inserted(count) => {
                        entries.extend(insert_entries(tree, &position, count));
                        offset += count;
                    }
                    Segment::Removed(count) => entries.push(DiffEntry::Remove {
                        position,
                        length: count,
                    }),
                    Segment::Changed(count, attributes) => {
                        let range = Range::from_position_and_shift(position, count);
                        for (key, (old_value, new_value)) in attributes {
                            entries.push(DiffEntry::Attribute {
                                range: range.clone(),
                                attribute_key: key,
                                old_value,
                                new_value,
                            });
                        }
                        offset += count;
                    }
                }
            }
        }
        entries
    }

    /// Pending marker changes that ended up changing something
    pub fn marker_changes(&self) -> Vec<MarkerChange> {
        self.markers
            .values()
            .filter(|change| change.old_range != change.new_range)
            .cloned()
            .collect()
    }

    pub(crate) fn reset(&mut self) {
        self.parents.clear();
        self.markers.clear();
    }

    fn mark_insert(&mut self, tree: &Tree, position: &Position, how_many: usize) {
        if let Some(changes) = self.parent_changes(tree, position) {
            changes.insert(position.offset(), how_many);
        }
    }

    fn mark_remove(&mut self, tree: &Tree, position: &Position, how_many: usize) {
        if let Some(changes) = self.parent_changes(tree, position) {
            changes.remove(position.offset(), how_many);
        }
    }

    /// Buffer for the parent of `position`, created on first use
    fn parent_changes(&mut self, tree: &Tree, position: &Position) -> Option<&mut ParentChanges> {
        if position.is_in_graveyard() || position.path.is_empty() {
            return None;
        }
        let parent = position.parent();
        match self.parents.iter().position(|changes| changes.parent == parent) {
            Some(index) => self.parents.get_mut(index),
            None => {
                let max_offset = tree.parent_of(position).ok()?.max_offset();
                self.parents.push(ParentChanges::new(parent, max_offset));
                self.parents.last_mut()
            }
        }
    }

    fn is_inside_inserted(&self, parent: &Position) -> bool {
        (1..=parent.path.len()).any(|depth| {
            let ancestor = Position::new(parent.root.clone(), parent.path[..depth - 1].to_vec());
            let offset = parent.path[depth - 1];
            self.parents
                .iter()
                .any(|changes| changes.parent == ancestor && changes.is_inserted_at(offset))
        })
    }
}

/// Where a parent element ends up after `operation`
fn transform_parent(parent: &Position, operation: &OperationKind) -> Position {
    if let OperationKind::Merge(op) = operation {
        if *parent == op.deletion_position() {
            return op.graveyard_position.clone();
        }
    }
    if parent.path.is_empty() {
        return parent.clone();
    }
    transform_position(parent, operation, Stickiness::ToNext)
}

/// Insert entries for `count` offsets at `position`, one per run of
/// characters or element
fn insert_entries(tree: &Tree, position: &Position, count: usize) -> Vec<DiffEntry> {
    let Ok(parent) = tree.parent_of(position) else {
        return vec![DiffEntry::Insert {
            position: position.clone(),
            length: count,
            name: "$text".to_string(),
        }];
    };

    let from = position.offset();
    let to = from + count;
    let mut entries: Vec<DiffEntry> = Vec::new();
    let mut start = 0;
    for child in parent.children() {
        let end = start + child.offset_size();
        let lo = start.max(from);
        let hi = end.min(to);
        if lo < hi {
            let name = match child {
                Node::Element(element) => element.name.clone(),
                Node::Text(_) => "$text".to_string(),
            };
            match entries.last_mut() {
                Some(DiffEntry::Insert {
                    length,
                    name: last_name,
                    ..
                }) if name == "$text" && *last_name == name => *length += hi - lo,
                _ => {
                    let mut entry_position = position.clone();
                    entry_position.set_offset(lo);
                    entries.push(DiffEntry::Insert {
                        position: entry_position,
                        length: hi - lo,
                        name,
                    });
                }
            }
        }
        start = end;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_model::Element;
    use serde_json::json;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end)).unwrap()
    }

    fn tree(paragraphs: &[&str]) -> Tree {
        let mut tree = Tree::new();
        tree.add_root(
            Element::new("main").with_children(
                paragraphs
                    .iter()
                    .map(|text| {
                        Node::element(Element::new("paragraph").with_children(vec![Node::text(*text)]))
                    })
                    .collect(),
            ),
        );
        tree
    }

    /// Buffer and apply a sequence of operations
    fn run(tree: &mut Tree, operations: &[Operation]) -> Differ {
        let mut differ = Differ::new();
        for operation in operations {
            crate::operation::validate(tree, operation).unwrap();
            differ.buffer_operation(operation, tree);
            crate::operation::apply(tree, operation).unwrap();
        }
        differ
    }

    #[test]
    fn test_insert_then_remove_inside_it_coalesces() {
        let mut tree = tree(&["abcdef"]);
        let differ = run(
            &mut tree,
            &[
                Operation::insert(0, pos(&[0, 2]), vec![Node::text("xyz")]),
                Operation::remove(1, &range(&[0, 3], &[0, 4])).unwrap(),
            ],
        );

        assert_eq!(
            differ.changes(&tree),
            vec![DiffEntry::Insert {
                position: pos(&[0, 2]),
                length: 2,
                name: "$text".to_string(),
            }]
        );
    }

    #[test]
    fn test_entries_sorted_by_offset() {
        let mut tree = tree(&["abcdef"]);
        let differ = run(
            &mut tree,
            &[
                Operation::insert(0, pos(&[0, 5]), vec![Node::text("x")]),
                Operation::remove(1, &range(&[0, 0], &[0, 2])).unwrap(),
            ],
        );

        assert_eq!(
            differ.changes(&tree),
            vec![
                DiffEntry::Remove {
                    position: pos(&[0, 0]),
                    length: 2,
                },
                DiffEntry::Insert {
                    position: pos(&[0, 3]),
                    length: 1,
                    name: "$text".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_attribute_set_and_reverted_is_not_reported() {
        let mut tree = tree(&["abc"]);
        let set = Operation::attribute(0, range(&[0, 0], &[0, 3]), "bold", None, Some(json!(true)));
        let differ = run(&mut tree, &[set.clone(), set.reversed()]);
        assert!(differ.changes(&tree).is_empty());
    }

    #[test]
    fn test_changes_inside_inserted_element_are_covered() {
        let mut tree = tree(&["abc"]);
        let paragraph = Element::new("paragraph").with_children(vec![Node::text("new")]);
        let differ = run(
            &mut tree,
            &[
                Operation::insert(0, pos(&[1]), vec![Node::element(paragraph)]),
                Operation::insert(1, pos(&[1, 3]), vec![Node::text("!")]),
            ],
        );

        assert_eq!(
            differ.changes(&tree),
            vec![DiffEntry::Insert {
                position: pos(&[1]),
                length: 1,
                name: "paragraph".to_string(),
            }]
        );
    }

    #[test]
    fn test_parent_key_follows_earlier_insert() {
        let mut tree = tree(&["abc", "def"]);
        let paragraph = Element::new("paragraph");
        let differ = run(
            &mut tree,
            &[
                Operation::insert(0, pos(&[1, 0]), vec![Node::text("x")]),
                Operation::insert(1, pos(&[0]), vec![Node::element(paragraph)]),
            ],
        );

        let changes = differ.changes(&tree);
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[1],
            DiffEntry::Insert {
                position: pos(&[2, 0]),
                length: 1,
                name: "$text".to_string(),
            }
        );
    }

    #[test]
    fn test_split_reported_as_remove_and_insert() {
        let mut tree = tree(&["abcdef"]);
        let differ = run(&mut tree, &[Operation::split(0, pos(&[0, 3]), 3, None)]);

        assert_eq!(
            differ.changes(&tree),
            vec![
                DiffEntry::Insert {
                    position: pos(&[1]),
                    length: 1,
                    name: "paragraph".to_string(),
                },
                DiffEntry::Remove {
                    position: pos(&[0, 3]),
                    length: 3,
                },
            ]
        );
    }

    #[test]
    fn test_marker_changes_keep_first_old_range() {
        let mut differ = Differ::new();
        differ.buffer_marker_change(MarkerChange {
            name: "m".to_string(),
            old_range: None,
            new_range: Some(range(&[0, 0], &[0, 1])),
            affects_data: false,
        });
        differ.buffer_marker_change(MarkerChange {
            name: "m".to_string(),
            old_range: Some(range(&[0, 0], &[0, 1])),
            new_range: None,
            affects_data: false,
        });
        assert!(differ.marker_changes().is_empty());
    }
}
