//! # Tree of roots
//!
//! The document content lives in named root elements. One root,
//! [`GRAVEYARD`], is reserved for removed content so that removing and
//! restoring are both plain moves.

use crate::error::{ModelError, ModelResult};
use crate::node::{Element, Node};
use crate::position::{Position, GRAVEYARD};
use crate::range::Range;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    roots: BTreeMap<String, Element>,
}

impl Tree {
    /// Tree holding only the graveyard root
    pub fn new() -> Self {
        let mut roots = BTreeMap::new();
        roots.insert(GRAVEYARD.to_string(), Element::new(GRAVEYARD));
        Self { roots }
    }

    /// Add (or replace) a root; the element name is used as the root name
    pub fn add_root(&mut self, root: Element) {
        self.roots.insert(root.name.clone(), root);
    }

    pub fn root(&self, name: &str) -> Option<&Element> {
        self.roots.get(name)
    }

    pub fn root_names(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    /// Element addressed by `path` (an empty path is the root itself)
    pub fn element_at(&self, root: &str, path: &[usize]) -> ModelResult<&Element> {
        let mut element = self
            .roots
            .get(root)
            .ok_or_else(|| ModelError::RootNotFound(root.to_string()))?;

        for (depth, offset) in path.iter().enumerate() {
            element = match element.child_at_offset(*offset) {
                Some(Node::Element(child)) => child,
                Some(Node::Text(_)) => {
                    return Err(ModelError::NotAnElement {
                        root: root.to_string(),
                        path: path[..=depth].to_vec(),
                    })
                }
                None => return Err(ModelError::invalid_path(root, &path[..=depth])),
            };
        }
        Ok(element)
    }

    pub fn element_at_mut(&mut self, root: &str, path: &[usize]) -> ModelResult<&mut Element> {
        let mut element = self
            .roots
            .get_mut(root)
            .ok_or_else(|| ModelError::RootNotFound(root.to_string()))?;

        for (depth, offset) in path.iter().enumerate() {
            element = element
                .element_at_offset_mut(*offset)
                .ok_or_else(|| ModelError::invalid_path(root, &path[..=depth]))?;
        }
        Ok(element)
    }

    /// Element containing `position`
    pub fn parent_of(&self, position: &Position) -> ModelResult<&Element> {
        self.element_at(&position.root, position.parent_path())
    }

    /// Node starting right at `position`, if any
    pub fn node_after(&self, position: &Position) -> Option<&Node> {
        self.parent_of(position)
            .ok()?
            .child_at_offset(position.offset())
    }

    /// Check that `position` points inside an existing element's offset space
    pub fn validate_position(&self, position: &Position) -> ModelResult<()> {
        let parent = self.parent_of(position)?;
        let max = parent.max_offset();
        if position.path.is_empty() || position.offset() > max {
            return Err(ModelError::OffsetOutOfBounds {
                offset: position.offset(),
                max,
            });
        }
        Ok(())
    }

    /// Check that a flat range addresses existing offsets
    pub fn validate_flat_range(&self, range: &Range) -> ModelResult<()> {
        if !range.is_flat() {
            return Err(ModelError::invalid_range("range must be flat"));
        }
        self.validate_position(&range.start)?;
        self.validate_position(&range.end)
    }

    pub fn insert(&mut self, position: &Position, nodes: Vec<Node>) -> ModelResult<()> {
        self.element_at_mut(&position.root, position.parent_path())?
            .insert_at(position.offset(), nodes)
    }

    pub fn remove(&mut self, position: &Position, how_many: usize) -> ModelResult<Vec<Node>> {
        self.element_at_mut(&position.root, position.parent_path())?
            .remove_at(position.offset(), how_many)
    }

    pub fn set_attribute(&mut self, range: &Range, key: &str, value: Option<&Value>) -> ModelResult<()> {
        if !range.is_flat() {
            return Err(ModelError::invalid_range("attribute range must be flat"));
        }
        self.element_at_mut(&range.start.root, range.start.parent_path())?
            .set_attribute_at(range.start.offset(), range.how_many(), key, value)
    }

    /// Split a flat range into runs sharing the same value of `key`
    pub fn attribute_runs(&self, range: &Range, key: &str) -> ModelResult<Vec<(Range, Option<Value>)>> {
        self.validate_flat_range(range)?;
        let parent = self.parent_of(&range.start)?;
        let from = range.start.offset();
        let to = range.end.offset();

        let mut runs: Vec<(Range, Option<Value>)> = Vec::new();
        let mut start = 0;
        for child in parent.children() {
            let end = start + child.offset_size();
            let lo = start.max(from);
            let hi = end.min(to);
            if lo < hi {
                let value = child.attributes().get(key).cloned();
                match runs.last_mut() {
                    Some((run, run_value)) if *run_value == value && run.end.offset() == lo => {
                        run.end.set_offset(hi);
                    }
                    _ => {
                        let mut run_start = range.start.clone();
                        run_start.set_offset(lo);
                        runs.push((Range::from_position_and_shift(run_start, hi - lo), value));
                    }
                }
            }
            start = end;
        }
        Ok(runs)
    }

    /// Characters covered by a flat range; elements contribute nothing
    pub fn text_in(&self, range: &Range) -> ModelResult<String> {
        self.validate_flat_range(range)?;
        let parent = self.parent_of(&range.start)?;
        let (from, to) = (range.start.offset(), range.end.offset());

        let mut text = String::new();
        let mut start = 0;
        for child in parent.children() {
            if let Node::Text(run) = child {
                text.extend(
                    run.data
                        .chars()
                        .enumerate()
                        .filter(|(index, _)| (from..to).contains(&(start + index)))
                        .map(|(_, character)| character),
                );
            }
            start += child.offset_size();
        }
        Ok(text)
    }

    /// Decompose any range into the minimal list of flat ranges covering it
    pub fn flat_ranges(&self, range: &Range) -> ModelResult<Vec<Range>> {
        if range.start.root != range.end.root {
            return Err(ModelError::disjoint_roots(&range.start.root, &range.end.root));
        }
        if range.start.path.is_empty() || range.end.path.is_empty() {
            return Err(ModelError::invalid_range("range ends must lie inside a root"));
        }
        let common = range
            .start
            .path
            .iter()
            .zip(&range.end.path)
            .take_while(|(a, b)| a == b)
            .count();

        let mut ranges = Vec::new();
        let mut position = range.start.clone();

        while position.path.len() > common + 1 {
            let max = self.parent_of(&position)?.max_offset();
            let how_many = max.saturating_sub(position.offset());
            if how_many > 0 {
                ranges.push(Range::from_position_and_shift(position.clone(), how_many));
            }
            position = position.parent().shifted_by(1);
        }

        while position.path.len() <= range.end.path.len() {
            let depth = position.path.len() - 1;
            let offset = range.end.path[depth];
            let how_many = offset.saturating_sub(position.offset());
            if how_many > 0 {
                ranges.push(Range::from_position_and_shift(position.clone(), how_many));
            }
            position.set_offset(offset);
            position.path.push(0);
        }

        Ok(ranges)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Tree {
        let mut tree = Tree::new();
        tree.add_root(Element::new("main").with_children(vec![
            Node::element(Element::new("paragraph").with_children(vec![Node::text("foo")])),
            Node::element(Element::new("paragraph").with_children(vec![Node::text("bar")])),
        ]));
        tree
    }

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    #[test]
    fn test_element_lookup() {
        let tree = sample();
        assert_eq!(tree.element_at("main", &[1]).unwrap().text(), "bar");
        assert!(matches!(
            tree.element_at("main", &[0, 1]),
            Err(ModelError::NotAnElement { .. })
        ));
        assert!(matches!(
            tree.element_at("missing", &[]),
            Err(ModelError::RootNotFound(_))
        ));
        assert!(tree.node_after(&pos(&[1])).is_some());

        let range = Range::new(pos(&[1, 1]), pos(&[1, 3])).unwrap();
        assert_eq!(tree.text_in(&range).unwrap(), "ar");
    }

    #[test]
    fn test_insert_and_remove() {
        let mut tree = sample();
        tree.insert(&pos(&[0, 3]), vec![Node::text("!")]).unwrap();
        assert_eq!(tree.element_at("main", &[0]).unwrap().text(), "foo!");

        let removed = tree.remove(&pos(&[1, 0]), 2).unwrap();
        assert_eq!(removed, vec![Node::text("ba")]);
        assert_eq!(tree.element_at("main", &[1]).unwrap().text(), "r");
    }

    #[test]
    fn test_attribute_runs() {
        let mut tree = sample();
        let range = Range::new(pos(&[0, 1]), pos(&[0, 2])).unwrap();
        tree.set_attribute(&range, "bold", Some(&json!(true))).unwrap();

        let whole = Range::new(pos(&[0, 0]), pos(&[0, 3])).unwrap();
        let runs = tree.attribute_runs(&whole, "bold").unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].1, Some(json!(true)));
        assert_eq!(runs[1].0, range);
    }

    #[test]
    fn test_flat_ranges() {
        let tree = sample();
        let range = Range::new(pos(&[0, 1]), pos(&[1, 2])).unwrap();
        let flat = tree.flat_ranges(&range).unwrap();
        assert_eq!(
            flat,
            vec![
                Range::new(pos(&[0, 1]), pos(&[0, 3])).unwrap(),
                Range::new(pos(&[1, 0]), pos(&[1, 2])).unwrap(),
            ]
        );
    }

    #[test]
    fn test_flat_ranges_rejects_root_positions() {
        let tree = sample();
        for range in [
            Range::collapsed(pos(&[])),
            Range::new(pos(&[]), pos(&[0, 1])).unwrap(),
        ] {
            assert!(matches!(
                tree.flat_ranges(&range),
                Err(ModelError::InvalidRange(_))
            ));
        }
    }
}
