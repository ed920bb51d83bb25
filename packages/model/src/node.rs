//! # Node Tree
//!
//! Elements and text runs. Every child occupies a span of integer offsets in
//! its parent: an element occupies one offset, a text run one offset per
//! character. Paths in [`Position`](crate::Position) address this offset
//! space, never child indexes.
//!
//! Adjacent text runs with identical attributes are always merged, so a
//! parent never holds two mergeable siblings.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute key → value mapping, ordered by key
pub type Attributes = BTreeMap<String, Value>;

/// A node in the document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Element(Element),
    Text(Text),
}

/// Named container with attributes and children
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    children: Vec<Node>,
}

/// Run of characters sharing one attribute set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub data: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Node {
    pub fn element(element: Element) -> Self {
        Node::Element(element)
    }

    pub fn text(data: impl Into<String>) -> Self {
        Node::Text(Text::new(data))
    }

    /// Number of offsets this node occupies in its parent
    pub fn offset_size(&self) -> usize {
        match self {
            Node::Element(_) => 1,
            Node::Text(text) => text.len(),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Node::Element(element) => &element.attributes,
            Node::Text(text) => &text.attributes,
        }
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            Node::Element(element) => &mut element.attributes,
            Node::Text(text) => &mut text.attributes,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element(_) => None,
        }
    }
}

impl Text {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.data.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Split into `[0, offset)` and `[offset, len)`, both keeping the attributes
    fn split_at(self, offset: usize) -> (Text, Text) {
        let byte = self
            .data
            .char_indices()
            .nth(offset)
            .map(|(index, _)| index)
            .unwrap_or(self.data.len());
        let (left, right) = self.data.split_at(byte);
        (
            Text {
                data: left.to_string(),
                attributes: self.attributes.clone(),
            },
            Text {
                data: right.to_string(),
                attributes: self.attributes,
            },
        )
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self.normalize();
        self
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Total offset size of all children
    pub fn max_offset(&self) -> usize {
        self.children.iter().map(Node::offset_size).sum()
    }

    /// Concatenated text of direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(Node::as_text)
            .map(|text| text.data.as_str())
            .collect()
    }

    /// Child that starts exactly at `offset`
    pub fn child_at_offset(&self, offset: usize) -> Option<&Node> {
        let mut start = 0;
        for child in &self.children {
            if start == offset {
                return Some(child);
            }
            start += child.offset_size();
            if start > offset {
                break;
            }
        }
        None
    }

    /// Child element that starts exactly at `offset`
    pub fn element_at_offset_mut(&mut self, offset: usize) -> Option<&mut Element> {
        let mut start = 0;
        for child in &mut self.children {
            if start == offset {
                return child.as_element_mut();
            }
            start += child.offset_size();
            if start > offset {
                break;
            }
        }
        None
    }

    /// Make sure a child boundary exists at `offset`, splitting a text run if
    /// needed. Returns the index of the first child starting at `offset`.
    fn boundary_at(&mut self, offset: usize) -> ModelResult<usize> {
        let max = self.max_offset();
        if offset > max {
            return Err(ModelError::OffsetOutOfBounds { offset, max });
        }

        let mut start = 0;
        for index in 0..self.children.len() {
            let size = self.children[index].offset_size();
            if start == offset {
                return Ok(index);
            }
            if offset < start + size {
                if let Node::Text(text) = self.children.remove(index) {
                    let (left, right) = text.split_at(offset - start);
                    self.children.insert(index, Node::Text(right));
                    self.children.insert(index, Node::Text(left));
                }
                return Ok(index + 1);
            }
            start += size;
        }

        Ok(self.children.len())
    }

    /// Insert nodes at `offset`
    pub fn insert_at(&mut self, offset: usize, nodes: Vec<Node>) -> ModelResult<()> {
        let index = self.boundary_at(offset)?;
        self.children.splice(index..index, nodes);
        self.normalize();
        Ok(())
    }

    /// Detach `how_many` offsets starting at `offset`
    pub fn remove_at(&mut self, offset: usize, how_many: usize) -> ModelResult<Vec<Node>> {
        let end = offset + how_many;
        let max = self.max_offset();
        if end > max {
            return Err(ModelError::OffsetOutOfBounds { offset: end, max });
        }

        let start_index = self.boundary_at(offset)?;
        let end_index = self.boundary_at(end)?;
        let removed: Vec<Node> = self.children.drain(start_index..end_index).collect();
        self.normalize();
        Ok(removed)
    }

    /// Set (or clear, with `None`) an attribute on every child in the span
    pub fn set_attribute_at(
        &mut self,
        offset: usize,
        how_many: usize,
        key: &str,
        value: Option<&Value>,
    ) -> ModelResult<()> {
        let end = offset + how_many;
        let max = self.max_offset();
        if end > max {
            return Err(ModelError::OffsetOutOfBounds { offset: end, max });
        }

        let start_index = self.boundary_at(offset)?;
        let end_index = self.boundary_at(end)?;
        for child in &mut self.children[start_index..end_index] {
            match value {
                Some(value) => {
                    child.attributes_mut().insert(key.to_string(), value.clone());
                }
                None => {
                    child.attributes_mut().remove(key);
                }
            }
        }
        self.normalize();
        Ok(())
    }

    /// Drop empty text runs and merge adjacent runs with equal attributes
    pub fn normalize(&mut self) {
        let mut merged: Vec<Node> = Vec::with_capacity(self.children.len());
        for child in self.children.drain(..) {
            if let Node::Text(text) = &child {
                if text.is_empty() {
                    continue;
                }
                if let Some(Node::Text(previous)) = merged.last_mut() {
                    if previous.attributes == text.attributes {
                        previous.data.push_str(&text.data);
                        continue;
                    }
                }
            }
            merged.push(child);
        }
        self.children = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paragraph(text: &str) -> Element {
        Element::new("paragraph").with_children(vec![Node::text(text)])
    }

    #[test]
    fn test_offsets_count_characters_and_elements() {
        let element = Element::new("div").with_children(vec![
            Node::text("héllo"),
            Node::element(Element::new("img")),
            Node::text("!"),
        ]);

        assert_eq!(element.max_offset(), 7);
        assert!(element.child_at_offset(5).unwrap().as_element().is_some());
        assert!(element.child_at_offset(3).is_none());
    }

    #[test]
    fn test_insert_merges_text() {
        let mut element = paragraph("foo");
        element.insert_at(3, vec![Node::text("bar")]).unwrap();

        assert_eq!(element.children().len(), 1);
        assert_eq!(element.text(), "foobar");
    }

    #[test]
    fn test_remove_splits_text() {
        let mut element = paragraph("abcdef");
        let removed = element.remove_at(2, 2).unwrap();

        assert_eq!(removed, vec![Node::text("cd")]);
        assert_eq!(element.text(), "abef");
        assert_eq!(element.children().len(), 1);
    }

    #[test]
    fn test_set_attribute_splits_and_remerges() {
        let mut element = paragraph("abc");
        element.set_attribute_at(1, 1, "bold", Some(&json!(true))).unwrap();
        assert_eq!(element.children().len(), 3);

        element.set_attribute_at(1, 1, "bold", None).unwrap();
        assert_eq!(element.children().len(), 1);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut element = paragraph("ab");
        assert!(matches!(
            element.remove_at(1, 5),
            Err(ModelError::OffsetOutOfBounds { .. })
        ));
    }
}
