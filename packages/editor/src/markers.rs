//! # Live markers
//!
//! Named ranges that follow the content they were placed on. Every applied
//! operation transforms every marker; removing the content moves the marker
//! into the graveyard along with it.

use crate::operation::OperationKind;
use crate::transform::transform_live_range;
use scribe_model::Range;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub name: String,
    pub range: Range,
    /// Changes to this marker are reported as content changes
    pub affects_data: bool,
}

/// A marker added, moved or removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerChange {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_range: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_range: Option<Range>,
    pub affects_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerCollection {
    markers: BTreeMap<String, Marker>,
}

impl MarkerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Marker> {
        self.markers.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Markers ordered by name
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Markers whose name starts with `prefix`, e.g. `"comment:"`
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers
            .values()
            .filter(move |marker| marker.name.starts_with(prefix))
    }

    /// Set or remove (`range == None`) a marker, reporting the change
    pub(crate) fn set(
        &mut self,
        name: &str,
        range: Option<Range>,
        affects_data: bool,
    ) -> Option<MarkerChange> {
        let old_range = self.markers.get(name).map(|marker| marker.range.clone());
        if old_range == range {
            return None;
        }

        match &range {
            Some(range) => {
                self.markers.insert(
                    name.to_string(),
                    Marker {
                        name: name.to_string(),
                        range: range.clone(),
                        affects_data,
                    },
                );
            }
            None => {
                self.markers.remove(name);
            }
        }

        Some(MarkerChange {
            name: name.to_string(),
            old_range,
            new_range: range,
            affects_data,
        })
    }

    /// Move every marker through an applied operation
    pub(crate) fn transform_all(&mut self, operation: &OperationKind) -> Vec<MarkerChange> {
        let mut changes = Vec::new();
        for marker in self.markers.values_mut() {
            let range = transform_live_range(&marker.range, operation);
            if range != marker.range {
                changes.push(MarkerChange {
                    name: marker.name.clone(),
                    old_range: Some(std::mem::replace(&mut marker.range, range.clone())),
                    new_range: Some(range),
                    affects_data: marker.affects_data,
                });
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use scribe_model::{Node, Position};

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end)).unwrap()
    }

    #[test]
    fn test_set_and_remove() {
        let mut markers = MarkerCollection::new();
        let added = markers.set("search:1", Some(range(&[0, 1], &[0, 3])), false).unwrap();
        assert_eq!(added.old_range, None);
        assert!(markers.has("search:1"));

        assert!(markers.set("search:1", Some(range(&[0, 1], &[0, 3])), false).is_none());

        let removed = markers.set("search:1", None, false).unwrap();
        assert_eq!(removed.old_range, Some(range(&[0, 1], &[0, 3])));
        assert!(markers.is_empty());
    }

    #[test]
    fn test_markers_follow_insertions() {
        let mut markers = MarkerCollection::new();
        markers.set("comment:1", Some(range(&[0, 2], &[0, 4])), true);
        markers.set("comment:2", Some(range(&[1, 0], &[1, 1])), true);

        let insert = Operation::insert(0, pos(&[0, 0]), vec![Node::text("ab")]);
        let changes = markers.transform_all(&insert.kind);

        assert_eq!(changes.len(), 1);
        assert_eq!(markers.get("comment:1").unwrap().range, range(&[0, 4], &[0, 6]));
        assert_eq!(markers.get("comment:2").unwrap().range, range(&[1, 0], &[1, 1]));
    }

    #[test]
    fn test_marker_goes_to_graveyard_with_content() {
        let mut markers = MarkerCollection::new();
        markers.set("comment:1", Some(range(&[0, 1], &[0, 2])), false);

        let remove = Operation::remove(0, &range(&[0, 0], &[0, 3])).unwrap();
        markers.transform_all(&remove.kind);

        let marker = markers.get("comment:1").unwrap();
        assert!(marker.range.start.is_in_graveyard());
        assert_eq!(markers.with_prefix("comment:").count(), 1);
    }
}
