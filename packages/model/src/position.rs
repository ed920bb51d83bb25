//! # Positions
//!
//! A position is a root name plus a path of offsets. Every segment but the
//! last addresses an element; the last segment is an offset inside that
//! element. Positions are plain values: nothing checks them until they are
//! used against a [`Tree`](crate::Tree).
//!
//! The `transformed_by_*` family answers "where does this position end up
//! after the given structural change". Operations and markers are kept
//! anchored to their content through these functions alone.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Name of the reserved root holding removed content
pub const GRAVEYARD: &str = "$graveyard";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub root: String,
    pub path: Vec<usize>,
}

/// Result of [`Position::compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRelation {
    Before,
    After,
    Same,
    DifferentRoot,
}

/// How a position behaves when content is inserted or moved exactly at it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stickiness {
    /// Follows neither side: shifted by insertions at its offset
    #[default]
    ToNone,
    /// Sticks to the node after it
    ToNext,
    /// Sticks to the node before it: insertions at its offset do not shift it
    ToPrevious,
}

impl Position {
    pub fn new(root: impl Into<String>, path: Vec<usize>) -> Self {
        Self {
            root: root.into(),
            path,
        }
    }

    /// Position at `offset` directly inside `root`
    pub fn at(root: impl Into<String>, offset: usize) -> Self {
        Self::new(root, vec![offset])
    }

    /// Position in the graveyard root
    pub fn graveyard(offset: usize) -> Self {
        Self::at(GRAVEYARD, offset)
    }

    pub fn is_in_graveyard(&self) -> bool {
        self.root == GRAVEYARD
    }

    /// Offset inside the parent (the last path segment)
    pub fn offset(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }

    pub fn set_offset(&mut self, offset: usize) {
        if let Some(last) = self.path.last_mut() {
            *last = offset;
        }
    }

    /// Path of the containing element
    pub fn parent_path(&self) -> &[usize] {
        match self.path.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    /// Position of the containing element itself (an empty path means the root)
    pub fn parent(&self) -> Position {
        Position::new(self.root.clone(), self.parent_path().to_vec())
    }

    /// Position at `offset` inside the node that starts at this position
    pub fn child(&self, offset: usize) -> Position {
        let mut path = self.path.clone();
        path.push(offset);
        Position::new(self.root.clone(), path)
    }

    pub fn has_same_parent_as(&self, other: &Position) -> bool {
        self.root == other.root && self.parent_path() == other.parent_path()
    }

    /// Compare two positions; positions in different roots are unrelated
    pub fn compare(&self, other: &Position) -> PositionRelation {
        match self.partial_cmp(other) {
            None => PositionRelation::DifferentRoot,
            Some(Ordering::Less) => PositionRelation::Before,
            Some(Ordering::Greater) => PositionRelation::After,
            Some(Ordering::Equal) => PositionRelation::Same,
        }
    }

    /// Like [`compare`](Self::compare) but failing for different roots
    pub fn try_compare(&self, other: &Position) -> ModelResult<Ordering> {
        self.partial_cmp(other)
            .ok_or_else(|| ModelError::disjoint_roots(&self.root, &other.root))
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self.compare(other) == PositionRelation::Before
    }

    pub fn is_after(&self, other: &Position) -> bool {
        self.compare(other) == PositionRelation::After
    }

    /// Shift the offset (last segment) by `delta`, clamping at zero
    pub fn shifted_by(&self, delta: isize) -> Position {
        let depth = self.path.len().saturating_sub(1);
        self.shifted_at(depth, delta)
    }

    /// Shift the path segment at `index` by `delta`, clamping at zero
    pub fn shifted_at(&self, index: usize, delta: isize) -> Position {
        let mut shifted = self.clone();
        if let Some(segment) = shifted.path.get_mut(index) {
            *segment = segment.saturating_add_signed(delta);
        }
        shifted
    }

    /// Index of the path segment an operation at `at` would modify, if any
    fn affected_segment(&self, at: &Position) -> Option<usize> {
        if self.root != at.root || at.path.is_empty() || self.path.len() < at.path.len() {
            return None;
        }
        let depth = at.path.len() - 1;
        (self.path[..depth] == at.path[..depth]).then_some(depth)
    }

    pub fn transformed_by_insertion(&self, at: &Position, how_many: usize) -> Position {
        self.transformed_by_insertion_with(at, how_many, Stickiness::ToNone)
    }

    pub fn transformed_by_insertion_with(
        &self,
        at: &Position,
        how_many: usize,
        stickiness: Stickiness,
    ) -> Position {
        let mut transformed = self.clone();
        let Some(depth) = self.affected_segment(at) else {
            return transformed;
        };

        let offset = at.path[depth];
        let current = self.path[depth];
        let shift = if self.path.len() == at.path.len() {
            offset < current || (offset == current && stickiness != Stickiness::ToPrevious)
        } else {
            offset <= current
        };
        if shift {
            transformed.path[depth] += how_many;
        }
        transformed
    }

    /// `None` when the position was inside the deleted span
    pub fn transformed_by_deletion(&self, at: &Position, how_many: usize) -> Option<Position> {
        let mut transformed = self.clone();
        let Some(depth) = self.affected_segment(at) else {
            return Some(transformed);
        };

        let offset = at.path[depth];
        let current = self.path[depth];
        let affected = if self.path.len() == at.path.len() {
            offset < current
        } else {
            offset <= current
        };
        if affected {
            if offset + how_many > current {
                return None;
            }
            transformed.path[depth] -= how_many;
        }
        Some(transformed)
    }

    pub fn transformed_by_move(&self, source: &Position, target: &Position, how_many: usize) -> Position {
        self.transformed_by_move_with(source, target, how_many, Stickiness::ToNone)
    }

    /// `target` is expressed before the moved span is detached
    pub fn transformed_by_move_with(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        stickiness: Stickiness,
    ) -> Position {
        let Some(target) = target.transformed_by_deletion(source, how_many) else {
            return self.clone();
        };
        if *source == target {
            return self.clone();
        }

        let transformed = self.transformed_by_deletion(source, how_many);
        let moved = match &transformed {
            None => true,
            Some(_) => {
                (stickiness == Stickiness::ToNext && self == source)
                    || (stickiness == Stickiness::ToPrevious
                        && *self == source.shifted_by(how_many as isize))
            }
        };

        match transformed {
            Some(transformed) if !moved => {
                transformed.transformed_by_insertion_with(&target, how_many, stickiness)
            }
            _ => self.combined(source, &target),
        }
    }

    /// Re-anchor a position that lies in (or after) `source` to the same
    /// relative place after `target`
    pub fn combined(&self, source: &Position, target: &Position) -> Position {
        let depth = source.path.len().saturating_sub(1);
        let mut combined = target.clone();
        let delta = self.path.get(depth).copied().unwrap_or(0) as isize - source.offset() as isize;
        combined = combined.shifted_by(delta);
        if self.path.len() > depth + 1 {
            combined.path.extend_from_slice(&self.path[depth + 1..]);
        }
        combined
    }

    /// Position right after the element containing `split_position`, where
    /// the second half of a split is inserted
    pub fn split_insertion_position(split_position: &Position) -> Position {
        split_position.parent().shifted_by(1)
    }

    pub fn transformed_by_split(
        &self,
        split_position: &Position,
        insertion: &Position,
        graveyard: Option<&Position>,
    ) -> Position {
        self.transformed_by_split_with(split_position, insertion, graveyard, Stickiness::ToNone)
    }

    /// Positions after the split offset move into the new element created at
    /// `insertion`; the rest only shift by that element
    pub fn transformed_by_split_with(
        &self,
        split_position: &Position,
        insertion: &Position,
        graveyard: Option<&Position>,
        stickiness: Stickiness,
    ) -> Position {
        let contained = self.affected_segment(split_position).is_some()
            && (self.is_after(split_position)
                || (self == split_position && stickiness == Stickiness::ToNext));

        if contained {
            return self.combined(split_position, &insertion.child(0));
        }

        match graveyard {
            Some(graveyard) => self.transformed_by_move_with(graveyard, insertion, 1, stickiness),
            None => self.transformed_by_insertion_with(insertion, 1, stickiness),
        }
    }

    pub fn transformed_by_merge(&self, source: &Position, target: &Position, graveyard: &Position) -> Position {
        self.transformed_by_merge_with(source, target, graveyard, Stickiness::ToNone)
    }

    /// Positions inside the merged element move to the merge target; the
    /// merged element itself goes to `graveyard`
    pub fn transformed_by_merge_with(
        &self,
        source: &Position,
        target: &Position,
        graveyard: &Position,
        stickiness: Stickiness,
    ) -> Position {
        let deletion = source.parent();
        let contained = self.affected_segment(source).is_some() && !self.is_before(source);

        if contained {
            let combined = self.combined(source, target);
            if source.is_before(target) {
                return match combined.transformed_by_deletion(&deletion, 1) {
                    Some(position) => position,
                    None => combined,
                };
            }
            return combined;
        }

        if *self == deletion {
            return self.clone();
        }

        self.transformed_by_move_with(&deletion, graveyard, 1, stickiness)
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.root != other.root {
            return None;
        }
        Some(self.path.cmp(&other.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    #[test]
    fn test_compare() {
        assert_eq!(pos(&[0, 1]).compare(&pos(&[0, 2])), PositionRelation::Before);
        assert_eq!(pos(&[1]).compare(&pos(&[0, 5])), PositionRelation::After);
        assert_eq!(pos(&[0, 1]).compare(&pos(&[0, 1])), PositionRelation::Same);
        assert_eq!(
            pos(&[0]).compare(&Position::graveyard(0)),
            PositionRelation::DifferentRoot
        );
        assert!(matches!(
            pos(&[0]).try_compare(&Position::graveyard(0)),
            Err(ModelError::DisjointRoots { .. })
        ));
    }

    #[test]
    fn test_shifted() {
        assert_eq!(pos(&[0, 3]).shifted_by(2), pos(&[0, 5]));
        assert_eq!(pos(&[0, 3]).shifted_by(-5), pos(&[0, 0]));
        assert_eq!(pos(&[2, 3]).shifted_at(0, 1), pos(&[3, 3]));
    }

    #[test]
    fn test_insertion_shifts_same_parent_and_descendants() {
        let at = pos(&[0, 2]);
        assert_eq!(pos(&[0, 2]).transformed_by_insertion(&at, 3), pos(&[0, 5]));
        assert_eq!(pos(&[0, 1]).transformed_by_insertion(&at, 3), pos(&[0, 1]));
        assert_eq!(pos(&[0, 2, 1]).transformed_by_insertion(&at, 3), pos(&[0, 5, 1]));
        assert_eq!(
            pos(&[0, 2]).transformed_by_insertion_with(&at, 3, Stickiness::ToPrevious),
            pos(&[0, 2])
        );
    }

    #[test]
    fn test_deletion() {
        let at = pos(&[0, 2]);
        assert_eq!(pos(&[0, 6]).transformed_by_deletion(&at, 3), Some(pos(&[0, 3])));
        assert_eq!(pos(&[0, 3]).transformed_by_deletion(&at, 3), None);
        assert_eq!(pos(&[0, 5]).transformed_by_deletion(&at, 3), Some(pos(&[0, 2])));
        assert_eq!(pos(&[0, 2, 0]).transformed_by_deletion(&at, 1), None);
    }

    #[test]
    fn test_move_combines_moved_positions() {
        // "abcdef": move "bc" to the end of the second paragraph
        let source = pos(&[0, 1]);
        let target = pos(&[1, 4]);
        assert_eq!(pos(&[0, 2]).transformed_by_move(&source, &target, 2), pos(&[1, 5]));
        assert_eq!(pos(&[0, 5]).transformed_by_move(&source, &target, 2), pos(&[0, 3]));
        assert_eq!(
            pos(&[0, 1]).transformed_by_move_with(&source, &target, 2, Stickiness::ToNext),
            pos(&[1, 4])
        );
    }

    #[test]
    fn test_split_redirects_into_second_element() {
        let split = pos(&[0, 3]);
        let insertion = Position::split_insertion_position(&split);
        assert_eq!(insertion, pos(&[1]));
        assert_eq!(pos(&[0, 5]).transformed_by_split(&split, &insertion, None), pos(&[1, 2]));
        assert_eq!(pos(&[0, 3]).transformed_by_split(&split, &insertion, None), pos(&[0, 3]));
        assert_eq!(
            pos(&[0, 3]).transformed_by_split_with(&split, &insertion, None, Stickiness::ToNext),
            pos(&[1, 0])
        );
        assert_eq!(pos(&[1, 1]).transformed_by_split(&split, &insertion, None), pos(&[2, 1]));
    }

    #[test]
    fn test_merge_moves_into_target() {
        // <p>abc</p><p>de</p> merged: source [1, 0], target [0, 3]
        let source = pos(&[1, 0]);
        let target = pos(&[0, 3]);
        let graveyard = Position::graveyard(0);
        assert_eq!(pos(&[1, 1]).transformed_by_merge(&source, &target, &graveyard), pos(&[0, 4]));
        assert_eq!(pos(&[2, 0]).transformed_by_merge(&source, &target, &graveyard), pos(&[1, 0]));
        assert_eq!(pos(&[1]).transformed_by_merge(&source, &target, &graveyard), pos(&[1]));
    }
}
