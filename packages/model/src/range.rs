//! # Ranges
//!
//! A range spans from `start` to `end` inside one root. Non-collapsed
//! ranges keep their content when something is inserted at their
//! boundaries: the start sticks to the next node, the end to the previous
//! one.

use crate::error::{ModelError, ModelResult};
use crate::position::{Position, Stickiness};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Create a range, checking that both ends share a root and are ordered
    pub fn new(start: Position, end: Position) -> ModelResult<Self> {
        match start.try_compare(&end)? {
            std::cmp::Ordering::Greater => Err(ModelError::invalid_range(format!(
                "start {:?} is after end {:?}",
                start.path, end.path
            ))),
            _ => Ok(Self { start, end }),
        }
    }

    pub fn collapsed(position: Position) -> Self {
        Self {
            start: position.clone(),
            end: position,
        }
    }

    /// Flat range of `how_many` offsets starting at `position`
    pub fn from_position_and_shift(position: Position, how_many: usize) -> Self {
        let end = position.shifted_by(how_many as isize);
        Self { start: position, end }
    }

    /// Range between `start_offset` in `start_parent` and `end_offset` in
    /// `end_parent`, where both parents are element positions
    pub fn from_parents_and_offsets(
        start_parent: &Position,
        start_offset: usize,
        end_parent: &Position,
        end_offset: usize,
    ) -> ModelResult<Self> {
        Self::new(start_parent.child(start_offset), end_parent.child(end_offset))
    }

    pub fn root(&self) -> &str {
        &self.start.root
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Both ends share the same parent
    pub fn is_flat(&self) -> bool {
        self.start.has_same_parent_as(&self.end)
    }

    /// Number of offsets covered by a flat range
    pub fn how_many(&self) -> usize {
        self.end.offset().saturating_sub(self.start.offset())
    }

    /// Strictly inside the range
    pub fn contains_position(&self, position: &Position) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }

    pub fn contains_range(&self, other: &Range) -> bool {
        !other.start.is_before(&self.start)
            && !other.end.is_after(&self.end)
            && self.start.root == other.start.root
    }

    pub fn intersects(&self, other: &Range) -> bool {
        self.start.is_before(&other.end) && self.end.is_after(&other.start)
    }

    /// Parts of this range not covered by `other`
    pub fn difference(&self, other: &Range) -> Vec<Range> {
        if !self.intersects(other) {
            return vec![self.clone()];
        }

        let mut ranges = Vec::new();
        if self.contains_position(&other.start) {
            ranges.push(Range::spanning(self.start.clone(), other.start.clone()));
        }
        if self.contains_position(&other.end) {
            ranges.push(Range::spanning(other.end.clone(), self.end.clone()));
        }
        ranges
    }

    pub fn intersection(&self, other: &Range) -> Option<Range> {
        if !self.intersects(other) {
            return None;
        }

        let mut start = self.start.clone();
        let mut end = self.end.clone();
        if self.contains_position(&other.start) {
            start = other.start.clone();
        }
        if self.contains_position(&other.end) {
            end = other.end.clone();
        }
        Some(Range::spanning(start, end))
    }

    /// Build a range from transformed boundaries, collapsing inverted ones
    pub fn spanning(start: Position, end: Position) -> Self {
        if start.root == end.root && start.is_after(&end) {
            return Self::collapsed(start);
        }
        Self { start, end }
    }

    fn stickiness(&self) -> (Stickiness, Stickiness) {
        if self.is_collapsed() {
            (Stickiness::ToNone, Stickiness::ToNone)
        } else {
            (Stickiness::ToNext, Stickiness::ToPrevious)
        }
    }

    /// Glue ranges touching the first one into a single range. Ranges that
    /// do not touch the growing result are dropped.
    pub fn glued(ranges: &[Range]) -> Option<Range> {
        let (reference, rest) = ranges.split_first()?;
        let mut sorted: Vec<&Range> = rest
            .iter()
            .filter(|range| range.root() == reference.root())
            .collect();
        sorted.sort_by(|a, b| a.start.path.cmp(&b.start.path));

        let mut result = reference.clone();
        for range in sorted.iter().rev() {
            if range.end == result.start {
                result.start = range.start.clone();
            }
        }
        for range in &sorted {
            if range.start == result.end {
                result.end = range.end.clone();
            }
        }
        Some(result)
    }

    /// `None` when the whole range was deleted
    pub fn transformed_by_deletion(&self, at: &Position, how_many: usize) -> Option<Range> {
        let start = self.start.transformed_by_deletion(at, how_many);
        let end = self.end.transformed_by_deletion(at, how_many);
        match (start, end) {
            (None, None) => None,
            (start, end) => Some(Range::spanning(
                start.unwrap_or_else(|| at.clone()),
                end.unwrap_or_else(|| at.clone()),
            )),
        }
    }

    /// With `spread`, an insertion strictly inside breaks the range in two
    /// instead of growing it
    pub fn transformed_by_insertion(&self, at: &Position, how_many: usize, spread: bool) -> Vec<Range> {
        let (start_stickiness, end_stickiness) = self.stickiness();

        if spread && self.contains_position(at) {
            return vec![
                Range::spanning(self.start.clone(), at.clone()),
                Range::spanning(
                    at.shifted_by(how_many as isize),
                    self.end.transformed_by_insertion_with(at, how_many, end_stickiness),
                ),
            ];
        }

        vec![Range::spanning(
            self.start.transformed_by_insertion_with(at, how_many, start_stickiness),
            self.end.transformed_by_insertion_with(at, how_many, end_stickiness),
        )]
    }

    /// Pieces of this range after `how_many` offsets at `source` moved to
    /// `target`; the moved part follows the content
    pub fn transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        spread: bool,
    ) -> Vec<Range> {
        let (start_stickiness, end_stickiness) = self.stickiness();

        if self.is_collapsed() {
            return vec![Range::collapsed(
                self.start.transformed_by_move(source, target, how_many),
            )];
        }

        let moved = Range::from_position_and_shift(source.clone(), how_many);
        let insertion = target
            .transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| source.clone());

        if self.contains_position(target)
            && !spread
            && (moved.contains_position(&self.start) || moved.contains_position(&self.end))
        {
            return vec![Range::spanning(
                self.start.transformed_by_move_with(source, target, how_many, start_stickiness),
                self.end.transformed_by_move_with(source, target, how_many, end_stickiness),
            )];
        }

        let differences = self.difference(&moved);
        let common = self.intersection(&moved);

        let difference = match differences.as_slice() {
            [single] => Some(Range::spanning(
                deleted(&single.start, source, how_many),
                deleted(&single.end, source, how_many),
            )),
            [_, _] => Some(Range::spanning(
                self.start.clone(),
                deleted(&self.end, source, how_many),
            )),
            _ => None,
        };

        let mut result = match difference {
            Some(difference) => {
                difference.transformed_by_insertion(&insertion, how_many, common.is_some() || spread)
            }
            None => Vec::new(),
        };

        if let Some(common) = common {
            let transformed = Range::spanning(
                common.start.combined(source, &insertion),
                common.end.combined(source, &insertion),
            );
            if result.len() == 2 {
                result.insert(1, transformed);
            } else {
                result.push(transformed);
            }
        }

        result
    }

    /// The result may span both halves and is then no longer flat
    pub fn transformed_by_split(
        &self,
        split_position: &Position,
        insertion: &Position,
        graveyard: Option<&Position>,
    ) -> Range {
        let (start_stickiness, end_stickiness) = self.stickiness();

        let start = self
            .start
            .transformed_by_split_with(split_position, insertion, graveyard, start_stickiness);
        let mut end = self
            .end
            .transformed_by_split_with(split_position, insertion, graveyard, end_stickiness);

        if self.end == *insertion {
            end = self.end.shifted_by(1);
        }
        if start.root != end.root {
            end = self.end.shifted_by(-1);
        }

        Range::spanning(start, end)
    }

    pub fn transformed_by_merge(&self, source: &Position, target: &Position, graveyard: &Position) -> Range {
        let deletion = source.parent();
        if self.start == *target && self.end == deletion {
            return Range::collapsed(self.start.clone());
        }

        let (start_stickiness, end_stickiness) = self.stickiness();
        let mut start = self
            .start
            .transformed_by_merge_with(source, target, graveyard, start_stickiness);
        let mut end = self
            .end
            .transformed_by_merge_with(source, target, graveyard, end_stickiness);

        if start.root != end.root {
            end = self.end.shifted_by(-1);
        }

        if start.is_after(&end) {
            if source.is_before(target) {
                start = end.clone();
                start.set_offset(0);
            } else {
                if deletion != start {
                    end = deletion;
                }
                start = target.clone();
            }
        }

        Range::spanning(start, end)
    }
}

fn deleted(position: &Position, source: &Position, how_many: usize) -> Position {
    position
        .transformed_by_deletion(source, how_many)
        .unwrap_or_else(|| source.clone())
}
