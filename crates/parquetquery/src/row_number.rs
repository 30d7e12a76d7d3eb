//! Hierarchical row numbers derived from repetition and definition levels

use std::cmp::Ordering;
use std::fmt;

/// Maximum nesting depth tracked by a [`RowNumber`]
pub const MAX_DEFINITION_LEVEL: usize = 8;

/// Position of a value inside the nested trace structure.
///
/// Index 0 is the trace (top-level row), index 1 the resource spans entry,
/// index 2 the scope spans entry, index 3 the span and index 4 the span
/// attribute, event or link. Levels that are not defined for a value are -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowNumber(pub [i32; MAX_DEFINITION_LEVEL]);

impl RowNumber {
    /// A row number positioned before the first row
    pub const fn empty() -> Self {
        Self([-1; MAX_DEFINITION_LEVEL])
    }

    /// Builds a row number from explicit levels, leaving the rest undefined
    pub fn from_levels(levels: &[i32]) -> Self {
        let mut row = Self::empty();
        for (slot, level) in row.0.iter_mut().zip(levels) {
            *slot = *level;
        }
        row
    }

    /// Advances to the next value given its repetition level and the depth
    /// at which the value is defined.
    pub fn next(&mut self, repetition_level: usize, depth: usize) {
        self.0[repetition_level] += 1;
        for i in repetition_level + 1..MAX_DEFINITION_LEVEL {
            self.0[i] = if i <= depth { 0 } else { -1 };
        }
    }

    /// Moves past `num_rows` top-level rows without visiting them
    pub fn skip(&mut self, num_rows: i64) {
        self.0[0] += num_rows as i32;
        for level in self.0.iter_mut().skip(1) {
            *level = -1;
        }
    }

    /// Returns a copy with every level deeper than `level` undefined
    pub fn truncated(&self, level: usize) -> Self {
        let mut row = *self;
        for slot in row.0.iter_mut().skip(level + 1) {
            *slot = -1;
        }
        row
    }

    /// Compares two row numbers up to and including `level`
    pub fn compare(a: &RowNumber, b: &RowNumber, level: usize) -> Ordering {
        let end = (level + 1).min(MAX_DEFINITION_LEVEL);
        a.0[..end].cmp(&b.0[..end])
    }

    /// Index at the given level
    pub fn level(&self, level: usize) -> i32 {
        self.0[level]
    }
}

impl Default for RowNumber {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for RowNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, level) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", level)?;
        }
        write!(f, "]")
    }
}
