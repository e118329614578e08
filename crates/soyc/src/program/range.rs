//! Half-open ranges over emitted JavaScript text

use std::cmp::Ordering;

/// A half-open byte range `[start, end)` within one output fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {start} is past its end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely within this range
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Orders ranges so that a container is visited before anything it contains.
    ///
    /// Ranges are sorted by start offset; ranges sharing a start put the longer
    /// one first.
    pub fn dependency_order(a: &Self, b: &Self) -> Ordering {
        a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end))
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
