//! Lazy coordinate sequences for tile layout
//!
//! `finite` and `infinite` produce 1-D index sequences; `row_major` and
//! `column_major` combine a major sequence with a factory of fresh minor
//! sequences into 2-D grid coordinates. All of them are plain iterators, so a
//! layout pass simply zips the page list with a grid sequence.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Grid cell coordinates (0-relative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub row: usize,
    pub column: usize,
}

impl Tile {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// The sequence `0..limit`
#[derive(Debug, Clone)]
pub struct Finite {
    next: usize,
    limit: usize,
}

impl Finite {
    /// Bounded sequence without the `limit > 0` check; callers have validated it.
    pub(crate) fn up_to(limit: usize) -> Self {
        Self { next: 0, limit }
    }
}

impl Iterator for Finite {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.limit {
            return None;
        }
        let value = self.next;
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.limit.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Finite {}
impl FusedIterator for Finite {}

/// The sequence `0, 1, 2, ...` without end
#[derive(Debug, Clone, Default)]
pub struct Infinite {
    next: usize,
}

impl Iterator for Infinite {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let value = self.next;
        self.next = self.next.wrapping_add(1);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

/// Generate the sequence `[0..limit)`
pub fn finite(limit: usize) -> Result<Finite> {
    if limit == 0 {
        return Err(Error::invalid_argument("finite: limit must be GT 0"));
    }
    Ok(Finite::up_to(limit))
}

/// Generate the sequence `[0...]` without end
pub fn infinite() -> Infinite {
    Infinite::default()
}

#[derive(Debug, Clone, Copy)]
enum Major {
    Rows,
    Columns,
}

/// 2-D coordinate sequence built from a major sequence and a minor factory
///
/// For every major value a fresh minor sequence is built and exhausted.
pub struct GridSequence<M, F, N> {
    major: M,
    factory: F,
    minor: N,
    current: Option<usize>,
    fresh: bool,
    orientation: Major,
}

impl<M, F, N> GridSequence<M, F, N>
where
    M: Iterator<Item = usize>,
    F: FnMut() -> N,
    N: Iterator<Item = usize>,
{
    fn new(major: M, mut factory: F, orientation: Major) -> Self {
        let minor = factory();
        Self {
            major,
            factory,
            minor,
            current: None,
            fresh: true,
            orientation,
        }
    }
}

impl<M, F, N> Iterator for GridSequence<M, F, N>
where
    M: Iterator<Item = usize>,
    F: FnMut() -> N,
    N: Iterator<Item = usize>,
{
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        loop {
            let major = match self.current {
                Some(value) => value,
                None => {
                    let value = self.major.next()?;
                    self.current = Some(value);
                    value
                }
            };

            if let Some(minor) = self.minor.next() {
                self.fresh = false;
                return Some(match self.orientation {
                    Major::Rows => Tile::new(major, minor),
                    Major::Columns => Tile::new(minor, major),
                });
            }

            // An empty minor sequence would spin forever on an unbounded major
            if self.fresh {
                self.current = None;
                return None;
            }

            self.current = None;
            self.minor = (self.factory)();
            self.fresh = true;
        }
    }
}

/// Row-major coordinates: (0,0)...(0,n-1),(1,0)...(1,n-1),...
///
/// `columns` MUST build a new sequence on every call.
pub fn row_major<M, F, N>(rows: M, columns: F) -> GridSequence<M, F, N>
where
    M: Iterator<Item = usize>,
    F: FnMut() -> N,
    N: Iterator<Item = usize>,
{
    GridSequence::new(rows, columns, Major::Rows)
}

/// Column-major coordinates: (0,0)...(n-1,0),(0,1)...(n-1,1),...
///
/// `rows` MUST build a new sequence on every call.
pub fn column_major<M, F, N>(rows: F, columns: M) -> GridSequence<M, F, N>
where
    M: Iterator<Item = usize>,
    F: FnMut() -> N,
    N: Iterator<Item = usize>,
{
    GridSequence::new(columns, rows, Major::Columns)
}
