use serde::{Deserialize, Serialize};

use super::sequence::{column_major, row_major, Finite, Infinite, Tile};
use crate::{Error, Result};

/// Fill order of the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fill each row left to right, then move down
    Row,
    /// Fill each column top to bottom, then move right
    Column,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
        }
    }
}

/// Size of one grid dimension, or any other count that may be unbounded.
///
/// Serialized as a number or the string `"auto"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExtentRepr", into = "ExtentRepr")]
pub enum Extent {
    /// Unbounded; grows with the page count
    Auto,
    Fixed(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ExtentRepr {
    Fixed(usize),
    Keyword(String),
}

impl TryFrom<ExtentRepr> for Extent {
    type Error = String;

    fn try_from(value: ExtentRepr) -> std::result::Result<Self, String> {
        match value {
            ExtentRepr::Fixed(n) => Ok(Self::Fixed(n)),
            ExtentRepr::Keyword(word) if word == "auto" => Ok(Self::Auto),
            ExtentRepr::Keyword(word) => Err(format!("expected \"auto\" or a count, got {:?}", word)),
        }
    }
}

impl From<Extent> for ExtentRepr {
    fn from(value: Extent) -> Self {
        match value {
            Extent::Auto => Self::Keyword("auto".to_string()),
            Extent::Fixed(n) => Self::Fixed(n),
        }
    }
}

impl Extent {
    pub fn fixed(&self) -> Option<usize> {
        match self {
            Self::Auto => None,
            Self::Fixed(n) => Some(*n),
        }
    }

    fn axis(self) -> Axis {
        match self {
            Self::Auto => Axis::Unbounded(Infinite::default()),
            Self::Fixed(n) => Axis::Bounded(Finite::up_to(n)),
        }
    }
}

impl From<Option<usize>> for Extent {
    fn from(value: Option<usize>) -> Self {
        value.map(Self::Fixed).unwrap_or(Self::Auto)
    }
}

/// One grid dimension as an index sequence
#[derive(Debug, Clone)]
enum Axis {
    Bounded(Finite),
    Unbounded(Infinite),
}

impl Iterator for Axis {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Self::Bounded(seq) => seq.next(),
            Self::Unbounded(seq) => seq.next(),
        }
    }
}

/// Boxed coordinate sequence produced by [`TileConfiguration::sequence`]
pub type TileSequence = Box<dyn Iterator<Item = Tile> + Send>;

/// Immutable grid layout description
///
/// At most one of `rows`/`columns` may be [`Extent::Auto`], and it must be the
/// dimension the direction does not iterate within: row-major needs a fixed
/// column count, column-major needs a fixed row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileConfiguration {
    direction: Direction,
    rows: Extent,
    columns: Extent,
}

impl TileConfiguration {
    pub fn new(direction: Direction, rows: Extent, columns: Extent) -> Result<Self> {
        if rows == Extent::Auto && columns == Extent::Auto {
            return Err(Error::InvalidConfiguration(
                "both rows and columns are auto".to_string(),
            ));
        }
        if rows == Extent::Fixed(0) {
            return Err(Error::InvalidConfiguration(
                "rows: must be auto OR GT 0".to_string(),
            ));
        }
        if columns == Extent::Fixed(0) {
            return Err(Error::InvalidConfiguration(
                "columns: must be auto OR GT 0".to_string(),
            ));
        }
        match direction {
            Direction::Row if columns == Extent::Auto => {
                return Err(Error::InvalidConfiguration(
                    "row: columns is auto; must be a number".to_string(),
                ));
            }
            Direction::Column if rows == Extent::Auto => {
                return Err(Error::InvalidConfiguration(
                    "column: rows is auto; must be a number".to_string(),
                ));
            }
            _ => {}
        }
        if let (Extent::Fixed(r), Extent::Fixed(c)) = (rows, columns) {
            if r.checked_mul(c).is_none() {
                return Err(Error::InvalidConfiguration(format!(
                    "rows x columns overflows ({} x {})",
                    r, c
                )));
            }
        }

        Ok(Self {
            direction,
            rows,
            columns,
        })
    }

    /// Single column, one page per row, growing downwards
    pub fn single_column() -> Self {
        Self {
            direction: Direction::Row,
            rows: Extent::Auto,
            columns: Extent::Fixed(1),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn rows(&self) -> Extent {
        self.rows
    }

    pub fn columns(&self) -> Extent {
        self.columns
    }

    /// Total cell count, or `None` if one dimension is auto
    pub fn total(&self) -> Option<usize> {
        self.rows.fixed()?.checked_mul(self.columns.fixed()?)
    }

    /// Build a fresh coordinate sequence for this layout
    pub fn sequence(&self) -> TileSequence {
        match self.direction {
            Direction::Row => {
                let columns = self.columns;
                Box::new(row_major(self.rows.axis(), move || columns.axis()))
            }
            Direction::Column => {
                let rows = self.rows;
                Box::new(column_major(move || rows.axis(), self.columns.axis()))
            }
        }
    }

    /// Coordinates of the `index`-th cell, `None` past the end of a bounded grid
    pub fn tile_at(&self, index: usize) -> Option<Tile> {
        match (self.direction, self.rows, self.columns) {
            (Direction::Row, rows, Extent::Fixed(columns)) => {
                let tile = Tile::new(index / columns, index % columns);
                match rows {
                    Extent::Fixed(rows) if tile.row >= rows => None,
                    _ => Some(tile),
                }
            }
            (Direction::Column, Extent::Fixed(rows), columns) => {
                let tile = Tile::new(index % rows, index / rows);
                match columns {
                    Extent::Fixed(columns) if tile.column >= columns => None,
                    _ => Some(tile),
                }
            }
            _ => None,
        }
    }
}

impl Default for TileConfiguration {
    fn default() -> Self {
        Self::single_column()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_3x3() {
        let tc = TileConfiguration::new(Direction::Row, Extent::Fixed(3), Extent::Fixed(3)).unwrap();
        let tiles: Vec<Tile> = tc.sequence().collect();
        assert_eq!(tiles.len(), 9);
        for (ix, tile) in tiles.iter().enumerate() {
            assert_eq!(*tile, Tile::new(ix / 3, ix % 3));
        }
    }

    #[test]
    fn test_column_3x3() {
        let tc =
            TileConfiguration::new(Direction::Column, Extent::Fixed(3), Extent::Fixed(3)).unwrap();
        let tiles: Vec<Tile> = tc.sequence().collect();
        assert_eq!(tiles.len(), 9);
        for (ix, tile) in tiles.iter().enumerate() {
            assert_eq!(*tile, Tile::new(ix % 3, ix / 3));
        }
    }

    #[test]
    fn test_sequence_is_restartable() {
        let tc = TileConfiguration::new(Direction::Row, Extent::Fixed(2), Extent::Fixed(4)).unwrap();
        let first: Vec<Tile> = tc.sequence().take(8).collect();
        let second: Vec<Tile> = tc.sequence().take(8).collect();
        assert_eq!(first, second);
        assert_eq!(tc.sequence().count(), 8);
    }

    #[test]
    fn test_auto_rows() {
        let tc = TileConfiguration::new(Direction::Row, Extent::Auto, Extent::Fixed(1)).unwrap();
        let mut seq = tc.sequence();
        for ix in 0..10 {
            assert_eq!(seq.next(), Some(Tile::new(ix, 0)));
        }
        assert_eq!(tc.total(), None);
    }

    #[test]
    fn test_auto_columns() {
        let tc = TileConfiguration::new(Direction::Column, Extent::Fixed(1), Extent::Auto).unwrap();
        let mut seq = tc.sequence();
        for ix in 0..10 {
            assert_eq!(seq.next(), Some(Tile::new(0, ix)));
        }
    }

    #[test]
    fn test_total() {
        let tc =
            TileConfiguration::new(Direction::Column, Extent::Fixed(3), Extent::Fixed(3)).unwrap();
        assert_eq!(tc.total(), Some(9));
    }

    #[test]
    fn test_invalid_configurations() {
        let cases = [
            (Direction::Column, Extent::Auto, Extent::Fixed(1)),
            (Direction::Row, Extent::Fixed(1), Extent::Auto),
            (Direction::Row, Extent::Auto, Extent::Auto),
            (Direction::Column, Extent::Auto, Extent::Auto),
            (Direction::Row, Extent::Fixed(0), Extent::Fixed(2)),
            (Direction::Column, Extent::Fixed(2), Extent::Fixed(0)),
            (Direction::Row, Extent::Fixed(usize::MAX), Extent::Fixed(2)),
            (Direction::Column, Extent::Fixed(usize::MAX / 2), Extent::Fixed(3)),
        ];
        for (direction, rows, columns) in cases {
            let result = TileConfiguration::new(direction, rows, columns);
            assert!(
                matches!(result, Err(Error::InvalidConfiguration(_))),
                "{:?} {:?} {:?}",
                direction,
                rows,
                columns
            );
        }
    }

    #[test]
    fn test_tile_at_matches_sequence() {
        let configs = [
            TileConfiguration::new(Direction::Row, Extent::Fixed(3), Extent::Fixed(4)).unwrap(),
            TileConfiguration::new(Direction::Column, Extent::Fixed(3), Extent::Fixed(4)).unwrap(),
            TileConfiguration::new(Direction::Row, Extent::Auto, Extent::Fixed(2)).unwrap(),
            TileConfiguration::new(Direction::Column, Extent::Fixed(2), Extent::Auto).unwrap(),
        ];
        for tc in configs {
            for (ix, tile) in tc.sequence().take(12).enumerate() {
                assert_eq!(tc.tile_at(ix), Some(tile));
            }
        }
    }

    #[test]
    fn test_tile_at_past_end() {
        let tc = TileConfiguration::new(Direction::Row, Extent::Fixed(2), Extent::Fixed(2)).unwrap();
        assert_eq!(tc.tile_at(3), Some(Tile::new(1, 1)));
        assert_eq!(tc.tile_at(4), None);
    }
}
