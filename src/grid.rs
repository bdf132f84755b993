//! Rectangular string grid built from parsed CSV text.
//!
//! A [`Grid`] is the raw material of every conversion run: header rows are
//! sliced off for field extraction and the remaining rows feed record
//! synthesis. Slicing follows Python-style end indices and never fails; an
//! empty effective range simply yields an empty grid.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("Row {row} has {found} cell(s) but the grid is {expected} column(s) wide")]
    Shape {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Cell ({row}, {col}) is outside a {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// Open end index for [`Grid::slice`] and [`Grid::slice_columns`].
    pub const END: isize = isize::MAX;

    /// Builds a grid from rows that must all have the same length.
    pub fn new(rows: Vec<Vec<String>>) -> Result<Self, GridError> {
        let expected = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((row, found)) = rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, len)| *len != expected)
        {
            return Err(GridError::Shape {
                row,
                expected,
                found,
            });
        }
        Ok(Self { rows })
    }

    /// Builds a grid from ragged rows, padding short rows with empty cells.
    pub fn from_rows_padded<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect::<Vec<String>>())
            .collect::<Vec<_>>();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0 || self.column_count() == 0
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
    }

    /// Like [`Grid::get`] but reads missing cells as empty text.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.get(row, col).unwrap_or("")
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) -> Result<(), GridError> {
        let (rows, cols) = (self.row_count(), self.column_count());
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|cells| cells.get_mut(col))
            .ok_or(GridError::OutOfBounds {
                row,
                col,
                rows,
                cols,
            })?;
        *cell = value.into();
        Ok(())
    }

    /// Returns rows `start..end`, see [`effective_end`] for the end semantics.
    pub fn slice(&self, start: usize, end: isize) -> Grid {
        match effective_end(self.row_count(), end) {
            Some(end) if start < end => Grid {
                rows: self.rows[start..end].to_vec(),
            },
            _ => Grid::default(),
        }
    }

    /// Returns columns `start..end` of every row. An empty column range keeps
    /// the row count and drops every cell.
    pub fn slice_columns(&self, start: usize, end: isize) -> Grid {
        let range = effective_end(self.column_count(), end).filter(|end| start < *end);
        let rows = self
            .rows
            .iter()
            .map(|cells| match range {
                Some(end) => cells[start..end].to_vec(),
                None => Vec::new(),
            })
            .collect();
        Grid { rows }
    }

    /// Drops the first row at or after `from_row` whose `column` cell trims to
    /// `marker`, together with every row below it.
    pub fn truncate_at_marker(&mut self, column: usize, marker: &str, from_row: usize) -> Option<usize> {
        let position = self
            .rows
            .iter()
            .enumerate()
            .skip(from_row)
            .find(|(_, cells)| cells.get(column).is_some_and(|cell| cell.trim() == marker))
            .map(|(idx, _)| idx)?;
        self.rows.truncate(position);
        Some(position)
    }
}

/// Resolves a Python-style end index against a dimension of length `len`.
///
/// `None` means the range is empty regardless of the start index.
pub fn effective_end(len: usize, end: isize) -> Option<usize> {
    let n = len as isize;
    if end >= n {
        Some(len)
    } else if end <= -n {
        None
    } else {
        Some(end.rem_euclid(n) as usize)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            let line = row
                .iter()
                .map(|cell| format!("\"{cell}\""))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
