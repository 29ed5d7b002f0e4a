//! Sparse matrix storage
//!
//! Design matrices produced by the term parser have one non-zero per row and
//! can have many rows, so they are kept in compressed sparse row (CSR) form.
//! [`SparseParts`] is the 1-based CSR triple expected by the sampling backend.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Compressed Sparse Row (CSR) matrix.
///
/// For a matrix with `m` rows and `nnz` non-zeros:
/// - `row_ptr` has length `m + 1`
/// - `col_indices` and `values` each have length `nnz`
/// - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix<T> {
    /// Row pointers into `col_indices`/`values`
    pub row_ptr: Vec<usize>,
    /// Column index of each non-zero entry
    pub col_indices: Vec<usize>,
    /// Value of each non-zero entry
    pub values: Vec<T>,
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
}

impl<T: Copy> CsrMatrix<T> {
    /// A `rows x 0` matrix with no entries.
    pub fn empty(rows: usize) -> Self {
        Self {
            row_ptr: vec![0; rows + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
            rows,
            cols: 0,
        }
    }

    /// Number of stored non-zero entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of stored entries in `row`.
    pub fn row_degree(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Iterate over `(column, value)` pairs of `row`.
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, &T)> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter())
    }

    /// Value stored at `(row, col)`, if any.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.rows {
            return None;
        }
        self.row_entries(row)
            .find(|(c, _)| *c == col)
            .map(|(_, v)| *v)
    }

    /// Join matrices side by side.
    ///
    /// Column indices of each block are offset by the widths of the blocks
    /// before it. Fails with the position of the first block that does not
    /// have `rows` rows.
    pub fn hstack(rows: usize, blocks: &[&CsrMatrix<T>]) -> Result<Self, usize> {
        if let Some(position) = blocks.iter().position(|block| block.rows != rows) {
            return Err(position);
        }

        let nnz = blocks.iter().map(|block| block.nnz()).sum();
        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_ptr.push(0);

        for row in 0..rows {
            let mut offset = 0;
            for block in blocks {
                for (col, value) in block.row_entries(row) {
                    col_indices.push(offset + col);
                    values.push(*value);
                }
                offset += block.cols;
            }
            row_ptr.push(col_indices.len());
        }

        Ok(Self {
            row_ptr,
            col_indices,
            values,
            rows,
            cols: blocks.iter().map(|block| block.cols).sum(),
        })
    }

    /// Sub-matrix made of the columns in `range`, re-indexed from zero.
    pub fn column_range(&self, range: Range<usize>) -> Self {
        let cols = range.end.saturating_sub(range.start);
        let mut row_ptr = Vec::with_capacity(self.rows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);

        for row in 0..self.rows {
            for (col, value) in self.row_entries(row) {
                if range.contains(&col) {
                    col_indices.push(col - range.start);
                    values.push(*value);
                }
            }
            row_ptr.push(col_indices.len());
        }

        Self {
            row_ptr,
            col_indices,
            values,
            rows: self.rows,
            cols,
        }
    }
}

impl<T: Copy + Default> CsrMatrix<T> {
    /// Expand into a dense row-major representation.
    pub fn to_dense(&self) -> Vec<Vec<T>> {
        let mut dense = vec![vec![T::default(); self.cols]; self.rows];
        for (row, dense_row) in dense.iter_mut().enumerate() {
            for (col, value) in self.row_entries(row) {
                dense_row[col] = *value;
            }
        }
        dense
    }
}

impl CsrMatrix<f64> {
    /// Build a square identity matrix of dimension `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            row_ptr: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![1.0; n],
            rows: n,
            cols: n,
        }
    }

    /// Indicator matrix with a single 1.0 per row, in column `columns[row]`.
    ///
    /// # Panics
    ///
    /// Panics if any column is not below `cols`.
    pub fn indicator(cols: usize, columns: Vec<usize>) -> Self {
        if let Some(&col) = columns.iter().find(|&&col| col >= cols) {
            panic!("col index {} out of bounds (cols={})", col, cols);
        }
        let rows = columns.len();
        Self {
            row_ptr: (0..=rows).collect(),
            col_indices: columns,
            values: vec![1.0; rows],
            rows,
            cols,
        }
    }

    /// Export as the backend's 1-based CSR parts.
    pub fn to_sparse_parts(&self) -> SparseParts {
        SparseParts {
            rows: self.rows,
            cols: self.cols,
            w: self.values.clone(),
            v: self.col_indices.iter().map(|c| c + 1).collect(),
            u: self.row_ptr.iter().map(|p| p + 1).collect(),
        }
    }
}

/// CSR parts with 1-based indices, as consumed by the sampling backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseParts {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
    /// Non-zero values
    pub w: Vec<f64>,
    /// 1-based column index of each value
    pub v: Vec<usize>,
    /// 1-based start of each row in `w`, plus one trailing entry
    pub u: Vec<usize>,
}
