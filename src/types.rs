//! Core types for the Epiform pipeline
//!
//! These are the structures handed to the sampling backend: the resolved
//! shape of each random walk term and their concatenation over a formula.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::sparse::{CsrMatrix, SparseParts};

/// One random walk term resolved against a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTerm {
    /// Canonical label of the term
    pub label: String,
    /// Number of distinct groups, one random walk each
    pub num_processes: usize,
    /// Distinct time periods of each process
    pub periods_per_process: Vec<usize>,
    /// Increment prior scale, one entry per process
    pub prior_scale: Vec<f64>,
    /// Coefficient names, `label[time,group]`, one per design matrix column
    pub coefficient_names: Vec<String>,
    /// Observation-to-coefficient indicator matrix
    pub design_matrix: CsrMatrix<f64>,
}

impl ParsedTerm {
    /// Number of random walk coefficients (design matrix columns)
    pub fn num_coefficients(&self) -> usize {
        self.design_matrix.cols
    }
}

/// All random walk terms of a formula, concatenated in formula order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTerms {
    /// Term labels, one per term
    pub labels: Vec<String>,
    /// Process count of each term
    pub num_processes: Vec<usize>,
    /// Period counts of every process, term after term
    pub periods_per_process: Vec<usize>,
    /// Prior scale of every process, term after term
    pub prior_scale: Vec<f64>,
    /// Coefficient names, one per design matrix column
    pub coefficient_names: Vec<String>,
    /// Design matrices joined column-wise
    pub design_matrix: CsrMatrix<f64>,
}

impl AggregatedTerms {
    /// No terms, over a dataset of `rows` observations
    pub fn empty(rows: usize) -> Self {
        Self {
            labels: Vec::new(),
            num_processes: Vec::new(),
            periods_per_process: Vec::new(),
            prior_scale: Vec::new(),
            coefficient_names: Vec::new(),
            design_matrix: CsrMatrix::empty(rows),
        }
    }

    pub fn num_terms(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn total_processes(&self) -> usize {
        self.num_processes.iter().sum()
    }

    pub fn num_coefficients(&self) -> usize {
        self.design_matrix.cols
    }

    /// Design matrix columns owned by each term
    pub fn column_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::with_capacity(self.num_terms());
        let mut process = 0;
        let mut column = 0;
        for &n in &self.num_processes {
            let width: usize = self.periods_per_process[process..process + n].iter().sum();
            ranges.push(column..column + width);
            process += n;
            column += width;
        }
        ranges
    }
}

/// Data handed to the sampling backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendPayload {
    pub producer: String,
    pub version: String,
    /// The formula as parsed
    pub formula: String,
    /// The formula without random walk terms
    pub fixed_effects_formula: String,
    pub labels: Vec<String>,
    pub num_terms: usize,
    pub num_processes: Vec<usize>,
    pub periods_per_process: Vec<usize>,
    pub prior_scale: Vec<f64>,
    pub num_coefficients: usize,
    pub coefficient_names: Vec<String>,
    /// Design matrix as 1-based CSR parts
    pub design: SparseParts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_keeps_rows() {
        let terms = AggregatedTerms::empty(5);
        assert!(terms.is_empty());
        assert_eq!(terms.design_matrix.rows, 5);
        assert_eq!(terms.num_coefficients(), 0);
        assert_eq!(terms.column_ranges(), Vec::<Range<usize>>::new());
    }

    #[test]
    fn test_column_ranges() {
        let terms = AggregatedTerms {
            labels: vec!["rw()".to_string(), "rw(gr = g)".to_string()],
            num_processes: vec![1, 2],
            periods_per_process: vec![4, 2, 3],
            prior_scale: vec![0.2; 3],
            coefficient_names: Vec::new(),
            design_matrix: CsrMatrix::empty(4),
        };
        assert_eq!(terms.total_processes(), 3);
        assert_eq!(terms.column_ranges(), vec![0..4, 4..9]);
    }
}
