//! Multi-term aggregation
//!
//! Parses each detected random walk term and concatenates the results in
//! label order: process counts, period counts and prior scales end to end,
//! design matrices side by side.

use tracing::debug;

use crate::config::ParseConfig;
use crate::dataset::Dataset;
use crate::error::TermError;
use crate::formula::RandomWalkDescriptor;
use crate::sparse::CsrMatrix;
use crate::term_parser::parse_term_with;
use crate::types::{AggregatedTerms, ParsedTerm};

/// Aggregate terms with the default configuration
pub fn aggregate<S: AsRef<str>>(labels: &[S], dataset: &Dataset) -> Result<AggregatedTerms, TermError> {
    aggregate_with(labels, dataset, &ParseConfig::default())
}

/// Parse every label against `dataset` and concatenate the results
pub fn aggregate_with<S: AsRef<str>>(
    labels: &[S],
    dataset: &Dataset,
    config: &ParseConfig,
) -> Result<AggregatedTerms, TermError> {
    let parsed = labels
        .iter()
        .map(|label| {
            let descriptor = RandomWalkDescriptor::from_label(label.as_ref())?;
            parse_term_with(&descriptor, dataset, config)
        })
        .collect::<Result<Vec<_>, _>>()?;
    combine(parsed, dataset.rows())
}

/// Concatenate parsed terms over a dataset of `rows` observations
pub fn combine(parsed: Vec<ParsedTerm>, rows: usize) -> Result<AggregatedTerms, TermError> {
    let matrices: Vec<&CsrMatrix<f64>> = parsed.iter().map(|t| &t.design_matrix).collect();
    let design_matrix =
        CsrMatrix::hstack(rows, &matrices).map_err(|position| TermError::RowCountMismatch {
            label: parsed[position].label.clone(),
            expected: rows,
            actual: parsed[position].design_matrix.rows,
        })?;

    let mut aggregated = AggregatedTerms::empty(rows);
    for term in parsed {
        aggregated.labels.push(term.label);
        aggregated.num_processes.push(term.num_processes);
        aggregated.periods_per_process.extend(term.periods_per_process);
        aggregated.prior_scale.extend(term.prior_scale);
        aggregated.coefficient_names.extend(term.coefficient_names);
    }
    aggregated.design_matrix = design_matrix;

    debug!(
        terms = aggregated.num_terms(),
        processes = aggregated.total_processes(),
        coefficients = aggregated.num_coefficients(),
        "aggregated random walk terms"
    );

    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::term_parser::parse_term;
    use pretty_assertions::assert_eq;

    fn dataset() -> Dataset {
        Dataset::builder("date")
            .column(
                "date",
                Column::parse_dates(&["2020-02-22", "2020-02-23", "2020-02-24", "2020-02-25"])
                    .unwrap(),
            )
            .column("region", Column::text(&["A", "A", "B", "B"]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_single_default_term() {
        let terms = aggregate(&["rw()"], &dataset()).unwrap();
        assert_eq!(terms.num_processes, vec![1]);
        assert_eq!(terms.periods_per_process, vec![4]);
        assert_eq!(terms.design_matrix, CsrMatrix::identity(4));
    }

    #[test]
    fn test_terms_concatenate_in_order() {
        let data = dataset();
        let terms = aggregate(&["rw(gr = region)", "rw()"], &data).unwrap();
        assert_eq!(terms.labels, vec!["rw(gr = region)", "rw()"]);
        assert_eq!(terms.num_processes, vec![2, 1]);
        assert_eq!(terms.periods_per_process, vec![2, 2, 4]);
        assert_eq!(terms.prior_scale, vec![0.2; 3]);
        assert_eq!(terms.design_matrix.rows, 4);
        assert_eq!(terms.design_matrix.cols, 8);
        assert_eq!(terms.design_matrix.nnz(), 8);
        assert_eq!(terms.coefficient_names.len(), 8);
        assert_eq!(terms.column_ranges(), vec![0..4, 4..8]);

        let first = parse_term(&RandomWalkDescriptor::from_label("rw(gr = region)").unwrap(), &data)
            .unwrap();
        assert_eq!(terms.design_matrix.column_range(0..4), first.design_matrix);
    }

    #[test]
    fn test_leading_block_independent_of_later_terms() {
        let data = dataset();
        let alone = aggregate(&["rw(gr = region)"], &data).unwrap();
        let followed = aggregate(&["rw(gr = region)", "rw()", "rw(date, region)"], &data).unwrap();
        assert_eq!(
            followed.design_matrix.column_range(0..alone.num_coefficients()),
            alone.design_matrix
        );
    }

    #[test]
    fn test_no_labels() {
        let labels: [&str; 0] = [];
        let terms = aggregate(&labels, &dataset()).unwrap();
        assert_eq!(terms, AggregatedTerms::empty(4));
        assert_eq!(terms.design_matrix.rows, 4);
        assert_eq!(terms.design_matrix.cols, 0);
    }

    #[test]
    fn test_unknown_column_names_term() {
        let err = aggregate(&["rw()", "rw(gr = country)"], &dataset()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown column 'country' referenced by term 'rw(gr = country)'"
        );
    }

    #[test]
    fn test_row_count_mismatch() {
        let data = dataset();
        let mut bad = parse_term(&RandomWalkDescriptor::from_label("rw()").unwrap(), &data).unwrap();
        bad.design_matrix = CsrMatrix::identity(3);
        let err = combine(vec![bad], data.rows()).unwrap_err();
        match err {
            TermError::RowCountMismatch {
                label,
                expected,
                actual,
            } => {
                assert_eq!(label, "rw()");
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
