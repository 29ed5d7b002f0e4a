//! Single random walk term parsing
//!
//! Resolves a [`RandomWalkDescriptor`] against a [`Dataset`]:
//! - the time axis is the named column or the dataset's date column
//! - the group is the named column or one implicit group for all rows
//! - each distinct group is a process; each distinct time within it a period
//! - the design matrix maps every row to its (process, period) coefficient
//!
//! Coefficients are ordered process-major. Processes appear in the order their
//! group is first observed and periods in the order their time is first
//! observed within the group, so for rows sorted by (group, time) this is the
//! first-appearance order of the (time, group) pair.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::config::ParseConfig;
use crate::dataset::{CellKey, Column, Dataset};
use crate::error::TermError;
use crate::formula::{ColumnRef, RandomWalkDescriptor};
use crate::sparse::CsrMatrix;
use crate::types::ParsedTerm;

/// Parse one term with the default configuration
pub fn parse_term(
    descriptor: &RandomWalkDescriptor,
    dataset: &Dataset,
) -> Result<ParsedTerm, TermError> {
    parse_term_with(descriptor, dataset, &ParseConfig::default())
}

/// Parse one term
pub fn parse_term_with(
    descriptor: &RandomWalkDescriptor,
    dataset: &Dataset,
    config: &ParseConfig,
) -> Result<ParsedTerm, TermError> {
    let time = match descriptor.time() {
        ColumnRef::Default => dataset.dates(),
        ColumnRef::Named(name) => lookup(descriptor, dataset, name)?,
    };
    let group = match descriptor.group() {
        ColumnRef::Default => None,
        ColumnRef::Named(name) => Some(lookup(descriptor, dataset, name)?),
    };

    let rows = dataset.rows();
    let mut processes = Processes::default();
    let mut coordinates = Vec::with_capacity(rows);
    for row in 0..rows {
        let group_key = group.map(|column| column.key(row));
        let coordinate = processes.insert(group_key, time.key(row));
        coordinates.push(coordinate);
    }

    let periods_per_process: Vec<usize> = processes.periods.iter().map(Vec::len).collect();
    let mut offsets = Vec::with_capacity(periods_per_process.len());
    let mut cols = 0;
    for &periods in &periods_per_process {
        offsets.push(cols);
        cols += periods;
    }

    let columns = coordinates
        .iter()
        .map(|&(process, period)| offsets[process] + period)
        .collect();
    let design_matrix = CsrMatrix::indicator(cols, columns);

    let coefficient_names = processes.coefficient_names(descriptor.label(), config.synthetic_group());
    let num_processes = periods_per_process.len();
    let prior_scale = vec![descriptor.prior_scale_or(config.default_prior_scale()); num_processes];

    debug!(
        label = descriptor.label(),
        rows,
        num_processes,
        coefficients = cols,
        "parsed random walk term"
    );
    trace!(label = descriptor.label(), ?periods_per_process);

    Ok(ParsedTerm {
        label: descriptor.label().to_string(),
        num_processes,
        periods_per_process,
        prior_scale,
        coefficient_names,
        design_matrix,
    })
}

fn lookup<'a>(
    descriptor: &RandomWalkDescriptor,
    dataset: &'a Dataset,
    name: &str,
) -> Result<&'a Column, TermError> {
    dataset.column(name).ok_or_else(|| TermError::UnknownColumn {
        label: descriptor.label().to_string(),
        column: name.to_string(),
    })
}

/// Index of processes and their periods, in first-appearance order.
///
/// Maps are only used for lookup; positions come from the vectors, so no
/// hash iteration order leaks into the output.
#[derive(Default)]
struct Processes {
    /// `None` is the implicit group of an ungrouped term
    groups: Vec<Option<CellKey>>,
    group_index: HashMap<Option<CellKey>, usize>,
    periods: Vec<Vec<CellKey>>,
    period_index: Vec<HashMap<CellKey, usize>>,
}

impl Processes {
    /// Record an observation, returning its (process, period) coordinate
    fn insert(&mut self, group: Option<CellKey>, time: CellKey) -> (usize, usize) {
        let process = match self.group_index.get(&group) {
            Some(&index) => index,
            None => {
                let index = self.groups.len();
                self.group_index.insert(group.clone(), index);
                self.groups.push(group);
                self.periods.push(Vec::new());
                self.period_index.push(HashMap::new());
                index
            }
        };

        let period = match self.period_index[process].get(&time) {
            Some(&index) => index,
            None => {
                let index = self.periods[process].len();
                self.period_index[process].insert(time.clone(), index);
                self.periods[process].push(time);
                index
            }
        };

        (process, period)
    }

    fn coefficient_names(&self, label: &str, synthetic_group: &str) -> Vec<String> {
        let mut names = Vec::new();
        for (group, periods) in self.groups.iter().zip(&self.periods) {
            let group_name = match group {
                Some(key) => key.to_string(),
                None => synthetic_group.to_string(),
            };
            for time in periods {
                names.push(format!("{}[{},{}]", label, time, group_name));
            }
        }
        names
    }
}
