//! Observation dataset
//!
//! A [`Dataset`] is the immutable column table that random-walk terms are
//! resolved against. It carries a designated default date column, used by
//! terms that do not name their own time axis.
//!
//! Datasets can be built in-process or loaded from JSON:
//!
//! ```json
//! {
//!   "date_column": "date",
//!   "columns": [
//!     { "name": "date", "type": "date", "values": ["2020-02-22", "2020-02-23"] },
//!     { "name": "region", "type": "factor", "levels": ["A", "B", "C"], "values": ["A", "B"] }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::TermError;

/// Default name of the dataset's date column
pub const DEFAULT_DATE_COLUMN: &str = "date";

/// A typed column of observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Column {
    Date { values: Vec<NaiveDate> },
    Integer { values: Vec<i64> },
    Real { values: Vec<f64> },
    Text { values: Vec<String> },
    /// Categorical column; `levels` may include categories that never occur
    Factor {
        levels: Vec<String>,
        values: Vec<String>,
    },
}

impl Column {
    /// Parse `YYYY-MM-DD` strings into a date column
    pub fn parse_dates(values: &[&str]) -> Result<Self, TermError> {
        let values = values
            .iter()
            .map(|v| {
                NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|e| {
                    TermError::InvalidDataset(format!("invalid date '{}': {}", v, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Column::Date { values })
    }

    /// Text column from string slices
    pub fn text(values: &[&str]) -> Self {
        Column::Text {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Factor column from declared levels and per-row values
    pub fn factor(levels: &[&str], values: &[&str]) -> Self {
        Column::Factor {
            levels: levels.iter().map(|v| v.to_string()).collect(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Date { values } => values.len(),
            Column::Integer { values } => values.len(),
            Column::Real { values } => values.len(),
            Column::Text { values } => values.len(),
            Column::Factor { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Date { .. } => "date",
            Column::Integer { .. } => "integer",
            Column::Real { .. } => "real",
            Column::Text { .. } => "text",
            Column::Factor { .. } => "factor",
        }
    }

    /// Hashable key for the value at `row`.
    ///
    /// Factor cells key on their level name, so levels that never occur are
    /// invisible to anything counting distinct keys.
    pub fn key(&self, row: usize) -> CellKey {
        match self {
            Column::Date { values } => CellKey::Date(values[row]),
            Column::Integer { values } => CellKey::Integer(values[row]),
            Column::Real { values } => {
                let v = values[row];
                // -0.0 and 0.0 are the same observation
                let v = if v == 0.0 { 0.0 } else { v };
                CellKey::Real(v.to_bits())
            }
            Column::Text { values } => CellKey::Text(values[row].clone()),
            Column::Factor { values, .. } => CellKey::Text(values[row].clone()),
        }
    }
}

/// A single cell value usable as a map key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    Date(NaiveDate),
    Integer(i64),
    /// Bit pattern of an `f64`
    Real(u64),
    Text(String),
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellKey::Integer(i) => write!(f, "{}", i),
            CellKey::Real(bits) => write!(f, "{}", f64::from_bits(*bits)),
            CellKey::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A column with its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedColumn {
    pub name: String,
    #[serde(flatten)]
    pub column: Column,
}

/// Serialized form of a dataset, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    #[serde(default = "default_date_column")]
    pub date_column: String,
    pub columns: Vec<NamedColumn>,
}

fn default_date_column() -> String {
    DEFAULT_DATE_COLUMN.to_string()
}

/// Immutable table of observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetSpec", into = "DatasetSpec")]
pub struct Dataset {
    date_column: String,
    columns: Vec<NamedColumn>,
    date_index: usize,
    rows: usize,
}

impl Dataset {
    /// Validate and build a dataset.
    ///
    /// Requires at least one row, equal-length uniquely named columns, a
    /// date-typed default date column, and factor values drawn from their
    /// declared levels.
    pub fn new(date_column: impl Into<String>, columns: Vec<NamedColumn>) -> Result<Self, TermError> {
        let date_column = date_column.into();

        let mut seen = HashSet::new();
        for named in &columns {
            if !seen.insert(named.name.as_str()) {
                return Err(TermError::InvalidDataset(format!(
                    "duplicate column '{}'",
                    named.name
                )));
            }
        }

        let date_index = columns
            .iter()
            .position(|c| c.name == date_column)
            .ok_or_else(|| {
                TermError::InvalidDataset(format!("missing date column '{}'", date_column))
            })?;
        let date = &columns[date_index];
        if !matches!(date.column, Column::Date { .. }) {
            return Err(TermError::InvalidDataset(format!(
                "date column '{}' has type {}, expected date",
                date_column,
                date.column.type_name()
            )));
        }

        let rows = date.column.len();
        if rows == 0 {
            return Err(TermError::InvalidDataset("dataset has no rows".to_string()));
        }

        for named in &columns {
            if named.column.len() != rows {
                return Err(TermError::InvalidDataset(format!(
                    "column '{}' has {} rows, expected {}",
                    named.name,
                    named.column.len(),
                    rows
                )));
            }
            if let Column::Factor { levels, values } = &named.column {
                validate_factor(&named.name, levels, values)?;
            }
        }

        Ok(Self {
            date_column,
            columns,
            date_index,
            rows,
        })
    }

    /// Start building a dataset whose default date column is `date_column`
    pub fn builder(date_column: impl Into<String>) -> DatasetBuilder {
        DatasetBuilder {
            date_column: date_column.into(),
            columns: Vec::new(),
        }
    }

    /// Parse a dataset from its JSON form
    pub fn from_json(json: &str) -> Result<Self, TermError> {
        let spec: DatasetSpec = serde_json::from_str(json)?;
        Self::try_from(spec)
    }

    /// Serialize the dataset to JSON
    pub fn to_json(&self) -> Result<String, TermError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.column)
    }

    /// The default date column
    pub fn dates(&self) -> &Column {
        &self.columns[self.date_index].column
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

fn validate_factor(name: &str, levels: &[String], values: &[String]) -> Result<(), TermError> {
    let mut level_set = HashSet::new();
    for level in levels {
        if !level_set.insert(level.as_str()) {
            return Err(TermError::InvalidDataset(format!(
                "factor column '{}' declares level '{}' twice",
                name, level
            )));
        }
    }
    if let Some(value) = values.iter().find(|v| !level_set.contains(v.as_str())) {
        return Err(TermError::InvalidDataset(format!(
            "factor column '{}' has value '{}' outside its levels",
            name, value
        )));
    }
    Ok(())
}

impl TryFrom<DatasetSpec> for Dataset {
    type Error = TermError;

    fn try_from(spec: DatasetSpec) -> Result<Self, Self::Error> {
        Dataset::new(spec.date_column, spec.columns)
    }
}

impl From<Dataset> for DatasetSpec {
    fn from(dataset: Dataset) -> Self {
        DatasetSpec {
            date_column: dataset.date_column,
            columns: dataset.columns,
        }
    }
}

/// Incremental dataset construction
pub struct DatasetBuilder {
    date_column: String,
    columns: Vec<NamedColumn>,
}

impl DatasetBuilder {
    /// Append a column
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push(NamedColumn {
            name: name.into(),
            column,
        });
        self
    }

    pub fn build(self) -> Result<Dataset, TermError> {
        Dataset::new(self.date_column, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dates() -> Column {
        Column::parse_dates(&["2020-02-22", "2020-02-23", "2020-02-24", "2020-02-25"]).unwrap()
    }

    #[test]
    fn test_build_dataset() {
        let data = Dataset::builder("date")
            .column("date", dates())
            .column("region", Column::text(&["A", "A", "B", "B"]))
            .build()
            .unwrap();

        assert_eq!(data.rows(), 4);
        assert_eq!(data.date_column(), "date");
        assert_eq!(data.column_names().collect::<Vec<_>>(), vec!["date", "region"]);
        assert_eq!(data.dates(), &dates());
        assert!(data.column("missing").is_none());
    }

    #[test]
    fn test_missing_date_column_rejected() {
        let result = Dataset::builder("date")
            .column("day", dates())
            .build();
        assert!(matches!(result, Err(TermError::InvalidDataset(_))));
    }

    #[test]
    fn test_date_column_must_be_dates() {
        let result = Dataset::builder("date")
            .column("date", Column::Integer { values: vec![1, 2] })
            .build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("expected date"));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = Dataset::builder("date")
            .column("date", dates())
            .column("region", Column::text(&["A", "B"]))
            .build();
        assert!(matches!(result, Err(TermError::InvalidDataset(_))));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let result = Dataset::builder("date")
            .column("date", Column::Date { values: vec![] })
            .build();
        assert!(matches!(result, Err(TermError::InvalidDataset(_))));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = Dataset::builder("date")
            .column("date", dates())
            .column("date", dates())
            .build();
        assert!(matches!(result, Err(TermError::InvalidDataset(_))));
    }

    #[test]
    fn test_factor_values_must_be_levels() {
        let result = Dataset::builder("date")
            .column("date", dates())
            .column("region", Column::factor(&["A", "B"], &["A", "A", "B", "C"]))
            .build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("'C' outside its levels"));
    }

    #[test]
    fn test_invalid_date_string() {
        assert!(Column::parse_dates(&["2020-13-01"]).is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "columns": [
                { "name": "date", "type": "date", "values": ["2020-02-22", "2020-02-23"] },
                { "name": "week", "type": "integer", "values": [1, 1] },
                { "name": "region", "type": "factor", "levels": ["A", "B", "C"], "values": ["A", "B"] }
            ]
        }"#;
        let data = Dataset::from_json(json).unwrap();
        assert_eq!(data.rows(), 2);
        assert_eq!(data.date_column(), DEFAULT_DATE_COLUMN);
        assert_eq!(data.column("week").unwrap().type_name(), "integer");

        let round_trip = Dataset::from_json(&data.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, data);
    }

    #[test]
    fn test_from_json_validates() {
        let json = r#"{ "date_column": "day", "columns": [] }"#;
        assert!(matches!(
            Dataset::from_json(json),
            Err(TermError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_cell_keys() {
        let real = Column::Real { values: vec![-0.0, 0.0, 1.5] };
        assert_eq!(real.key(0), real.key(1));
        assert_eq!(real.key(2).to_string(), "1.5");

        let factor = Column::factor(&["A", "B"], &["B"]);
        assert_eq!(factor.key(0), CellKey::Text("B".to_string()));
        assert_eq!(dates().key(0).to_string(), "2020-02-22");
    }
}
