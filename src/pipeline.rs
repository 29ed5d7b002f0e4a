//! Pipeline orchestration
//!
//! This module provides the public API for Epiform.
//! It chains formula parsing, random walk detection and aggregation into the
//! payload consumed by the sampling backend.

use tracing::debug;

use crate::aggregate::aggregate_with;
use crate::config::ParseConfig;
use crate::dataset::Dataset;
use crate::detector::detect;
use crate::error::TermError;
use crate::formula::Formula;
use crate::types::{AggregatedTerms, BackendPayload};
use crate::{EPIFORM_VERSION, PRODUCER_NAME};

/// Resolve every random walk term of `formula` against `dataset`.
///
/// # Example
/// ```ignore
/// let formula = Formula::parse("R(country, date) ~ 1 + rw(gr = country)")?;
/// let terms = random_walk_terms(&formula, &dataset)?;
/// ```
pub fn random_walk_terms(formula: &Formula, dataset: &Dataset) -> Result<AggregatedTerms, TermError> {
    TermProcessor::new().process(formula, dataset)
}

/// Convert formula text and a JSON dataset into the backend payload JSON.
///
/// # Arguments
/// * `formula` - Model formula, e.g. `"R(country, date) ~ rw(gr = country)"`
/// * `dataset_json` - Dataset in its JSON form
///
/// # Returns
/// The serialized [`BackendPayload`]
pub fn formula_to_backend_json(formula: String, dataset_json: String) -> Result<String, TermError> {
    TermProcessor::new().process_json(&formula, &dataset_json)
}

/// Term processor holding the parse configuration.
///
/// Use this when the defaults for the implicit group name or the prior scale
/// need to change.
#[derive(Debug, Clone, Default)]
pub struct TermProcessor {
    config: ParseConfig,
}

impl TermProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor with the given configuration
    pub fn with_config(config: ParseConfig) -> Self {
        Self { config }
    }

    /// Load configuration from JSON
    pub fn load_config(&mut self, json: &str) -> Result<(), TermError> {
        self.config = ParseConfig::from_json(json)?;
        Ok(())
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Labels of the random walk terms in formula text
    pub fn detect(&self, formula: &str) -> Result<Vec<String>, TermError> {
        Ok(detect(&Formula::parse(formula)?))
    }

    /// Parse and aggregate the formula's random walk terms
    pub fn process(&self, formula: &Formula, dataset: &Dataset) -> Result<AggregatedTerms, TermError> {
        let labels = detect(formula);
        debug!(formula = %formula, terms = labels.len(), "detected random walk terms");
        aggregate_with(&labels, dataset, &self.config)
    }

    /// Build the backend payload for a formula and dataset
    pub fn payload(&self, formula: &Formula, dataset: &Dataset) -> Result<BackendPayload, TermError> {
        let terms = self.process(formula, dataset)?;
        Ok(BackendPayload {
            producer: PRODUCER_NAME.to_string(),
            version: EPIFORM_VERSION.to_string(),
            formula: formula.to_string(),
            fixed_effects_formula: formula.without_random_walks().to_string(),
            num_terms: terms.num_terms(),
            num_coefficients: terms.num_coefficients(),
            design: terms.design_matrix.to_sparse_parts(),
            labels: terms.labels,
            num_processes: terms.num_processes,
            periods_per_process: terms.periods_per_process,
            prior_scale: terms.prior_scale,
            coefficient_names: terms.coefficient_names,
        })
    }

    /// JSON in, JSON out
    pub fn process_json(&self, formula: &str, dataset_json: &str) -> Result<String, TermError> {
        let formula = Formula::parse(formula)?;
        let dataset = Dataset::from_json(dataset_json)?;
        let payload = self.payload(&formula, &dataset)?;
        Ok(serde_json::to_string(&payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_dataset_json() -> &'static str {
        r#"{
            "date_column": "date",
            "columns": [
                { "name": "date", "type": "date",
                  "values": ["2020-02-22", "2020-02-23", "2020-02-22", "2020-02-23"] },
                { "name": "country", "type": "factor", "levels": ["Italy", "Spain", "UK"],
                  "values": ["Italy", "Italy", "UK", "UK"] },
                { "name": "week", "type": "integer", "values": [8, 8, 8, 8] }
            ]
        }"#
    }

    #[test]
    fn test_process_json() {
        let json = formula_to_backend_json(
            "R(country, date) ~ 1 + rw(gr = country) + rw(week)".to_string(),
            sample_dataset_json().to_string(),
        )
        .unwrap();
        let payload: BackendPayload = serde_json::from_str(&json).unwrap();

        assert_eq!(payload.producer, PRODUCER_NAME);
        assert_eq!(payload.labels, vec!["rw(gr = country)", "rw(week)"]);
        assert_eq!(payload.num_terms, 2);
        assert_eq!(payload.num_processes, vec![2, 1]);
        assert_eq!(payload.periods_per_process, vec![2, 2, 1]);
        assert_eq!(payload.num_coefficients, 5);
        assert_eq!(payload.fixed_effects_formula, "R(country, date) ~ 1");
        assert_eq!(payload.design.rows, 4);
        assert_eq!(payload.design.w, vec![1.0; 8]);
        assert_eq!(payload.design.v, vec![1, 5, 2, 5, 3, 5, 4, 5]);
        assert_eq!(payload.design.u, vec![1, 3, 5, 7, 9]);
        assert_eq!(payload.coefficient_names[4], "rw(week)[8,all]");
    }

    #[test]
    fn test_formula_without_random_walks() {
        let formula = Formula::parse("R(country, date) ~ x").unwrap();
        let dataset = Dataset::from_json(sample_dataset_json()).unwrap();
        let terms = random_walk_terms(&formula, &dataset).unwrap();
        assert_eq!(terms, AggregatedTerms::empty(4));
    }

    #[test]
    fn test_configured_processor() {
        let mut processor = TermProcessor::new();
        processor
            .load_config(r#"{ "synthetic_group": "pooled", "default_prior_scale": 0.1 }"#)
            .unwrap();
        let formula = Formula::parse("R(country, date) ~ rw()").unwrap();
        let dataset = Dataset::from_json(sample_dataset_json()).unwrap();
        let terms = processor.process(&formula, &dataset).unwrap();
        assert_eq!(terms.prior_scale, vec![0.1]);
        assert_eq!(terms.coefficient_names[0], "rw()[2020-02-22,pooled]");
    }

    #[test]
    fn test_load_config_rejects_negative_prior_scale() {
        let mut processor = TermProcessor::new();
        let err = processor
            .load_config(r#"{"default_prior_scale": -1}"#)
            .unwrap_err();
        assert!(matches!(err, TermError::InvalidConfig(_)));
        assert_eq!(processor.config(), &ParseConfig::default());
    }

    #[test]
    fn test_invalid_formula_propagates() {
        let err = formula_to_backend_json(
            "rw(gr = country)".to_string(),
            sample_dataset_json().to_string(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_FORMULA");
    }

    #[test]
    fn test_unknown_column_propagates() {
        let err = TermProcessor::new()
            .process_json("R(country, date) ~ rw(gr = region)", sample_dataset_json())
            .unwrap_err();
        assert!(matches!(err, TermError::UnknownColumn { .. }));
    }

    #[test]
    fn test_detect() {
        let labels = TermProcessor::new()
            .detect("R(country, date) ~ rw() + (1 | country)")
            .unwrap();
        assert_eq!(labels, vec!["rw()"]);
    }
}
