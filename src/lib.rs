//! Epiform - Formula front end for Bayesian epidemiological models
//!
//! Epiform turns a model formula and a grouped time-series dataset into the
//! structured inputs a renewal-equation sampler needs for its random walk
//! terms: formula parsing → random walk detection → per-term parsing →
//! aggregation → backend payload.
//!
//! ## Modules
//!
//! - **Formula**: parse formulas and classify their terms
//! - **Detector / Term parser / Aggregate**: resolve `rw(...)` terms into
//!   process counts, period counts and sparse design matrices
//! - **Pipeline**: JSON-in, JSON-out entry points

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod detector;
pub mod error;
pub mod formula;
pub mod pipeline;
pub mod sparse;
pub mod term_parser;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregate::aggregate;
pub use config::ParseConfig;
pub use dataset::{Column, Dataset};
pub use detector::detect;
pub use error::TermError;
pub use formula::{ColumnRef, Formula, RandomWalkDescriptor};
pub use pipeline::{formula_to_backend_json, random_walk_terms, TermProcessor};
pub use sparse::CsrMatrix;
pub use term_parser::parse_term;
pub use types::{AggregatedTerms, BackendPayload, ParsedTerm};

/// Epiform version embedded in all backend payloads
pub const EPIFORM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for backend payloads
pub const PRODUCER_NAME: &str = "epiform";
