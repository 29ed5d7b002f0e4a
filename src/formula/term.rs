//! Random walk term descriptors
//!
//! A [`RandomWalkDescriptor`] records what an `rw(time, gr, prior_scale)` term
//! says, not what it means for any particular dataset: column references are
//! stored by name and resolved later by the term parser.

use serde::{Deserialize, Serialize};

use crate::error::TermError;
use crate::formula::expr::{render_name, Expr};
use crate::formula::parser::parse_expression;

/// Name of the random walk term constructor in formulas
pub const RANDOM_WALK_FN: &str = "rw";

/// Prior scale used when neither the term nor the configuration sets one
pub const DEFAULT_PRIOR_SCALE: f64 = 0.2;

/// Formal arguments of `rw`, in positional order
const FORMALS: [&str; 3] = ["time", "gr", "prior_scale"];

/// An unevaluated reference to a dataset column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRef {
    /// Use the dataset's default for this role
    Default,
    Named(String),
}

impl ColumnRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            ColumnRef::Default => None,
            ColumnRef::Named(name) => Some(name.as_str()),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ColumnRef::Default)
    }
}

/// One random walk term as written in a formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomWalkDescriptor {
    time: ColumnRef,
    group: ColumnRef,
    prior_scale: Option<f64>,
    label: String,
}

impl RandomWalkDescriptor {
    pub fn builder() -> RandomWalkBuilder {
        RandomWalkBuilder::default()
    }

    /// Rebuild a descriptor from its term label, e.g. `rw(week, gr = region)`
    pub fn from_label(label: &str) -> Result<Self, TermError> {
        let expr = parse_expression(label).map_err(|e| TermError::InvalidTerm {
            label: label.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_call(expr.unparenthesized())
    }

    /// Build a descriptor from an `rw(...)` call expression.
    ///
    /// Arguments bind like the constructor's signature: named arguments first,
    /// then positional ones fill the remaining formals in order.
    pub fn from_call(expr: &Expr) -> Result<Self, TermError> {
        let label = expr.to_string();
        let invalid = |reason: String| TermError::InvalidTerm {
            label: label.clone(),
            reason,
        };

        let args = match expr {
            Expr::Call { name, args } if name == RANDOM_WALK_FN => args,
            _ => return Err(invalid(format!("not a call to {}()", RANDOM_WALK_FN))),
        };

        let mut bound: [Option<&Expr>; 3] = [None; 3];
        for arg in args {
            if let Some(name) = &arg.name {
                let slot = FORMALS
                    .iter()
                    .position(|formal| *formal == name.as_str())
                    .ok_or_else(|| invalid(format!("unused argument '{}'", name)))?;
                if bound[slot].is_some() {
                    return Err(invalid(format!(
                        "argument '{}' matched by multiple actual arguments",
                        name
                    )));
                }
                bound[slot] = Some(&arg.value);
            }
        }
        for arg in args.iter().filter(|arg| arg.name.is_none()) {
            let slot = bound
                .iter()
                .position(|b| b.is_none())
                .ok_or_else(|| invalid(format!("unused argument '{}'", arg.value)))?;
            bound[slot] = Some(&arg.value);
        }

        let prior_scale = match bound[2] {
            None => None,
            Some(value) => Some(parse_prior_scale(value).map_err(invalid)?),
        };

        Ok(Self {
            time: column_ref(bound[0]),
            group: column_ref(bound[1]),
            prior_scale,
            label,
        })
    }

    pub fn time(&self) -> &ColumnRef {
        &self.time
    }

    pub fn group(&self) -> &ColumnRef {
        &self.group
    }

    /// Prior scale given in the term, if any
    pub fn prior_scale(&self) -> Option<f64> {
        self.prior_scale
    }

    pub fn prior_scale_or(&self, default: f64) -> f64 {
        self.prior_scale.unwrap_or(default)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

fn column_ref(value: Option<&Expr>) -> ColumnRef {
    match value {
        None => ColumnRef::Default,
        Some(Expr::Symbol(name)) | Some(Expr::Str(name)) => ColumnRef::Named(name.clone()),
        // Anything else is kept as text and will not match a column
        Some(other) => ColumnRef::Named(other.to_string()),
    }
}

fn parse_prior_scale(value: &Expr) -> Result<f64, String> {
    let scale = match value.unparenthesized() {
        Expr::Number(text) => text
            .parse::<f64>()
            .map_err(|e| format!("invalid prior_scale '{}': {}", text, e))?,
        Expr::Negate(_) => return Err(format!("prior_scale must be positive, got {}", value)),
        other => return Err(format!("prior_scale must be a number, got '{}'", other)),
    };
    if !is_valid_prior_scale(scale) {
        return Err(format!("prior_scale must be positive, got {}", value));
    }
    Ok(scale)
}

/// Prior scales must be finite and strictly positive
pub(crate) fn is_valid_prior_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

/// Builder for [`RandomWalkDescriptor`]s created in code rather than parsed
#[derive(Debug, Clone, Default)]
pub struct RandomWalkBuilder {
    time: Option<String>,
    group: Option<String>,
    prior_scale: Option<f64>,
}

impl RandomWalkBuilder {
    /// Column holding the time axis
    pub fn time(mut self, column: impl Into<String>) -> Self {
        self.time = Some(column.into());
        self
    }

    /// Column holding the group of each observation
    pub fn group(mut self, column: impl Into<String>) -> Self {
        self.group = Some(column.into());
        self
    }

    pub fn prior_scale(mut self, scale: f64) -> Self {
        self.prior_scale = Some(scale);
        self
    }

    /// Finish the descriptor; the label lists the arguments that were set
    pub fn build(self) -> Result<RandomWalkDescriptor, TermError> {
        let mut parts = Vec::new();
        if let Some(time) = &self.time {
            parts.push(format!("time = {}", render_name(time)));
        }
        if let Some(group) = &self.group {
            parts.push(format!("gr = {}", render_name(group)));
        }
        if let Some(scale) = self.prior_scale {
            parts.push(format!("prior_scale = {}", scale));
        }
        let label = format!("{}({})", RANDOM_WALK_FN, parts.join(", "));

        if let Some(scale) = self.prior_scale {
            if !is_valid_prior_scale(scale) {
                return Err(TermError::InvalidTerm {
                    label,
                    reason: format!("prior_scale must be positive, got {}", scale),
                });
            }
        }

        Ok(RandomWalkDescriptor {
            time: self.time.map_or(ColumnRef::Default, ColumnRef::Named),
            group: self.group.map_or(ColumnRef::Default, ColumnRef::Named),
            prior_scale: self.prior_scale,
            label,
        })
    }
}
