//! Model formulas
//!
//! This module parses formulas such as
//! `R(country, date) ~ 1 + x + rw(week, gr = region) + (1 | region)` into a
//! response and an ordered list of additive terms. Each term keeps its
//! expression tree, its canonical label, and a [`TermKind`] tag so that
//! random walk terms can be told apart from covariates, interactions and
//! random effects by inspection.

mod expr;
mod parser;
mod term;

pub use expr::{is_syntactic_name, render_name, Arg, BinaryOp, Expr};
pub use parser::{parse_expression, parse_formula};
pub use term::{
    ColumnRef, RandomWalkBuilder, RandomWalkDescriptor, DEFAULT_PRIOR_SCALE, RANDOM_WALK_FN,
};

pub(crate) use term::is_valid_prior_scale;

use std::fmt;
use std::str::FromStr;

use crate::error::TermError;

/// What kind of model component a term is
#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    /// A whole-term call to `rw(...)`
    RandomWalk(RandomWalkDescriptor),
    /// A grouped term such as `(1 | region)`
    RandomEffect,
    /// An interaction such as `x:y`
    Interaction,
    /// Any other term
    Covariate,
}

/// One additive term of a formula
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    label: String,
    expr: Expr,
    kind: TermKind,
}

impl Term {
    fn classify(expr: Expr) -> Result<Self, TermError> {
        let label = expr.to_string();
        let kind = if expr.contains_bar() {
            TermKind::RandomEffect
        } else {
            match &expr {
                Expr::Binary {
                    op: BinaryOp::Interact,
                    ..
                } => TermKind::Interaction,
                // A label with ':' or '|' would be mistaken for an interaction
                // or a grouped term downstream
                call if call.is_call_to(RANDOM_WALK_FN)
                    && !label.contains(|c: char| c == ':' || c == '|') =>
                {
                    TermKind::RandomWalk(RandomWalkDescriptor::from_call(call)?)
                }
                _ => TermKind::Covariate,
            }
        };
        Ok(Self { label, expr, kind })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    pub fn is_random_walk(&self) -> bool {
        matches!(self.kind, TermKind::RandomWalk(_))
    }

    /// Term text as it appears inside a formula
    fn formula_text(&self) -> String {
        if self.expr.is_bar() {
            format!("({})", self.label)
        } else {
            self.label.clone()
        }
    }
}

/// A parsed model formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    response: Expr,
    terms: Vec<Term>,
    intercept: bool,
}

impl Formula {
    /// Parse formula text
    pub fn parse(text: &str) -> Result<Self, TermError> {
        let (response, rhs) = parse_formula(text)?;

        let mut flattened = Vec::new();
        flatten(&rhs, true, &mut flattened);

        let mut intercept = true;
        let mut terms: Vec<Term> = Vec::new();
        for (expr, include) in flattened {
            if let Expr::Number(text) = &expr {
                match text.parse::<f64>() {
                    Ok(v) if v == 1.0 => intercept = include,
                    Ok(v) if v == 0.0 => intercept = !include,
                    _ => {
                        return Err(TermError::InvalidFormula(format!(
                            "invalid model term '{}'",
                            text
                        )))
                    }
                }
                continue;
            }

            let label = expr.to_string();
            if include {
                if !terms.iter().any(|t| t.label == label) {
                    terms.push(Term::classify(expr)?);
                }
            } else {
                terms.retain(|t| t.label != label);
            }
        }

        Ok(Self {
            response,
            terms,
            intercept,
        })
    }

    pub fn response(&self) -> &Expr {
        &self.response
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Canonical labels of all terms, in formula order
    pub fn term_labels(&self) -> Vec<&str> {
        self.terms.iter().map(|t| t.label()).collect()
    }

    pub fn has_intercept(&self) -> bool {
        self.intercept
    }

    /// The same formula with every random walk term removed
    pub fn without_random_walks(&self) -> Formula {
        Formula {
            response: self.response.clone(),
            terms: self
                .terms
                .iter()
                .filter(|t| !t.is_random_walk())
                .cloned()
                .collect(),
            intercept: self.intercept,
        }
    }
}

impl FromStr for Formula {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ ", self.response)?;
        if self.terms.is_empty() {
            return write!(f, "{}", if self.intercept { "1" } else { "0" });
        }
        if !self.intercept {
            write!(f, "0 + ")?;
        }
        let rhs: Vec<String> = self.terms.iter().map(|t| t.formula_text()).collect();
        write!(f, "{}", rhs.join(" + "))
    }
}

/// Flatten a right-hand side into `(term, include)` pairs.
///
/// `include` is false for terms that are subtracted. Products expand to
/// their main effects followed by their interactions.
fn flatten(expr: &Expr, include: bool, out: &mut Vec<(Expr, bool)>) {
    match expr {
        Expr::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        } => {
            flatten(lhs, include, out);
            flatten(rhs, include, out);
        }
        Expr::Binary {
            op: BinaryOp::Sub,
            lhs,
            rhs,
        } => {
            flatten(lhs, include, out);
            flatten(rhs, !include, out);
        }
        Expr::Binary {
            op: BinaryOp::Mul,
            lhs,
            rhs,
        } => {
            let left = main_effects(lhs);
            let right = main_effects(rhs);
            let mut expanded = left.clone();
            expanded.extend(right.iter().cloned());
            for l in &left {
                for r in &right {
                    expanded.push(Expr::binary(BinaryOp::Interact, l.clone(), r.clone()));
                }
            }
            out.extend(expanded.into_iter().map(|e| (e, include)));
        }
        Expr::Negate(inner) => flatten(inner, !include, out),
        Expr::Paren(inner) if inner.is_bar() => out.push((inner.unparenthesized().clone(), include)),
        Expr::Paren(inner) => flatten(inner, include, out),
        other => out.push((other.clone(), include)),
    }
}

fn main_effects(expr: &Expr) -> Vec<Expr> {
    let mut terms = Vec::new();
    flatten(expr, true, &mut terms);
    terms
        .into_iter()
        .filter(|(e, include)| *include && !matches!(e, Expr::Number(_)))
        .map(|(e, _)| e)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_term_labels_in_order() {
        let formula =
            Formula::parse("R(country, date) ~ 1 + x + rw(week, gr = region) + (1 | region)")
                .unwrap();
        assert_eq!(
            formula.term_labels(),
            vec!["x", "rw(week, gr = region)", "1 | region"]
        );
        assert!(formula.has_intercept());
        assert_eq!(formula.response().to_string(), "R(country, date)");
    }

    #[test]
    fn test_term_kinds() {
        let formula = Formula::parse("y ~ rw() + x:z + (rw() | g) + log(x)").unwrap();
        let kinds: Vec<&TermKind> = formula.terms().iter().map(|t| t.kind()).collect();
        assert!(matches!(kinds[0], TermKind::RandomWalk(_)));
        assert_eq!(kinds[1], &TermKind::Interaction);
        assert_eq!(kinds[2], &TermKind::RandomEffect);
        assert_eq!(kinds[3], &TermKind::Covariate);
    }

    #[test]
    fn test_product_expansion() {
        let formula = Formula::parse("y ~ a * rw(gr = g)").unwrap();
        assert_eq!(
            formula.term_labels(),
            vec!["a", "rw(gr = g)", "a:rw(gr = g)"]
        );
    }

    #[test]
    fn test_removal_and_intercept() {
        let formula = Formula::parse("y ~ a + b - a - 1").unwrap();
        assert_eq!(formula.term_labels(), vec!["b"]);
        assert!(!formula.has_intercept());

        let formula = Formula::parse("y ~ 0 + a").unwrap();
        assert!(!formula.has_intercept());
        assert_eq!(formula.to_string(), "y ~ 0 + a");
    }

    #[test]
    fn test_parenthesised_sum_is_flattened() {
        let formula = Formula::parse("y ~ (a + b) + (1 + a | g)").unwrap();
        assert_eq!(formula.term_labels(), vec!["a", "b", "1 + a | g"]);
    }

    #[test]
    fn test_duplicate_terms_kept_once() {
        let formula = Formula::parse("y ~ rw() + x + rw()").unwrap();
        assert_eq!(formula.term_labels(), vec!["rw()", "x"]);
    }

    #[test]
    fn test_invalid_numeric_term() {
        let err = Formula::parse("y ~ 2 + x").unwrap_err();
        assert!(matches!(err, TermError::InvalidFormula(_)));
    }

    #[test]
    fn test_invalid_random_walk_arguments() {
        let err = Formula::parse("y ~ rw(foo = bar)").unwrap_err();
        assert!(matches!(err, TermError::InvalidTerm { .. }));
    }

    #[test]
    fn test_without_random_walks() {
        let formula = Formula::parse("R(c, date) ~ x + rw(gr = c) + (1 | c)").unwrap();
        assert_eq!(
            formula.without_random_walks().to_string(),
            "R(c, date) ~ x + (1 | c)"
        );

        let only_walks = Formula::parse("R(c, date) ~ rw()").unwrap();
        assert_eq!(only_walks.without_random_walks().to_string(), "R(c, date) ~ 1");

        let no_intercept = Formula::parse("R(c, date) ~ rw() - 1").unwrap();
        assert_eq!(no_intercept.without_random_walks().to_string(), "R(c, date) ~ 0");
    }

    #[test]
    fn test_r_syntax_terms_are_covariates() {
        let formula = Formula::parse(
            r#"R(country, date) ~ 1 + I(x^2) + a %in% b + a/b + (a + b)^2 + factor(x, levels = c("a")) + rw(gr = région)"#,
        )
        .unwrap();
        assert_eq!(
            formula.term_labels(),
            vec![
                "I(x^2)",
                "a %in% b",
                "a/b",
                "(a + b)^2",
                r#"factor(x, levels = c("a"))"#,
                "rw(gr = région)",
            ]
        );
        let kinds: Vec<&TermKind> = formula.terms().iter().map(|t| t.kind()).collect();
        assert!(kinds[..5].iter().all(|k| **k == TermKind::Covariate));
        assert!(matches!(kinds[5], TermKind::RandomWalk(_)));
    }

    #[test]
    fn test_random_walk_with_interaction_argument_is_covariate() {
        let formula = Formula::parse("y ~ rw(time = a:b) + rw(gr = \"a|b\")").unwrap();
        assert!(formula.terms().iter().all(|t| *t.kind() == TermKind::Covariate));
        assert_eq!(
            formula.without_random_walks().to_string(),
            "y ~ rw(time = a:b) + rw(gr = \"a|b\")"
        );
    }

    #[test]
    fn test_display_round_trips() {
        let text = "R(c, date) ~ x + rw(week, c) + (1 | c)";
        let formula: Formula = text.parse().unwrap();
        assert_eq!(formula.to_string(), text);
        assert_eq!(Formula::parse(&formula.to_string()).unwrap(), formula);
    }
}
