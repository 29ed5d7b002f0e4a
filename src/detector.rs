//! Random walk term detection
//!
//! Picks out the terms of a formula that are wholly a call to `rw(...)`.
//! Interactions such as `rw():x` and random effect terms such as
//! `(rw() | g)` are left to other parts of the model.

use crate::error::TermError;
use crate::formula::{Formula, TermKind};

/// Labels of the formula's random walk terms, in formula order
pub fn detect(formula: &Formula) -> Vec<String> {
    formula
        .terms()
        .iter()
        .filter(|term| matches!(term.kind(), TermKind::RandomWalk(_)))
        .filter(|term| !term.label().contains(|c: char| c == '|' || c == ':'))
        .map(|term| term.label().to_string())
        .collect()
}

/// Parse formula text and detect its random walk terms
pub fn detect_str(formula: &str) -> Result<Vec<String>, TermError> {
    Ok(detect(&Formula::parse(formula)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detects_in_formula_order() {
        let labels =
            detect_str("R(country, date) ~ rw(gr = country) + x + rw(week, prior_scale = 0.1)")
                .unwrap();
        assert_eq!(labels, vec!["rw(gr = country)", "rw(week, prior_scale = 0.1)"]);
    }

    #[test]
    fn test_skips_interactions_and_random_effects() {
        let labels =
            detect_str("y ~ rw():x + (rw() | g) + (1 | g) + rw(gr = g) + rwx(a) + x").unwrap();
        assert_eq!(labels, vec!["rw(gr = g)"]);
        assert!(labels.iter().all(|l| !l.contains('|') && !l.contains(':')));
    }

    #[test]
    fn test_product_contributes_main_effect_only() {
        let labels = detect_str("y ~ rw(gr = g) * x").unwrap();
        assert_eq!(labels, vec!["rw(gr = g)"]);
    }

    #[test]
    fn test_r_operators_beside_random_walks() {
        assert_eq!(detect_str("y ~ I(x^2) + rw()").unwrap(), vec!["rw()"]);

        let labels = detect_str("R(country, date) ~ 1 + I(x^2) + rw(gr = country)").unwrap();
        assert_eq!(labels, vec!["rw(gr = country)"]);

        let labels = detect_str(
            r#"y ~ a %in% b + a/b + (a + b)^2 + factor(x, levels = c("a")) + rw(gr = région)"#,
        )
        .unwrap();
        assert_eq!(labels, vec!["rw(gr = région)"]);
    }

    #[test]
    fn test_interaction_inside_arguments_not_detected() {
        let labels = detect_str("y ~ rw(time = a:b) + rw(gr = \"a|b\") + rw()").unwrap();
        assert_eq!(labels, vec!["rw()"]);
    }

    #[test]
    fn test_no_random_walks() {
        assert!(detect_str("y ~ 1 + x").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_formula() {
        let err = detect_str("rw(gr = g)").unwrap_err();
        assert!(matches!(err, TermError::InvalidFormula(_)));
    }
}
