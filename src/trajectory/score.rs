//! Closure scoring: derivation efficiency blended with symbol fairness.
//!
//! Shallow closures score higher on efficiency; closures that pile up
//! duplicate-symbol derivations score lower on fairness. Both terms are pure
//! functions of the closure, so identical inputs always score identically.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::kb::Closure;

/// Weight of the efficiency term in the total score.
pub const EFFICIENCY_WEIGHT: f64 = 0.6;
/// Weight of the fairness term in the total score.
pub const FAIRNESS_WEIGHT: f64 = 0.4;

/// Optional knobs for trajectory scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectoryConstraints {
    /// Per-symbol fairness weights; symbols not listed weigh 1.0. When any
    /// weight is supplied, the fairness term becomes the simple average of
    /// the unweighted and weighted ratios.
    #[serde(default)]
    pub fairness_weights: HashMap<String, f64>,
}

/// Score pair for one closure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryScore {
    pub total: f64,
    pub fairness: f64,
}

/// Score a closure: `0.6 * efficiency + 0.4 * fairness`, where efficiency is
/// `1 / (1 + depth)`.
pub fn score_closure(
    closure: &Closure,
    constraints: Option<&TrajectoryConstraints>,
) -> TrajectoryScore {
    let efficiency = 1.0 / (1.0 + closure.depth as f64);
    let fairness = fairness_of(closure, constraints);
    TrajectoryScore {
        total: EFFICIENCY_WEIGHT * efficiency + FAIRNESS_WEIGHT * fairness,
        fairness,
    }
}

/// Fairness of a closure: unique symbols over total facts, 0.0 when empty.
pub fn fairness_of(closure: &Closure, constraints: Option<&TrajectoryConstraints>) -> f64 {
    if closure.facts.is_empty() {
        return 0.0;
    }
    let total = closure.facts.len() as f64;
    let unique: HashSet<&str> = closure.facts.iter().map(|f| f.symbol.as_str()).collect();
    let unweighted = unique.len() as f64 / total;

    let weights = match constraints {
        Some(c) if !c.fairness_weights.is_empty() => &c.fairness_weights,
        _ => return unweighted,
    };
    let weight_of = |symbol: &str| weights.get(symbol).copied().unwrap_or(1.0);
    let unique_weight: f64 = unique.iter().map(|s| weight_of(s)).sum();
    let total_weight: f64 = closure.facts.iter().map(|f| weight_of(&f.symbol)).sum();
    let weighted = if total_weight > 0.0 {
        unique_weight / total_weight
    } else {
        0.0
    };
    (unweighted + weighted) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::Fact;
    use serde_json::json;

    fn closure(symbols: &[&str], depth: usize) -> Closure {
        Closure {
            facts: symbols.iter().map(|s| Fact::new(*s, json!(true))).collect(),
            depth,
            rules_fired: Vec::new(),
        }
    }

    #[test]
    fn empty_closure_has_zero_fairness() {
        let score = score_closure(&closure(&[], 0), None);
        assert!((score.fairness - 0.0).abs() < 1e-12);
        assert!((score.total - 0.6).abs() < 1e-12);
    }

    #[test]
    fn all_unique_shallow_closure_scores_one() {
        let score = score_closure(&closure(&["A", "B", "C"], 0), None);
        assert!((score.fairness - 1.0).abs() < 1e-12);
        assert!((score.total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn duplicates_lower_fairness_and_depth_lowers_efficiency() {
        let score = score_closure(&closure(&["A", "A", "B"], 1), None);
        assert!((score.fairness - 2.0 / 3.0).abs() < 1e-12);
        assert!((score.total - (0.6 * 0.5 + 0.4 * (2.0 / 3.0))).abs() < 1e-12);
    }

    #[test]
    fn fairness_weights_blend_with_the_unweighted_ratio() {
        let mut constraints = TrajectoryConstraints::default();
        constraints.fairness_weights.insert("A".into(), 2.0);

        let fairness = fairness_of(&closure(&["A", "A", "B"], 0), Some(&constraints));
        // unweighted 2/3, weighted (2+1)/(2+2+1) = 3/5, blended 19/30
        assert!((fairness - 19.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn empty_weight_map_is_the_unweighted_score() {
        let constraints = TrajectoryConstraints::default();
        let with = score_closure(&closure(&["A", "B"], 2), Some(&constraints));
        let without = score_closure(&closure(&["A", "B"], 2), None);
        assert_eq!(with, without);
    }

    #[test]
    fn scoring_is_deterministic() {
        let c = closure(&["A", "B", "A"], 3);
        assert_eq!(score_closure(&c, None), score_closure(&c, None));
    }
}
