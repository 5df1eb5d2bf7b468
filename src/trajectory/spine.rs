//! Canonical trajectory fold.
//!
//! Folding compresses a whole trajectory to one content hash. Facts from all
//! closures are gathered as a multiset and sorted by symbol then canonical
//! value, fired rule ids are sorted, and the hash is taken over the combined
//! structure. Discovery order therefore never changes the hash, and neither
//! do fact timestamps.

use serde::Serialize;
use serde_json::{Value, json};

use crate::hash::{canonical_string, content_hash};

use super::beam::TrajectoryPath;

/// A folded trajectory: the spine hash plus the exact structure hashed.
#[derive(Debug, Clone, Serialize)]
pub struct SpineFold {
    pub hash: String,
    pub spine: Value,
}

/// Fold a trajectory to its spine hash. An empty path folds to the hash of
/// the empty spine.
pub fn fold(path: &TrajectoryPath) -> SpineFold {
    let mut facts: Vec<(String, String, Value)> = path
        .closures
        .iter()
        .flat_map(|closure| closure.facts.iter())
        .map(|fact| {
            (
                fact.symbol.clone(),
                canonical_string(&fact.value),
                fact.value.clone(),
            )
        })
        .collect();
    facts.sort_by(|a, b| (a.0.as_str(), a.1.as_str()).cmp(&(b.0.as_str(), b.1.as_str())));
    let facts: Vec<Value> = facts
        .into_iter()
        .map(|(symbol, _, value)| json!({"symbol": symbol, "value": value}))
        .collect();

    let mut rules_applied: Vec<String> = path
        .closures
        .iter()
        .flat_map(|closure| closure.rules_fired.iter().cloned())
        .collect();
    rules_applied.sort();

    let spine = json!({
        "facts": facts,
        "rules_applied": rules_applied,
        "depth": path.closures.last().map_or(0, |closure| closure.depth),
        "score": path.score,
        "fairness": path.fairness,
    });
    SpineFold {
        hash: content_hash(&spine),
        spine,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::{Closure, Fact};
    use serde_json::json;

    fn path_of(closures: Vec<Closure>) -> TrajectoryPath {
        TrajectoryPath {
            closures,
            cumulative_cost: 1.0,
            score: 0.7,
            fairness: 1.0,
        }
    }

    #[test]
    fn fold_ignores_discovery_order() {
        let together = path_of(vec![Closure {
            facts: vec![Fact::new("A", json!(1)), Fact::new("B", json!(2))],
            depth: 1,
            rules_fired: vec!["r1".into(), "r2".into()],
        }]);
        let split = path_of(vec![
            Closure {
                facts: vec![Fact::new("B", json!(2))],
                depth: 0,
                rules_fired: vec!["r2".into()],
            },
            Closure {
                facts: vec![Fact::new("A", json!(1))],
                depth: 1,
                rules_fired: vec!["r1".into()],
            },
        ]);
        assert_eq!(fold(&together).hash, fold(&split).hash);
    }

    #[test]
    fn fold_ignores_fact_timestamps() {
        let mut early = Fact::new("A", json!(1));
        early.created_at = 1.0;
        let mut late = Fact::new("A", json!(1));
        late.created_at = 2_000_000_000.0;

        let first = path_of(vec![Closure {
            facts: vec![early],
            depth: 0,
            rules_fired: Vec::new(),
        }]);
        let second = path_of(vec![Closure {
            facts: vec![late],
            depth: 0,
            rules_fired: Vec::new(),
        }]);
        assert_eq!(fold(&first).hash, fold(&second).hash);
    }

    #[test]
    fn fold_is_reproducible_hex() {
        let path = path_of(vec![Closure {
            facts: vec![Fact::new("A", json!(true))],
            depth: 0,
            rules_fired: Vec::new(),
        }]);
        let first = fold(&path);
        let second = fold(&path);
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.hash.len(), 64);
        assert!(first.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_rules_change_the_hash() {
        let base = Closure {
            facts: vec![Fact::new("A", json!(1))],
            depth: 1,
            rules_fired: vec!["r1".into()],
        };
        let mut other = base.clone();
        other.rules_fired = vec!["r2".into()];
        assert_ne!(
            fold(&path_of(vec![base])).hash,
            fold(&path_of(vec![other])).hash
        );
    }

    #[test]
    fn empty_path_folds_cleanly() {
        let folded = fold(&path_of(Vec::new()));
        assert_eq!(folded.hash.len(), 64);
        assert_eq!(folded.spine["facts"], json!([]));
        assert_eq!(folded.spine["depth"], json!(0));
    }
}
