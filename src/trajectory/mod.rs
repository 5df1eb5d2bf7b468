//! Trajectory optimizer: a knowledge base, a hash-chained log of every
//! mutation and search, and beam search over derivation trajectories.
//!
//! Chaining and scoring are pure; only operations that change or discover
//! something append to the log. The log makes every fact registration, rule
//! registration, search run, and spine fold auditable after the fact.

pub mod beam;
pub mod score;
pub mod spine;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::error::{TrajectoryError, TrajectoryResult};
use crate::kb::{Closure, Fact, KnowledgeBase, Rule};
use crate::ledger::{ChainLog, ChainReport};

pub use beam::{SearchOutcome, TrajectoryPath};
pub use score::{TrajectoryConstraints, TrajectoryScore, fairness_of, score_closure};
pub use spine::SpineFold;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a trajectory optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Path of the optimizer's chain log file.
    pub log_path: PathBuf,
    /// Beam width for trajectory search (default: 5).
    pub beam_width: usize,
    /// Iteration cap for search and chaining (default: 10).
    pub max_depth: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("trajectory_log.jsonl"),
            beam_width: 5,
            max_depth: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Knowledge-base owner with a chained audit log and beam search on top.
#[derive(Debug)]
pub struct TrajectoryOptimizer {
    kb: KnowledgeBase,
    log: ChainLog,
    beam_width: usize,
    max_depth: usize,
}

impl TrajectoryOptimizer {
    pub fn new(config: OptimizerConfig) -> TrajectoryResult<Self> {
        if config.beam_width == 0 {
            return Err(TrajectoryError::InvalidConfig {
                message: "beam_width must be at least 1".into(),
            });
        }
        if config.max_depth == 0 {
            return Err(TrajectoryError::InvalidConfig {
                message: "max_depth must be at least 1".into(),
            });
        }

        let log = ChainLog::open(&config.log_path)?;
        tracing::info!(
            log = %config.log_path.display(),
            beam_width = config.beam_width,
            max_depth = config.max_depth,
            "trajectory optimizer ready"
        );
        Ok(Self {
            kb: KnowledgeBase::new(),
            log,
            beam_width: config.beam_width,
            max_depth: config.max_depth,
        })
    }

    /// Register a fact and log the registration. Returns whether the fact was
    /// new to the knowledge base.
    pub fn add_fact(&mut self, symbol: &str, value: Value) -> TrajectoryResult<bool> {
        let added = self.kb.add_fact(Fact::new(symbol, value.clone()));

        let mut fields = Map::new();
        fields.insert("event_type".into(), json!("fact_added"));
        fields.insert("symbol".into(), json!(symbol));
        fields.insert("value".into(), value);
        fields.insert("added".into(), json!(added));
        self.log.append(fields)?;
        Ok(added)
    }

    /// Register a rule and log the registration. A duplicate `rule_id`
    /// overwrites the prior rule in place; the replaced rule is returned.
    pub fn add_rule(
        &mut self,
        rule_id: &str,
        premises: Vec<String>,
        conclusion: &str,
        cost: f64,
    ) -> TrajectoryResult<Option<Rule>> {
        let replaced = self
            .kb
            .add_rule(Rule::new(rule_id, premises.clone(), conclusion, cost));
        if replaced.is_some() {
            tracing::debug!(rule_id, "rule overwritten");
        }

        let mut fields = Map::new();
        fields.insert("event_type".into(), json!("rule_added"));
        fields.insert("rule_id".into(), json!(rule_id));
        fields.insert("premises".into(), json!(premises));
        fields.insert("conclusion".into(), json!(conclusion));
        fields.insert("cost".into(), json!(cost));
        fields.insert("replaced".into(), json!(replaced.is_some()));
        self.log.append(fields)?;
        Ok(replaced)
    }

    /// Forward-chain from `initial_facts` up to `max_depth` passes. Pure;
    /// nothing is logged.
    pub fn forward_chain(&self, initial_facts: &[Fact], max_depth: usize) -> Closure {
        self.kb.forward_chain(initial_facts, max_depth)
    }

    /// Score one closure. Pure; nothing is logged.
    pub fn score_trajectory(
        &self,
        closure: &Closure,
        constraints: Option<&TrajectoryConstraints>,
    ) -> TrajectoryScore {
        score_closure(closure, constraints)
    }

    /// Beam-search trajectories from `initial_facts`, logging the search
    /// start and its outcome.
    pub fn beam_search_optimal_spine(
        &mut self,
        initial_facts: &[Fact],
        constraints: Option<&TrajectoryConstraints>,
    ) -> TrajectoryResult<SearchOutcome> {
        let mut fields = Map::new();
        fields.insert("event_type".into(), json!("search_started"));
        fields.insert(
            "initial_symbols".into(),
            json!(initial_facts.iter().map(|f| f.symbol.as_str()).collect::<Vec<_>>()),
        );
        fields.insert("beam_width".into(), json!(self.beam_width));
        fields.insert("max_depth".into(), json!(self.max_depth));
        self.log.append(fields)?;

        let outcome = beam::search(
            &self.kb,
            initial_facts,
            self.beam_width,
            self.max_depth,
            constraints,
        );
        tracing::info!(
            iterations = outcome.iterations,
            paths_explored = outcome.paths_explored,
            best_score = outcome.best.as_ref().map(|p| p.score),
            "beam search completed"
        );

        let mut fields = Map::new();
        fields.insert("event_type".into(), json!("search_completed"));
        fields.insert("iterations".into(), json!(outcome.iterations));
        fields.insert("paths_explored".into(), json!(outcome.paths_explored));
        fields.insert(
            "best_score".into(),
            json!(outcome.best.as_ref().map(|p| p.score)),
        );
        fields.insert(
            "best_fairness".into(),
            json!(outcome.best.as_ref().map(|p| p.fairness)),
        );
        self.log.append(fields)?;

        Ok(outcome)
    }

    /// Fold a trajectory to its spine hash, logging the hash together with
    /// the full spine structure.
    pub fn fold_to_hash(&mut self, path: &TrajectoryPath) -> TrajectoryResult<SpineFold> {
        let folded = spine::fold(path);

        let mut fields = Map::new();
        fields.insert("event_type".into(), json!("spine_folded"));
        fields.insert("spine_hash".into(), json!(folded.hash));
        fields.insert("spine".into(), folded.spine.clone());
        self.log.append(fields)?;

        tracing::debug!(spine_hash = %folded.hash, "trajectory folded");
        Ok(folded)
    }

    /// Walk the optimizer's chain log and report its integrity.
    pub fn verify_hash_chain(&self) -> TrajectoryResult<ChainReport> {
        Ok(self.log.verify()?)
    }

    pub fn facts(&self) -> &[Fact] {
        self.kb.facts()
    }

    pub fn rules(&self) -> &[Rule] {
        self.kb.rules()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn optimizer_in(dir: &TempDir) -> TrajectoryOptimizer {
        TrajectoryOptimizer::new(OptimizerConfig {
            log_path: dir.path().join("traj.jsonl"),
            ..Default::default()
        })
        .unwrap()
    }

    fn entries_of_type(optimizer: &TrajectoryOptimizer, event_type: &str) -> Vec<Map<String, Value>> {
        let log = ChainLog::open(optimizer.log_path()).unwrap();
        log.read_all()
            .unwrap()
            .into_iter()
            .map(|entry| entry.fields)
            .filter(|fields| fields.get("event_type") == Some(&json!(event_type)))
            .collect()
    }

    #[test]
    fn zero_width_or_depth_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = TrajectoryOptimizer::new(OptimizerConfig {
            log_path: dir.path().join("traj.jsonl"),
            beam_width: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrajectoryError::InvalidConfig { .. }));

        let err = TrajectoryOptimizer::new(OptimizerConfig {
            log_path: dir.path().join("traj.jsonl"),
            max_depth: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrajectoryError::InvalidConfig { .. }));
    }

    #[test]
    fn fact_registration_is_logged_and_deduplicated() {
        let dir = TempDir::new().unwrap();
        let mut optimizer = optimizer_in(&dir);

        assert!(optimizer.add_fact("A", json!(true)).unwrap());
        assert!(!optimizer.add_fact("A", json!(true)).unwrap());
        assert_eq!(optimizer.facts().len(), 1);

        let logged = entries_of_type(&optimizer, "fact_added");
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0]["added"], json!(true));
        assert_eq!(logged[1]["added"], json!(false));
        assert!(optimizer.verify_hash_chain().unwrap().valid);
    }

    #[test]
    fn duplicate_rule_id_overwrites_and_reports_the_replaced_rule() {
        let dir = TempDir::new().unwrap();
        let mut optimizer = optimizer_in(&dir);

        assert!(optimizer
            .add_rule("r1", vec!["A".into()], "B", 1.0)
            .unwrap()
            .is_none());
        let replaced = optimizer
            .add_rule("r1", vec!["A".into()], "C", 2.0)
            .unwrap()
            .unwrap();
        assert_eq!(replaced.conclusion, "B");
        assert_eq!(optimizer.rules().len(), 1);
        assert_eq!(optimizer.rules()[0].conclusion, "C");

        let logged = entries_of_type(&optimizer, "rule_added");
        assert_eq!(logged[1]["replaced"], json!(true));
    }

    #[test]
    fn search_and_fold_are_logged_end_to_end() {
        let dir = TempDir::new().unwrap();
        let mut optimizer = optimizer_in(&dir);
        optimizer.add_fact("A", json!(true)).unwrap();
        optimizer.add_rule("r1", vec!["A".into()], "B", 1.0).unwrap();

        let outcome = optimizer
            .beam_search_optimal_spine(&[Fact::new("A", json!(true))], None)
            .unwrap();
        let best = outcome.best.unwrap();
        assert!(best
            .last_closure()
            .unwrap()
            .facts
            .iter()
            .any(|f| f.symbol == "B"));

        let first = optimizer.fold_to_hash(&best).unwrap();
        let second = optimizer.fold_to_hash(&best).unwrap();
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.hash.len(), 64);

        assert_eq!(entries_of_type(&optimizer, "search_started").len(), 1);
        let completed = entries_of_type(&optimizer, "search_completed");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0]["paths_explored"], json!(1));
        let folds = entries_of_type(&optimizer, "spine_folded");
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0]["spine_hash"], json!(first.hash));
        assert!(folds[0]["spine"]["facts"].is_array());
        assert!(optimizer.verify_hash_chain().unwrap().valid);
    }

    #[test]
    fn fruitless_search_logs_zero_candidates() {
        let dir = TempDir::new().unwrap();
        let mut optimizer = optimizer_in(&dir);
        optimizer.add_rule("r1", vec!["X".into()], "Y", 1.0).unwrap();

        let outcome = optimizer
            .beam_search_optimal_spine(&[Fact::new("A", json!(true))], None)
            .unwrap();
        assert!(outcome.best.is_none());

        let completed = entries_of_type(&optimizer, "search_completed");
        assert_eq!(completed[0]["paths_explored"], json!(0));
        assert_eq!(completed[0]["best_score"], Value::Null);
    }
}
