//! Beam search over derivation trajectories.
//!
//! A trajectory is a sequence of closures, each produced by one forward-chain
//! pass from its predecessor's fact set. The beam keeps the top-scoring paths
//! per iteration and tracks the best path seen anywhere, which may come from
//! an intermediate depth rather than the final beam.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kb::{Closure, Fact, KnowledgeBase};

use super::score::{TrajectoryConstraints, score_closure};

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// One candidate trajectory: its closures in step order, the summed cost of
/// every rule fired along it, and the score of its last closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPath {
    pub closures: Vec<Closure>,
    pub cumulative_cost: f64,
    pub score: f64,
    pub fairness: f64,
}

impl TrajectoryPath {
    fn seed(closure: Closure, constraints: Option<&TrajectoryConstraints>) -> Self {
        let score = score_closure(&closure, constraints);
        Self {
            closures: vec![closure],
            cumulative_cost: 0.0,
            score: score.total,
            fairness: score.fairness,
        }
    }

    pub fn last_closure(&self) -> Option<&Closure> {
        self.closures.last()
    }

    /// Per-symbol presence vectors, one slot per closure in the path.
    pub fn occupancy_map(&self) -> BTreeMap<String, Vec<bool>> {
        let steps = self.closures.len();
        let mut map: BTreeMap<String, Vec<bool>> = BTreeMap::new();
        for (step, closure) in self.closures.iter().enumerate() {
            for fact in &closure.facts {
                map.entry(fact.symbol.clone())
                    .or_insert_with(|| vec![false; steps])[step] = true;
            }
        }
        map
    }
}

/// What a search run produced. `best` is `None` when no iteration ever
/// yielded a candidate; the seed path alone never counts.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best: Option<TrajectoryPath>,
    pub iterations: usize,
    pub paths_explored: usize,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Beam-search trajectories from `initial_facts`.
///
/// Each iteration extends every beam path by one forward-chain pass, scores
/// the extensions, and keeps the top `beam_width`. A path whose extension
/// fires no rules produces no candidate; an iteration with no candidates at
/// all ends the search. Iterations are capped at `max_depth`.
pub fn search(
    kb: &KnowledgeBase,
    initial_facts: &[Fact],
    beam_width: usize,
    max_depth: usize,
    constraints: Option<&TrajectoryConstraints>,
) -> SearchOutcome {
    let seed = TrajectoryPath::seed(kb.forward_chain(initial_facts, 0), constraints);
    let mut beam = vec![seed];
    let mut best: Option<TrajectoryPath> = None;
    let mut iterations = 0;
    let mut paths_explored = 0;

    for _ in 0..max_depth {
        let mut candidates: Vec<TrajectoryPath> = beam
            .iter()
            .filter_map(|path| extend(kb, path, constraints))
            .collect();
        if candidates.is_empty() {
            break;
        }
        iterations += 1;
        paths_explored += candidates.len();

        for candidate in &candidates {
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate.clone());
            }
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(beam_width);
        beam = candidates;
    }

    SearchOutcome {
        best,
        iterations,
        paths_explored,
    }
}

/// Extend a path by one chaining pass; `None` when the pass fires nothing.
fn extend(
    kb: &KnowledgeBase,
    path: &TrajectoryPath,
    constraints: Option<&TrajectoryConstraints>,
) -> Option<TrajectoryPath> {
    let last = path.last_closure()?;
    let step = kb.forward_chain(&last.facts, 1);
    if step.rules_fired.is_empty() {
        return None;
    }

    let step_cost: f64 = step
        .rules_fired
        .iter()
        .filter_map(|id| kb.rule(id))
        .map(|rule| rule.cost)
        .sum();
    let extended = Closure {
        facts: step.facts,
        depth: last.depth + 1,
        rules_fired: step.rules_fired,
    };
    let score = score_closure(&extended, constraints);

    let mut closures = path.closures.clone();
    closures.push(extended);
    Some(TrajectoryPath {
        closures,
        cumulative_cost: path.cumulative_cost + step_cost,
        score: score.total,
        fairness: score.fairness,
    })
}
