//! Knowledge base: facts, rules, and forward chaining.
//!
//! A fact is a (symbol, value) pair; two facts with the same symbol and value
//! are the same fact no matter when they were created. Rules fire when every
//! premise symbol is present in the current fact set (symbol presence only,
//! values are not consulted), adding their conclusion symbol if absent.
//! Chaining repeats passes over the rules until a pass adds nothing (fixed
//! point) or the depth bound is hit.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash;

fn stamp_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

// ---------------------------------------------------------------------------
// Facts and rules
// ---------------------------------------------------------------------------

/// One atomic piece of knowledge.
///
/// Identity is the (symbol, value) pair; `created_at` never participates in
/// equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub symbol: String,
    pub value: Value,
    #[serde(default = "stamp_now")]
    pub created_at: f64,
}

impl Fact {
    pub fn new(symbol: impl Into<String>, value: Value) -> Self {
        Self {
            symbol: symbol.into(),
            value,
            created_at: stamp_now(),
        }
    }

    /// Identity key: symbol plus canonical value form.
    pub fn identity(&self) -> (String, String) {
        (self.symbol.clone(), hash::canonical_string(&self.value))
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol && self.value == other.value
    }
}

impl Eq for Fact {}

impl std::hash::Hash for Fact {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        hash::canonical_string(&self.value).hash(state);
    }
}

/// One inference rule: all premise symbols present implies the conclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub premises: Vec<String>,
    pub conclusion: String,
    /// Non-negative cost charged when the rule fires, used in path scoring.
    #[serde(default)]
    pub cost: f64,
}

impl Rule {
    pub fn new(
        rule_id: impl Into<String>,
        premises: Vec<String>,
        conclusion: impl Into<String>,
        cost: f64,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            premises,
            conclusion: conclusion.into(),
            cost,
        }
    }
}

/// Result of one forward-chaining run: the accumulated fact set, the depth
/// reached, and the rules that fired in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub facts: Vec<Fact>,
    pub depth: usize,
    pub rules_fired: Vec<String>,
}

// ---------------------------------------------------------------------------
// Knowledge base
// ---------------------------------------------------------------------------

/// Registry of facts and rules that forward chaining runs over.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    facts: Vec<Fact>,
    rules: Vec<Rule>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fact. Returns false when the same (symbol, value) fact is
    /// already known; the original is kept.
    pub fn add_fact(&mut self, fact: Fact) -> bool {
        if self.facts.iter().any(|known| known == &fact) {
            return false;
        }
        self.facts.push(fact);
        true
    }

    /// Register a rule. A duplicate `rule_id` silently replaces the prior rule
    /// in place, keeping its position in the scan order; the replaced rule is
    /// returned.
    pub fn add_rule(&mut self, rule: Rule) -> Option<Rule> {
        if let Some(slot) = self.rules.iter_mut().find(|r| r.rule_id == rule.rule_id) {
            return Some(std::mem::replace(slot, rule));
        }
        self.rules.push(rule);
        None
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    /// Forward-chain from `initial_facts` until a pass over the rules adds
    /// nothing or `max_depth` passes have run.
    ///
    /// A rule counts as fired only when it adds its conclusion; a conclusion
    /// added mid-pass is visible to later rules in the same pass. Derived
    /// facts carry a depth-marker value recording the pass that produced them.
    pub fn forward_chain(&self, initial_facts: &[Fact], max_depth: usize) -> Closure {
        let mut facts: Vec<Fact> = Vec::new();
        let mut symbols: HashSet<String> = HashSet::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for fact in initial_facts {
            if seen.insert(fact.identity()) {
                symbols.insert(fact.symbol.clone());
                facts.push(fact.clone());
            }
        }

        let mut rules_fired: Vec<String> = Vec::new();
        let mut depth = 0;
        for pass in 1..=max_depth {
            let mut fired_this_pass = false;
            for rule in &self.rules {
                if symbols.contains(&rule.conclusion) {
                    continue;
                }
                if !rule.premises.iter().all(|premise| symbols.contains(premise)) {
                    continue;
                }
                symbols.insert(rule.conclusion.clone());
                facts.push(Fact::new(
                    rule.conclusion.clone(),
                    Value::String(format!("derived@depth{pass}")),
                ));
                rules_fired.push(rule.rule_id.clone());
                fired_this_pass = true;
            }
            if !fired_this_pass {
                break;
            }
            depth = pass;
        }

        Closure {
            facts,
            depth,
            rules_fired,
        }
    }
}
