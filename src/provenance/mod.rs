//! Provenance domain: the single ingress point for system events.
//!
//! Every event enters through [`ProvenanceDomain::tap_event`], which redacts
//! the payload, stores it in the bounded recent-events ring, feeds the anomaly
//! detector, and writes one hash-chained log entry, in that order. Callers
//! never touch the sub-components directly, so nothing unredacted can reach
//! durable storage and no event can skip the chain.

pub mod graph;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::anomaly::{AnomalyDetector, AnomalyEvent, DetectorConfig};
use crate::error::{DomainError, DomainResult};
use crate::ledger::{ChainLog, ChainReport};
use crate::redact::Redactor;
use crate::ring::RingBuffer;

pub use graph::{CostBucket, DerivationGraph, GraphSnapshot, ProvenanceEdge, SourceTag};

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a provenance domain.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    /// Path of the domain's chain log file.
    pub log_path: PathBuf,
    /// Capacity of the recent-events ring (default: 100).
    pub ring_capacity: usize,
    /// Redact with fingerprint placeholders instead of the literal one
    /// (default: true, keeping redacted values joinable for audits).
    pub hash_pii: bool,
    /// Anomaly detector thresholds.
    pub detector: DetectorConfig,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("provenance_log.jsonl"),
            ring_capacity: 100,
            hash_pii: true,
            detector: DetectorConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// One redacted event as held in the recent-events ring.
#[derive(Debug, Clone, Serialize)]
pub struct TappedEvent {
    pub event_type: String,
    pub timestamp: f64,
    pub run_id: String,
    /// Redacted payload; the raw form is never retained.
    pub payload: Value,
}

/// What one tap produced: the chained entry's hash and any anomalies raised.
#[derive(Debug, Clone)]
pub struct TapOutcome {
    pub event_hash: String,
    pub anomalies: Vec<AnomalyEvent>,
}

/// Audit snapshot: volatile views plus the derivation graph, in one structure.
#[derive(Debug, Clone, Serialize)]
pub struct AuditSnapshot {
    pub generated_at: f64,
    pub recent_events: Vec<TappedEvent>,
    pub anomalies: Vec<AnomalyEvent>,
    pub provenance_graph: GraphSnapshot,
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// Observability boundary composing redaction, bounded retention, anomaly
/// detection, and tamper-evident logging.
#[derive(Debug)]
pub struct ProvenanceDomain {
    redactor: Redactor,
    recent: RingBuffer<TappedEvent>,
    detector: AnomalyDetector,
    log: ChainLog,
    edges: Vec<ProvenanceEdge>,
    graph: DerivationGraph,
}

impl ProvenanceDomain {
    pub fn new(config: DomainConfig) -> DomainResult<Self> {
        if config.ring_capacity == 0 {
            return Err(DomainError::InvalidConfig {
                message: "ring_capacity must be at least 1".into(),
            });
        }

        let log = ChainLog::open(&config.log_path)?;
        tracing::info!(
            log = %config.log_path.display(),
            ring_capacity = config.ring_capacity,
            hash_pii = config.hash_pii,
            "provenance domain ready"
        );
        Ok(Self {
            redactor: Redactor::new(config.hash_pii),
            recent: RingBuffer::new(config.ring_capacity),
            detector: AnomalyDetector::new(config.detector),
            log,
            edges: Vec::new(),
            graph: DerivationGraph::new(),
        })
    }

    /// Tap one event into the domain.
    ///
    /// Redacts the payload, stores it in the ring, runs anomaly detection,
    /// and appends one chained log entry recording the redacted payload and
    /// every anomaly raised at that moment.
    pub fn tap_event(
        &mut self,
        event_type: &str,
        payload: &Value,
        run_id: &str,
    ) -> DomainResult<TapOutcome> {
        let timestamp = now_secs();
        let redacted = self.redactor.redact(payload);

        self.recent.append(TappedEvent {
            event_type: event_type.to_string(),
            timestamp,
            run_id: run_id.to_string(),
            payload: redacted.clone(),
        });

        let anomalies = self.detector.record_event(event_type, timestamp);
        if !anomalies.is_empty() {
            tracing::warn!(
                count = anomalies.len(),
                event_type,
                run_id,
                "tap raised anomalies"
            );
        }

        let mut fields = Map::new();
        fields.insert("event_type".into(), json!(event_type));
        fields.insert("run_id".into(), json!(run_id));
        fields.insert("payload".into(), redacted);
        fields.insert(
            "anomalies".into(),
            serde_json::to_value(&anomalies).map_err(|err| DomainError::Snapshot {
                message: err.to_string(),
            })?,
        );
        let entry = self.log.append(fields)?;

        Ok(TapOutcome {
            event_hash: entry.event_hash,
            anomalies,
        })
    }

    /// Record one derivation edge and chain-log it.
    ///
    /// The raw cost goes on the log entry; the edge itself keeps only the
    /// bucket.
    pub fn add_provenance_edge(
        &mut self,
        source: &str,
        target: &str,
        rule_id: &str,
        run_id: &str,
        cost: f64,
        source_tag: SourceTag,
    ) -> DomainResult<ProvenanceEdge> {
        let edge = ProvenanceEdge {
            source: source.to_string(),
            target: target.to_string(),
            rule_id: rule_id.to_string(),
            cost_bucket: CostBucket::from_cost(cost),
            source_tag,
            run_id: run_id.to_string(),
            timestamp: now_secs(),
        };
        self.graph.record(&edge);
        self.edges.push(edge.clone());

        let mut fields = Map::new();
        fields.insert("event_type".into(), json!("provenance_edge"));
        fields.insert("source".into(), json!(edge.source));
        fields.insert("target".into(), json!(edge.target));
        fields.insert("rule_id".into(), json!(edge.rule_id));
        fields.insert("run_id".into(), json!(edge.run_id));
        fields.insert("cost".into(), json!(cost));
        fields.insert("cost_bucket".into(), json!(edge.cost_bucket));
        fields.insert("source_tag".into(), json!(edge.source_tag));
        self.log.append(fields)?;

        tracing::debug!(
            source,
            target,
            rule_id,
            bucket = %edge.cost_bucket,
            "provenance edge recorded"
        );
        Ok(edge)
    }

    /// Deduplicated symbol set plus the full edge list.
    pub fn provenance_graph(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.graph.symbols(),
            edges: self.edges.clone(),
        }
    }

    /// Transitive ancestors of a fact symbol in the edge graph.
    pub fn lineage_of(&self, symbol: &str) -> Vec<String> {
        self.graph.lineage_of(symbol)
    }

    /// Up to the `n` most recently tapped events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<&TappedEvent> {
        self.recent.recent(n)
    }

    /// Every anomaly raised over the domain's lifetime.
    pub fn anomaly_history(&self) -> &[AnomalyEvent] {
        self.detector.history()
    }

    /// Snapshot ring contents, anomaly history, and the provenance graph;
    /// optionally write the snapshot as pretty JSON. The chain log is not
    /// touched.
    pub fn export_audit(&self, output_path: Option<&Path>) -> DomainResult<AuditSnapshot> {
        let snapshot = AuditSnapshot {
            generated_at: now_secs(),
            recent_events: self.recent.iter().cloned().collect(),
            anomalies: self.detector.history().to_vec(),
            provenance_graph: self.provenance_graph(),
        };
        if let Some(path) = output_path {
            let pretty =
                serde_json::to_string_pretty(&snapshot).map_err(|err| DomainError::Snapshot {
                    message: err.to_string(),
                })?;
            fs::write(path, pretty).map_err(|source| DomainError::Export { source })?;
            tracing::info!(path = %path.display(), "audit snapshot written");
        }
        Ok(snapshot)
    }

    /// Walk this domain's chain log and report its integrity.
    pub fn verify_hash_chain(&self) -> DomainResult<ChainReport> {
        Ok(self.log.verify()?)
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }
}
