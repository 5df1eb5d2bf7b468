// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # seshat
//!
//! Tamper-evident audit infrastructure: hash-chained event logs, PII
//! redaction, sliding-window anomaly detection, and a trajectory optimizer
//! that forward-chains facts and beam-searches derivation paths.
//!
//! ## Architecture
//!
//! - **Hash-chained ledger** (`ledger`): append-only JSONL where every entry
//!   embeds its predecessor's content hash
//! - **Redaction** (`redact`): pattern and denylist scrubbing with
//!   deterministic fingerprint placeholders
//! - **Anomaly detection** (`anomaly`): sliding-window rate, burst, and
//!   distribution-drift checks
//! - **Provenance domain** (`provenance`): one tap composing redaction,
//!   bounded retention, detection, chained logging, and a petgraph-backed
//!   derivation graph
//! - **Trajectory optimizer** (`trajectory`): forward chaining, beam search,
//!   and canonical spine folds over derivation trajectories
//!
//! ## Library usage
//!
//! ```no_run
//! use seshat::provenance::{DomainConfig, ProvenanceDomain};
//! use serde_json::json;
//!
//! let mut domain = ProvenanceDomain::new(DomainConfig::default()).unwrap();
//! let outcome = domain
//!     .tap_event("login", &json!({"email": "ada@corp.io"}), "run-1")
//!     .unwrap();
//! println!("chained as {}", outcome.event_hash);
//! ```

pub mod anomaly;
pub mod error;
pub mod hash;
pub mod kb;
pub mod ledger;
pub mod provenance;
pub mod redact;
pub mod ring;
pub mod trajectory;
