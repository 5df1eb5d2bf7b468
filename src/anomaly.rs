//! Sliding-window anomaly detection over tapped event streams.
//!
//! The detector keeps a time window of recent event timestamps, overall and
//! per event type, and runs three independent checks on every recorded event:
//!
//! - **Rate spike**: events per second over the window exceeds a threshold
//! - **Burst**: a large window count with most of it packed into a few seconds
//! - **Drift**: the recent quarter-window's event-type distribution has moved
//!   away from the rest of the window (L1 distance)
//!
//! Found anomalies are returned to the caller and appended to a running
//! history that is never cleared. The detector observes; it does not react.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Anomaly types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    RateSpike,
    Burst,
    Drift,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateSpike => write!(f, "rate_spike"),
            Self::Burst => write!(f, "burst"),
            Self::Drift => write!(f, "drift"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One detected deviation. Append-only observations, never retracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub timestamp: f64,
    /// Numbers behind the verdict, specific to the check that raised it.
    pub details: Value,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds for the three anomaly checks.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Sliding window size in seconds (default: 60).
    pub window_secs: f64,
    /// Events per second above which a rate spike is raised (default: 10).
    pub rate_threshold: f64,
    /// Events needed in the window before the rate check runs (default: 10).
    pub min_rate_samples: usize,
    /// Window count above which the burst check engages (default: 25).
    pub burst_threshold: usize,
    /// Burst sub-window in seconds (default: 5).
    pub burst_window_secs: f64,
    /// Fraction of the window that must fall inside the sub-window (default: 0.5).
    pub burst_fraction: f64,
    /// L1 distance between type distributions above which drift is raised
    /// (default: 0.5; the distance ranges over [0, 2]).
    pub drift_threshold: f64,
    /// Events needed in the window before the drift check runs (default: 20).
    pub min_drift_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_secs: 60.0,
            rate_threshold: 10.0,
            min_rate_samples: 10,
            burst_threshold: 25,
            burst_window_secs: 5.0,
            burst_fraction: 0.5,
            drift_threshold: 0.5,
            min_drift_samples: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Windowed event-stream analyzer.
///
/// Timestamps are expected to be non-decreasing across calls; the window is
/// anchored at the latest timestamp seen so far.
#[derive(Debug)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    timestamps: VecDeque<f64>,
    per_type: HashMap<String, VecDeque<f64>>,
    latest: Option<f64>,
    anomalies: Vec<AnomalyEvent>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            timestamps: VecDeque::new(),
            per_type: HashMap::new(),
            latest: None,
            anomalies: Vec::new(),
        }
    }

    /// Record one event and return any anomalies it raises.
    ///
    /// Raised anomalies are also appended to [`AnomalyDetector::history`].
    pub fn record_event(&mut self, event_type: &str, timestamp: f64) -> Vec<AnomalyEvent> {
        let now = match self.latest {
            Some(latest) => latest.max(timestamp),
            None => timestamp,
        };
        self.latest = Some(now);

        self.timestamps.push_back(timestamp);
        self.per_type
            .entry(event_type.to_string())
            .or_default()
            .push_back(timestamp);
        self.purge(now);

        let mut found = Vec::new();
        found.extend(self.check_rate(now));
        found.extend(self.check_burst(now));
        found.extend(self.check_drift(now));

        for anomaly in &found {
            tracing::debug!(
                kind = %anomaly.kind,
                severity = %anomaly.severity,
                event_type,
                "anomaly raised"
            );
        }
        self.anomalies.extend(found.iter().cloned());
        found
    }

    /// Every anomaly ever raised, in detection order.
    pub fn history(&self) -> &[AnomalyEvent] {
        &self.anomalies
    }

    /// Events currently inside the window.
    pub fn window_len(&self) -> usize {
        self.timestamps.len()
    }

    fn purge(&mut self, now: f64) {
        let cutoff = now - self.config.window_secs;
        while self.timestamps.front().is_some_and(|ts| *ts < cutoff) {
            self.timestamps.pop_front();
        }
        for deque in self.per_type.values_mut() {
            while deque.front().is_some_and(|ts| *ts < cutoff) {
                deque.pop_front();
            }
        }
        self.per_type.retain(|_, deque| !deque.is_empty());
    }

    fn check_rate(&self, now: f64) -> Option<AnomalyEvent> {
        let count = self.timestamps.len();
        if count < self.config.min_rate_samples {
            return None;
        }
        let oldest = *self.timestamps.front()?;
        let span = (now - oldest).max(1.0);
        let rate = count as f64 / span;
        if rate <= self.config.rate_threshold {
            return None;
        }
        let severity = if rate >= 2.0 * self.config.rate_threshold {
            Severity::High
        } else {
            Severity::Medium
        };
        Some(AnomalyEvent {
            kind: AnomalyKind::RateSpike,
            severity,
            timestamp: now,
            details: json!({
                "rate_per_sec": rate,
                "threshold": self.config.rate_threshold,
                "window_events": count,
            }),
        })
    }

    fn check_burst(&self, now: f64) -> Option<AnomalyEvent> {
        let total = self.timestamps.len();
        if total <= self.config.burst_threshold {
            return None;
        }
        let sub_cutoff = now - self.config.burst_window_secs;
        let recent = self
            .timestamps
            .iter()
            .filter(|ts| **ts >= sub_cutoff)
            .count();
        if (recent as f64) < self.config.burst_fraction * total as f64 {
            return None;
        }
        Some(AnomalyEvent {
            kind: AnomalyKind::Burst,
            severity: Severity::Medium,
            timestamp: now,
            details: json!({
                "window_events": total,
                "sub_window_events": recent,
                "sub_window_secs": self.config.burst_window_secs,
            }),
        })
    }

    fn check_drift(&self, now: f64) -> Option<AnomalyEvent> {
        let total = self.timestamps.len();
        if total < self.config.min_drift_samples {
            return None;
        }

        let recent_cutoff = now - self.config.window_secs / 4.0;
        let mut recent_counts: HashMap<&str, usize> = HashMap::new();
        let mut historical_counts: HashMap<&str, usize> = HashMap::new();
        let mut recent_total = 0usize;
        let mut historical_total = 0usize;
        for (event_type, deque) in &self.per_type {
            for ts in deque {
                if *ts >= recent_cutoff {
                    *recent_counts.entry(event_type.as_str()).or_insert(0) += 1;
                    recent_total += 1;
                } else {
                    *historical_counts.entry(event_type.as_str()).or_insert(0) += 1;
                    historical_total += 1;
                }
            }
        }
        if recent_total == 0 || historical_total == 0 {
            return None;
        }

        let types: HashSet<&str> = recent_counts
            .keys()
            .chain(historical_counts.keys())
            .copied()
            .collect();
        let mut distance = 0.0_f64;
        for event_type in types {
            let recent_p =
                recent_counts.get(event_type).copied().unwrap_or(0) as f64 / recent_total as f64;
            let historical_p = historical_counts.get(event_type).copied().unwrap_or(0) as f64
                / historical_total as f64;
            distance += (recent_p - historical_p).abs();
        }
        if distance <= self.config.drift_threshold {
            return None;
        }
        Some(AnomalyEvent {
            kind: AnomalyKind::Drift,
            severity: Severity::Low,
            timestamp: now,
            details: json!({
                "l1_distance": distance,
                "recent_events": recent_total,
                "historical_events": historical_total,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(DetectorConfig::default())
    }

    #[test]
    fn rate_spike_over_twice_threshold_is_high_severity() {
        let mut det = detector();
        let mut last = Vec::new();
        for i in 0..20 {
            last = det.record_event("request", 100.0 + i as f64 * 0.05);
        }
        let spike = last
            .iter()
            .find(|a| a.kind == AnomalyKind::RateSpike)
            .expect("rate spike raised");
        assert_eq!(spike.severity, Severity::High);
    }

    #[test]
    fn moderate_overrate_is_medium_severity() {
        let mut det = detector();
        // 15 events inside ~1s: rate 15/s, above 10 but below 20.
        let mut last = Vec::new();
        for i in 0..15 {
            last = det.record_event("request", 100.0 + i as f64 * 0.05);
        }
        let spike = last
            .iter()
            .find(|a| a.kind == AnomalyKind::RateSpike)
            .expect("rate spike raised");
        assert_eq!(spike.severity, Severity::Medium);
    }

    #[test]
    fn too_few_events_raise_nothing() {
        let mut det = detector();
        for i in 0..5 {
            let found = det.record_event("request", 100.0 + i as f64 * 0.01);
            assert!(found.is_empty());
        }
    }

    #[test]
    fn packed_tail_of_a_slow_window_is_a_burst() {
        let mut det = detector();
        // 13 slow events over ~50s, then 13 packed into ~1s.
        for i in 0..13 {
            det.record_event("job", i as f64 * 4.0);
        }
        let mut last = Vec::new();
        for i in 0..13 {
            last = det.record_event("job", 53.0 + i as f64 * 0.1);
        }
        let burst = last
            .iter()
            .find(|a| a.kind == AnomalyKind::Burst)
            .expect("burst raised");
        assert_eq!(burst.severity, Severity::Medium);
        assert!(last.iter().all(|a| a.kind != AnomalyKind::RateSpike));
    }

    #[test]
    fn type_distribution_shift_is_drift() {
        let mut det = detector();
        for i in 0..24 {
            det.record_event("read", i as f64);
        }
        let mut last = Vec::new();
        for i in 0..8 {
            last = det.record_event("write", 50.0 + i as f64);
        }
        let drift = last
            .iter()
            .find(|a| a.kind == AnomalyKind::Drift)
            .expect("drift raised");
        assert_eq!(drift.severity, Severity::Low);
        assert!(drift.details["l1_distance"].as_f64().unwrap() > 0.5);
    }

    #[test]
    fn uniform_stream_has_no_drift() {
        let mut det = detector();
        for i in 0..40 {
            let found = det.record_event("steady", i as f64 * 1.5);
            assert!(found.iter().all(|a| a.kind != AnomalyKind::Drift));
        }
    }

    #[test]
    fn stale_events_leave_the_window() {
        let mut det = detector();
        det.record_event("a", 0.0);
        det.record_event("a", 1.0);
        assert_eq!(det.window_len(), 2);
        det.record_event("a", 100.0);
        assert_eq!(det.window_len(), 1);
    }

    #[test]
    fn history_accumulates_and_is_never_cleared() {
        let mut det = detector();
        for i in 0..20 {
            det.record_event("request", 100.0 + i as f64 * 0.05);
        }
        let raised = det.history().len();
        assert!(raised > 0);
        det.record_event("request", 500.0);
        assert!(det.history().len() >= raised);
    }
}
