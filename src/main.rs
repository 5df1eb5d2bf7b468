//! seshat CLI: tamper-evident provenance and trajectory auditing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use seshat::kb::{Fact, KnowledgeBase, Rule};
use seshat::ledger::ChainLog;
use seshat::provenance::{DomainConfig, ProvenanceDomain};
use seshat::redact::Redactor;
use seshat::trajectory::{OptimizerConfig, TrajectoryOptimizer};

#[derive(Parser)]
#[command(name = "seshat", version, about = "Tamper-evident provenance and trajectory auditing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Redact and tap one event into a provenance chain log.
    Tap {
        /// Chain log file to append to.
        #[arg(long, default_value = "provenance_log.jsonl")]
        log: PathBuf,

        /// Event type label.
        #[arg(long)]
        event_type: String,

        /// Run identifier grouping related events.
        #[arg(long, default_value = "cli")]
        run_id: String,

        /// Payload as inline JSON, or @path to read a JSON file.
        #[arg(long)]
        payload: String,

        /// Use the literal placeholder instead of fingerprints.
        #[arg(long)]
        no_hash_pii: bool,
    },

    /// Verify the hash chain of a log file.
    Verify {
        /// Chain log file to check.
        log: PathBuf,
    },

    /// Print the last entries of a chain log.
    Show {
        /// Chain log file to read.
        log: PathBuf,

        /// Number of entries to print.
        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Redact a JSON document and print the result.
    Redact {
        /// Document as inline JSON, or @path to read a JSON file.
        payload: String,

        /// Use the literal placeholder instead of fingerprints.
        #[arg(long)]
        no_hash_pii: bool,

        /// Pretty-print the redacted document.
        #[arg(long)]
        pretty: bool,
    },

    /// Forward-chain facts through rules and print the closure.
    Chain {
        /// JSON file with an array of facts ({"symbol", "value"}).
        #[arg(long)]
        facts: PathBuf,

        /// JSON file with an array of rules ({"rule_id", "premises", "conclusion", "cost"}).
        #[arg(long)]
        rules: PathBuf,

        /// Maximum chaining depth.
        #[arg(long, default_value = "10")]
        max_depth: usize,
    },

    /// Beam-search the best derivation trajectory and fold it to its spine.
    Optimize {
        /// JSON file with an array of facts.
        #[arg(long)]
        facts: PathBuf,

        /// JSON file with an array of rules.
        #[arg(long)]
        rules: PathBuf,

        /// Chain log file recording the run.
        #[arg(long, default_value = "trajectory_log.jsonl")]
        log: PathBuf,

        /// Beam width.
        #[arg(long, default_value = "5")]
        beam_width: usize,

        /// Iteration cap.
        #[arg(long, default_value = "10")]
        max_depth: usize,

        /// Print the per-symbol occupancy map of the best path.
        #[arg(long)]
        occupancy: bool,
    },

    /// Summarize a chain log: entry counts by type, anomaly totals.
    Audit {
        /// Chain log file to summarize.
        log: PathBuf,

        /// Also verify the chain.
        #[arg(long)]
        verify: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tap {
            log,
            event_type,
            run_id,
            payload,
            no_hash_pii,
        } => {
            let payload = read_json_arg(&payload)?;
            let mut domain = ProvenanceDomain::new(DomainConfig {
                log_path: log,
                hash_pii: !no_hash_pii,
                ..Default::default()
            })
            .into_diagnostic()?;

            let outcome = domain
                .tap_event(&event_type, &payload, &run_id)
                .into_diagnostic()?;
            println!("Tapped \"{event_type}\" as {}", outcome.event_hash);
            if outcome.anomalies.is_empty() {
                println!("No anomalies raised.");
            } else {
                println!("Anomalies ({}):", outcome.anomalies.len());
                for anomaly in &outcome.anomalies {
                    println!(
                        "  [{}] {} at {:.3}",
                        anomaly.severity, anomaly.kind, anomaly.timestamp
                    );
                }
            }
        }

        Commands::Verify { log } => {
            let chain = ChainLog::open(&log).into_diagnostic()?;
            let report = chain.verify().into_diagnostic()?;
            if !report.valid {
                miette::bail!("{report}");
            }
            println!("{report}");
        }

        Commands::Show { log, count } => {
            let chain = ChainLog::open(&log).into_diagnostic()?;
            let entries = chain.read_all().into_diagnostic()?;
            if entries.is_empty() {
                println!("Log is empty.");
            } else {
                let start = entries.len().saturating_sub(count);
                println!("Entries {}..{} of {}:", start, entries.len(), entries.len());
                for entry in &entries[start..] {
                    let event_type = entry
                        .fields
                        .get("event_type")
                        .and_then(|v| v.as_str())
                        .unwrap_or("event");
                    let short = entry.event_hash.get(..12).unwrap_or(&entry.event_hash);
                    println!("  {:.3}  {}  {}", entry.timestamp, short, event_type);
                }
            }
        }

        Commands::Redact {
            payload,
            no_hash_pii,
            pretty,
        } => {
            let value = read_json_arg(&payload)?;
            let scrubbed = Redactor::new(!no_hash_pii).redact(&value);
            if pretty {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&scrubbed).into_diagnostic()?
                );
            } else {
                println!("{scrubbed}");
            }
        }

        Commands::Chain {
            facts,
            rules,
            max_depth,
        } => {
            let facts: Vec<Fact> = load_json_file(&facts)?;
            let rules: Vec<Rule> = load_json_file(&rules)?;

            let mut kb = KnowledgeBase::new();
            for rule in rules {
                kb.add_rule(rule);
            }
            let closure = kb.forward_chain(&facts, max_depth);

            println!(
                "Closure at depth {} ({} facts):",
                closure.depth,
                closure.facts.len()
            );
            for fact in &closure.facts {
                println!("  {} = {}", fact.symbol, fact.value);
            }
            if !closure.rules_fired.is_empty() {
                println!("Rules fired: {}", closure.rules_fired.join(", "));
            }
        }

        Commands::Optimize {
            facts,
            rules,
            log,
            beam_width,
            max_depth,
            occupancy,
        } => {
            let facts: Vec<Fact> = load_json_file(&facts)?;
            let rules: Vec<Rule> = load_json_file(&rules)?;

            let mut optimizer = TrajectoryOptimizer::new(OptimizerConfig {
                log_path: log,
                beam_width,
                max_depth,
            })
            .into_diagnostic()?;
            for fact in &facts {
                optimizer
                    .add_fact(&fact.symbol, fact.value.clone())
                    .into_diagnostic()?;
            }
            for rule in rules {
                optimizer
                    .add_rule(&rule.rule_id, rule.premises, &rule.conclusion, rule.cost)
                    .into_diagnostic()?;
            }

            let outcome = optimizer
                .beam_search_optimal_spine(&facts, None)
                .into_diagnostic()?;
            println!(
                "Search finished: {} iterations, {} paths explored.",
                outcome.iterations, outcome.paths_explored
            );

            match outcome.best {
                None => println!("No candidate path was produced."),
                Some(best) => {
                    println!(
                        "Best path: {} closures, score {:.4}, fairness {:.4}, cost {:.2}",
                        best.closures.len(),
                        best.score,
                        best.fairness,
                        best.cumulative_cost
                    );
                    let folded = optimizer.fold_to_hash(&best).into_diagnostic()?;
                    println!("Spine hash: {}", folded.hash);

                    if occupancy {
                        println!("Occupancy:");
                        for (symbol, presence) in best.occupancy_map() {
                            let cells: String = presence
                                .iter()
                                .map(|&present| if present { '●' } else { '·' })
                                .collect();
                            println!("  {symbol:>16}  {cells}");
                        }
                    }
                }
            }
        }

        Commands::Audit { log, verify } => {
            let chain = ChainLog::open(&log).into_diagnostic()?;
            let entries = chain.read_all().into_diagnostic()?;

            let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
            let mut anomaly_totals: BTreeMap<String, usize> = BTreeMap::new();
            for entry in &entries {
                let event_type = entry
                    .fields
                    .get("event_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("event");
                *by_type.entry(event_type.to_string()).or_default() += 1;

                if let Some(anomalies) = entry.fields.get("anomalies").and_then(|v| v.as_array()) {
                    for anomaly in anomalies {
                        let kind = anomaly.get("kind").and_then(|v| v.as_str()).unwrap_or("unknown");
                        let severity = anomaly
                            .get("severity")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown");
                        *anomaly_totals.entry(format!("{kind}/{severity}")).or_default() += 1;
                    }
                }
            }

            println!("Entries ({}):", entries.len());
            for (event_type, count) in &by_type {
                println!("  {event_type}: {count}");
            }
            if anomaly_totals.is_empty() {
                println!("No anomalies recorded.");
            } else {
                println!("Anomalies:");
                for (key, count) in &anomaly_totals {
                    println!("  {key}: {count}");
                }
            }

            if verify {
                let report = chain.verify().into_diagnostic()?;
                if !report.valid {
                    miette::bail!("{report}");
                }
                println!("{report}");
            }
        }
    }

    Ok(())
}

/// Parse an argument as inline JSON, or as `@path` naming a JSON file.
fn read_json_arg(raw: &str) -> Result<serde_json::Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).into_diagnostic()?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).into_diagnostic()
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&content).into_diagnostic()
}
