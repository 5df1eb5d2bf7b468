//! Rich diagnostic error types for seshat.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for seshat.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SeshatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Trajectory(#[from] TrajectoryError),
}

// ---------------------------------------------------------------------------
// Ledger errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LedgerError {
    #[error("I/O error on chain log: {source}")]
    #[diagnostic(
        code(seshat::ledger::io),
        help(
            "A filesystem operation on the chain log failed. Check that the log \
             directory exists, has correct permissions, and that the disk is not \
             full. A skipped append breaks the chain for every later entry, so \
             this error must not be ignored."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(seshat::ledger::serde),
        help(
            "An event could not be serialized to or parsed from its JSON line \
             form. For reads, this usually means the log file was edited or \
             truncated by hand; run a chain verification for details."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Provenance domain errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DomainError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid domain configuration: {message}")]
    #[diagnostic(
        code(seshat::domain::invalid_config),
        help("Check the DomainConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("audit snapshot error: {message}")]
    #[diagnostic(
        code(seshat::domain::snapshot),
        help(
            "The audit snapshot could not be assembled. This indicates an \
             event payload that does not serialize to JSON, which should not \
             happen for data that entered through the tap."
        )
    )]
    Snapshot { message: String },

    #[error("audit export error: {source}")]
    #[diagnostic(
        code(seshat::domain::export),
        help(
            "The audit snapshot could not be written to the output path. \
             Check that the target directory exists and is writable."
        )
    )]
    Export {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Trajectory errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TrajectoryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid optimizer configuration: {message}")]
    #[diagnostic(
        code(seshat::trajectory::invalid_config),
        help("Check the OptimizerConfig fields. {message}")
    )]
    InvalidConfig { message: String },
}

/// Convenience alias for functions returning seshat results.
pub type SeshatResult<T> = std::result::Result<T, SeshatError>;

/// Result type for chain log operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Result type for provenance domain operations.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

/// Result type for trajectory optimizer operations.
pub type TrajectoryResult<T> = std::result::Result<T, TrajectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_converts_to_seshat_error() {
        let err = LedgerError::Serialization {
            message: "bad line".into(),
        };
        let top: SeshatError = err.into();
        assert!(matches!(
            top,
            SeshatError::Ledger(LedgerError::Serialization { .. })
        ));
    }

    #[test]
    fn domain_error_wraps_ledger_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let ledger = LedgerError::Io { source: io };
        let domain: DomainError = ledger.into();
        assert!(matches!(domain, DomainError::Ledger(LedgerError::Io { .. })));
    }

    #[test]
    fn trajectory_error_wraps_ledger_error() {
        let ledger = LedgerError::Serialization {
            message: "oops".into(),
        };
        let traj: TrajectoryError = ledger.into();
        assert!(matches!(
            traj,
            TrajectoryError::Ledger(LedgerError::Serialization { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = DomainError::InvalidConfig {
            message: "ring_capacity must be at least 1".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("ring_capacity"));
    }
}
