//! Error types for pruning task generation.
//!
//! Configuration problems are reported before any artifact is written.
//! Invariant violations carry the offending values so a long run can be
//! diagnosed without being restarted.

use thiserror::Error;

/// Result type alias for podar operations.
pub type Result<T, E = PodarError> = std::result::Result<T, E>;

/// Errors that can occur while generating pruning tasks.
#[derive(Debug, Error)]
pub enum PodarError {
    /// Malformed or inconsistent user sparsity configuration.
    #[error("Invalid configuration for '{field}': {message}")]
    Config { field: String, message: String },

    /// A scheduled incremental sparsity fell outside `[0, 1]`.
    #[error(
        "Incremental sparsity out of range: incremental={incremental}, \
         cumulative target={cumulative}, achieved={achieved}"
    )]
    SparsityOutOfRange {
        cumulative: f64,
        achieved: f64,
        incremental: f64,
    },

    /// Rejection sampling did not find a feasible sparsity vector.
    #[error("Sparsity rescale did not converge for target {target} after {attempts} attempts")]
    RescaleDiverged { target: f64, attempts: usize },

    /// A result for a scored task arrived without a score.
    #[error("Task {task_id} finished without a score")]
    MissingScore { task_id: String },

    /// A result referenced a task this generator never emitted.
    #[error("Unknown task id: {task_id}")]
    UnknownTask { task_id: String },

    /// A result arrived for a task that is not in flight.
    #[error("Task {task_id} is already finished")]
    TaskAlreadyFinished { task_id: String },

    /// A stored artifact could not be found.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// No decoder registered for a protocol command.
    #[error("Bad command type: channel=\"{channel}\" command_type=\"{kind}\"")]
    UnknownCommand { channel: String, kind: String },

    /// A protocol command could not be decoded.
    #[error("Malformed command: {message}")]
    MalformedCommand { message: String },
}

impl PodarError {
    /// Create a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Check if this error is a programming error rather than bad input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            PodarError::SparsityOutOfRange { .. } | PodarError::RescaleDiverged { .. }
        )
    }

    /// Check if this error was caused by the user's configuration.
    pub fn is_user_error(&self) -> bool {
        matches!(self, PodarError::Config { .. })
    }
}

impl From<serde_json::Error> for PodarError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

impl From<serde_yaml::Error> for PodarError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PodarError::config("total_sparsity", "must be in [0, 1)");
        assert!(err.to_string().contains("total_sparsity"));
        assert!(err.to_string().contains("[0, 1)"));

        let err = PodarError::SparsityOutOfRange {
            cumulative: 0.4,
            achieved: 0.2,
            incremental: 1.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("1.5"));
        assert!(msg.contains("0.4"));
        assert!(msg.contains("0.2"));

        let err = PodarError::RescaleDiverged {
            target: 0.9,
            attempts: 10,
        };
        assert!(err.to_string().contains("10 attempts"));

        let err = PodarError::UnknownCommand {
            channel: "to-algo".to_string(),
            kind: "bogus".to_string(),
        };
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_error_classification() {
        assert!(PodarError::RescaleDiverged {
            target: 0.5,
            attempts: 1
        }
        .is_invariant_violation());
        assert!(!PodarError::config("x", "y").is_invariant_violation());
        assert!(PodarError::config("x", "y").is_user_error());
        assert!(!PodarError::ArtifactNotFound("k".into()).is_user_error());
    }

    #[test]
    fn test_from_serde_json() {
        let err: PodarError = serde_json::from_str::<u32>("not json")
            .map_err(PodarError::from)
            .unwrap_err();
        assert!(matches!(err, PodarError::Serialization { .. }));
    }
}
