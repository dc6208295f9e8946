// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error taxonomy for the destruction pipeline.
//!
//! - `Rejection`: policy refused the request, nothing was touched.
//! - `TargetError`: one target failed, recorded in its result.
//! - `StrategyError`: the whole task is meaningless or faulted.
//! - `TransportError`: an event could not be delivered to the caller.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Policy violations. Always raised before a task exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("confirmation required")]
    ConfirmationRequired,
    #[error("severity exceeds maximum allowed ({ceiling})")]
    SeverityExceeded {
        requested: crate::types::Severity,
        ceiling: crate::types::Severity,
    },
    #[error("target is blocked: {0}")]
    Blocked(String),
    #[error("target not in allowed list: {0}")]
    NotAllowed(String),
}

/// Failure confined to a single target.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target is in blocked list")]
    Blocked,
    #[error("resolved path is blocked: {}", .0.display())]
    ResolvedBlocked(PathBuf),
    #[error("resolved path is not within allowed targets: {}", .0.display())]
    ResolvedNotAllowed(PathBuf),
    #[error("path traversal detected in {0}")]
    PathTraversal(String),
    #[error("failed to stat file: {0}")]
    Stat(#[source] io::Error),
    #[error("target is a directory, not supported in safe mode")]
    IsDirectory,
    #[error("failed to create backup: {0}")]
    Backup(#[source] io::Error),
    #[error("backup verification failed for {}", .0.display())]
    BackupMismatch(PathBuf),
    #[error("failed to remove file: {0}")]
    Remove(#[source] io::Error),
}

/// Whole-task faults. Results gathered before the fault are kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("strategy panicked while processing {target}: {message}")]
    Panicked { target: String, message: String },
    #[error("{0}")]
    Internal(String),
}

/// Event delivery failures on a stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("event receiver disconnected")]
    Closed,
    #[error("failed to write event")]
    Io(#[from] io::Error),
    #[error("failed to encode event")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn rejection_messages_name_the_reason() {
        assert!(Rejection::ConfirmationRequired.to_string().contains("confirm"));
        let exceeded = Rejection::SeverityExceeded {
            requested: Severity::Critical,
            ceiling: Severity::Medium,
        };
        assert_eq!(
            exceeded.to_string(),
            "severity exceeds maximum allowed (MEDIUM)"
        );
        assert_eq!(
            Rejection::Blocked("/etc/passwd".into()).to_string(),
            "target is blocked: /etc/passwd"
        );
    }
}
