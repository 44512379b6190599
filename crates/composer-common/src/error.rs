//! Unified error types for the Composer workspace.
//!
//! The variants mirror the life of an `up` invocation: document errors and
//! graph errors abort before anything is scheduled, while runtime, dependency
//! and cancellation errors are reported per service by the scheduler.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ComposerError {
    /// The composition document could not be parsed or failed validation.
    #[error("malformed composition at `{field}`: {message}")]
    MalformedSpec {
        /// Path of the offending field, e.g. `services.web.ports[0]`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A service lists a dependency that is not declared.
    #[error("service \"{service}\" depends on undeclared service \"{dependency}\"")]
    UnknownDependency {
        /// Service carrying the dangling reference.
        service: String,
        /// Name that does not resolve to a service.
        dependency: String,
    },

    /// A service requested by name does not exist in the composition.
    #[error("no such service: \"{name}\"")]
    UnknownService {
        /// Requested service name.
        name: String,
    },

    /// The dependency graph contains a cycle.
    #[error("cyclic dependency between services: {}", .services.join(", "))]
    CyclicDependency {
        /// Services on the cycle, sorted by name.
        services: Vec<String>,
    },

    /// A service was not started because one of its dependencies failed.
    #[error("service \"{service}\" not started: dependency \"{root}\" failed")]
    DependencyFailed {
        /// Service that was never started.
        service: String,
        /// Service whose own failure caused this one.
        root: String,
    },

    /// The container runtime reported a failure for a service.
    #[error("service \"{service}\" failed: {reason}")]
    Runtime {
        /// Service the runtime was operating on.
        service: String,
        /// Reason reported by the runtime, verbatim.
        reason: String,
    },

    /// An outstanding start was cancelled because a sibling in its batch failed.
    #[error("service \"{service}\" cancelled")]
    Cancelled {
        /// Service whose start was cancelled.
        service: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl ComposerError {
    /// Shorthand for building a [`ComposerError::MalformedSpec`].
    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSpec {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the service this error is attributed to, if any.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::UnknownDependency { service, .. }
            | Self::DependencyFailed { service, .. }
            | Self::Runtime { service, .. }
            | Self::Cancelled { service } => Some(service),
            Self::UnknownService { name } => Some(name),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ComposerError>;
