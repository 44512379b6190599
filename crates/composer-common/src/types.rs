//! Domain primitive types used across the Composer workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a built or pulled image, as understood by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    /// Creates an image reference from a string value.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a started container, issued by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(String);

impl Handle {
    /// Creates a handle from a runtime-issued identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a service during an `up` run.
///
/// Transitions are `Pending -> Starting -> Ready | Failed`, or
/// `Pending -> Failed` when a dependency failed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    /// Not started yet.
    Pending,
    /// Image prepared or container launched, waiting for readiness.
    Starting,
    /// Reported ready by the runtime.
    Ready,
    /// Failed, cancelled, or skipped because a dependency failed.
    Failed,
}

impl ServiceState {
    /// Returns whether the state is final for this run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Returns whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Starting | Self::Failed)
                | (Self::Starting, Self::Ready | Self::Failed)
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_displays_runtime_id() {
        let handle = Handle::new("3f2a9c");
        assert_eq!(handle.to_string(), "3f2a9c");
        assert_eq!(handle.as_str(), "3f2a9c");
    }

    #[test]
    fn terminal_states() {
        assert!(!ServiceState::Pending.is_terminal());
        assert!(!ServiceState::Starting.is_terminal());
        assert!(ServiceState::Ready.is_terminal());
        assert!(ServiceState::Failed.is_terminal());
    }

    #[test]
    fn legal_transitions() {
        use ServiceState::{Failed, Pending, Ready, Starting};
        assert!(Pending.can_transition_to(Starting));
        assert!(Pending.can_transition_to(Failed));
        assert!(Starting.can_transition_to(Ready));
        assert!(Starting.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Starting));
    }

    #[test]
    fn state_serializes_as_variant_name() {
        let json = serde_json::to_string(&ServiceState::Ready).expect("serialize");
        assert_eq!(json, "\"Ready\"");
    }
}
