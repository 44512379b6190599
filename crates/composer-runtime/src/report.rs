//! Per-service outcome of an `up` run.
//!
//! The scheduler is the only writer of a [`RunReport`]; every state change
//! goes through [`RunReport::transition`], which enforces the service state
//! machine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use composer_common::error::ComposerError;
use composer_common::types::{Handle, ServiceState};
use composer_compose::plan::StartPlan;
use serde::Serialize;

/// Outcome record of one service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    /// Service name.
    pub name: String,
    /// Index of the batch the service belongs to.
    pub batch: usize,
    /// Final (or current) state.
    pub state: ServiceState,
    /// Runtime handle, once started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<Handle>,
    /// When the service entered `Starting`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the service reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure description, if the service failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of executing a start plan.
#[derive(Debug)]
pub struct RunReport {
    services: BTreeMap<String, ServiceReport>,
    order: Vec<String>,
    failures: Vec<ComposerError>,
    skipped: Vec<String>,
}

impl RunReport {
    /// Creates a report with every planned service `Pending`.
    #[must_use]
    pub fn new(plan: &StartPlan) -> Self {
        let mut services = BTreeMap::new();
        for (batch, names) in plan.batches().iter().enumerate() {
            for name in names {
                let _ = services.insert(
                    name.clone(),
                    ServiceReport {
                        name: name.clone(),
                        batch,
                        state: ServiceState::Pending,
                        handle: None,
                        started_at: None,
                        finished_at: None,
                        error: None,
                    },
                );
            }
        }
        Self {
            services,
            order: plan.services().map(String::from).collect(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Moves a service to `next`, rejecting illegal transitions.
    ///
    /// Returns whether the transition was applied.
    pub fn transition(&mut self, name: &str, next: ServiceState) -> bool {
        let Some(entry) = self.services.get_mut(name) else {
            tracing::warn!(service = name, "transition for unplanned service");
            return false;
        };
        if !entry.state.can_transition_to(next) {
            tracing::warn!(service = name, from = %entry.state, to = %next, "illegal state transition");
            return false;
        }
        tracing::info!(service = name, from = %entry.state, to = %next, "service state changed");
        entry.state = next;
        let now = Utc::now();
        if next == ServiceState::Starting {
            entry.started_at = Some(now);
        } else if next.is_terminal() {
            entry.finished_at = Some(now);
        }
        true
    }

    /// Marks a service `Ready` with its runtime handle.
    pub fn mark_ready(&mut self, name: &str, handle: Handle) {
        if self.transition(name, ServiceState::Ready) {
            if let Some(entry) = self.services.get_mut(name) {
                entry.handle = Some(handle);
            }
        }
    }

    /// Marks a service `Failed` and records the error.
    pub fn mark_failed(&mut self, name: &str, error: ComposerError) {
        if self.transition(name, ServiceState::Failed) {
            if let Some(entry) = self.services.get_mut(name) {
                entry.error = Some(error.to_string());
            }
            self.failures.push(error);
        }
    }

    /// Records a planned service that was never launched.
    pub fn mark_skipped(&mut self, name: &str) {
        self.skipped.push(name.to_string());
    }

    /// Returns the state of a service.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<ServiceState> {
        self.services.get(name).map(|s| s.state)
    }

    /// Returns the record of a service.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceReport> {
        self.services.get(name)
    }

    /// Returns service records in plan order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceReport> {
        self.order.iter().filter_map(|name| self.services.get(name))
    }

    /// Returns failures in the order they were recorded.
    #[must_use]
    pub fn failures(&self) -> &[ComposerError] {
        &self.failures
    }

    /// Returns the planned services that were never launched.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Returns names of failed services in plan order.
    #[must_use]
    pub fn failed_services(&self) -> Vec<&str> {
        self.services()
            .filter(|s| s.state == ServiceState::Failed)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Returns whether any service has failed so far.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns whether every planned service is `Ready`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.services.values().all(|s| s.state == ServiceState::Ready)
    }
}
