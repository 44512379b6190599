//! Adapter that performs nothing and reports success.
//!
//! Used by `up --dry-run` to walk a plan without touching a runtime.

use std::sync::Mutex;

use composer_common::error::Result;
use composer_common::types::{Handle, ImageRef};
use composer_compose::model::{ImageSource, ServiceSpec};

use super::{Readiness, RuntimeAdapter, StartRequest};

/// A no-op runtime that records the requests it receives.
#[derive(Debug)]
pub struct DryRunAdapter {
    project: String,
    calls: Mutex<Vec<String>>,
}

impl DryRunAdapter {
    /// Creates a dry-run adapter for `project`.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns the recorded calls, in the order they were made.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        tracing::info!(call = %call, "dry run");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl RuntimeAdapter for DryRunAdapter {
    fn build(&self, service: &ServiceSpec, force: bool) -> Result<ImageRef> {
        let image = match &service.source {
            ImageSource::Image(reference) => reference.clone(),
            ImageSource::Build { .. } => format!("{}-{}:latest", self.project, service.name),
        };
        let verb = match (&service.source, force) {
            (ImageSource::Image(_), _) => "pull",
            (ImageSource::Build { .. }, true) => "rebuild",
            (ImageSource::Build { .. }, false) => "build",
        };
        self.record(format!("{verb} {} {image}", service.name));
        Ok(ImageRef::new(image))
    }

    fn start(&self, request: &StartRequest, image: &ImageRef) -> Result<Handle> {
        self.record(format!("start {} {image}", request.service));
        Ok(Handle::new(request.container_name.clone()))
    }

    fn probe_ready(&self, _handle: &Handle) -> Readiness {
        Readiness::Ready
    }

    fn stop(&self, service: &str, handle: &Handle) -> Result<()> {
        self.record(format!("stop {service} {handle}"));
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}
