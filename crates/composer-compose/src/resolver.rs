//! Link environment injection.
//!
//! Services reach their dependencies by service name. When enabled, each
//! service receives host and port variables for every service it depends
//! on, so an application can build its connection string from them.

use std::collections::BTreeMap;

use crate::model::{CompositionSpec, ServiceSpec};

/// Returns every service's environment with link variables injected.
///
/// For each `depends_on` entry `dep`, the service receives:
/// - `<DEP>_HOST` set to the dependency's service name.
/// - `<DEP>_PORT` set to the dependency's first container port, if it
///   publishes any.
///
/// Variables declared explicitly on the service are never overwritten.
#[must_use]
pub fn link_environment(spec: &CompositionSpec) -> BTreeMap<String, BTreeMap<String, String>> {
    spec.services
        .values()
        .map(|service| (service.name.clone(), linked_env_for(spec, service)))
        .collect()
}

fn linked_env_for(spec: &CompositionSpec, service: &ServiceSpec) -> BTreeMap<String, String> {
    let mut env = service.environment.clone();
    for dep in &service.depends_on {
        let prefix = env_prefix(dep);
        let _ = env
            .entry(format!("{prefix}_HOST"))
            .or_insert_with(|| dep.clone());
        let port = spec
            .service(dep)
            .and_then(|d| d.ports.first())
            .map(|p| p.container.to_string());
        if let Some(port) = port {
            let _ = env.entry(format!("{prefix}_PORT")).or_insert(port);
        }
    }
    env
}

/// Upper-cases a service name and replaces characters invalid in variable names.
fn env_prefix(service: &str) -> String {
    service
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
