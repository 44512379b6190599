//! Normalized composition model.
//!
//! These types are produced by the [loader](crate::loader) and are never
//! mutated afterwards. Maps are ordered so that every derived artifact
//! (graph, plan, printed config) is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// A validated composition: services keyed by name plus declared volumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompositionSpec {
    /// Services keyed by their unique name.
    pub services: BTreeMap<String, ServiceSpec>,
    /// Named volumes declared at the top level.
    pub volumes: BTreeSet<String>,
}

impl CompositionSpec {
    /// Looks up a service by name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    /// Returns service names in sorted order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

/// One service of the composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    /// Unique service name.
    pub name: String,
    /// Where the service image comes from.
    pub source: ImageSource,
    /// Published ports, in declaration order.
    pub ports: Vec<PortMapping>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Volume mounts, in declaration order.
    pub volumes: Vec<VolumeMount>,
    /// Services that must be ready before this one starts.
    pub depends_on: Vec<String>,
    /// Command overriding the image default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Image origin of a service. Exactly one of the two forms is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// Build from a local context.
    Build {
        /// Build context directory.
        context: PathBuf,
        /// Build file, relative to the context.
        dockerfile: PathBuf,
    },
    /// Use a prebuilt image reference.
    Image(String),
}

/// Transport protocol of a port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (the default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// A host port to container port mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    /// Host interface to bind, if restricted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Host port; `None` lets the runtime pick one.
    pub host: Option<u16>,
    /// Port inside the container.
    pub container: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ip) = &self.host_ip {
            write!(f, "{ip}:")?;
        }
        if let Some(host) = self.host {
            write!(f, "{host}:")?;
        }
        write!(f, "{}", self.container)?;
        if self.protocol == Protocol::Udp {
            write!(f, "/udp")?;
        }
        Ok(())
    }
}

/// Source side of a volume mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountSource {
    /// A named volume declared at the top level.
    Named(String),
    /// A host path.
    Bind(PathBuf),
    /// An anonymous volume created by the runtime.
    Anonymous,
}

/// A volume mounted into a service container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeMount {
    /// What is mounted.
    pub source: MountSource,
    /// Absolute path inside the container.
    pub target: String,
    /// Whether the mount is read-only.
    pub read_only: bool,
}
