//! Composition document loader.
//!
//! Turns YAML text into a validated [`CompositionSpec`], rejecting malformed
//! documents with the path of the offending field. Dependency names are not
//! resolved here; that is the graph builder's job.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use composer_common::constants::{
    DEFAULT_BUILD_CONTEXT, DEFAULT_COMPOSE_FILES, DEFAULT_DOCKERFILE,
};
use composer_common::error::{ComposerError, Result};
use serde_yaml::Value;

use crate::document::{
    Entries, RawBuild, RawCommand, RawDependsOn, RawDocument, RawEnvironment, RawPort,
    RawService,
};
use crate::model::{
    CompositionSpec, ImageSource, MountSource, PortMapping, Protocol, ServiceSpec, VolumeMount,
};

/// Keys a service may carry that are accepted but have no effect here.
const PASSTHROUGH_KEYS: &[&str] = &["container_name", "restart", "networks", "healthcheck"];

/// Returns the first default composition file present in `dir`.
pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
    DEFAULT_COMPOSE_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Reads and loads a composition file.
///
/// # Errors
///
/// Returns [`ComposerError::Io`] if the file cannot be read, or
/// [`ComposerError::MalformedSpec`] if its content is invalid.
pub fn load_file(path: &Path) -> Result<CompositionSpec> {
    tracing::info!(path = %path.display(), "loading composition file");
    let content = std::fs::read_to_string(path).map_err(|e| ComposerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_str(&content)
}

/// Loads a composition from YAML text.
///
/// # Errors
///
/// Returns [`ComposerError::MalformedSpec`] citing the offending field when
/// the document cannot be parsed or violates a structural rule.
pub fn load_str(content: &str) -> Result<CompositionSpec> {
    let raw: RawDocument = serde_yaml::from_str(content)
        .map_err(|e| ComposerError::malformed("<document>", e.to_string()))?;

    for key in raw.extra.keys() {
        tracing::warn!(key = %key, "ignoring unsupported top-level key");
    }

    let volumes = collect_volumes(raw.volumes)?;
    let Some(Entries(raw_services)) = raw.services else {
        return Err(ComposerError::malformed(
            "services",
            "document declares no services",
        ));
    };

    let mut services = BTreeMap::new();
    for (name, raw_service) in raw_services {
        let field = format!("services.{name}");
        if name.trim().is_empty() {
            return Err(ComposerError::malformed(field, "service name is empty"));
        }
        if services.contains_key(&name) {
            return Err(ComposerError::malformed(
                field,
                format!("duplicate service name \"{name}\""),
            ));
        }
        let service = normalize_service(&name, raw_service, &volumes)?;
        let _ = services.insert(name, service);
    }

    tracing::debug!(services = services.len(), volumes = volumes.len(), "composition loaded");
    Ok(CompositionSpec { services, volumes })
}

fn collect_volumes(raw: Option<Entries<Value>>) -> Result<BTreeSet<String>> {
    let mut volumes = BTreeSet::new();
    let Some(Entries(entries)) = raw else {
        return Ok(volumes);
    };
    for (name, options) in entries {
        let field = format!("volumes.{name}");
        if !matches!(options, Value::Null | Value::Mapping(_)) {
            return Err(ComposerError::malformed(
                field,
                "volume options must be a mapping",
            ));
        }
        if !volumes.insert(name.clone()) {
            return Err(ComposerError::malformed(
                field,
                format!("duplicate volume name \"{name}\""),
            ));
        }
    }
    Ok(volumes)
}

fn normalize_service(
    name: &str,
    raw: RawService,
    volumes: &BTreeSet<String>,
) -> Result<ServiceSpec> {
    let field = format!("services.{name}");
    warn_unknown_keys(name, &raw.extra);

    let source = match (raw.image, raw.build) {
        (Some(image), None) if !image.trim().is_empty() => ImageSource::Image(image),
        (Some(_), None) => {
            return Err(ComposerError::malformed(
                format!("{field}.image"),
                "image reference is empty",
            ));
        }
        (None, Some(build)) => build_source(build),
        (Some(_), Some(_)) => {
            return Err(ComposerError::malformed(
                field,
                "`image` and `build` are mutually exclusive",
            ));
        }
        (None, None) => {
            return Err(ComposerError::malformed(
                format!("{field}.image"),
                "service needs either `image` or `build`",
            ));
        }
    };

    let ports = raw
        .ports
        .iter()
        .enumerate()
        .map(|(i, port)| parse_port(&format!("{field}.ports[{i}]"), port))
        .collect::<Result<Vec<_>>>()?;

    let environment = match raw.environment {
        Some(env) => parse_environment(&format!("{field}.environment"), env)?,
        None => BTreeMap::new(),
    };

    let mounts = raw
        .volumes
        .iter()
        .enumerate()
        .map(|(i, volume)| parse_volume(&format!("{field}.volumes[{i}]"), volume, volumes))
        .collect::<Result<Vec<_>>>()?;

    let depends_on = match raw.depends_on {
        Some(deps) => parse_depends_on(&format!("{field}.depends_on"), deps)?,
        None => Vec::new(),
    };

    let command = raw.command.map(|command| match command {
        RawCommand::Shell(line) => line.split_whitespace().map(String::from).collect(),
        RawCommand::Exec(args) => args,
    });

    Ok(ServiceSpec {
        name: name.to_string(),
        source,
        ports,
        environment,
        volumes: mounts,
        depends_on,
        command,
    })
}

fn warn_unknown_keys(service: &str, extra: &BTreeMap<String, Value>) {
    for (key, value) in extra {
        if PASSTHROUGH_KEYS.contains(&key.as_str()) {
            continue;
        }
        let looks_like_service = value
            .as_mapping()
            .is_some_and(|m| m.contains_key("image") || m.contains_key("build"));
        if looks_like_service {
            tracing::warn!(
                service,
                key = %key,
                "nested service definition ignored; services must be siblings under `services`"
            );
        } else {
            tracing::warn!(service, key = %key, "ignoring unsupported service key");
        }
    }
}

fn build_source(build: RawBuild) -> ImageSource {
    let (context, dockerfile) = match build {
        RawBuild::Context(context) => (Some(context), None),
        RawBuild::Full {
            context,
            dockerfile,
        } => (context, dockerfile),
    };
    ImageSource::Build {
        context: PathBuf::from(context.unwrap_or_else(|| DEFAULT_BUILD_CONTEXT.into())),
        dockerfile: PathBuf::from(dockerfile.unwrap_or_else(|| DEFAULT_DOCKERFILE.into())),
    }
}

/// Parses `container`, `host:container` or `ip:host:container`, with an
/// optional `/tcp` or `/udp` suffix.
fn parse_port(field: &str, raw: &RawPort) -> Result<PortMapping> {
    let text = match raw {
        RawPort::Number(n) => n.to_string(),
        RawPort::Text(s) => s.trim().to_string(),
    };

    let (spec, protocol) = match text.rsplit_once('/') {
        Some((spec, "tcp")) => (spec, Protocol::Tcp),
        Some((spec, "udp")) => (spec, Protocol::Udp),
        Some((_, other)) => {
            return Err(ComposerError::malformed(
                field,
                format!("unknown protocol \"{other}\""),
            ));
        }
        None => (text.as_str(), Protocol::Tcp),
    };

    let parts: Vec<&str> = spec.split(':').collect();
    let (host_ip, host, container) = match parts.as_slice() {
        [container] => (None, None, *container),
        [host, container] => (None, Some(*host), *container),
        [ip, host, container] => (Some(*ip), Some(*host), *container),
        _ => {
            return Err(ComposerError::malformed(
                field,
                format!("expected \"host:container\", got \"{text}\""),
            ));
        }
    };

    let host = match host {
        Some("") | None => None,
        Some(h) => Some(parse_port_number(field, h)?),
    };
    let container = parse_port_number(field, container)?;
    let host_ip = host_ip.filter(|ip| !ip.is_empty()).map(String::from);

    Ok(PortMapping {
        host_ip,
        host,
        container,
        protocol,
    })
}

fn parse_port_number(field: &str, value: &str) -> Result<u16> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ComposerError::malformed(
            field,
            format!("\"{value}\" is not a valid port number"),
        )),
    }
}

fn parse_environment(field: &str, raw: RawEnvironment) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    match raw {
        RawEnvironment::List(items) => {
            for (i, item) in items.iter().enumerate() {
                let Some((key, value)) = item.split_once('=') else {
                    return Err(ComposerError::malformed(
                        format!("{field}[{i}]"),
                        format!("expected KEY=VALUE, got \"{item}\""),
                    ));
                };
                if key.trim().is_empty() {
                    return Err(ComposerError::malformed(
                        format!("{field}[{i}]"),
                        "variable name is empty",
                    ));
                }
                let _ = env.insert(key.trim().to_string(), value.to_string());
            }
        }
        RawEnvironment::Map(Entries(entries)) => {
            for (key, value) in entries {
                let value = scalar_to_string(&value).ok_or_else(|| {
                    ComposerError::malformed(format!("{field}.{key}"), "value must be a scalar")
                })?;
                let _ = env.insert(key, value);
            }
        }
    }
    Ok(env)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// Parses `target`, `source:target` or `source:target:mode`.
///
/// Sources starting with `/`, `.` or `~` are host paths; anything else names
/// a top-level volume, which must be declared.
fn parse_volume(field: &str, raw: &str, declared: &BTreeSet<String>) -> Result<VolumeMount> {
    let parts: Vec<&str> = raw.split(':').collect();
    let (source, target, mode) = match parts.as_slice() {
        [target] => (None, *target, None),
        [source, target] => (Some(*source), *target, None),
        [source, target, mode] => (Some(*source), *target, Some(*mode)),
        _ => {
            return Err(ComposerError::malformed(
                field,
                format!("expected \"source:target[:mode]\", got \"{raw}\""),
            ));
        }
    };

    if target.is_empty() {
        return Err(ComposerError::malformed(field, "container path is empty"));
    }
    if !target.starts_with('/') {
        return Err(ComposerError::malformed(
            field,
            format!("container path \"{target}\" must be absolute"),
        ));
    }

    let read_only = match mode {
        None | Some("rw") => false,
        Some("ro") => true,
        Some(other) => {
            return Err(ComposerError::malformed(
                field,
                format!("unknown mount mode \"{other}\""),
            ));
        }
    };

    let source = match source {
        None => MountSource::Anonymous,
        Some("") => {
            return Err(ComposerError::malformed(field, "volume source is empty"));
        }
        Some(path) if path.starts_with(['/', '.', '~']) => MountSource::Bind(PathBuf::from(path)),
        Some(name) if declared.contains(name) => MountSource::Named(name.to_string()),
        Some(name) => {
            return Err(ComposerError::malformed(
                field,
                format!("reference to undeclared volume \"{name}\""),
            ));
        }
    };

    Ok(VolumeMount {
        source,
        target: target.to_string(),
        read_only,
    })
}

fn parse_depends_on(field: &str, raw: RawDependsOn) -> Result<Vec<String>> {
    let names = match raw {
        RawDependsOn::List(names) => names,
        RawDependsOn::Map(Entries(entries)) => entries.into_iter().map(|(name, _)| name).collect(),
    };

    let mut seen = HashSet::new();
    let mut deps = Vec::with_capacity(names.len());
    for (i, name) in names.into_iter().enumerate() {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ComposerError::malformed(
                format!("{field}[{i}]"),
                "dependency name is empty",
            ));
        }
        if seen.insert(name.clone()) {
            deps.push(name);
        }
    }
    Ok(deps)
}
