//! Raw, unvalidated shape of a composition document.
//!
//! These types accept every syntax the loader understands (short and long
//! forms of `build`, list and map forms of `environment` and `depends_on`)
//! and keep unknown keys around so the loader can warn about them.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_yaml::Value;

/// Top level of a composition document.
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    /// Format version; accepted and ignored.
    #[serde(default)]
    pub version: Option<Value>,
    /// Service definitions.
    #[serde(default)]
    pub services: Option<Entries<RawService>>,
    /// Named volume declarations.
    #[serde(default)]
    pub volumes: Option<Entries<Value>>,
    /// Any other top-level key.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One service as written in the document.
#[derive(Debug, Deserialize)]
pub struct RawService {
    /// Prebuilt image reference.
    #[serde(default)]
    pub image: Option<String>,
    /// Build section.
    #[serde(default)]
    pub build: Option<RawBuild>,
    /// Port mappings.
    #[serde(default)]
    pub ports: Vec<RawPort>,
    /// Environment variables.
    #[serde(default)]
    pub environment: Option<RawEnvironment>,
    /// Volume mounts in short syntax.
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Dependencies.
    #[serde(default)]
    pub depends_on: Option<RawDependsOn>,
    /// Command override.
    #[serde(default)]
    pub command: Option<RawCommand>,
    /// Any other key.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `build:` either as a context path or as a full section.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawBuild {
    /// `build: ./api`
    Context(String),
    /// `build: { context: ./api, dockerfile: Dockerfile.dev }`
    Full {
        /// Build context.
        #[serde(default)]
        context: Option<String>,
        /// Build file relative to the context.
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

/// A port entry, either a bare container port or a short-syntax string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawPort {
    /// `- 5000`
    Number(u64),
    /// `- "5001:5000"`
    Text(String),
}

/// `environment:` as a list of `KEY=VALUE` or as a mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawEnvironment {
    /// `- DATABASE_URL=postgres://db`
    List(Vec<String>),
    /// `DATABASE_URL: postgres://db`
    Map(Entries<Value>),
}

/// `depends_on:` as a list of names or as a mapping of name to condition.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawDependsOn {
    /// `- db`
    List(Vec<String>),
    /// `db: { condition: service_started }`
    Map(Entries<Value>),
}

/// `command:` as a single string or an exec array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawCommand {
    /// `command: python app.py`
    Shell(String),
    /// `command: ["python", "app.py"]`
    Exec(Vec<String>),
}

/// Mapping entries in document order, duplicates included.
///
/// Deserializing into a map type would silently keep one of two entries
/// sharing a key; keeping every pair lets the loader reject duplicates with
/// the offending name.
#[derive(Debug)]
pub struct Entries<T>(pub Vec<(String, T)>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Entries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

struct EntriesVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
    type Value = Entries<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping with string keys")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(Entries(Vec::new()))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, T>()? {
            entries.push((key, value));
        }
        Ok(Entries(entries))
    }
}
