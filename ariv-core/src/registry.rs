//! The declarative model catalog (§4.A).
//!
//! Loaded once from a YAML document and held read-only for the lifetime of
//! the process.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use ariv_common::{ArivError, ModelSpec, Result};
use indexmap::IndexMap;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    models: RawEntries,
}

/// The raw `(name, entry)` pairs in document order, collected by hand so that
/// a repeated top-level key surfaces as a duplicate entry in the list instead
/// of being silently collapsed by a map deserializer.
#[derive(Debug, Default)]
struct RawEntries(Vec<(String, RawModelEntry)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of model name to model entry")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(pair) = map.next_entry::<String, RawModelEntry>()? {
                    entries.push(pair);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// A document entry, deserialized loosely then stamped with its map key as
/// `name` (the key IS the name; it cannot be missing).
#[derive(Debug, Deserialize)]
struct RawModelEntry {
    #[serde(rename = "type", default = "default_type")]
    model_type: String,
    #[serde(default)]
    family: String,
    #[serde(default)]
    quant: String,
    #[serde(default)]
    vram_mb: u64,
    #[serde(default = "default_task")]
    task: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    license: String,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    preferred_langs: Vec<String>,
    #[serde(default)]
    fallback: Vec<String>,
    #[serde(default)]
    local_path: Option<String>,
}

fn default_type() -> String {
    "gguf".to_string()
}
fn default_task() -> String {
    "general".to_string()
}

/// Read-only catalog of `ModelSpec`s, keyed by name, preserving document order.
#[derive(Debug, Clone)]
pub struct Registry {
    models: IndexMap<String, ModelSpec>,
}

impl Registry {
    /// Parse a registry document from a YAML string.
    ///
    /// A name repeated across two top-level entries is rejected as
    /// `ConfigInvalid` rather than silently keeping the last occurrence.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let doc: RegistryDocument = serde_yaml::from_str(yaml)
            .map_err(|e| ArivError::ConfigInvalid(e.to_string()))?;

        let mut seen = HashSet::with_capacity(doc.models.0.len());
        let mut models = IndexMap::with_capacity(doc.models.0.len());
        for (name, entry) in doc.models.0 {
            if !seen.insert(name.clone()) {
                return Err(ArivError::ConfigInvalid(format!(
                    "duplicate model name in registry: {name}"
                )));
            }
            let spec = ModelSpec {
                name: name.clone(),
                model_type: entry.model_type,
                family: entry.family,
                quant: entry.quant,
                vram_mb: entry.vram_mb,
                task: entry.task,
                url: entry.url,
                license: entry.license,
                sha256: entry.sha256,
                preferred_langs: entry.preferred_langs,
                fallback: entry.fallback,
                local_path: entry.local_path,
            };
            models.insert(name, spec);
        }
        Ok(Self { models })
    }

    /// Load and parse a registry document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ArivError::ConfigInvalid(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn get(&self, name: &str) -> Result<&ModelSpec> {
        self.models
            .get(name)
            .ok_or_else(|| ArivError::NotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// All entries, in document order.
    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// Entries whose `local_path` is set and exists on disk right now.
    pub fn available_local(&self) -> Vec<&ModelSpec> {
        self.models
            .values()
            .filter(|m| m.is_available_locally())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
