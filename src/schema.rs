use anyhow::{Context, Result, bail};
use evalctx::{RawConfig, Resource, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::paths;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The attune configuration file
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AttuneConfig {
    /// Walk-wide variables, referenced as `${var.NAME}`
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Providers by name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Managed resources by name
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceConfig>,
}

/// Built-in provider implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Attributes kept in a local JSON document
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Document path for `file` providers (default: `<state_dir>/remote/<name>.json`)
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Name of the provider managing this resource
    pub provider: String,
    /// Remote identifier; may contain references
    pub id: String,
    /// Declared attributes; values may contain references
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl AttuneConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!(
            "Loaded {} resources and {} providers from {}",
            config.resources.len(),
            config.providers.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate config from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that resources name declared providers and resources, that every
    /// template parses and that no two providers share a document
    pub fn validate(&self) -> Result<()> {
        let mut documents: BTreeMap<PathBuf, &str> = BTreeMap::new();
        for (name, provider) in &self.providers {
            let Some(path) = &provider.path else { continue };
            if let Some(other) = documents.insert(paths::expand(path), name) {
                bail!(
                    "Providers '{}' and '{}' share the document '{}'",
                    other,
                    name,
                    path
                );
            }
        }

        for (name, resource) in &self.resources {
            if !is_valid_name(name) {
                bail!(
                    "Invalid resource name '{}': use letters, digits, '_' or '-', and do not use 'var' or 'self'",
                    name
                );
            }
            if !self.providers.contains_key(&resource.provider) {
                bail!(
                    "Resource '{}' uses undeclared provider '{}'",
                    name,
                    resource.provider
                );
            }
            if resource.tags.keys().any(String::is_empty) {
                bail!("Resource '{}' has an empty tag key", name);
            }
            let raw = self.raw_config(name)?;
            if let Some(missing) = raw
                .node_references(name)
                .into_iter()
                .find(|dep| !self.resources.contains_key(dep))
            {
                bail!(
                    "Resource '{}' references undeclared resource '{}'",
                    name,
                    missing
                );
            }
        }
        Ok(())
    }

    /// The graph node for a resource
    pub fn node(&self, name: &str) -> Option<Resource> {
        self.resources
            .get(name)
            .map(|r| Resource::new(name, r.provider.clone()))
    }

    /// Unresolved configuration of a resource: `id` plus one `tags.KEY` entry per tag
    pub fn raw_config(&self, name: &str) -> Result<RawConfig> {
        let resource = self
            .resources
            .get(name)
            .with_context(|| format!("Unknown resource '{}'", name))?;

        let mut raw = RawConfig::new();
        raw.insert(
            "id",
            Template::parse(&resource.id).with_context(|| format!("Resource '{}': id", name))?,
        );
        for (key, value) in &resource.tags {
            let template = Template::parse(value)
                .with_context(|| format!("Resource '{}': tag '{}'", name, key))?;
            raw.insert(format!("tags.{key}"), template);
        }
        Ok(raw)
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    first_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name != "var"
        && name != "self"
}
