use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::AttributeSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

/// Persisted record of what attune last applied
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AttuneState {
    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,

    /// Applied resources by name
    #[serde(default)]
    pub resources: BTreeMap<String, AppliedResource>,
}

/// The attributes last applied to one resource
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppliedResource {
    /// Provider the resource was applied through
    pub provider: String,
    /// Resolved remote identifier
    pub id: String,
    /// When the attributes were last applied
    pub applied_at: DateTime<Utc>,
    /// Attributes as last applied
    #[serde(default)]
    pub attributes: AttributeSet,
}

// ============================================================================
// AttuneState Implementation
// ============================================================================

impl AttuneState {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: AttuneState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    /// Attributes last applied to `name`.
    ///
    /// Empty when the resource was never applied or now lives at a different
    /// id or provider: nothing is known about the new target.
    pub fn prior(&self, name: &str, provider: &str, id: &str) -> AttributeSet {
        match self.resources.get(name) {
            Some(applied) if applied.provider == provider && applied.id == id => {
                applied.attributes.clone()
            }
            _ => AttributeSet::new(),
        }
    }

    /// Record a successful apply; an empty attribute set drops the entry
    pub fn record(&mut self, name: &str, provider: &str, id: &str, attributes: AttributeSet) {
        if attributes.is_empty() {
            self.resources.remove(name);
            return;
        }
        self.resources.insert(
            name.to_string(),
            AppliedResource {
                provider: provider.to_string(),
                id: id.to_string(),
                applied_at: Utc::now(),
                attributes,
            },
        );
    }

    /// Forget a resource without touching its remote attributes
    pub fn remove(&mut self, name: &str) -> bool {
        self.resources.remove(name).is_some()
    }
}

impl Default for AttuneState {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
