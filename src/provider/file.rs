//! Provider backed by a local JSON document
//!
//! The document maps resource ids to tag lists in wire form:
//!
//! ```json
//! { "web-prod": [ { "Key": "Name", "Value": "web" } ] }
//! ```

use reconcile::{AttributeSet, Provider, TransportError, decode_tags};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

type Document = BTreeMap<String, AttributeSet>;

/// Attributes stored in a JSON file, with the remote's additive semantics
///
/// The lock only serializes calls on this instance; config validation keeps
/// two providers from sharing a document.
#[derive(Debug)]
pub struct FileProvider {
    name: String,
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProvider {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Current attributes of a resource (empty when it has none)
    pub fn attributes(&self, resource_id: &str) -> Result<AttributeSet, TransportError> {
        let _guard = self.guard();
        let doc = self.read()?;
        Ok(doc.get(resource_id).cloned().unwrap_or_default())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read(&self) -> Result<Document, TransportError> {
        if !self.path.exists() {
            return Ok(Document::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            TransportError::with_source(format!("failed to read {}", self.path.display()), e)
        })?;
        if content.trim().is_empty() {
            return Ok(Document::new());
        }

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            TransportError::with_source(format!("failed to parse {}", self.path.display()), e)
        })?;
        let Value::Object(entries) = value else {
            return Err(TransportError::new(format!(
                "{}: expected an object of resource ids",
                self.path.display()
            )));
        };

        let mut doc = Document::new();
        for (resource_id, tags) in entries {
            let attributes = decode_tags(tags).map_err(|e| {
                TransportError::with_source(
                    format!("{}: resource '{}'", self.path.display(), resource_id),
                    e,
                )
            })?;
            doc.insert(resource_id, attributes);
        }
        Ok(doc)
    }

    fn write(&self, doc: &Document) -> Result<(), TransportError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                TransportError::with_source(format!("failed to create {}", dir.display()), e)
            })?;
        }

        let wire: BTreeMap<&String, _> = doc
            .iter()
            .filter(|(_, attributes)| !attributes.is_empty())
            .map(|(id, attributes)| (id, attributes.to_tags()))
            .collect();
        let content = serde_json::to_string_pretty(&wire)
            .map_err(|e| TransportError::with_source("failed to encode document", e))?;

        fs::write(&self.path, content).map_err(|e| {
            TransportError::with_source(format!("failed to write {}", self.path.display()), e)
        })
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, resource_id: &str, attributes: &AttributeSet) -> Result<(), TransportError> {
        let _guard = self.guard();
        let mut doc = self.read()?;
        let entry = doc.entry(resource_id.to_string()).or_default();
        for (key, value) in attributes {
            entry.insert(key.as_str(), value.as_str());
        }
        log::debug!(
            "{}: wrote {} attributes to {}",
            self.name,
            attributes.len(),
            resource_id
        );
        self.write(&doc)
    }

    fn delete(&self, resource_id: &str, keys: &[String]) -> Result<(), TransportError> {
        let _guard = self.guard();
        let mut doc = self.read()?;
        if let Some(entry) = doc.get_mut(resource_id) {
            for key in keys {
                entry.remove(key);
            }
        }
        log::debug!(
            "{}: deleted {} attributes from {}",
            self.name,
            keys.len(),
            resource_id
        );
        self.write(&doc)
    }
}
