//! Provider transport contract
//!
//! Reconciliation needs exactly two operations from a remote API: write a
//! set of attributes (overwriting existing keys) and delete a list of keys.
//! Anything implementing [`Provider`] can be reconciled.

use crate::attrs::AttributeSet;
use crate::error::TransportError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// A named, stateful connection to one remote attribute API
pub trait Provider: Send + Sync + fmt::Debug {
    /// Name this provider was registered under
    fn name(&self) -> &str;

    /// Write every attribute onto the resource, overwriting existing keys
    fn create(&self, resource_id: &str, attributes: &AttributeSet) -> Result<(), TransportError>;

    /// Delete the given keys from the resource
    fn delete(&self, resource_id: &str, keys: &[String]) -> Result<(), TransportError>;
}

/// Shared handle to an initialized provider
pub type ProviderHandle = Arc<dyn Provider>;

// ============================================================================
// Recording provider
// ============================================================================

/// A call received by a [`RecordingProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Create {
        resource_id: String,
        attributes: AttributeSet,
    },
    Delete {
        resource_id: String,
        keys: Vec<String>,
    },
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<ProviderCall>,
    remote: HashMap<String, AttributeSet>,
    fail_create: Option<String>,
    fail_delete: Option<String>,
}

/// In-memory provider that records every call.
///
/// It keeps a simulated remote store with additive semantics: `create`
/// inserts or overwrites keys and leaves others alone, `delete` removes the
/// listed keys. Failures can be injected for the next call of either kind;
/// a failed call is recorded but does not touch the store.
#[derive(Debug)]
pub struct RecordingProvider {
    name: String,
    state: Mutex<Recorded>,
}

impl RecordingProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(Recorded::default()),
        }
    }

    /// Seed the simulated remote attributes of a resource
    pub fn with_remote(self, resource_id: &str, attributes: AttributeSet) -> Self {
        self.lock().remote.insert(resource_id.to_string(), attributes);
        self
    }

    /// Make the next `create` call fail with `message`
    pub fn fail_next_create(&self, message: &str) {
        self.lock().fail_create = Some(message.to_string());
    }

    /// Make the next `delete` call fail with `message`
    pub fn fail_next_delete(&self, message: &str) {
        self.lock().fail_delete = Some(message.to_string());
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls, keeping the remote store
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current simulated remote attributes of a resource
    pub fn remote(&self, resource_id: &str) -> AttributeSet {
        self.lock()
            .remote
            .get(resource_id)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, resource_id: &str, attributes: &AttributeSet) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::Create {
            resource_id: resource_id.to_string(),
            attributes: attributes.clone(),
        });

        if let Some(message) = state.fail_create.take() {
            return Err(TransportError::new(message));
        }

        let remote = state.remote.entry(resource_id.to_string()).or_default();
        for (key, value) in attributes {
            remote.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn delete(&self, resource_id: &str, keys: &[String]) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(ProviderCall::Delete {
            resource_id: resource_id.to_string(),
            keys: keys.to_vec(),
        });

        if let Some(message) = state.fail_delete.take() {
            return Err(TransportError::new(message));
        }

        if let Some(remote) = state.remote.get_mut(resource_id) {
            for key in keys {
                remote.remove(key);
            }
        }
        Ok(())
    }
}
