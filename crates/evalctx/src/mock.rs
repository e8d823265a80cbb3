//! Recording evaluation context for tests
//!
//! Returns programmed results and records the arguments of every call so
//! tests of graph nodes can assert on what a node asked for.

use crate::config::{RawConfig, ResolvedConfig, Resource};
use crate::context::EvalContext;
use crate::error::{Error, InterpolationError, Result};
use reconcile::ProviderHandle;
use std::sync::{Mutex, MutexGuard};

/// A call received by a [`RecordingEvalContext`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalCall {
    InitProvider {
        name: String,
    },
    Provider {
        name: String,
    },
    Interpolate {
        config: RawConfig,
        resource: Option<Resource>,
    },
}

/// Evaluation context that answers from programmed results.
///
/// Unprogrammed calls return an absent provider from `provider`, an
/// `UnknownProvider` error from `init_provider`, and an empty configuration
/// from `interpolate`.
#[derive(Debug, Default)]
pub struct RecordingEvalContext {
    init_provider: Option<Result<ProviderHandle>>,
    provider: Option<ProviderHandle>,
    interpolate: Option<Result<ResolvedConfig>>,
    calls: Mutex<Vec<EvalCall>>,
}

impl RecordingEvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `handle` from every `init_provider` call
    pub fn with_init_provider(mut self, handle: ProviderHandle) -> Self {
        self.init_provider = Some(Ok(handle));
        self
    }

    /// Fail every `init_provider` call with `err`
    pub fn with_init_provider_error(mut self, err: Error) -> Self {
        self.init_provider = Some(Err(err));
        self
    }

    /// Return `handle` from every `provider` lookup
    pub fn with_provider(mut self, handle: ProviderHandle) -> Self {
        self.provider = Some(handle);
        self
    }

    /// Return `resolved` from every `interpolate` call
    pub fn with_interpolated(mut self, resolved: ResolvedConfig) -> Self {
        self.interpolate = Some(Ok(resolved));
        self
    }

    /// Fail every `interpolate` call with `err`
    pub fn with_interpolate_error(mut self, err: InterpolationError) -> Self {
        self.interpolate = Some(Err(Error::Interpolation(err)));
        self
    }

    /// Every call received, in order
    pub fn calls(&self) -> Vec<EvalCall> {
        self.lock().clone()
    }

    /// Names passed to `init_provider`, in order
    pub fn init_provider_names(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                EvalCall::InitProvider { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Arguments of the most recent `interpolate` call
    pub fn last_interpolate(&self) -> Option<(RawConfig, Option<Resource>)> {
        self.lock().iter().rev().find_map(|call| match call {
            EvalCall::Interpolate { config, resource } => Some((config.clone(), resource.clone())),
            _ => None,
        })
    }

    fn record(&self, call: EvalCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EvalCall>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EvalContext for RecordingEvalContext {
    fn init_provider(&self, name: &str) -> Result<ProviderHandle> {
        self.record(EvalCall::InitProvider {
            name: name.to_string(),
        });
        match &self.init_provider {
            Some(result) => result.clone(),
            None => Err(Error::UnknownProvider {
                name: name.to_string(),
            }),
        }
    }

    fn provider(&self, name: &str) -> Option<ProviderHandle> {
        self.record(EvalCall::Provider {
            name: name.to_string(),
        });
        self.provider.clone()
    }

    fn interpolate(
        &self,
        config: &RawConfig,
        resource: Option<&Resource>,
    ) -> Result<ResolvedConfig> {
        self.record(EvalCall::Interpolate {
            config: config.clone(),
            resource: resource.cloned(),
        });
        match &self.interpolate {
            Some(result) => result.clone(),
            None => Ok(ResolvedConfig::new()),
        }
    }
}
