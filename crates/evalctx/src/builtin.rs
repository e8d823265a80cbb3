//! Production evaluation context

use crate::config::{RawConfig, ResolvedConfig, Resource};
use crate::context::EvalContext;
use crate::error::{Error, Result};
use crate::interpolate::interpolate;
use crate::state::GraphState;
use reconcile::{ProviderHandle, TransportError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Builds the provider registered under a name
pub type ProviderFactory =
    Arc<dyn Fn(&str) -> std::result::Result<ProviderHandle, TransportError> + Send + Sync>;

/// Evaluation context backed by provider factories and a shared [`GraphState`].
///
/// Registry transitions are one-way (`unregistered -> registered`). A name is
/// claimed under a short lock before its factory runs, so a second
/// initialization of the same name fails immediately while factories for
/// different names run in parallel. Lookups only take the registry's read
/// lock and never wait on a factory.
pub struct BuiltinEvalContext {
    factories: HashMap<String, ProviderFactory>,
    claimed: Mutex<HashSet<String>>,
    providers: RwLock<HashMap<String, ProviderHandle>>,
    state: Arc<GraphState>,
}

impl BuiltinEvalContext {
    pub fn new(state: Arc<GraphState>) -> Self {
        Self {
            factories: HashMap::new(),
            claimed: Mutex::new(HashSet::new()),
            providers: RwLock::new(HashMap::new()),
            state,
        }
    }

    /// Register the factory used to initialize provider `name`
    pub fn with_factory<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<ProviderHandle, TransportError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Graph state that interpolation reads from
    pub fn state(&self) -> &Arc<GraphState> {
        &self.state
    }

    fn claim(&self, name: &str) -> bool {
        lock(&self.claimed).insert(name.to_string())
    }

    fn release(&self, name: &str) {
        lock(&self.claimed).remove(name);
    }
}

impl EvalContext for BuiltinEvalContext {
    fn init_provider(&self, name: &str) -> Result<ProviderHandle> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownProvider {
                name: name.to_string(),
            })?;

        if !self.claim(name) {
            return Err(Error::AlreadyInitialized {
                name: name.to_string(),
            });
        }

        log::debug!("Initializing provider {name}");
        let handle = match factory(name) {
            Ok(handle) => handle,
            Err(err) => {
                self.release(name);
                return Err(Error::ProviderInit {
                    name: name.to_string(),
                    message: err.to_string(),
                });
            }
        };

        let mut providers = match self.providers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        providers.insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    fn provider(&self, name: &str) -> Option<ProviderHandle> {
        let providers = match self.providers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        providers.get(name).cloned()
    }

    fn interpolate(
        &self,
        config: &RawConfig,
        resource: Option<&Resource>,
    ) -> Result<ResolvedConfig> {
        Ok(interpolate(config, resource, &self.state)?)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::RecordingProvider;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording(name: &str) -> std::result::Result<ProviderHandle, TransportError> {
        Ok(Arc::new(RecordingProvider::new(name)))
    }

    fn context() -> BuiltinEvalContext {
        BuiltinEvalContext::new(Arc::new(GraphState::default()))
            .with_factory("p", recording)
            .with_factory("q", recording)
    }

    #[test]
    fn test_init_then_lookup() {
        let ctx = context();
        assert!(ctx.provider("p").is_none());

        let handle = ctx.init_provider("p").unwrap();
        assert_eq!(handle.name(), "p");

        let found = ctx.provider("p").unwrap();
        assert!(Arc::ptr_eq(&handle, &found));
    }

    #[test]
    fn test_double_init_fails_and_keeps_handle() {
        let ctx = context();
        let first = ctx.init_provider("p").unwrap();

        let err = ctx.init_provider("p").unwrap_err();
        assert_eq!(
            err,
            Error::AlreadyInitialized {
                name: "p".to_string()
            }
        );
        assert!(Arc::ptr_eq(&first, &ctx.provider("p").unwrap()));
    }

    #[test]
    fn test_unregistered_lookup_stays_absent() {
        let ctx = context();
        assert!(ctx.provider("unregistered").is_none());
        ctx.init_provider("p").unwrap();
        ctx.init_provider("q").unwrap();
        assert!(ctx.provider("unregistered").is_none());
    }

    #[test]
    fn test_unknown_provider() {
        let ctx = context();
        let err = ctx.init_provider("nope").unwrap_err();
        assert!(matches!(err, Error::UnknownProvider { .. }));
    }

    #[test]
    fn test_failed_factory_releases_claim() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let ctx = BuiltinEvalContext::new(Arc::new(GraphState::default())).with_factory(
            "flaky",
            move |name: &str| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::new("credentials expired"))
                } else {
                    recording(name)
                }
            },
        );

        let err = ctx.init_provider("flaky").unwrap_err();
        assert!(
            matches!(err, Error::ProviderInit { ref message, .. } if message == "credentials expired")
        );
        assert!(ctx.provider("flaky").is_none());

        ctx.init_provider("flaky").unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_init_of_distinct_names() {
        let ctx = context();

        std::thread::scope(|s| {
            let a = s.spawn(|| ctx.init_provider("p"));
            let b = s.spawn(|| ctx.init_provider("q"));
            assert!(a.join().unwrap().is_ok());
            assert!(b.join().unwrap().is_ok());
        });

        assert_eq!(ctx.provider("p").unwrap().name(), "p");
        assert_eq!(ctx.provider("q").unwrap().name(), "q");
    }

    #[test]
    fn test_concurrent_init_of_same_name_succeeds_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let ctx = BuiltinEvalContext::new(Arc::new(GraphState::default())).with_factory(
            "p",
            move |name: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                recording(name)
            },
        );

        let successes = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| ctx.init_provider("p"))).collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|result| result.is_ok())
                .count()
        });

        assert_eq!(successes, 1);
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lookup_does_not_wait_on_other_init() {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let (s1, r1) = (Arc::clone(&started), Arc::clone(&release));

        let ctx = context().with_factory("slow", move |name: &str| {
            s1.wait();
            r1.wait();
            recording(name)
        });

        std::thread::scope(|s| {
            let slow = s.spawn(|| ctx.init_provider("slow"));

            started.wait();
            // "slow" is mid-initialization; other names are unaffected
            assert!(ctx.provider("slow").is_none());
            assert!(ctx.init_provider("p").is_ok());
            assert!(ctx.provider("p").is_some());
            assert!(matches!(
                ctx.init_provider("slow"),
                Err(Error::AlreadyInitialized { .. })
            ));
            release.wait();

            assert!(slow.join().unwrap().is_ok());
        });

        assert!(ctx.provider("slow").is_some());
    }

    #[test]
    fn test_interpolate_while_publishing() {
        let variables = [("env".to_string(), "prod".to_string())].into_iter().collect();
        let state = Arc::new(GraphState::new(variables));
        state.publish("db", [("id", "db-0")].into_iter().collect());
        let ctx = BuiltinEvalContext::new(Arc::clone(&state));
        let raw = RawConfig::parse([("id", "web-${var.env}"), ("tags.Upstream", "${db.id}")])
            .unwrap();

        const ROUNDS: usize = 200;
        const READERS: usize = 4;
        let start = Barrier::new(READERS + 1);

        std::thread::scope(|s| {
            s.spawn(|| {
                start.wait();
                for i in 1..=ROUNDS {
                    let id = format!("db-{i}");
                    state.publish("db", [("id", id.as_str())].into_iter().collect());
                    state.publish(&format!("n{i}"), [("id", id.as_str())].into_iter().collect());
                }
            });

            for _ in 0..READERS {
                s.spawn(|| {
                    start.wait();
                    for _ in 0..ROUNDS {
                        let resolved = ctx.interpolate(&raw, None).unwrap();
                        assert_eq!(resolved.get("id"), Some("web-prod"));
                        let upstream = resolved.get("tags.Upstream").unwrap();
                        assert!(upstream.starts_with("db-"), "torn read: {upstream}");
                    }
                });
            }
        });

        let resolved = ctx.interpolate(&raw, None).unwrap();
        assert_eq!(resolved.get("tags.Upstream"), Some("db-200"));
        assert!(state.is_published("n200"));
    }

    #[test]
    fn test_interpolate_reads_shared_state() {
        let state = Arc::new(GraphState::default());
        state.publish("db", [("id", "db-1")].into_iter().collect());
        let ctx = BuiltinEvalContext::new(Arc::clone(&state));

        let raw = RawConfig::parse([("tags.Upstream", "${db.id}")]).unwrap();
        let resolved = ctx.interpolate(&raw, None).unwrap();
        assert_eq!(resolved.get("tags.Upstream"), Some("db-1"));

        let missing = RawConfig::parse([("tags.Cache", "${cache.id}")]).unwrap();
        assert!(matches!(
            ctx.interpolate(&missing, None),
            Err(Error::Interpolation(_))
        ));
    }
}
