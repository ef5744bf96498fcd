//! Authorization engines.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    check_query, AuthorizationEngine, AuthzError, Decision, PolicyError, PolicySet,
    PolicySnapshot, PolicySource,
};

/// Engine over a policy fixed at startup.
#[derive(Debug, Clone)]
pub struct StaticEngine {
    snapshot: Arc<PolicySnapshot>,
}

impl StaticEngine {
    /// # Errors
    /// Returns `PolicyError::InvalidPattern` if the policy does not compile.
    pub fn new(set: PolicySet) -> Result<Self, PolicyError> {
        Ok(Self {
            snapshot: Arc::new(PolicySnapshot::compile(set)?),
        })
    }

    /// Load once from `source`.
    ///
    /// # Errors
    /// Propagates source and compile failures.
    pub async fn load<S: PolicySource>(source: &S) -> Result<Self, PolicyError> {
        Self::new(source.load().await?)
    }
}

impl AuthorizationEngine for StaticEngine {
    fn authorize(&self, subject: &str, object: &str, action: &str) -> Result<Decision, AuthzError> {
        check_query(subject, object)?;
        Ok(self.snapshot.evaluate(subject, object, action))
    }
}

/// Engine that periodically replaces its snapshot from a [`PolicySource`].
///
/// Each decision evaluates against exactly one snapshot: readers load the
/// current `Arc` once and a reload publishes a new one atomically. A failed
/// reload keeps the previous snapshot.
pub struct ReloadingEngine<S> {
    current: ArcSwap<PolicySnapshot>,
    source: S,
}

impl<S: PolicySource> ReloadingEngine<S> {
    /// Perform the initial load.
    ///
    /// # Errors
    /// Startup fails if the first load or compile fails.
    pub async fn load(source: S) -> Result<Self, PolicyError> {
        let snapshot = PolicySnapshot::compile(source.load().await?)?;
        info!(rules = snapshot.rule_count(), "Policy loaded");
        Ok(Self {
            current: ArcSwap::from(Arc::new(snapshot)),
            source,
        })
    }

    /// Load and compile the policy, then publish it.
    ///
    /// # Errors
    /// On failure the current snapshot is left untouched.
    pub async fn reload(&self) -> Result<(), PolicyError> {
        let snapshot = PolicySnapshot::compile(self.source.load().await?)?;
        debug!(rules = snapshot.rule_count(), "Policy reloaded");
        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// The snapshot currently used for decisions.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Reload every `period` until `cancel` fires.
    pub fn spawn_reloader(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial load already ran.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Policy reloader stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.reload().await {
                            warn!(error = %e, "Policy reload failed, keeping previous snapshot");
                        }
                    }
                }
            }
        })
    }
}

impl<S: PolicySource> AuthorizationEngine for ReloadingEngine<S> {
    fn authorize(&self, subject: &str, object: &str, action: &str) -> Result<Decision, AuthzError> {
        check_query(subject, object)?;
        let snapshot = self.current.load();
        Ok(snapshot.evaluate(subject, object, action))
    }
}

impl<S> std::fmt::Debug for ReloadingEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadingEngine")
            .field("rules", &self.current.load().rule_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use blog_store::{PolicyRepository, PolicyRow};

    use super::*;
    use crate::authz::{Effect, StorePolicySource};

    const GET_USER: &str = "/blog.v1.BlogService/GetUser";

    /// Serves `set` until `fail` is raised.
    struct FlakySource {
        set: PolicySet,
        fail: AtomicBool,
    }

    impl PolicySource for FlakySource {
        async fn load(&self) -> Result<PolicySet, PolicyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PolicyError::Source("backend down".to_string()));
            }
            Ok(self.set.clone())
        }
    }

    fn admin_policy() -> PolicySet {
        PolicySet::default()
            .rule("role::admin", "*", "*", Effect::Allow)
            .binding("user-000000", "role::admin")
    }

    #[test]
    fn static_engine_rejects_empty_queries() {
        let engine = StaticEngine::new(admin_policy()).unwrap();
        assert_eq!(engine.authorize("", GET_USER, "CALL"), Err(AuthzError::EmptySubject));
        assert_eq!(engine.authorize("user-000000", "", "CALL"), Err(AuthzError::EmptyObject));
        assert!(engine.authorize("user-000000", GET_USER, "CALL").unwrap().allowed);
    }

    #[tokio::test]
    async fn initial_load_failure_is_an_error() {
        let source = FlakySource {
            set: admin_policy(),
            fail: AtomicBool::new(true),
        };
        assert!(ReloadingEngine::load(source).await.is_err());
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let engine = ReloadingEngine::load(FlakySource {
            set: admin_policy(),
            fail: AtomicBool::new(false),
        })
        .await
        .unwrap();
        let before = engine.snapshot();

        engine.source.fail.store(true, Ordering::SeqCst);
        assert!(engine.reload().await.is_err());

        assert!(Arc::ptr_eq(&before, &engine.snapshot()));
        assert!(engine.authorize("user-000000", GET_USER, "CALL").unwrap().allowed);
    }

    #[tokio::test]
    async fn reload_publishes_store_changes() {
        let repo = PolicyRepository::new();
        let engine = ReloadingEngine::load(StorePolicySource::new(repo.clone()))
            .await
            .unwrap();
        assert!(!engine.authorize("user-a", GET_USER, "CALL").unwrap().allowed);

        repo.add_rows([
            PolicyRow::rule("role::user", "/blog.v1.BlogService/*", "CALL", "allow"),
            PolicyRow::binding("user-a", "role::user"),
        ])
        .await
        .unwrap();
        assert!(!engine.authorize("user-a", GET_USER, "CALL").unwrap().allowed);

        engine.reload().await.unwrap();
        assert!(engine.authorize("user-a", GET_USER, "CALL").unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn reloader_runs_until_cancelled() {
        let repo = PolicyRepository::new();
        let engine = Arc::new(
            ReloadingEngine::load(StorePolicySource::new(repo.clone()))
                .await
                .unwrap(),
        );
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&engine).spawn_reloader(Duration::from_secs(5), cancel.clone());

        repo.add_rows([PolicyRow::rule("user-a", GET_USER, "CALL", "allow")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(engine.authorize("user-a", GET_USER, "CALL").unwrap().allowed);

        cancel.cancel();
        handle.await.unwrap();
    }
}
