//! Application wiring: store, policy, pipeline, business layer, listeners.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use blog_core::JwtValidator;
use blog_proto::v1::DEFAULT_NICKNAME;
use blog_store::{CreateUserParams, PolicyRow, Store};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregate::ListAggregator;
use crate::authz::{
    load_policy_file, AuthorizationEngine, ReloadingEngine, StaticEngine, StorePolicySource,
};
use crate::biz::{password, Biz, ROLE_ADMIN, ROLE_USER, ROOT_USERNAME, ROOT_USER_ID};
use crate::config::{AppSettings, PolicyConfig};
use crate::middleware::{Authenticator, Authorizer, InterceptorChain, Whitelist};
use crate::server::{ServeError, ShutdownReport, TransportServer};
use crate::services::BlogServer;
use crate::validation::Validator;

/// Policy seeded when no policy file is configured.
///
/// Admins may call anything; users may call every method except
/// `DeleteUser`, and ownership checks in the business layer scope the rest.
#[must_use]
pub fn default_policy() -> Vec<PolicyRow> {
    vec![
        PolicyRow::rule(ROLE_ADMIN, "*", "*", "allow"),
        PolicyRow::rule(ROLE_USER, "/blog.v1.BlogService/*", "CALL", "allow"),
        PolicyRow::rule(ROLE_USER, "/blog.v1.BlogService/DeleteUser", "CALL", "deny"),
        PolicyRow::binding(ROOT_USER_ID, ROLE_ADMIN),
    ]
}

/// A running application.
#[derive(Debug)]
pub struct Application {
    server: TransportServer,
    background: CancellationToken,
    reloader: Option<JoinHandle<()>>,
}

impl Application {
    /// Wire every component and start the listeners.
    ///
    /// # Errors
    /// Policy file or compile errors, root account seeding errors and
    /// listener bind failures.
    pub async fn build(settings: &AppSettings) -> anyhow::Result<Self> {
        let store = Store::new();
        seed_policy(&store, settings.policy.file.as_deref()).await?;
        if let Some(password) = &settings.root_password {
            seed_root(&store, password).await?;
        }

        let background = CancellationToken::new();
        let (engine, reloader) = build_engine(&store, &settings.policy, &background).await?;

        let tokens = JwtValidator::new(
            &settings.token.secret,
            &settings.token.identity_key,
            settings.token.expiration,
        );

        // Parent of every request's cancellation token.
        let request_cancel = CancellationToken::new();
        let chain = InterceptorChain::new(
            Whitelist::new(settings.whitelist_methods.iter().cloned()),
            Authenticator::new(tokens.clone()),
            Authorizer::new(engine),
            Validator::new(),
            request_cancel.clone(),
        );
        let biz = Biz::new(store, tokens, ListAggregator::new(settings.max_fan_out));
        let service = BlogServer::new(Arc::new(chain), Arc::new(biz));

        let server = match TransportServer::start(&settings.transport, service, request_cancel).await {
            Ok(server) => server,
            Err(e) => {
                background.cancel();
                return Err(e.into());
            }
        };

        Ok(Self {
            server,
            background,
            reloader,
        })
    }

    #[inline]
    #[must_use]
    pub const fn server(&self) -> &TransportServer {
        &self.server
    }

    /// Serve until `signal` resolves or a listener fails, then shut down
    /// the listeners and background tasks.
    ///
    /// # Errors
    /// The listener failure that ended the run.
    pub async fn run_until<F>(self, signal: F) -> Result<ShutdownReport, ServeError>
    where
        F: Future<Output = ()>,
    {
        let result = self.server.run_until(signal).await;

        self.background.cancel();
        if let Some(reloader) = self.reloader {
            let _ = reloader.await;
        }
        result
    }
}

async fn seed_policy(store: &Store, file: Option<&Path>) -> anyhow::Result<()> {
    let rows = match file {
        Some(path) => load_policy_file(path)
            .await
            .with_context(|| format!("Failed to load policy file {}", path.display()))?,
        None => default_policy(),
    };
    let added = store.policies.add_rows(rows).await?;
    info!(rows = added, file = ?file, "Policy seeded");
    Ok(())
}

async fn seed_root(store: &Store, root_password: &SecretString) -> anyhow::Result<()> {
    let password_hash = password::hash(root_password.expose_secret())?;
    store
        .users
        .insert_user(
            ROOT_USER_ID,
            CreateUserParams {
                username: ROOT_USERNAME,
                password_hash: &password_hash,
                nickname: DEFAULT_NICKNAME,
                email: "",
                phone: "",
            },
        )
        .await?;
    info!(user_id = ROOT_USER_ID, "Root account created");
    Ok(())
}

async fn build_engine(
    store: &Store,
    policy: &PolicyConfig,
    background: &CancellationToken,
) -> anyhow::Result<(Arc<dyn AuthorizationEngine>, Option<JoinHandle<()>>)> {
    let source = StorePolicySource::new(store.policies.clone());

    match policy.reload_interval {
        None => {
            let engine = StaticEngine::load(&source)
                .await
                .context("Failed to compile policy")?;
            info!("Static authorization engine");
            let engine: Arc<dyn AuthorizationEngine> = Arc::new(engine);
            Ok((engine, None))
        }
        Some(period) => {
            let engine = Arc::new(
                ReloadingEngine::load(source)
                    .await
                    .context("Failed to compile policy")?,
            );
            let reloader = Arc::clone(&engine).spawn_reloader(period, background.child_token());
            info!(period_ms = period.as_millis() as u64, "Reloading authorization engine");
            let engine: Arc<dyn AuthorizationEngine> = engine;
            Ok((engine, Some(reloader)))
        }
    }
}
