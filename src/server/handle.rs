//! Lifecycle of one listener.

use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ServeError;

/// Listener state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// How a listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Drained before the deadline.
    Graceful,
    /// Aborted at the deadline.
    Forced,
    /// Had already exited.
    AlreadyStopped,
}

/// Owns a spawned listener task and its shutdown signal.
#[derive(Debug)]
pub struct ServerHandle {
    name: &'static str,
    local_addr: SocketAddr,
    state: watch::Sender<ServerState>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<Result<(), ServeError>>>,
}

impl ServerHandle {
    #[must_use]
    pub fn new(name: &'static str, local_addr: SocketAddr) -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        Self {
            name,
            local_addr,
            state,
            shutdown: CancellationToken::new(),
            task: None,
        }
    }

    /// Spawn the listener. `serve` receives the token that asks it to drain.
    pub fn start<F, Fut>(&mut self, serve: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), ServeError>> + Send + 'static,
    {
        if self.task.is_some() {
            return;
        }
        self.task = Some(tokio::spawn(serve(self.shutdown.clone())));
        self.advance(ServerState::Running);
        info!(name = self.name, address = %self.local_addr, "Listener running");
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    fn advance(&self, next: ServerState) {
        self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// Resolves when the listener exits on its own, which is always a failure.
    ///
    /// Never resolves for a handle that was not started. Cancel safe.
    pub async fn exited(&mut self) -> ServeError {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let joined = task.await;
        self.task = None;
        self.advance(ServerState::Stopped);

        match joined {
            Ok(Ok(())) => ServeError::Exited(self.name),
            Ok(Err(e)) => e,
            Err(e) => ServeError::Listener {
                name: self.name,
                message: e.to_string(),
            },
        }
    }

    /// Ask the listener to drain and wait until `deadline`, then abort it.
    pub async fn graceful_stop(&mut self, deadline: Instant) -> StopOutcome {
        self.advance(ServerState::Stopping);
        self.shutdown.cancel();

        let outcome = match self.task.take() {
            None => StopOutcome::AlreadyStopped,
            Some(mut task) => match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(Err(e))) => {
                    warn!(name = self.name, error = %e, "Listener failed while draining");
                    StopOutcome::Graceful
                }
                Ok(_) => StopOutcome::Graceful,
                Err(_) => {
                    task.abort();
                    let _ = task.await;
                    StopOutcome::Forced
                }
            },
        };

        self.advance(ServerState::Stopped);
        info!(name = self.name, outcome = ?outcome, "Listener stopped");
        outcome
    }
}
