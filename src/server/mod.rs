//! Transport listeners: the gRPC server and the optional HTTP gateway.
//!
//! Startup binds and spawns the RPC listener first; the gateway dials it
//! only once it is running. Shutdown runs in reverse under one shared
//! deadline.

mod gateway;
mod handle;

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use blog_proto::v1::BlogServiceServer;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic_health::server::HealthReporter;
use tracing::{error, info};

use crate::services::BlogServer;

pub use gateway::{http_status, router, GatewayError, RpcClient};
pub use handle::{ServerHandle, ServerState, StopOutcome};

const RPC_LISTENER: &str = "grpc";
const GATEWAY_LISTENER: &str = "http";

/// Listener failures.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Failed to bind {name} listener on {addr}: {source}")]
    Bind {
        name: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Gateway failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("{name} listener failed: {message}")]
    Listener { name: &'static str, message: String },

    #[error("{0} listener exited unexpectedly")]
    Exited(&'static str),
}

/// Which listeners to run.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// gRPC listener only.
    Grpc,
    /// gRPC listener plus the HTTP/JSON gateway.
    GrpcGateway,
}

/// Listener addresses and timeouts.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub mode: ServerMode,
    pub grpc_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub shutdown_timeout: Duration,
    pub request_timeout: Duration,
}

/// How each listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub gateway: Option<StopOutcome>,
    pub rpc: StopOutcome,
}

/// Owns the running listeners.
pub struct TransportServer {
    rpc: ServerHandle,
    gateway: Option<ServerHandle>,
    health: HealthReporter,
    request_cancel: CancellationToken,
    shutdown_timeout: Duration,
}

impl TransportServer {
    /// Bind and spawn the listeners selected by `config.mode`.
    ///
    /// `request_cancel` is cancelled first on shutdown so in-flight work
    /// observes it before listeners drain.
    ///
    /// # Errors
    /// A bind failure on either listener, or the gateway failing to reach
    /// the RPC listener. The RPC listener is stopped before a gateway error
    /// is returned.
    pub async fn start(
        config: &TransportConfig,
        service: BlogServer,
        request_cancel: CancellationToken,
    ) -> Result<Self, ServeError> {
        let (listener, grpc_addr) = bind(RPC_LISTENER, config.grpc_addr).await?;

        let (mut health, health_service) = tonic_health::server::health_reporter();
        health
            .set_serving::<BlogServiceServer<BlogServer>>()
            .await;

        let mut rpc = ServerHandle::new(RPC_LISTENER, grpc_addr);
        rpc.start(move |shutdown| async move {
            tonic::transport::Server::builder()
                .add_service(health_service)
                .add_service(BlogServiceServer::new(service))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    shutdown.cancelled().await;
                })
                .await
                .map_err(|e| ServeError::Listener {
                    name: RPC_LISTENER,
                    message: e.to_string(),
                })
        });

        let gateway = match config.mode {
            ServerMode::Grpc => None,
            ServerMode::GrpcGateway => match start_gateway(config, grpc_addr).await {
                Ok(gateway) => Some(gateway),
                Err(e) => {
                    rpc.graceful_stop(Instant::now() + config.shutdown_timeout)
                        .await;
                    return Err(e);
                }
            },
        };

        info!(
            mode = ?config.mode,
            grpc = %grpc_addr,
            http = ?gateway.as_ref().map(ServerHandle::local_addr),
            "Transport server started"
        );

        Ok(Self {
            rpc,
            gateway,
            health,
            request_cancel,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    #[inline]
    #[must_use]
    pub const fn rpc(&self) -> &ServerHandle {
        &self.rpc
    }

    #[inline]
    #[must_use]
    pub const fn gateway(&self) -> Option<&ServerHandle> {
        self.gateway.as_ref()
    }

    /// Serve until `signal` resolves or a listener exits, then shut down.
    ///
    /// # Errors
    /// Returns the listener failure when one exits on its own; the other
    /// listener is still stopped first.
    pub async fn run_until<F>(mut self, signal: F) -> Result<ShutdownReport, ServeError>
    where
        F: Future<Output = ()>,
    {
        let failure = {
            let Self { rpc, gateway, .. } = &mut self;
            let gateway_exit = async move {
                match gateway {
                    Some(gateway) => gateway.exited().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = signal => None,
                e = rpc.exited() => Some(e),
                e = gateway_exit => Some(e),
            }
        };

        if let Some(e) = &failure {
            error!(error = %e, "Listener exited, shutting down");
        }
        let report = self.shutdown().await;

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Cancel in-flight requests, then stop the gateway and the RPC
    /// listener in that order, both bounded by the shutdown timeout.
    pub async fn shutdown(mut self) -> ShutdownReport {
        let deadline = Instant::now() + self.shutdown_timeout;
        info!(timeout_secs = self.shutdown_timeout.as_secs(), "Shutting down");

        self.request_cancel.cancel();
        self.health
            .set_not_serving::<BlogServiceServer<BlogServer>>()
            .await;

        let gateway = match self.gateway.as_mut() {
            Some(gateway) => Some(gateway.graceful_stop(deadline).await),
            None => None,
        };
        let rpc = self.rpc.graceful_stop(deadline).await;

        ShutdownReport { gateway, rpc }
    }
}

impl std::fmt::Debug for TransportServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportServer")
            .field("rpc", &self.rpc)
            .field("gateway", &self.gateway)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

async fn bind(name: &'static str, addr: SocketAddr) -> Result<(TcpListener, SocketAddr), ServeError> {
    let to_error = |source| ServeError::Bind { name, addr, source };
    let listener = TcpListener::bind(addr).await.map_err(to_error)?;
    let local_addr = listener.local_addr().map_err(to_error)?;
    Ok((listener, local_addr))
}

async fn start_gateway(
    config: &TransportConfig,
    grpc_addr: SocketAddr,
) -> Result<ServerHandle, ServeError> {
    let endpoint = format!("http://{}", dial_address(grpc_addr));
    let client = RpcClient::connect(endpoint.clone())
        .await
        .map_err(|source| ServeError::Connect { endpoint, source })?;

    let (listener, http_addr) = bind(GATEWAY_LISTENER, config.http_addr).await?;
    let app = router(client, config.request_timeout);

    let mut gateway = ServerHandle::new(GATEWAY_LISTENER, http_addr);
    gateway.start(move |shutdown| async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ServeError::Listener {
                name: GATEWAY_LISTENER,
                message: e.to_string(),
            })
    });
    Ok(gateway)
}

/// Address the gateway dials: a wildcard bind is reached over loopback.
fn dial_address(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port()),
        _ => addr,
    }
}
