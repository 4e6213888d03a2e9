//! Embedded HTTP server exposing a [`FlagClient`] to test drivers.
//!
//! The listener is bound and routes are served before the client finishes initializing, so health
//! checks answer while the client is still warming up.
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{net::TcpListener, runtime::Runtime, task::JoinHandle};

use crate::{CfClient, Error, FlagClient, Result, ServerConfig};

mod api;
mod response;
mod routes;
mod self_test;
mod simple;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{FlagCheckRequest, FlagCheckResponse, FlagKind, PongResponse, TargetRequest};
pub use response::{write_error, write_json, write_not_found, HandlerError};
pub use routes::{build_router, route_groups, AppState, RouteGroup};
pub use self_test::run_self_test;
pub use simple::{VersionResponse, SDK_VERSION};

/// Number of threads serving requests.
pub const WORKER_THREADS: usize = 10;

/// Constructs the client once the listener is up.
pub type ClientFactory =
    Box<dyn FnOnce(&ServerConfig) -> Result<Arc<dyn FlagClient>> + Send + 'static>;

/// Readiness of a running service.
pub trait Status {
    /// Whether the service is ready to serve requests.
    fn is_active(&self) -> bool;

    /// Negation of [`is_active()`](Status::is_active).
    fn is_not_active(&self) -> bool {
        !self.is_active()
    }
}

/// Lifecycle of a [`WrapperServer`]. A stopped server cannot be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not started.
    Created,
    /// Binding the listener and waiting for the client.
    Starting,
    /// Listener is up.
    Running,
    /// Stopped, or failed to bind.
    Stopped,
}

/// HTTP server wrapping a flag client.
///
/// `start()` and `stop()` block and must not be called from within an async runtime.
///
/// # Examples
/// ```no_run
/// # use ff_wrapper::{ServerConfig, Status, WrapperServer};
/// let mut server = WrapperServer::new(ServerConfig::new(4000, "sdk-key"));
/// if server.start().unwrap() {
///     assert!(server.is_active());
/// }
/// assert!(server.stop());
/// ```
pub struct WrapperServer {
    config: ServerConfig,
    state: AppState,
    client_factory: Option<ClientFactory>,
    lifecycle: LifecycleState,
    runtime: Option<Runtime>,
    server_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl WrapperServer {
    /// Create a server that evaluates flags with a [`CfClient`] built from `config`.
    pub fn new(config: ServerConfig) -> WrapperServer {
        WrapperServer::with_client_factory(
            config,
            Box::new(|config: &ServerConfig| -> Result<Arc<dyn FlagClient>> {
                let client = CfClient::new(config.api_key(), config.client().clone())?;
                Ok(Arc::new(client) as Arc<dyn FlagClient>)
            }),
        )
    }

    /// Create a server whose client is constructed by `factory`.
    pub fn with_client_factory(config: ServerConfig, factory: ClientFactory) -> WrapperServer {
        WrapperServer {
            config,
            state: AppState::new(),
            client_factory: Some(factory),
            lifecycle: LifecycleState::Created,
            runtime: None,
            server_task: None,
            local_addr: None,
        }
    }

    /// Bind the listener, start serving and construct the client, then wait for the client to
    /// become ready.
    ///
    /// Returns `Ok(true)` if the client became ready within the startup timeout and `Ok(false)`
    /// otherwise. The listener keeps serving in both cases.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if called more than once.
    /// - [`Error::Io`] if the listener cannot be bound.
    /// - Any error of the client factory. The listener keeps serving.
    pub fn start(&mut self) -> Result<bool> {
        if self.lifecycle != LifecycleState::Created {
            return Err(Error::AlreadyStarted);
        }
        self.lifecycle = LifecycleState::Starting;

        if let Err(err) = self.serve() {
            log::error!(target: "ff_wrapper", "failed to start server: {}", err);
            self.lifecycle = LifecycleState::Stopped;
            return Err(err);
        }
        self.lifecycle = LifecycleState::Running;

        let factory = self.client_factory.take().ok_or(Error::AlreadyStarted)?;
        let client = factory(&self.config)?;
        self.state.set_client(client.clone());

        let started = Instant::now();
        let ready = client.wait_for_initialization(self.config.startup_timeout);
        if ready {
            log::info!(target: "ff_wrapper",
                elapsed_ms = started.elapsed().as_millis() as u64;
                "client is ready");
        } else {
            log::warn!(target: "ff_wrapper",
                timeout_secs = self.config.startup_timeout.as_secs();
                "client did not become ready in time");
        }
        Ok(ready)
    }

    fn serve(&mut self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("ff-wrapper-worker")
            .enable_all()
            .build()?;

        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        let listener = runtime.block_on(TcpListener::bind(addr))?;
        let local_addr = listener.local_addr()?;

        let router = build_router(&route_groups(), self.state.clone());
        let server_task = runtime.spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                log::error!(target: "ff_wrapper", "server error: {}", err);
            }
        });

        log::info!(target: "ff_wrapper", "listening on {}", local_addr);
        self.runtime = Some(runtime);
        self.server_task = Some(server_task);
        self.local_addr = Some(local_addr);
        Ok(())
    }

    /// Stop accepting connections, destroy the client and shut down the runtime without waiting
    /// for in-flight requests.
    ///
    /// Returns [`is_not_active()`](Status::is_not_active).
    pub fn stop(&mut self) -> bool {
        if self.lifecycle == LifecycleState::Stopped {
            return self.is_not_active();
        }

        if let Some(server_task) = self.server_task.take() {
            server_task.abort();
        }
        if let Some(client) = self.state.client() {
            client.destroy();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::ZERO);
        }
        self.lifecycle = LifecycleState::Stopped;

        log::info!(target: "ff_wrapper", "server stopped");
        self.is_not_active()
    }

    /// Block until the process receives Ctrl-C. Returns immediately if the server is not running.
    pub fn wait_for_shutdown_signal(&self) -> Result<()> {
        if let Some(runtime) = &self.runtime {
            runtime.block_on(tokio::signal::ctrl_c())?;
            log::info!(target: "ff_wrapper", "received shutdown signal");
        }
        Ok(())
    }

    /// Address the listener is bound to. Useful when the configured port is `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Current lifecycle state.
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle
    }
}

impl Status for WrapperServer {
    fn is_active(&self) -> bool {
        self.state
            .client()
            .is_some_and(|client| client.is_initialized())
    }
}

impl Drop for WrapperServer {
    fn drop(&mut self) {
        if self.runtime.is_some() {
            self.stop();
        }
    }
}
