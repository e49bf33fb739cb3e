//! Server setup and lifecycle management
//!
//! Startup order is fixed: check the database, build the router, bind, register
//! the ticket job, then start the background tasks after a grace delay. Only a
//! missing port stops the sequence before it begins.

use crate::adapters::Adapters;
use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::gateway::Gateway;
use crate::scheduler::Scheduler;
use crate::storage::Persistence;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Predix daemon server
pub struct Server {
    config: DaemonConfig,
    addr: SocketAddr,
    persistence: Arc<dyn Persistence>,
    gateway: Arc<Gateway>,
    adapters: Adapters,
    scheduler: Arc<Scheduler>,
    api: Option<Router>,
}

impl Server {
    /// Create a new server. Fails without a configured port.
    pub fn new(
        config: DaemonConfig,
        persistence: Arc<dyn Persistence>,
        gateway: Arc<Gateway>,
        adapters: Adapters,
    ) -> DaemonResult<Self> {
        let addr = config.listen_addr()?;
        let scheduler = Scheduler::new(config.scheduler(), &adapters);

        Ok(Self {
            config,
            addr,
            persistence,
            gateway,
            adapters,
            scheduler,
            api: None,
        })
    }

    /// Mount an external REST router under `/api`
    pub fn with_api(mut self, api: Router) -> Self {
        self.api = Some(api);
        self
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    /// Run the startup sequence and return once the listener is bound
    pub async fn start(self) -> DaemonResult<RunningServer> {
        let backend = self.persistence.backend();
        match self.persistence.ping().await {
            Ok(()) => tracing::info!(backend, "Database connected"),
            Err(e) => {
                tracing::warn!(backend, error = %e, "Database not reachable, continuing startup")
            }
        }

        let state = AppState::new(
            self.persistence.clone(),
            self.scheduler.clone(),
            self.gateway.clone(),
        );
        let app = create_router(state, &self.config.cors_origins, self.api);

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Predix daemon listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tickets = match self.adapters.tickets.register(shutdown_rx.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Failed to register ticket job");
                None
            }
        };

        let grace = self.config.startup_grace();
        let scheduler = self.scheduler.clone();
        let scheduler_shutdown = shutdown_rx.clone();
        let grace_shutdown = shutdown_rx.clone();
        let background = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {
                    scheduler.start(scheduler_shutdown).await;
                }
                _ = stopped(grace_shutdown) => {
                    tracing::info!("Shutdown requested before background tasks started");
                }
            }
        });

        let serve = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stopped(shutdown_rx))
                .await
        });

        Ok(RunningServer {
            local_addr,
            handle: ShutdownHandle {
                tx: Arc::new(shutdown_tx),
                gateway: self.gateway,
            },
            serve,
            background,
            tickets,
        })
    }

    /// Start, then serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        let running = self.start().await?;

        let handle = running.shutdown_handle();
        tokio::spawn(async move {
            shutdown_signal().await;
            handle.shutdown();
        });

        running.wait().await
    }
}

/// Cloneable trigger for a graceful shutdown
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    gateway: Arc<Gateway>,
}

impl ShutdownHandle {
    /// Stop the listener, the scheduler, the ticket job and every live socket
    pub fn shutdown(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("Predix daemon shutting down");
        }
        self.gateway.close_all();
    }
}

/// A bound, serving daemon
pub struct RunningServer {
    local_addr: SocketAddr,
    handle: ShutdownHandle,
    serve: JoinHandle<std::io::Result<()>>,
    background: JoinHandle<()>,
    tickets: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.handle.clone()
    }

    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Wait for the listener to stop, then for the background tasks and the
    /// ticket job to drain
    pub async fn wait(self) -> DaemonResult<()> {
        let served = self
            .serve
            .await
            .map_err(|e| DaemonError::Server(e.to_string()));

        // The listener may also stop on its own; background work follows it
        self.handle.shutdown();

        if let Err(e) = self.background.await {
            tracing::error!(error = %e, "Background tasks terminated abnormally");
        }
        if let Some(tickets) = self.tickets {
            if let Err(e) = tickets.await {
                tracing::error!(error = %e, "Ticket job terminated abnormally");
            }
        }

        served?.map_err(|e| DaemonError::Server(e.to_string()))?;
        tracing::info!("Predix daemon stopped");
        Ok(())
    }
}

/// Resolves once the shutdown flag is raised or its sender is gone
async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
