//! HTTP server and its start/serve/shutdown lifecycle.
//!
//! [`Server::start`] binds, serves, and watches for termination signals. On
//! shutdown it stops accepting connections, marks responses `Connection: close`
//! and waits a bounded time for in-flight requests to finish.

mod error;
mod routes;

pub use error::{codes, ApiError, ServerError};
pub use routes::routes;

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::notes::NoteService;
use routes::Lifecycle;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

impl State {
    fn is_terminal(self) -> bool {
        matches!(self, State::Stopped | State::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Address to listen on, `host:port`.
    pub addr: String,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            addr: "localhost:3000".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Observe and stop a running [`Server`] from elsewhere.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<watch::Sender<State>>,
    local_addr: Arc<OnceLock<SocketAddr>>,
    shutdown: CancellationToken,
}

impl ServerHandle {
    fn new() -> Self {
        let (state, _) = watch::channel(State::Created);
        Self {
            state: Arc::new(state),
            local_addr: Arc::new(OnceLock::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Address actually bound, once the listener is up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Wait until the server is serving or has given up. Returns the state seen.
    pub async fn running(&self) -> State {
        let mut rx = self.state.subscribe();
        let seen = match rx
            .wait_for(|state| *state == State::Running || state.is_terminal())
            .await
        {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        seen
    }

    /// Begin graceful shutdown, as a termination signal would. Repeat calls are no-ops.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn set(&self, state: State) {
        self.state.send_replace(state);
    }
}

pub struct Server {
    notes: Arc<dyn NoteService>,
    options: ServerOptions,
    handle: ServerHandle,
}

impl Server {
    pub fn new(notes: Arc<dyn NoteService>, options: ServerOptions) -> Self {
        Self {
            notes,
            options,
            handle: ServerHandle::new(),
        }
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Serve until a listener failure or a completed shutdown.
    pub async fn start(self) -> Result<(), ServerError> {
        let handle = self.handle;
        handle.set(State::Starting);

        let (listener, addr) = match bind(&self.options.addr).await {
            Ok(bound) => bound,
            Err(err) => {
                error!(addr = %self.options.addr, error = %err, "failed to listen");
                handle.set(State::Failed);
                return Err(ServerError::Listen(err));
            }
        };
        let _ = handle.local_addr.set(addr);

        let tracker = TaskTracker::new();
        let token = handle.shutdown.clone();
        let app = routes::app(
            self.notes,
            Lifecycle {
                tracker: tracker.clone(),
                shutdown: token.clone(),
            },
            self.options.request_timeout,
        );

        let mut serve = tokio::spawn(
            axum::serve(listener, app)
                .with_graceful_shutdown(token.clone().cancelled_owned())
                .into_future(),
        );
        let signals = tokio::spawn(watch_signals(token.clone()));

        handle.set(State::Running);
        info!(%addr, "server listening");

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                handle.set(State::ShuttingDown);
                info!("server shutting down");
                let drained = drain(serve, tracker, self.options.shutdown_timeout).await;
                match drained {
                    Err(ServerError::Listen(_)) => handle.set(State::Failed),
                    _ => handle.set(State::Stopped),
                }
                drained
            }
            served = &mut serve => {
                match served {
                    Ok(Ok(())) => {
                        handle.set(State::Stopped);
                        Ok(())
                    }
                    Ok(Err(err)) => {
                        error!(error = %err, "listener failed");
                        handle.set(State::Failed);
                        Err(ServerError::Listen(err))
                    }
                    Err(err) => {
                        handle.set(State::Failed);
                        Err(ServerError::Task(err))
                    }
                }
            }
        };

        signals.abort();
        if result.is_ok() {
            info!("server stopped");
        }
        result
    }
}

async fn bind(addr: &str) -> io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}

/// Wait for the accept loop to finish and every tracked handler to return.
async fn drain(
    serve: JoinHandle<io::Result<()>>,
    tracker: TaskTracker,
    timeout: Duration,
) -> Result<(), ServerError> {
    tracker.close();
    let abort = serve.abort_handle();

    let finished = async {
        let served = serve.await;
        tracker.wait().await;
        served
    };

    match tokio::time::timeout(timeout, finished).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(err))) => Err(ServerError::Listen(err)),
        Ok(Err(err)) => Err(ServerError::Task(err)),
        Err(_) => {
            warn!(?timeout, "in-flight requests still running, aborting");
            abort.abort();
            Err(ServerError::ShutdownTimeout(timeout))
        }
    }
}

/// Cancel `token` on Ctrl-C, or SIGTERM on unix.
async fn watch_signals(token: CancellationToken) {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("received interrupt"),
        _ = terminate => info!("received terminate"),
        _ = token.cancelled() => return,
    }
    token.cancel();
}
