//! TCP accept loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use httplog_middleware::AccessLogConfig;
//! use httplog_server::{shutdown_signal, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = AccessLogConfig::builder().service("api").build()?.wrap(app());
//!     Server::bind("0.0.0.0:8080")
//!         .await?
//!         .serve_with_shutdown(handler, shutdown_signal())
//!         .await?;
//!     Ok(())
//! }
//! ```

use crate::error::{ServerError, ServerResult};
use crate::service::HandlerService;
use httplog_middleware::{ConnectionInfo, Handler};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

/// An HTTP/1.1 server hosting one handler.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds a listener to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind<A: ToSocketAddrs + std::fmt::Display>(addr: A) -> ServerResult<Self> {
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the process ends.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; accept failures are logged.
    pub async fn serve<H: Handler>(self, handler: H) -> ServerResult<()> {
        self.serve_with_shutdown(handler, std::future::pending()).await
    }

    /// Serves until `shutdown` completes.
    ///
    /// Connections already accepted keep running until they close.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; accept failures are logged.
    pub async fn serve_with_shutdown<H, F>(self, handler: H, shutdown: F) -> ServerResult<()>
    where
        H: Handler,
        F: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        tracing::info!("Server listening on {}", self.local_addr);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let handler = Arc::clone(&handler);
                            tokio::spawn(serve_connection(stream, remote_addr, handler));
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                () = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn serve_connection<H: Handler>(stream: TcpStream, remote_addr: SocketAddr, handler: Arc<H>) {
    let connection = ConnectionInfo {
        remote_addr: Some(remote_addr),
        local_addr: stream.local_addr().ok(),
    };
    let service = HandlerService::new(handler, connection);

    let result = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await;
    if let Err(e) = result {
        tracing::debug!("Connection error from {}: {}", remote_addr, e);
    }
}

/// Completes on SIGTERM or SIGINT (Ctrl+C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            tracing::warn!("Failed to register signal handlers, waiting forever");
            return std::future::pending().await;
        };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating shutdown"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, initiating shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to wait for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown");
    }
}
