use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::config::ServiceConfig;
use super::handler::Service;
use super::protocol::Response;

const LISTEN_BACKLOG: u32 = 1024;
const ACCEPT_RETRY_MIN: Duration = Duration::from_millis(50);
const ACCEPT_RETRY_MAX: Duration = Duration::from_secs(2);

/// HTTP front end of the credential service.
pub struct Server {
    listener: TcpListener,
    router: Router,
    config: ServiceConfig,
    cancel_token: CancellationToken,
}

async fn dispatch(State(service): State<Arc<Service>>, body: Bytes) -> Json<Response> {
    Json(service.handle_bytes(&body))
}

fn bind_socket(addr: SocketAddr) -> Result<TcpListener> {
    let sock = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    sock.set_reuseaddr(true)?;
    sock.bind(addr)?;

    let listener = sock.listen(LISTEN_BACKLOG)?;

    Ok(listener)
}

impl Server {
    pub fn bind(config: ServiceConfig, service: Arc<Service>) -> Result<Self> {
        config.validate()?;

        let addr = config.socket_addr();
        let listener = bind_socket(addr)
            .with_context(|| format!("failed to bind credential service to {addr}"))?;

        let router = Router::new()
            .route("/", post(dispatch))
            .with_state(service);

        Ok(Self {
            listener,
            router,
            config,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Cancelling the token stops the accept loop and closes connections
    /// once their in-flight request is answered.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Accepts connections until the shutdown token is cancelled, then waits
    /// for open connections to finish.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            addr = %self.local_addr()?,
            idle_timeout = ?self.config.idle_timeout(),
            "credential service listening"
        );

        let connections = TaskTracker::new();
        let mut retry_delay = ACCEPT_RETRY_MIN;

        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                () = self.cancel_token.cancelled() => break,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => {
                    retry_delay = ACCEPT_RETRY_MIN;
                    conn
                }
                Err(e) => {
                    // e.g. EMFILE; retrying at once would spin
                    tracing::warn!(error = %e, delay = ?retry_delay, "accept failed");
                    tokio::select! {
                        () = tokio::time::sleep(retry_delay) => {}
                        () = self.cancel_token.cancelled() => break,
                    }
                    retry_delay = next_retry_delay(retry_delay);
                    continue;
                }
            };

            tracing::debug!(%peer, "connection accepted");
            connections.spawn(serve_connection(
                stream,
                peer,
                self.router.clone(),
                self.config,
                self.cancel_token.clone(),
            ));
        }

        connections.close();
        tracing::info!(open = connections.len(), "credential service draining connections");
        connections.wait().await;

        tracing::info!("credential service stopped");
        Ok(())
    }
}

/// Doubles the accept back-off, capped at [`ACCEPT_RETRY_MAX`].
fn next_retry_delay(delay: Duration) -> Duration {
    (delay * 2).min(ACCEPT_RETRY_MAX)
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    config: ServiceConfig,
    cancel_token: CancellationToken,
) {
    let mut builder = http1::Builder::new();
    // closes keep-alive connections that sit idle waiting for the next request
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(config.idle_timeout());

    let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        () = cancel_token.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = res {
        tracing::debug!(%peer, error = %e, "connection closed with error");
    }
}
