//! HTTP health route for uptime monitors.
//!
//! Serves `GET /` (and `HEAD /`) with a fixed JSON string so hosting
//! platforms and ping services can tell the process is alive.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Errors from the health server.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("Failed to bind health server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Shared state for the health route.
#[derive(Debug, Clone)]
struct HealthState {
    message: Arc<str>,
}

/// `GET /`: returns the configured message as a JSON string.
async fn root(State(state): State<HealthState>) -> Json<String> {
    Json(state.message.to_string())
}

/// Builds the router with the health route.
pub fn router(message: &str) -> Router {
    Router::new().route("/", get(root)).with_state(HealthState {
        message: Arc::from(message),
    })
}

/// Binds the health server's listener.
///
/// # Errors
///
/// Returns [`WebError::Bind`] if the address is unavailable.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, WebError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| WebError::Bind { addr, source })
}

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve(listener: TcpListener, app: Router, shutdown: impl Future<Output = ()> + Send + 'static) {
    match listener.local_addr() {
        Ok(addr) => info!("Health server listening on {addr}"),
        Err(e) => error!("Health server has no local address: {e}"),
    }

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        error!("Health server error: {e}");
    }
}

/// Running health server task.
#[derive(Debug)]
pub struct WebServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WebServer {
    /// Binds and spawns the health server.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Bind`] if the address is unavailable.
    pub async fn start(addr: SocketAddr, message: &str) -> Result<Self, WebError> {
        let listener = bind(addr).await?;
        let addr = listener
            .local_addr()
            .map_err(|source| WebError::Bind { addr, source })?;

        let (shutdown, rx) = oneshot::channel::<()>();
        let app = router(message);
        let task = tokio::spawn(serve(listener, app, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            addr,
            shutdown,
            task,
        })
    }

    /// Address the server is actually bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and waits for the server task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!("Health server task failed: {e}");
        }
        info!("Health server stopped");
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_root_returns_json_string() {
        let app = router("Bot is alive");
        let req = Request::get("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"],
            "application/json"
        );

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!("Bot is alive"));
    }

    #[tokio::test]
    async fn test_head_is_allowed() {
        let app = router("ok");
        let req = Request::head("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = router("ok");
        let req = Request::get("/nope").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_is_rejected() {
        let app = router("ok");
        let req = Request::post("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_server_start_and_stop() {
        let server = WebServer::start("127.0.0.1:0".parse().unwrap(), "up").await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        server.stop().await;
    }
}
