//! HTTP command surface

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::config::UiConfig;
use crate::error::Result;
use crate::ui::handlers;
use crate::worker::WorkerHandle;

/// Shared handler state
pub struct AppState {
    pub worker: WorkerHandle,
    pub started_at: Instant,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/streams", get(handlers::get_streams).post(handlers::create_stream))
        .route("/api/streams/:id", delete(handlers::delete_stream))
        .route("/api/reset", post(handlers::reset))
        .route("/api/stop", post(handlers::stop))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, worker: WorkerHandle) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                worker,
                started_at: Instant::now(),
            }),
        }
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("HTTP API listening on http://{}", addr);
        axum::serve(listener, router(self.state)).await?;
        Ok(())
    }

    pub fn start_background(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("HTTP API failed: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::testing::{RecordingConnector, ScriptedCodecFactory};
    use crate::worker::Worker;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let (worker, handle, _events) = Worker::new(
            &AppConfig::default(),
            Arc::new(RecordingConnector::default()),
            Arc::new(ScriptedCodecFactory::default()),
        );
        worker.spawn();
        router(Arc::new(AppState {
            worker: handle,
            started_at: Instant::now(),
        }))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_stream_lifecycle_over_http() {
        let app = app();

        let (status, body) = call(
            &app,
            "POST",
            "/api/streams",
            Some(serde_json::json!({
                "subscriberId": "sub-1",
                "mediaUrl": "wss://host/stream-gate/meeting/ws/room/stream-9"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["data"]["streamId"], "stream-9");

        let (status, body) = call(&app, "GET", "/api/streams", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["subscriberId"], "sub-1");

        let (_, body) = call(&app, "GET", "/api/status", None).await;
        assert_eq!(body["data"]["streamCount"], 1);

        let (status, _) = call(&app, "DELETE", "/api/streams/sub-1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, "DELETE", "/api/streams/sub-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_invalid_media_url_rejected() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/streams",
            Some(serde_json::json!({ "mediaUrl": "nonsense" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid media URL"));
    }

    #[tokio::test]
    async fn test_generated_subscriber_and_stop() {
        let app = app();
        let (_, body) = call(
            &app,
            "POST",
            "/api/streams",
            Some(serde_json::json!({ "mediaUrl": "ws://host/ws/room/stream-3" })),
        )
        .await;
        let subscriber = body["data"]["subscriberId"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(subscriber).is_ok());

        let (status, _) = call(&app, "POST", "/api/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, "GET", "/api/streams", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }
}
