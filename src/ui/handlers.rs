//! HTTP API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, StreamError};
use crate::streams::{stream_id_from_url, StreamStats};
use crate::ui::server::AppState;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn failure<T>(e: Error) -> ApiResult<T> {
    let status = match e {
        Error::Stream(StreamError::WorkerGone) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(ApiResponse::error(e.to_string())))
}

/// Worker status
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub stream_count: usize,
    pub uptime_seconds: u64,
}

/// Get worker status
pub async fn get_status(State(state): State<Arc<AppState>>) -> ApiResult<SystemStatus> {
    match state.worker.snapshot().await {
        Ok(streams) => (
            StatusCode::OK,
            Json(ApiResponse::ok(SystemStatus {
                stream_count: streams.len(),
                uptime_seconds: state.started_at.elapsed().as_secs(),
            })),
        ),
        Err(e) => failure(e),
    }
}

/// Get all streams
pub async fn get_streams(State(state): State<Arc<AppState>>) -> ApiResult<Vec<StreamStats>> {
    match state.worker.snapshot().await {
        Ok(streams) => (StatusCode::OK, Json(ApiResponse::ok(streams))),
        Err(e) => failure(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStreamRequest {
    /// Generated when absent
    pub subscriber_id: Option<String>,
    pub media_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedStream {
    pub stream_id: String,
    pub subscriber_id: String,
}

/// Start a stream. Its decoded audio goes to the subscriber's registered
/// channel, if any.
pub async fn create_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateStreamRequest>,
) -> ApiResult<CreatedStream> {
    let stream_id = match stream_id_from_url(&request.media_url) {
        Ok(id) => id,
        Err(e) => return failure(e.into()),
    };
    let subscriber_id = request
        .subscriber_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    match state
        .worker
        .init_stream(subscriber_id.clone(), request.media_url, None)
        .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::ok(CreatedStream {
                stream_id,
                subscriber_id,
            })),
        ),
        Err(e) => failure(e),
    }
}

/// Remove a stream by stream id or subscriber id
pub async fn delete_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let streams = match state.worker.snapshot().await {
        Ok(streams) => streams,
        Err(e) => return failure(e),
    };
    if !streams
        .iter()
        .any(|s| s.stream_id == id || s.subscriber_id == id)
    {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(StreamError::NotFound(id).to_string())),
        );
    }

    match state.worker.remove_stream(id).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(()))),
        Err(e) => failure(e),
    }
}

/// Reopen every stream socket
pub async fn reset(State(state): State<Arc<AppState>>) -> ApiResult<()> {
    match state.worker.reset().await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(()))),
        Err(e) => failure(e),
    }
}

/// Tear down every stream
pub async fn stop(State(state): State<Arc<AppState>>) -> ApiResult<()> {
    match state.worker.stop().await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(()))),
        Err(e) => failure(e),
    }
}
