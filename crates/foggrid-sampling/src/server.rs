//! Agent HTTP surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fog_core::{AgentErrorBody, AgentSampleRequest};
use serde::{Deserialize, Serialize};

use crate::agent::RegionAgent;
use crate::error::SampleError;

/// Response wrapper shared by agent handlers and the HTTP client.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AgentErrorBody>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(err: &SampleError) -> impl IntoResponse {
    let status = match err {
        SampleError::UnknownStrategy(_) => StatusCode::NOT_FOUND,
        SampleError::Invalid(_) => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(AgentErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }),
    )
}

/// Build the agent router.
pub fn agent_router(agent: Arc<RegionAgent>) -> Router {
    Router::new()
        .route("/samples/status", get(status))
        .route("/samples/{strategy}", post(sample))
        .with_state(agent)
}

/// POST /samples/{strategy}
async fn sample(
    State(agent): State<Arc<RegionAgent>>,
    Path(strategy): Path<String>,
    Json(request): Json<AgentSampleRequest>,
) -> impl IntoResponse {
    match agent.sample(&strategy, &request) {
        Ok(response) => ApiResponse::ok(response).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /samples/status
async fn status(State(agent): State<Arc<RegionAgent>>) -> impl IntoResponse {
    ApiResponse::ok(agent.status())
}
