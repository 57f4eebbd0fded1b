//! Scheduler submission API.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/workloads` | Validate and queue a workload |
//! | GET | `/api/v1/scheduler/stats` | Queue depth and outcome counters |

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fog_core::WorkloadSubmission;
use foggrid_scheduler::{Scheduler, SchedulerError};
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
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

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

#[derive(Serialize)]
struct Accepted {
    id: String,
}

pub fn scheduler_router(scheduler: Arc<Scheduler>) -> Router {
    let api = Router::new()
        .route("/workloads", post(submit_workload))
        .route("/scheduler/stats", get(scheduler_stats))
        .with_state(scheduler);
    Router::new().nest("/api/v1", api)
}

/// POST /api/v1/workloads
async fn submit_workload(
    State(scheduler): State<Arc<Scheduler>>,
    Json(submission): Json<WorkloadSubmission>,
) -> impl IntoResponse {
    match scheduler.submit(submission) {
        Ok(id) => (StatusCode::ACCEPTED, ApiResponse::ok(Accepted { id })).into_response(),
        Err(e @ SchedulerError::Validation(_)) => {
            debug!(error = %e, "submission rejected");
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
        Err(e @ (SchedulerError::QueueFull(_) | SchedulerError::QueueClosed)) => {
            error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/scheduler/stats
async fn scheduler_stats(State(scheduler): State<Arc<Scheduler>>) -> impl IntoResponse {
    ApiResponse::ok(scheduler.stats())
}
