//! Task handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use faucet_core::UserId;

use crate::engine::TaskStatus;
use crate::error::ApiError;
use crate::handlers::{authorize, parse_user_id, ApiJson};
use crate::state::AppState;

/// Query parameters for `GET /get-tasks`.
#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    /// User whose completions to report.
    pub user_id: Option<String>,
}

/// Body for `POST /get-tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct TasksRequest {
    /// User whose completions to report.
    pub user_id: Option<Value>,
}

/// Task list response.
#[derive(Debug, Serialize)]
pub struct TasksResponse {
    /// Always `success`.
    pub status: &'static str,
    /// The catalog.
    pub tasks: Vec<TaskStatus>,
}

/// List tasks (query string form).
pub async fn list_tasks_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TasksQuery>,
) -> Result<Json<TasksResponse>, ApiError> {
    let user_id = query
        .user_id
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_user_id(Some(&Value::String(s))))
        .transpose()?;
    list_tasks(&state, user_id.as_ref()).await
}

/// List tasks (JSON body form).
pub async fn list_tasks_body(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<TasksRequest>,
) -> Result<Json<TasksResponse>, ApiError> {
    let user_id = match body.user_id {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_user_id(Some(&value))?),
    };
    list_tasks(&state, user_id.as_ref()).await
}

async fn list_tasks(
    state: &AppState,
    user_id: Option<&UserId>,
) -> Result<Json<TasksResponse>, ApiError> {
    let tasks = state.engine.list_tasks(user_id).await?;
    Ok(Json(TasksResponse {
        status: "success",
        tasks,
    }))
}

/// Task completion request.
#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    /// User ID (string or number).
    pub user_id: Option<Value>,
    /// Task name from the catalog.
    pub task_name: Option<String>,
    /// Telegram WebApp init data.
    #[serde(default, rename = "initData")]
    pub init_data: Option<String>,
}

/// Task completion response.
#[derive(Debug, Serialize)]
pub struct CompleteTaskResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Completed task.
    pub task_name: String,
    /// Points credited.
    pub points_earned: i64,
    /// Balance after the reward.
    pub new_balance: i64,
}

/// Complete a task and collect its reward.
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CompleteTaskRequest>,
) -> Result<Json<CompleteTaskResponse>, ApiError> {
    let user_id = parse_user_id(body.user_id.as_ref())?;
    let task_name = body
        .task_name
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("task_name required".into()))?;
    authorize(&state, &user_id, body.init_data.as_deref())?;

    let done = state
        .engine
        .complete_task(&user_id, &task_name, Utc::now())
        .await?;

    Ok(Json(CompleteTaskResponse {
        status: "success",
        task_name: done.task_name,
        points_earned: done.reward,
        new_balance: done.new_balance,
    }))
}
