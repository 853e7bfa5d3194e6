// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::error::EngineError;
use crate::routes::AppState;
use crate::{allocator, approval, assignment, database, lifecycle, quota};

use axum::{
    extract::{FromRequestParts, Json, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use common::{
    Actor, ApproveLeadPayload, AssignTeamPayload, AssignmentCriteria, BulkTransitionPayload,
    Campaign, CreateCampaignPayload, CreateLeadPayload, CreateTaskPayload, DailyQuotaStatus, Lead,
    Role, StatusLogEntry, Task, TaskStatus, TransitionPayload, UpdateLeadPayload,
    UpdateQuotaPayload,
};
use serde::Deserialize;
use tracing::info;

// --- Actor resolution ---
// The upstream gateway authenticates the caller and forwards the
// resolved identity in these two headers; the engine itself never
// touches sessions.

const ACTOR_ID_HEADER: &str = "x-actor-id";
const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extracts the acting `{user_id, role}` from the gateway headers.
pub struct ActorHeader(pub Actor);

impl<S> FromRequestParts<S> for ActorHeader
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| {
                AppError::new(
                    StatusCode::UNAUTHORIZED,
                    "Missing or malformed x-actor-id header.",
                )
            })?;
        let role = parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<Role>().ok())
            .ok_or_else(|| {
                AppError::new(
                    StatusCode::UNAUTHORIZED,
                    "Missing or malformed x-actor-role header.",
                )
            })?;
        Ok(ActorHeader(Actor { user_id, role }))
    }
}

#[derive(Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

// --- Task handlers ---

/// Handler for listing tasks, optionally filtered by status.
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = database::list_tasks(&state.pool, query.status).await?;
    info!("Successfully retrieved {} tasks.", tasks.len());
    Ok(Json(tasks))
}

/// Handler for creating a new task.
pub async fn create_task(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let task = lifecycle::create_task(&state.pool, payload, actor).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Handler for moving one task through the status graph.
pub async fn transition_task(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(task_id): Path<i64>,
    Json(payload): Json<TransitionPayload>,
) -> Result<Json<Task>, AppError> {
    let task = lifecycle::transition(
        &state.pool,
        state.dispatcher.as_ref(),
        task_id,
        payload.status,
        actor,
        payload.comment.as_deref(),
    )
    .await?;
    Ok(Json(task))
}

/// Handler for the all-or-nothing multi-task status update.
pub async fn bulk_transition_tasks(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(payload): Json<BulkTransitionPayload>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = lifecycle::bulk_transition(
        &state.pool,
        state.dispatcher.as_ref(),
        &payload.task_ids,
        payload.status,
        actor,
        payload.comment.as_deref(),
    )
    .await?;
    Ok(Json(tasks))
}

/// Handler for the admin-only terminal approval.
pub async fn approve_task(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, AppError> {
    let task = approval::approve(
        &state.pool,
        state.dispatcher.as_ref(),
        task_id,
        actor,
        None,
    )
    .await?;
    state.audit.record(actor.user_id, "approve", "task", task_id);
    Ok(Json(task))
}

/// Handler for deleting a task (admin only; cascades audit rows).
pub async fn delete_task(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    lifecycle::delete_task(&state.pool, task_id, actor).await?;
    state.audit.record(actor.user_id, "delete", "task", task_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for reading a task's status audit trail.
pub async fn task_history(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<Vec<StatusLogEntry>>, AppError> {
    let entries = database::status_history(&state.pool, task_id).await?;
    Ok(Json(entries))
}

/// Handler for auto-assigning a task via the configured strategy.
pub async fn auto_assign_task(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(task_id): Path<i64>,
    Json(criteria): Json<AssignmentCriteria>,
) -> Result<Json<Task>, AppError> {
    let task =
        assignment::assign_task(&state.pool, state.strategy, task_id, &criteria, actor).await?;
    state
        .audit
        .record(actor.user_id, "auto_assign", "task", task_id);
    Ok(Json(task))
}

// --- Campaign handlers ---

/// Handler for creating a campaign.
pub async fn create_campaign(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(payload): Json<CreateCampaignPayload>,
) -> Result<(StatusCode, Json<Campaign>), AppError> {
    let campaign = quota::create_campaign(&state.pool, payload, actor).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// Handler for assigning a team to a campaign over a date range.
pub async fn assign_team(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(campaign_id): Path<i64>,
    Json(payload): Json<AssignTeamPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let created = quota::assign_team(&state.pool, campaign_id, payload, actor).await?;
    state
        .audit
        .record(actor.user_id, "assign_team", "campaign", campaign_id);
    Ok(Json(serde_json::json!({ "slots_created": created })))
}

/// Handler for the per-user quota progress of one campaign/date.
pub async fn quota_status(
    State(state): State<AppState>,
    Path(campaign_id): Path<i64>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<DailyQuotaStatus>>, AppError> {
    let status = quota::quota_status(&state.pool, campaign_id, query.date).await?;
    Ok(Json(status))
}

/// Handler for the admin quota override.
pub async fn update_quota(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(campaign_id): Path<i64>,
    Json(payload): Json<UpdateQuotaPayload>,
) -> Result<StatusCode, AppError> {
    quota::update_quota(&state.pool, campaign_id, payload, actor).await?;
    state
        .audit
        .record(actor.user_id, "update_quota", "campaign", campaign_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for topping up placeholder leads to quota.
pub async fn generate_leads(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(campaign_id): Path<i64>,
    Json(payload): Json<common::GenerateLeadsPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let created = allocator::generate_daily_leads(&state.pool, campaign_id, payload.quota_date).await?;
    info!(
        "User {} generated {} leads for campaign {}.",
        actor.user_id, created, campaign_id
    );
    Ok(Json(serde_json::json!({ "leads_created": created })))
}

/// Handler for listing a campaign's leads on one date.
pub async fn list_campaign_leads(
    State(state): State<AppState>,
    Path(campaign_id): Path<i64>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Lead>>, AppError> {
    database::find_campaign(&state.pool, campaign_id).await?;
    let leads = database::list_campaign_leads(&state.pool, campaign_id, query.date).await?;
    Ok(Json(leads))
}

// --- Lead handlers ---

/// Handler for a staff member creating a lead directly.
pub async fn create_lead(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(payload): Json<CreateLeadPayload>,
) -> Result<(StatusCode, Json<Lead>), AppError> {
    let lead = allocator::create_lead(&state.pool, payload, actor).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// Handler for updating a lead's contact and follow-up fields.
pub async fn update_lead(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(lead_id): Path<i64>,
    Json(payload): Json<UpdateLeadPayload>,
) -> Result<Json<Lead>, AppError> {
    let lead = allocator::update_lead(&state.pool, lead_id, payload, actor).await?;
    Ok(Json(lead))
}

/// Handler for the admin lead verdict.
pub async fn approve_lead(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(lead_id): Path<i64>,
    Json(payload): Json<ApproveLeadPayload>,
) -> Result<Json<Lead>, AppError> {
    let lead = allocator::approve_lead(&state.pool, lead_id, payload, actor).await?;
    state
        .audit
        .record(actor.user_id, "approve", "lead", lead_id);
    Ok(Json(lead))
}

/// Handler for auto-assigning a lead via the configured strategy.
pub async fn auto_assign_lead(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(lead_id): Path<i64>,
    Json(criteria): Json<AssignmentCriteria>,
) -> Result<Json<Lead>, AppError> {
    let lead =
        assignment::assign_lead(&state.pool, state.strategy, lead_id, &criteria, actor).await?;
    state
        .audit
        .record(actor.user_id, "auto_assign", "lead", lead_id);
    Ok(Json(lead))
}

// --- Custom Error Handling ---
// Transforms the engine's typed errors into appropriate HTTP responses;
// the engine itself carries no presentation concerns.

/// Our custom error type for the application.
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.code
    }
}

/// Maps each engine error kind to its transport status. Persistence
/// details are logged but never leaked to the client.
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let code = match &err {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidTransition { .. }
            | EngineError::InvalidState(_)
            | EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal server error: {:?}", err);
            Self {
                code,
                message: "An internal error occurred.".to_string(),
            }
        } else {
            Self {
                code,
                message: err.to_string(),
            }
        }
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
