// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::assignment::AssignmentStrategy;
use crate::handlers;
use crate::notify::{AuditLogger, LogAuditLogger, LogDispatcher, NotificationDispatcher};

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Everything the handlers need, injected per request scope.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub audit: Arc<dyn AuditLogger>,
    pub strategy: AssignmentStrategy,
}

impl AppState {
    /// State with the default log-backed collaborators.
    pub fn new(pool: SqlitePool, strategy: AssignmentStrategy) -> Self {
        Self {
            pool,
            dispatcher: Arc::new(LogDispatcher),
            audit: Arc::new(LogAuditLogger),
            strategy,
        }
    }
}

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Task lifecycle
        .route("/api/tasks", get(handlers::list_tasks))
        .route("/api/tasks", post(handlers::create_task))
        .route("/api/tasks/bulk-status", patch(handlers::bulk_transition_tasks))
        .route("/api/tasks/{id}", delete(handlers::delete_task))
        .route("/api/tasks/{id}/status", patch(handlers::transition_task))
        .route("/api/tasks/{id}/approve", post(handlers::approve_task))
        .route("/api/tasks/{id}/history", get(handlers::task_history))
        .route("/api/tasks/{id}/assign", post(handlers::auto_assign_task))
        // Campaigns and quota scheduling
        .route("/api/campaigns", post(handlers::create_campaign))
        .route("/api/campaigns/{id}/team", post(handlers::assign_team))
        .route("/api/campaigns/{id}/quotas", get(handlers::quota_status))
        .route("/api/campaigns/{id}/quotas", patch(handlers::update_quota))
        .route("/api/campaigns/{id}/leads", get(handlers::list_campaign_leads))
        .route(
            "/api/campaigns/{id}/leads/generate",
            post(handlers::generate_leads),
        )
        // Leads
        .route("/api/leads", post(handlers::create_lead))
        .route("/api/leads/{id}", patch(handlers::update_lead))
        .route("/api/leads/{id}/approve", post(handlers::approve_lead))
        .route("/api/leads/{id}/assign", post(handlers::auto_assign_lead))
        // Adds the shared state to the application
        .with_state(state)
}
