// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use common::TaskStatus;
use tracing::info;

/// Emitted after a status transition has committed.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub task_id: i64,
    pub previous_status: TaskStatus,
    pub status: TaskStatus,
    pub actor_id: i64,
}

/// Best-effort notification delivery.
///
/// Called strictly after the owning transaction has committed, and never
/// allowed to fail or block it; the production impl just logs, since push
/// delivery is handled by an external collaborator.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, user_id: i64, event: &LifecycleEvent);
}

/// Records activity that is not part of the status audit trail
/// (team assignments, quota overrides, lead approvals).
pub trait AuditLogger: Send + Sync {
    fn record(&self, actor_id: i64, action: &str, entity: &str, entity_id: i64);
}

/// Default dispatcher: surfaces notifications on the log stream.
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn notify(&self, user_id: i64, event: &LifecycleEvent) {
        info!(
            "Notify user {}: task {} moved {} -> {} (by user {})",
            user_id, event.task_id, event.previous_status, event.status, event.actor_id
        );
    }
}

/// Default activity logger, also backed by the log stream.
pub struct LogAuditLogger;

impl AuditLogger for LogAuditLogger {
    fn record(&self, actor_id: i64, action: &str, entity: &str, entity_id: i64) {
        info!(
            "Activity: user {} performed '{}' on {} {}",
            actor_id, action, entity, entity_id
        );
    }
}
