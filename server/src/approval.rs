// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle;
use crate::notify::NotificationDispatcher;

use common::{Actor, Task, TaskStatus};
use tracing::info;

/// Comment written to the audit trail when the approver supplies none.
const APPROVAL_COMMENT: &str = "Approved by admin";

/// The admin-only terminal transition confirming completed work.
///
/// Valid only for a task currently in `Done`; delegates the actual state
/// change (and the audit row, and setting `approved_by`) to the
/// lifecycle engine, which also notifies the assignee when the approver
/// is someone else.
pub async fn approve(
    pool: &sqlx::SqlitePool,
    dispatcher: &dyn NotificationDispatcher,
    task_id: i64,
    actor: Actor,
    comment: Option<&str>,
) -> EngineResult<Task> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may approve a task".into(),
        ));
    }

    let task = database::find_task(pool, task_id).await?;
    if task.status != TaskStatus::Done {
        return Err(EngineError::InvalidState(format!(
            "task {} is {}, only a done task can be approved",
            task_id, task.status
        )));
    }

    let approved = lifecycle::transition(
        pool,
        dispatcher,
        task_id,
        TaskStatus::Approved,
        actor,
        Some(comment.unwrap_or(APPROVAL_COMMENT)),
    )
    .await?;

    info!("Task {} approved by admin {}", task_id, actor.user_id);
    Ok(approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        admin, insert_task, insert_user, setup_test_db, staff, RecordingDispatcher,
    };
    use common::StatusLogEntry;
    use sqlx::SqlitePool;

    async fn log_rows(pool: &SqlitePool, task_id: i64) -> Vec<StatusLogEntry> {
        sqlx::query_as("SELECT * FROM status_log WHERE task_id = ? ORDER BY id ASC")
            .bind(task_id)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_non_admin_is_denied() {
        let pool = setup_test_db().await;
        let dispatcher = RecordingDispatcher::default();
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let alice = insert_user(&pool, "alice", "user", "general").await;
        let task_id = insert_task(&pool, "done", TaskStatus::Done, alice, boss, 1.0).await;

        let result = approve(&pool, &dispatcher, task_id, staff(alice), None).await;
        assert!(matches!(result, Err(EngineError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_only_done_tasks_can_be_approved() {
        let pool = setup_test_db().await;
        let dispatcher = RecordingDispatcher::default();
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let alice = insert_user(&pool, "alice", "user", "general").await;
        let task_id =
            insert_task(&pool, "in flight", TaskStatus::OnProgress, alice, boss, 1.0).await;

        let result = approve(&pool, &dispatcher, task_id, admin(boss), None).await;
        assert!(matches!(result, Err(EngineError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_approval_sets_approver_and_audits() {
        let pool = setup_test_db().await;
        let dispatcher = RecordingDispatcher::default();
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let alice = insert_user(&pool, "alice", "user", "general").await;
        let task_id = insert_task(&pool, "done", TaskStatus::Done, alice, boss, 1.0).await;

        let task = approve(&pool, &dispatcher, task_id, admin(boss), None)
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Approved);
        assert_eq!(task.approved_by, Some(boss));

        let rows = log_rows(&pool, task_id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].previous_status, Some(TaskStatus::Done));
        assert_eq!(rows[0].status, TaskStatus::Approved);
        assert_eq!(rows[0].comment.as_deref(), Some("Approved by admin"));

        // The assignee hears about it.
        let events = dispatcher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, alice);
    }

    #[tokio::test]
    async fn test_approved_task_cannot_be_approved_again() {
        let pool = setup_test_db().await;
        let dispatcher = RecordingDispatcher::default();
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let alice = insert_user(&pool, "alice", "user", "general").await;
        let task_id = insert_task(&pool, "done", TaskStatus::Done, alice, boss, 1.0).await;

        approve(&pool, &dispatcher, task_id, admin(boss), None)
            .await
            .unwrap();
        let again = approve(&pool, &dispatcher, task_id, admin(boss), None).await;
        assert!(matches!(again, Err(EngineError::InvalidState(_))));
    }
}
