// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::error::{EngineError, EngineResult};
use crate::notify::{LifecycleEvent, NotificationDispatcher};

use chrono::Utc;
use common::{Actor, CreateTaskPayload, Task, TaskStatus};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// The single source of truth for the task status graph.
///
/// `Approved` is terminal: it has no outgoing transitions.
pub fn allowed_transitions(from: TaskStatus) -> &'static [TaskStatus] {
    use TaskStatus::*;
    match from {
        Pending => &[OnProgress, OnHold],
        OnProgress => &[Done, OnHold, Pending],
        Done => &[Approved, OnProgress],
        OnHold => &[Pending, OnProgress],
        Approved => &[],
    }
}

pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Creates a task in `Pending` status and writes the opening audit row
/// (with no previous status) in the same transaction.
pub async fn create_task(
    pool: &SqlitePool,
    payload: CreateTaskPayload,
    actor: Actor,
) -> EngineResult<Task> {
    if payload.title.trim().is_empty() {
        return Err(EngineError::Validation("task title cannot be empty".into()));
    }
    if payload.estimated_hours < 0.0 {
        return Err(EngineError::Validation(
            "estimated hours cannot be negative".into(),
        ));
    }
    let assignee = database::find_user(pool, payload.assigned_to).await?;
    if !assignee.active {
        return Err(EngineError::Validation(format!(
            "user {} is not active",
            assignee.id
        )));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let task_id = sqlx::query(
        "INSERT INTO tasks \
         (title, details, status, priority, assigned_to, created_by, estimated_hours, \
          due_date, due_time, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payload.title)
    .bind(&payload.details)
    .bind(TaskStatus::Pending)
    .bind(payload.priority)
    .bind(payload.assigned_to)
    .bind(actor.user_id)
    .bind(payload.estimated_hours)
    .bind(payload.due_date)
    .bind(&payload.due_time)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query(
        "INSERT INTO status_log (task_id, status, previous_status, updated_by, comment, created_at) \
         VALUES (?, ?, NULL, ?, 'Task created', ?)",
    )
    .bind(task_id)
    .bind(TaskStatus::Pending)
    .bind(actor.user_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Task created successfully with ID: {}", task_id);
    database::find_task(pool, task_id).await
}

/// Moves one task to `target` on behalf of `actor`.
///
/// Permission, the transition graph, the task update and the audit row
/// all live inside one transaction; the lifecycle event is emitted only
/// after the commit.
pub async fn transition(
    pool: &SqlitePool,
    dispatcher: &dyn NotificationDispatcher,
    task_id: i64,
    target: TaskStatus,
    actor: Actor,
    comment: Option<&str>,
) -> EngineResult<Task> {
    let mut tx = pool.begin().await?;
    let (task, event) = apply_transition(&mut tx, task_id, target, actor, comment).await?;
    tx.commit().await?;

    debug!(
        "Task {} transitioned {} -> {} by user {}",
        task_id, event.previous_status, event.status, actor.user_id
    );

    // Best-effort, post-commit. The assignee already knows about their
    // own change.
    if task.assigned_to != actor.user_id {
        dispatcher.notify(task.assigned_to, &event);
    }

    Ok(task)
}

/// Moves every task in `task_ids` to `target`, all-or-nothing: a single
/// invalid id or disallowed transition rolls back the whole batch with
/// zero audit rows written.
pub async fn bulk_transition(
    pool: &SqlitePool,
    dispatcher: &dyn NotificationDispatcher,
    task_ids: &[i64],
    target: TaskStatus,
    actor: Actor,
    comment: Option<&str>,
) -> EngineResult<Vec<Task>> {
    if task_ids.is_empty() {
        return Err(EngineError::Validation("no task ids supplied".into()));
    }

    let mut tx = pool.begin().await?;
    let mut updated = Vec::with_capacity(task_ids.len());
    let mut events = Vec::with_capacity(task_ids.len());

    for &task_id in task_ids {
        let (task, event) = apply_transition(&mut tx, task_id, target, actor, comment).await?;
        updated.push(task);
        events.push(event);
    }

    tx.commit().await?;
    info!(
        "Bulk transition moved {} tasks to {}",
        updated.len(),
        target
    );

    for (task, event) in updated.iter().zip(&events) {
        if task.assigned_to != actor.user_id {
            dispatcher.notify(task.assigned_to, event);
        }
    }

    Ok(updated)
}

/// Validates and applies one transition inside an open transaction.
async fn apply_transition(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    task_id: i64,
    target: TaskStatus,
    actor: Actor,
    comment: Option<&str>,
) -> EngineResult<(Task, LifecycleEvent)> {
    let mut task = fetch_task(&mut **tx, task_id).await?;

    if !actor.is_admin() && actor.user_id != task.assigned_to {
        return Err(EngineError::PermissionDenied(format!(
            "user {} may not update task {}",
            actor.user_id, task_id
        )));
    }
    // Approval is stricter than the general rule: admins only, even for
    // the task's own assignee.
    if target == TaskStatus::Approved && !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may approve a task".into(),
        ));
    }
    if !can_transition(task.status, target) {
        return Err(EngineError::InvalidTransition {
            from: task.status,
            to: target,
        });
    }

    let previous = task.status;
    let now = Utc::now();
    let approved_by = (target == TaskStatus::Approved).then_some(actor.user_id);

    if let Some(approver) = approved_by {
        sqlx::query(
            "UPDATE tasks SET status = ?, updated_by = ?, updated_at = ?, approved_by = ? WHERE id = ?",
        )
        .bind(target)
        .bind(actor.user_id)
        .bind(now)
        .bind(approver)
        .bind(task_id)
        .execute(&mut **tx)
        .await?;
        task.approved_by = Some(approver);
    } else {
        sqlx::query("UPDATE tasks SET status = ?, updated_by = ?, updated_at = ? WHERE id = ?")
            .bind(target)
            .bind(actor.user_id)
            .bind(now)
            .bind(task_id)
            .execute(&mut **tx)
            .await?;
    }

    sqlx::query(
        "INSERT INTO status_log (task_id, status, previous_status, updated_by, comment, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(target)
    .bind(previous)
    .bind(actor.user_id)
    .bind(comment)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    task.status = target;
    task.updated_by = Some(actor.user_id);
    task.updated_at = now;

    let event = LifecycleEvent {
        task_id,
        previous_status: previous,
        status: target,
        actor_id: actor.user_id,
    };
    Ok((task, event))
}

async fn fetch_task(conn: &mut SqliteConnection, task_id: i64) -> EngineResult<Task> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| EngineError::not_found("task", task_id))
}

/// Deletes a task and its audit rows. Admin only.
pub async fn delete_task(pool: &SqlitePool, task_id: i64, actor: Actor) -> EngineResult<()> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may delete a task".into(),
        ));
    }
    database::find_task(pool, task_id).await?;

    let mut tx = pool.begin().await?;
    // Explicit cascade; SQLite foreign_keys enforcement is off by default.
    sqlx::query("DELETE FROM status_log WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Task {} deleted by admin {}", task_id, actor.user_id);
    Ok(())
}
