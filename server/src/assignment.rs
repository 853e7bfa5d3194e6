// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Auto-assignment: algorithmic selection of the most suitable staff
//! member for a task or lead.

use crate::database;
use crate::error::{EngineError, EngineResult};

use chrono::Utc;
use common::{Actor, AssignmentCriteria, Lead, Task, User};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};

/// Department used by the department-based strategy when the caller
/// supplies none.
const DEFAULT_DEPARTMENT: &str = "general";

/// The pluggable selection algorithms, chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentStrategy {
    #[default]
    WorkloadBalance,
    RoundRobin,
    DepartmentBased,
    /// Placeholder: delegates to `WorkloadBalance` until a skills data
    /// model exists. Not a contract guarantee.
    ExpertiseBased,
}

impl FromStr for AssignmentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workload_balance" => Ok(AssignmentStrategy::WorkloadBalance),
            "round_robin" => Ok(AssignmentStrategy::RoundRobin),
            "department_based" => Ok(AssignmentStrategy::DepartmentBased),
            "expertise_based" => Ok(AssignmentStrategy::ExpertiseBased),
            other => Err(format!("unknown assignment strategy '{}'", other)),
        }
    }
}

/// Picks the best candidate for the given criteria, or `None` when the
/// eligible pool is empty. Pure selection: nothing is written.
pub async fn select_assignee(
    pool: &SqlitePool,
    strategy: AssignmentStrategy,
    criteria: &AssignmentCriteria,
    actor: Actor,
) -> EngineResult<Option<User>> {
    match strategy {
        AssignmentStrategy::WorkloadBalance => workload_balance(pool, criteria).await,
        AssignmentStrategy::RoundRobin => round_robin(pool, criteria, actor).await,
        AssignmentStrategy::DepartmentBased => department_based(pool, criteria).await,
        AssignmentStrategy::ExpertiseBased => workload_balance(pool, criteria).await,
    }
}

/// Least-loaded first: fewest open tasks, then fewest estimated open
/// hours, then lowest id.
async fn workload_balance(
    pool: &SqlitePool,
    criteria: &AssignmentCriteria,
) -> EngineResult<Option<User>> {
    let candidates = ranked_candidates(pool, criteria.department.as_deref(), true).await?;
    Ok(candidates
        .into_iter()
        .find(|u| !criteria.exclude.contains(&u.id)))
}

/// Rotates through the pool in ascending-id order, continuing after the
/// assignee of the most recent task this actor created, wrapping at the
/// end. Note the rotation cursor is scoped to the requesting actor's
/// own created tasks; two admins each advance an independent rotation.
async fn round_robin(
    pool: &SqlitePool,
    criteria: &AssignmentCriteria,
    actor: Actor,
) -> EngineResult<Option<User>> {
    let candidates =
        database::active_staff(pool, criteria.department.as_deref(), &criteria.exclude).await?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let last_assigned: Option<i64> = sqlx::query_scalar(
        "SELECT assigned_to FROM tasks WHERE created_by = ? ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(actor.user_id)
    .fetch_optional(pool)
    .await?;

    let pick = match last_assigned {
        Some(last) => candidates
            .iter()
            .find(|u| u.id > last)
            .or_else(|| candidates.first()),
        None => candidates.first(),
    };

    debug!(
        "Round robin for actor {}: last assigned {:?}, picked {:?}",
        actor.user_id,
        last_assigned,
        pick.map(|u| u.id)
    );
    Ok(pick.cloned())
}

/// Least-loaded candidate within one department (the default department
/// when none is supplied).
async fn department_based(
    pool: &SqlitePool,
    criteria: &AssignmentCriteria,
) -> EngineResult<Option<User>> {
    let department = criteria
        .department
        .as_deref()
        .unwrap_or(DEFAULT_DEPARTMENT);
    let candidates = ranked_candidates(pool, Some(department), false).await?;
    Ok(candidates
        .into_iter()
        .find(|u| !criteria.exclude.contains(&u.id)))
}

/// Eligible staff ordered by open-task count, optionally tie-broken by
/// total estimated open hours, then by id. Open means Pending or
/// OnProgress.
async fn ranked_candidates(
    pool: &SqlitePool,
    department: Option<&str>,
    tie_break_on_hours: bool,
) -> EngineResult<Vec<User>> {
    let order = if tie_break_on_hours {
        "ORDER BY open_tasks ASC, open_hours ASC, u.id ASC"
    } else {
        "ORDER BY open_tasks ASC, u.id ASC"
    };

    let base = "SELECT u.*, \
                (SELECT COUNT(*) FROM tasks t \
                 WHERE t.assigned_to = u.id AND t.status IN ('pending', 'on_progress')) AS open_tasks, \
                (SELECT COALESCE(SUM(t.estimated_hours), 0) FROM tasks t \
                 WHERE t.assigned_to = u.id AND t.status IN ('pending', 'on_progress')) AS open_hours \
                FROM users u WHERE u.active = 1 AND u.role = 'user'";

    let users = match department {
        Some(dep) => {
            let sql = format!("{base} AND u.department = ? {order}");
            sqlx::query_as::<_, User>(&sql)
                .bind(dep)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("{base} {order}");
            sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?
        }
    };
    Ok(users)
}

/// Reassigns a task to the strategy's pick. Admin only.
pub async fn assign_task(
    pool: &SqlitePool,
    strategy: AssignmentStrategy,
    task_id: i64,
    criteria: &AssignmentCriteria,
    actor: Actor,
) -> EngineResult<Task> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may auto-assign a task".into(),
        ));
    }
    database::find_task(pool, task_id).await?;

    let assignee = select_assignee(pool, strategy, criteria, actor)
        .await?
        .ok_or_else(|| {
            EngineError::NotFound("no eligible assignee matches the criteria".into())
        })?;

    sqlx::query("UPDATE tasks SET assigned_to = ?, updated_by = ?, updated_at = ? WHERE id = ?")
        .bind(assignee.id)
        .bind(actor.user_id)
        .bind(Utc::now())
        .bind(task_id)
        .execute(pool)
        .await?;

    info!(
        "Task {} auto-assigned to user {} via {:?}",
        task_id, assignee.id, strategy
    );
    database::find_task(pool, task_id).await
}

/// Reassigns a lead to the strategy's pick. Admin only.
pub async fn assign_lead(
    pool: &SqlitePool,
    strategy: AssignmentStrategy,
    lead_id: i64,
    criteria: &AssignmentCriteria,
    actor: Actor,
) -> EngineResult<Lead> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may auto-assign a lead".into(),
        ));
    }
    database::find_lead(pool, lead_id).await?;

    let assignee = select_assignee(pool, strategy, criteria, actor)
        .await?
        .ok_or_else(|| {
            EngineError::NotFound("no eligible assignee matches the criteria".into())
        })?;

    sqlx::query("UPDATE leads SET assigned_to = ?, updated_by = ?, updated_at = ? WHERE id = ?")
        .bind(assignee.id)
        .bind(actor.user_id)
        .bind(Utc::now())
        .bind(lead_id)
        .execute(pool)
        .await?;

    info!(
        "Lead {} auto-assigned to user {} via {:?}",
        lead_id, assignee.id, strategy
    );
    database::find_lead(pool, lead_id).await
}
