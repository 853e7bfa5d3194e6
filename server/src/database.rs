// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::error::{EngineError, EngineResult};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use common::{Campaign, Lead, StatusLogEntry, Task, TaskStatus, User};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'user',
    department TEXT NOT NULL DEFAULT 'general',
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending',
    priority TEXT NOT NULL DEFAULT 'medium',
    assigned_to INTEGER NOT NULL REFERENCES users(id),
    created_by INTEGER NOT NULL REFERENCES users(id),
    approved_by INTEGER NULL REFERENCES users(id),
    estimated_hours REAL NOT NULL DEFAULT 0,
    actual_hours REAL NULL,
    due_date DATE NULL,
    due_time TEXT NULL,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL,
    updated_by INTEGER NULL REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS status_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    previous_status TEXT NULL,
    updated_by INTEGER NOT NULL REFERENCES users(id),
    comment TEXT NULL,
    created_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    daily_lead_quota INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_by INTEGER NOT NULL REFERENCES users(id),
    created_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS campaign_assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    daily_quota INTEGER NOT NULL,
    assigned_date DATE NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TIMESTAMP NOT NULL,
    UNIQUE (campaign_id, user_id, assigned_date)
);

CREATE TABLE IF NOT EXISTS daily_quotas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    quota_date DATE NOT NULL,
    quota_assigned INTEGER NOT NULL,
    created_at TIMESTAMP NOT NULL,
    UNIQUE (campaign_id, user_id, quota_date)
);

CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
    assigned_to INTEGER NOT NULL REFERENCES users(id),
    assigned_date DATE NOT NULL,
    contact_name TEXT NOT NULL DEFAULT '',
    contact_phone TEXT NOT NULL DEFAULT '',
    contact_email TEXT NOT NULL DEFAULT '',
    lead_source TEXT NOT NULL DEFAULT 'auto_generated',
    sale_status TEXT NOT NULL DEFAULT 'pending',
    follow_up_status TEXT NULL,
    admin_approved BOOLEAN NULL,
    approved_by INTEGER NULL REFERENCES users(id),
    approved_at TIMESTAMP NULL,
    notes TEXT NULL,
    updated_by INTEGER NULL REFERENCES users(id),
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);
"#;

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures all tables have the correct schema.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool).await?;

    info!("Database schema is ready.");

    Ok(pool)
}

/// Creates every table the engine uses. Also called by tests against
/// in-memory pools, so the test schema can never drift from this one.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("Failed to create engine tables")?;
    Ok(())
}

// --- User directory ---
// The engine's view of staff: active users, their role and department.
// Auto-assignment and team scheduling read through these helpers only.

/// Looks up one user by id.
pub async fn find_user(pool: &SqlitePool, user_id: i64) -> EngineResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| EngineError::not_found("user", user_id))
}

/// Active staff members with role 'user', optionally restricted to one
/// department, ordered by ascending id. The exclusion set is applied
/// after the fetch; staff pools are small enough that this stays cheap.
pub async fn active_staff(
    pool: &SqlitePool,
    department: Option<&str>,
    exclude: &[i64],
) -> EngineResult<Vec<User>> {
    let users = match department {
        Some(dep) => {
            sqlx::query_as::<_, User>(
                "SELECT * FROM users \
                 WHERE active = 1 AND role = 'user' AND department = ? \
                 ORDER BY id ASC",
            )
            .bind(dep)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE active = 1 AND role = 'user' ORDER BY id ASC",
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(users
        .into_iter()
        .filter(|u| !exclude.contains(&u.id))
        .collect())
}

// --- Shared entity lookups ---

pub async fn find_task(pool: &SqlitePool, task_id: i64) -> EngineResult<Task> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| EngineError::not_found("task", task_id))
}

pub async fn find_campaign(pool: &SqlitePool, campaign_id: i64) -> EngineResult<Campaign> {
    sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
        .bind(campaign_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| EngineError::not_found("campaign", campaign_id))
}

pub async fn find_lead(pool: &SqlitePool, lead_id: i64) -> EngineResult<Lead> {
    sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(lead_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| EngineError::not_found("lead", lead_id))
}

/// Retrieves tasks, optionally filtered to one status, newest first.
pub async fn list_tasks(pool: &SqlitePool, status: Option<TaskStatus>) -> EngineResult<Vec<Task>> {
    let tasks = match status {
        Some(status) => {
            sqlx::query_as::<_, Task>(
                "SELECT * FROM tasks WHERE status = ? ORDER BY created_at DESC, id DESC",
            )
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")
                .fetch_all(pool)
                .await?
        }
    };
    Ok(tasks)
}

/// The full audit trail of one task, oldest entry first.
pub async fn status_history(pool: &SqlitePool, task_id: i64) -> EngineResult<Vec<StatusLogEntry>> {
    // Resolve the task first so a bogus id is NotFound, not an empty list.
    find_task(pool, task_id).await?;

    let entries = sqlx::query_as::<_, StatusLogEntry>(
        "SELECT * FROM status_log WHERE task_id = ? ORDER BY id ASC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Leads belonging to one campaign on one date, in creation order.
pub async fn list_campaign_leads(
    pool: &SqlitePool,
    campaign_id: i64,
    date: NaiveDate,
) -> EngineResult<Vec<Lead>> {
    let leads = sqlx::query_as::<_, Lead>(
        "SELECT * FROM leads WHERE campaign_id = ? AND assigned_date = ? ORDER BY id ASC",
    )
    .bind(campaign_id)
    .bind(date)
    .fetch_all(pool)
    .await?;
    Ok(leads)
}
