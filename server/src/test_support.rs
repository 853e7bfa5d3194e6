// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Shared helpers for the unit tests of the engine modules.

use crate::database::create_schema;
use crate::notify::{LifecycleEvent, NotificationDispatcher};
use chrono::{NaiveDate, Utc};
use common::{Actor, Role, TaskStatus};
use sqlx::SqlitePool;
use std::sync::Mutex;

/// Sets up a fresh in-memory SQLite database with the real schema,
/// so every test is isolated and can never drift from production DDL.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory SQLite");
    create_schema(&pool)
        .await
        .expect("Failed to create schema in test DB");
    pool
}

pub fn admin(user_id: i64) -> Actor {
    Actor {
        user_id,
        role: Role::Admin,
    }
}

pub fn staff(user_id: i64) -> Actor {
    Actor {
        user_id,
        role: Role::User,
    }
}

pub async fn insert_user(pool: &SqlitePool, name: &str, role: &str, department: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, role, department, created_at) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(role)
        .bind(department)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn insert_task(
    pool: &SqlitePool,
    title: &str,
    status: TaskStatus,
    assigned_to: i64,
    created_by: i64,
    estimated_hours: f64,
) -> i64 {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO tasks \
         (title, details, status, priority, assigned_to, created_by, estimated_hours, created_at, updated_at) \
         VALUES (?, '', ?, 'medium', ?, ?, ?, ?, ?)",
    )
    .bind(title)
    .bind(status)
    .bind(assigned_to)
    .bind(created_by)
    .bind(estimated_hours)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn insert_campaign(
    pool: &SqlitePool,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    daily_lead_quota: i64,
    created_by: i64,
) -> i64 {
    sqlx::query(
        "INSERT INTO campaigns (name, start_date, end_date, daily_lead_quota, status, created_by, created_at) \
         VALUES (?, ?, ?, ?, 'active', ?, ?)",
    )
    .bind(name)
    .bind(start_date)
    .bind(end_date)
    .bind(daily_lead_quota)
    .bind(created_by)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// Dispatcher double that captures every notification for assertions.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub events: Mutex<Vec<(i64, LifecycleEvent)>>,
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(&self, user_id: i64, event: &LifecycleEvent) {
        self.events.lock().unwrap().push((user_id, event.clone()));
    }
}
