// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The status lifecycle of a task.
///
/// The allowed transitions between these states are owned by the
/// lifecycle engine on the server side; this type is only the value.
/// `Approved` is terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    OnProgress,
    Done,
    Approved,
    OnHold,
}

impl TaskStatus {
    /// Every status value, in declaration order. Used by the engine to
    /// test the transition table exhaustively.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::OnProgress,
        TaskStatus::Done,
        TaskStatus::Approved,
        TaskStatus::OnHold,
    ];
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::OnProgress => "on_progress",
            TaskStatus::Done => "done",
            TaskStatus::Approved => "approved",
            TaskStatus::OnHold => "on_hold",
        };
        write!(f, "{}", s)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Caller roles as resolved by the upstream gateway.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The identity on whose behalf an engine operation runs.
///
/// Always passed explicitly into the engine; the engine never reads
/// ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Paused,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Closed,
    NotInterested,
    Confirmed,
    NoResponse,
}

/// A staff member from the user directory.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub department: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Represents a task within the system.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `Debug`: Enables displaying the structure for debugging.
/// - `Clone`: Allows creating copies of the object.
/// - `sqlx::FromRow`: Allows `sqlx` to create a `Task` instance directly
///   from a database result row.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub details: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_to: i64,
    pub created_by: i64,
    pub approved_by: Option<i64>,
    pub estimated_hours: f64,
    pub actual_hours: Option<f64>,

    // We use NaiveDate because we are only interested in the day,
    // without a timezone. The optional due time rides along as text.
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<i64>,
}

/// One append-only audit row per successful status transition.
/// `previous_status` is NULL only for the row written at task creation.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct StatusLogEntry {
    pub id: i64,
    pub task_id: i64,
    pub status: TaskStatus,
    pub previous_status: Option<TaskStatus>,
    pub updated_by: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A time-boxed lead-generation effort with a daily quota and a team.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_lead_quota: i64,
    pub status: CampaignStatus,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// One row per (campaign, user, date) produced by a team assignment.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct CampaignAssignment {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub daily_quota: i64,
    pub assigned_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// The materialized quota target for one user on one date.
///
/// Note there is no stored "filled" counter here: the filled count is
/// always derived live from the leads table so it cannot drift.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct DailyQuota {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub quota_date: NaiveDate,
    pub quota_assigned: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-user quota progress for one campaign/date, as reported by
/// the quota status query.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DailyQuotaStatus {
    pub user_id: i64,
    pub username: String,
    pub quota_assigned: i64,
    pub leads_filled: i64,
    pub remaining: i64,
}

/// A sales contact record assigned to a staff member for follow-up.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Lead {
    pub id: i64,
    pub campaign_id: i64,
    pub assigned_to: i64,
    pub assigned_date: NaiveDate,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub lead_source: String,
    pub sale_status: SaleStatus,
    pub follow_up_status: Option<String>,

    // Tri-state admin verdict: NULL = not reviewed, otherwise the flag.
    pub admin_approved: Option<bool>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,

    pub notes: Option<String>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- API payloads ---
// It's a good practice to separate database models from API models,
// as they may have different fields.

#[derive(Deserialize, Debug)]
pub struct CreateTaskPayload {
    pub title: String,
    pub details: String,
    pub assigned_to: i64,
    pub priority: TaskPriority,
    pub estimated_hours: f64,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TransitionPayload {
    pub status: TaskStatus,
    pub comment: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct BulkTransitionPayload {
    pub task_ids: Vec<i64>,
    pub status: TaskStatus,
    pub comment: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CreateCampaignPayload {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_lead_quota: i64,
}

#[derive(Deserialize, Debug)]
pub struct AssignTeamPayload {
    pub user_ids: Vec<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Deserialize, Debug)]
pub struct UpdateQuotaPayload {
    pub user_id: i64,
    pub quota_date: NaiveDate,
    pub new_quota: i64,
}

#[derive(Deserialize, Debug)]
pub struct GenerateLeadsPayload {
    pub quota_date: NaiveDate,
}

#[derive(Deserialize, Debug)]
pub struct CreateLeadPayload {
    pub campaign_id: i64,
    pub assigned_to: i64,
    pub assigned_date: NaiveDate,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub lead_source: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateLeadPayload {
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub sale_status: Option<SaleStatus>,
    pub follow_up_status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ApproveLeadPayload {
    pub approved: bool,
}

/// Eligibility constraints handed to the auto-assignment strategies.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct AssignmentCriteria {
    pub department: Option<String>,
    #[serde(default)]
    pub exclude: Vec<i64>,
}
