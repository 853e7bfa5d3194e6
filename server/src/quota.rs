// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::error::{EngineError, EngineResult};

use chrono::{NaiveDate, Utc};
use common::{
    Actor, AssignTeamPayload, Campaign, CampaignStatus, CreateCampaignPayload, DailyQuotaStatus,
    UpdateQuotaPayload,
};
use sqlx::SqlitePool;
use tracing::{debug, info};

const QUOTA_MAX: i64 = 1000;

/// Creates a campaign. Admin only.
pub async fn create_campaign(
    pool: &SqlitePool,
    payload: CreateCampaignPayload,
    actor: Actor,
) -> EngineResult<Campaign> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may create a campaign".into(),
        ));
    }
    if payload.name.trim().is_empty() {
        return Err(EngineError::Validation(
            "campaign name cannot be empty".into(),
        ));
    }
    if payload.start_date >= payload.end_date {
        return Err(EngineError::Validation(
            "campaign start date must be before its end date".into(),
        ));
    }
    if payload.daily_lead_quota < 1 || payload.daily_lead_quota > QUOTA_MAX {
        return Err(EngineError::Validation(format!(
            "daily lead quota must be between 1 and {}",
            QUOTA_MAX
        )));
    }

    let campaign_id = sqlx::query(
        "INSERT INTO campaigns (name, start_date, end_date, daily_lead_quota, status, created_by, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payload.name)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.daily_lead_quota)
    .bind(CampaignStatus::Active)
    .bind(actor.user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!("Campaign '{}' created with ID: {}", payload.name, campaign_id);
    database::find_campaign(pool, campaign_id).await
}

/// Materializes assignment and quota rows for every (user, date) slot in
/// the requested range, capturing the campaign's daily quota at call
/// time. Admin only.
///
/// Upserts are keyed on (campaign, user, date) with an atomic
/// ON CONFLICT clause, so repeated or concurrent calls over overlapping
/// ranges never duplicate a slot, and slots materialized earlier keep
/// the quota they were created with (a later change to the campaign's
/// quota only shows up in slots materialized afterwards).
///
/// Returns the number of newly materialized quota slots.
pub async fn assign_team(
    pool: &SqlitePool,
    campaign_id: i64,
    payload: AssignTeamPayload,
    actor: Actor,
) -> EngineResult<u64> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may assign a campaign team".into(),
        ));
    }
    if payload.user_ids.is_empty() {
        return Err(EngineError::Validation("no users supplied".into()));
    }
    if payload.start_date > payload.end_date {
        return Err(EngineError::Validation(
            "assignment start date is after its end date".into(),
        ));
    }

    let campaign = database::find_campaign(pool, campaign_id).await?;
    // Quota dates outside the campaign window would later produce leads
    // violating the lead/campaign date invariant.
    if payload.start_date < campaign.start_date || payload.end_date > campaign.end_date {
        return Err(EngineError::Validation(format!(
            "assignment range must fall within the campaign window {} to {}",
            campaign.start_date, campaign.end_date
        )));
    }

    for &user_id in &payload.user_ids {
        let user = database::find_user(pool, user_id).await?;
        if !user.active {
            return Err(EngineError::Validation(format!(
                "user {} is not active",
                user_id
            )));
        }
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let mut created = 0u64;

    let mut date = payload.start_date;
    while date <= payload.end_date {
        for &user_id in &payload.user_ids {
            sqlx::query(
                "INSERT INTO campaign_assignments \
                 (campaign_id, user_id, daily_quota, assigned_date, status, created_at) \
                 VALUES (?, ?, ?, ?, 'active', ?) \
                 ON CONFLICT (campaign_id, user_id, assigned_date) DO NOTHING",
            )
            .bind(campaign_id)
            .bind(user_id)
            .bind(campaign.daily_lead_quota)
            .bind(date)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let inserted = sqlx::query(
                "INSERT INTO daily_quotas \
                 (campaign_id, user_id, quota_date, quota_assigned, created_at) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (campaign_id, user_id, quota_date) DO NOTHING",
            )
            .bind(campaign_id)
            .bind(user_id)
            .bind(date)
            .bind(campaign.daily_lead_quota)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            created += inserted;
        }
        date = date
            .succ_opt()
            .ok_or_else(|| EngineError::Validation("date range overflow".into()))?;
    }

    tx.commit().await?;
    info!(
        "Assigned {} users to campaign {} ({} new quota slots)",
        payload.user_ids.len(),
        campaign_id,
        created
    );
    Ok(created)
}

#[derive(sqlx::FromRow)]
struct QuotaRow {
    user_id: i64,
    username: String,
    quota_assigned: i64,
    leads_filled: i64,
}

/// Per-user quota progress for one campaign/date. The filled count is a
/// live recount of stored leads, never a cached counter.
pub async fn quota_status(
    pool: &SqlitePool,
    campaign_id: i64,
    date: NaiveDate,
) -> EngineResult<Vec<DailyQuotaStatus>> {
    database::find_campaign(pool, campaign_id).await?;

    let rows = sqlx::query_as::<_, QuotaRow>(
        "SELECT dq.user_id, u.username, dq.quota_assigned, \
                (SELECT COUNT(*) FROM leads l \
                 WHERE l.campaign_id = dq.campaign_id \
                   AND l.assigned_to = dq.user_id \
                   AND l.assigned_date = dq.quota_date) AS leads_filled \
         FROM daily_quotas dq \
         JOIN users u ON u.id = dq.user_id \
         WHERE dq.campaign_id = ? AND dq.quota_date = ? \
         ORDER BY dq.user_id ASC",
    )
    .bind(campaign_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    debug!(
        "Quota status for campaign {} on {}: {} assigned users",
        campaign_id,
        date,
        rows.len()
    );

    Ok(rows
        .into_iter()
        .map(|r| DailyQuotaStatus {
            user_id: r.user_id,
            username: r.username,
            quota_assigned: r.quota_assigned,
            leads_filled: r.leads_filled,
            remaining: (r.quota_assigned - r.leads_filled).max(0),
        })
        .collect())
}

/// Admin override for one user's quota on one date. A direct field
/// update: already-generated leads are not recomputed.
pub async fn update_quota(
    pool: &SqlitePool,
    campaign_id: i64,
    payload: UpdateQuotaPayload,
    actor: Actor,
) -> EngineResult<()> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may override a quota".into(),
        ));
    }
    if payload.new_quota < 0 || payload.new_quota > QUOTA_MAX {
        return Err(EngineError::Validation(format!(
            "quota must be between 0 and {}",
            QUOTA_MAX
        )));
    }

    let updated = sqlx::query(
        "UPDATE daily_quotas SET quota_assigned = ? \
         WHERE campaign_id = ? AND user_id = ? AND quota_date = ?",
    )
    .bind(payload.new_quota)
    .bind(campaign_id)
    .bind(payload.user_id)
    .bind(payload.quota_date)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(EngineError::NotFound(format!(
            "no quota row for campaign {}, user {} on {}",
            campaign_id, payload.user_id, payload.quota_date
        )));
    }

    info!(
        "Quota for campaign {}, user {} on {} set to {} by admin {}",
        campaign_id, payload.user_id, payload.quota_date, payload.new_quota, actor.user_id
    );
    Ok(())
}
