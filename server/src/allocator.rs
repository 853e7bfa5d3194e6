// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Lead records: quota-driven auto-generation plus the direct CRUD
//! surface used by staff.

use crate::database;
use crate::error::{EngineError, EngineResult};

use chrono::{NaiveDate, Utc};
use common::{
    Actor, ApproveLeadPayload, CampaignStatus, CreateLeadPayload, DailyQuota, Lead, SaleStatus,
    UpdateLeadPayload,
};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Source tag stamped on auto-generated placeholder leads.
const AUTO_SOURCE: &str = "auto_generated";

/// Tops up placeholder leads for every under-filled quota slot of the
/// campaign on `date`. Returns the total number of leads created.
///
/// The filled count is recomputed from stored lead rows inside the same
/// write transaction that inserts the top-ups, so a repeated or
/// concurrent invocation can never push a slot past its quota.
pub async fn generate_daily_leads(
    pool: &SqlitePool,
    campaign_id: i64,
    date: NaiveDate,
) -> EngineResult<i64> {
    let campaign = database::find_campaign(pool, campaign_id).await?;
    if campaign.status == CampaignStatus::Paused {
        return Err(EngineError::InvalidState(format!(
            "campaign {} is paused",
            campaign_id
        )));
    }

    let mut tx = pool.begin().await?;

    // Touch the quota rows first so the transaction holds the write
    // lock before the recount; concurrent top-ups for the same
    // campaign/date serialize behind it.
    sqlx::query(
        "UPDATE daily_quotas SET quota_assigned = quota_assigned \
         WHERE campaign_id = ? AND quota_date = ?",
    )
    .bind(campaign_id)
    .bind(date)
    .execute(&mut *tx)
    .await?;

    let slots = sqlx::query_as::<_, DailyQuota>(
        "SELECT * FROM daily_quotas WHERE campaign_id = ? AND quota_date = ? ORDER BY user_id ASC",
    )
    .bind(campaign_id)
    .bind(date)
    .fetch_all(&mut *tx)
    .await?;

    let now = Utc::now();
    let mut total_created = 0i64;

    for slot in &slots {
        let filled: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM leads \
             WHERE campaign_id = ? AND assigned_to = ? AND assigned_date = ?",
        )
        .bind(campaign_id)
        .bind(slot.user_id)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        let missing = (slot.quota_assigned - filled).max(0);
        for _ in 0..missing {
            sqlx::query(
                "INSERT INTO leads \
                 (campaign_id, assigned_to, assigned_date, contact_name, contact_phone, \
                  contact_email, lead_source, sale_status, created_at, updated_at) \
                 VALUES (?, ?, ?, '', '', '', ?, ?, ?, ?)",
            )
            .bind(campaign_id)
            .bind(slot.user_id)
            .bind(date)
            .bind(AUTO_SOURCE)
            .bind(SaleStatus::Pending)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        total_created += missing;

        debug!(
            "Quota slot user {} on {}: {}/{} filled, generated {}",
            slot.user_id, date, filled, slot.quota_assigned, missing
        );
    }

    tx.commit().await?;

    info!(
        "Generated {} leads for campaign {} on {}",
        total_created, campaign_id, date
    );
    Ok(total_created)
}

/// Creates a lead directly (staff entry, not a quota top-up).
pub async fn create_lead(
    pool: &SqlitePool,
    payload: CreateLeadPayload,
    actor: Actor,
) -> EngineResult<Lead> {
    let campaign = database::find_campaign(pool, payload.campaign_id).await?;
    let assignee = database::find_user(pool, payload.assigned_to).await?;
    if !assignee.active {
        return Err(EngineError::Validation(format!(
            "user {} is not active",
            assignee.id
        )));
    }
    if payload.assigned_date < campaign.start_date || payload.assigned_date > campaign.end_date {
        return Err(EngineError::Validation(format!(
            "lead date {} falls outside the campaign window {} to {}",
            payload.assigned_date, campaign.start_date, campaign.end_date
        )));
    }

    let now = Utc::now();
    let lead_id = sqlx::query(
        "INSERT INTO leads \
         (campaign_id, assigned_to, assigned_date, contact_name, contact_phone, contact_email, \
          lead_source, sale_status, notes, updated_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.campaign_id)
    .bind(payload.assigned_to)
    .bind(payload.assigned_date)
    .bind(payload.contact_name.as_deref().unwrap_or(""))
    .bind(payload.contact_phone.as_deref().unwrap_or(""))
    .bind(payload.contact_email.as_deref().unwrap_or(""))
    .bind(payload.lead_source.as_deref().unwrap_or("manual"))
    .bind(SaleStatus::Pending)
    .bind(&payload.notes)
    .bind(actor.user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!("Lead created with ID: {}", lead_id);
    database::find_lead(pool, lead_id).await
}

/// Updates contact and follow-up fields. Only the lead's assignee or an
/// admin may edit it; absent payload fields keep their current value.
pub async fn update_lead(
    pool: &SqlitePool,
    lead_id: i64,
    payload: UpdateLeadPayload,
    actor: Actor,
) -> EngineResult<Lead> {
    let lead = database::find_lead(pool, lead_id).await?;
    if !actor.is_admin() && actor.user_id != lead.assigned_to {
        return Err(EngineError::PermissionDenied(format!(
            "user {} may not update lead {}",
            actor.user_id, lead_id
        )));
    }

    sqlx::query(
        "UPDATE leads SET \
         contact_name = COALESCE(?, contact_name), \
         contact_phone = COALESCE(?, contact_phone), \
         contact_email = COALESCE(?, contact_email), \
         sale_status = COALESCE(?, sale_status), \
         follow_up_status = COALESCE(?, follow_up_status), \
         notes = COALESCE(?, notes), \
         updated_by = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&payload.contact_name)
    .bind(&payload.contact_phone)
    .bind(&payload.contact_email)
    .bind(payload.sale_status)
    .bind(&payload.follow_up_status)
    .bind(&payload.notes)
    .bind(actor.user_id)
    .bind(Utc::now())
    .bind(lead_id)
    .execute(pool)
    .await?;

    database::find_lead(pool, lead_id).await
}

/// Admin verdict on a lead. Re-callable: a second call simply flips the
/// flag and restamps the approver.
pub async fn approve_lead(
    pool: &SqlitePool,
    lead_id: i64,
    payload: ApproveLeadPayload,
    actor: Actor,
) -> EngineResult<Lead> {
    if !actor.is_admin() {
        return Err(EngineError::PermissionDenied(
            "only an admin may approve a lead".into(),
        ));
    }
    database::find_lead(pool, lead_id).await?;

    sqlx::query(
        "UPDATE leads SET admin_approved = ?, approved_by = ?, approved_at = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(payload.approved)
    .bind(actor.user_id)
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(lead_id)
    .execute(pool)
    .await?;

    info!(
        "Lead {} marked approved={} by admin {}",
        lead_id, payload.approved, actor.user_id
    );
    database::find_lead(pool, lead_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota;
    use crate::test_support::{admin, insert_campaign, insert_user, setup_test_db, staff};
    use common::AssignTeamPayload;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup_campaign_with_team(
        pool: &SqlitePool,
        quota_per_day: i64,
        users: &[i64],
        boss: i64,
        day: NaiveDate,
    ) -> i64 {
        let campaign = insert_campaign(
            pool,
            "Campaign",
            date(2024, 1, 1),
            date(2024, 12, 31),
            quota_per_day,
            boss,
        )
        .await;
        quota::assign_team(
            pool,
            campaign,
            AssignTeamPayload {
                user_ids: users.to_vec(),
                start_date: day,
                end_date: day,
            },
            admin(boss),
        )
        .await
        .unwrap();
        campaign
    }

    async fn leads_for(pool: &SqlitePool, campaign: i64, day: NaiveDate) -> Vec<Lead> {
        sqlx::query_as("SELECT * FROM leads WHERE campaign_id = ? AND assigned_date = ?")
            .bind(campaign)
            .bind(day)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_generate_fills_every_slot_then_stops() {
        // quota 5, two users, one day: first run creates 10 placeholder
        // leads, the second run creates nothing.
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let a = insert_user(&pool, "a", "user", "sales").await;
        let b = insert_user(&pool, "b", "user", "sales").await;
        let day = date(2024, 6, 1);
        let campaign = setup_campaign_with_team(&pool, 5, &[a, b], boss, day).await;

        let first = generate_daily_leads(&pool, campaign, day).await.unwrap();
        assert_eq!(first, 10);

        let leads = leads_for(&pool, campaign, day).await;
        assert_eq!(leads.len(), 10);
        assert!(leads.iter().all(|l| l.sale_status == SaleStatus::Pending));
        assert!(leads.iter().all(|l| l.lead_source == "auto_generated"));
        assert!(leads.iter().all(|l| l.contact_name.is_empty()));
        assert_eq!(leads.iter().filter(|l| l.assigned_to == a).count(), 5);
        assert_eq!(leads.iter().filter(|l| l.assigned_to == b).count(), 5);

        let second = generate_daily_leads(&pool, campaign, day).await.unwrap();
        assert_eq!(second, 0);
        assert_eq!(leads_for(&pool, campaign, day).await.len(), 10);
    }

    #[tokio::test]
    async fn test_generate_tops_up_partially_filled_slot() {
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let a = insert_user(&pool, "a", "user", "sales").await;
        let day = date(2024, 6, 1);
        let campaign = setup_campaign_with_team(&pool, 5, &[a], boss, day).await;

        // Three leads already entered by hand.
        for i in 0..3 {
            create_lead(
                &pool,
                CreateLeadPayload {
                    campaign_id: campaign,
                    assigned_to: a,
                    assigned_date: day,
                    contact_name: Some(format!("contact {i}")),
                    contact_phone: None,
                    contact_email: None,
                    lead_source: None,
                    notes: None,
                },
                staff(a),
            )
            .await
            .unwrap();
        }

        let created = generate_daily_leads(&pool, campaign, day).await.unwrap();
        assert_eq!(created, 2);
        assert_eq!(leads_for(&pool, campaign, day).await.len(), 5);
    }

    #[tokio::test]
    async fn test_generate_never_removes_overshoot() {
        // More manual leads than quota: the allocator adds nothing and
        // never tries to "correct" downwards.
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let a = insert_user(&pool, "a", "user", "sales").await;
        let day = date(2024, 6, 1);
        let campaign = setup_campaign_with_team(&pool, 2, &[a], boss, day).await;

        for i in 0..4 {
            create_lead(
                &pool,
                CreateLeadPayload {
                    campaign_id: campaign,
                    assigned_to: a,
                    assigned_date: day,
                    contact_name: Some(format!("contact {i}")),
                    contact_phone: None,
                    contact_email: None,
                    lead_source: None,
                    notes: None,
                },
                staff(a),
            )
            .await
            .unwrap();
        }

        let created = generate_daily_leads(&pool, campaign, day).await.unwrap();
        assert_eq!(created, 0);
        assert_eq!(leads_for(&pool, campaign, day).await.len(), 4);
    }

    #[tokio::test]
    async fn test_generate_refuses_paused_campaign() {
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let a = insert_user(&pool, "a", "user", "sales").await;
        let day = date(2024, 6, 1);
        let campaign = setup_campaign_with_team(&pool, 5, &[a], boss, day).await;

        sqlx::query("UPDATE campaigns SET status = 'paused' WHERE id = ?")
            .bind(campaign)
            .execute(&pool)
            .await
            .unwrap();

        let result = generate_daily_leads(&pool, campaign, day).await;
        assert!(matches!(result, Err(EngineError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_generate_on_unknown_campaign() {
        let pool = setup_test_db().await;
        let result = generate_daily_leads(&pool, 999, date(2024, 6, 1)).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_generate_without_quota_rows_is_noop() {
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let campaign = insert_campaign(
            &pool,
            "Empty",
            date(2024, 1, 1),
            date(2024, 12, 31),
            5,
            boss,
        )
        .await;

        let created = generate_daily_leads(&pool, campaign, date(2024, 6, 1))
            .await
            .unwrap();
        assert_eq!(created, 0);
    }

    #[tokio::test]
    async fn test_create_lead_rejects_date_outside_campaign() {
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let a = insert_user(&pool, "a", "user", "sales").await;
        let campaign =
            insert_campaign(&pool, "Jan", date(2024, 1, 1), date(2024, 1, 31), 5, boss).await;

        let result = create_lead(
            &pool,
            CreateLeadPayload {
                campaign_id: campaign,
                assigned_to: a,
                assigned_date: date(2024, 2, 1),
                contact_name: None,
                contact_phone: None,
                contact_email: None,
                lead_source: None,
                notes: None,
            },
            staff(a),
        )
        .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_lead_permissions() {
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let a = insert_user(&pool, "a", "user", "sales").await;
        let mallory = insert_user(&pool, "mallory", "user", "sales").await;
        let day = date(2024, 6, 1);
        let campaign = setup_campaign_with_team(&pool, 1, &[a], boss, day).await;
        generate_daily_leads(&pool, campaign, day).await.unwrap();
        let lead = &leads_for(&pool, campaign, day).await[0];

        let denied = update_lead(
            &pool,
            lead.id,
            UpdateLeadPayload {
                contact_name: Some("Intruder".into()),
                ..Default::default()
            },
            staff(mallory),
        )
        .await;
        assert!(matches!(denied, Err(EngineError::PermissionDenied(_))));

        let updated = update_lead(
            &pool,
            lead.id,
            UpdateLeadPayload {
                contact_name: Some("Jane Doe".into()),
                sale_status: Some(SaleStatus::Confirmed),
                ..Default::default()
            },
            staff(a),
        )
        .await
        .unwrap();
        assert_eq!(updated.contact_name, "Jane Doe");
        assert_eq!(updated.sale_status, SaleStatus::Confirmed);
        assert_eq!(updated.updated_by, Some(a));
        // Untouched fields survive.
        assert_eq!(updated.lead_source, "auto_generated");
    }

    #[tokio::test]
    async fn test_approve_lead_is_admin_only_and_flips() {
        let pool = setup_test_db().await;
        let boss = insert_user(&pool, "boss", "admin", "general").await;
        let a = insert_user(&pool, "a", "user", "sales").await;
        let day = date(2024, 6, 1);
        let campaign = setup_campaign_with_team(&pool, 1, &[a], boss, day).await;
        generate_daily_leads(&pool, campaign, day).await.unwrap();
        let lead_id = leads_for(&pool, campaign, day).await[0].id;

        let denied = approve_lead(
            &pool,
            lead_id,
            ApproveLeadPayload { approved: true },
            staff(a),
        )
        .await;
        assert!(matches!(denied, Err(EngineError::PermissionDenied(_))));

        let approved = approve_lead(
            &pool,
            lead_id,
            ApproveLeadPayload { approved: true },
            admin(boss),
        )
        .await
        .unwrap();
        assert_eq!(approved.admin_approved, Some(true));
        assert_eq!(approved.approved_by, Some(boss));
        assert!(approved.approved_at.is_some());

        // Re-callable: the verdict can be flipped.
        let flipped = approve_lead(
            &pool,
            lead_id,
            ApproveLeadPayload { approved: false },
            admin(boss),
        )
        .await
        .unwrap();
        assert_eq!(flipped.admin_approved, Some(false));
    }
}
