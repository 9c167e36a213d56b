//! Contribution tier and contribution repository

use sqlx::PgPool;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::contribution::{
    Contribution, ContributionFrequency, ContributionStatus, ContributionTier,
};
use crate::utils::errors::RivayaError;

/// Fields of a contribution row to insert, after defaults are resolved
#[derive(Debug, Clone)]
pub struct NewContribution {
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub tier_id: Option<Uuid>,
    pub period: String,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

/// Fields of a tier row to insert
#[derive(Debug, Clone)]
pub struct NewTier {
    pub group_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub frequency: ContributionFrequency,
    pub is_default: bool,
}

#[derive(Clone, Debug)]
pub struct ContributionRepository {
    pool: PgPool,
}

impl ContributionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a tier; a new default tier clears the previous default
    pub async fn create_tier(&self, tier: NewTier) -> Result<ContributionTier, RivayaError> {
        let mut tx = self.pool.begin().await?;

        if tier.is_default {
            sqlx::query("UPDATE contribution_tiers SET is_default = FALSE WHERE group_id = $1")
                .bind(tier.group_id)
                .execute(&mut *tx)
                .await?;
        }

        let created = sqlx::query_as::<_, ContributionTier>(
            r#"
            INSERT INTO contribution_tiers (id, group_id, name, description, amount, currency, frequency, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, group_id, name, description, amount, currency, frequency, is_default, created_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(tier.group_id)
        .bind(tier.name.trim())
        .bind(tier.description)
        .bind(tier.amount)
        .bind(tier.currency)
        .bind(tier.frequency)
        .bind(tier.is_default)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    pub async fn list_tiers(&self, group_id: Uuid) -> Result<Vec<ContributionTier>, RivayaError> {
        let tiers = sqlx::query_as::<_, ContributionTier>(
            "SELECT id, group_id, name, description, amount, currency, frequency, is_default, created_at FROM contribution_tiers WHERE group_id = $1 ORDER BY amount ASC, name ASC"
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tiers)
    }

    pub async fn find_tier(&self, id: Uuid) -> Result<Option<ContributionTier>, RivayaError> {
        let tier = sqlx::query_as::<_, ContributionTier>(
            "SELECT id, group_id, name, description, amount, currency, frequency, is_default, created_at FROM contribution_tiers WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tier)
    }

    /// Create a contribution; a duplicate period for the same member and tier is a conflict
    pub async fn create(&self, contribution: NewContribution) -> Result<Contribution, RivayaError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Contribution>(
            r#"
            INSERT INTO contributions (id, group_id, member_id, tier_id, period, amount, currency, status, due_date, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10, $10)
            RETURNING id, group_id, member_id, tier_id, period, amount, currency, status, due_date, paid_at, payment_id, notes, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(contribution.group_id)
        .bind(contribution.member_id)
        .bind(contribution.tier_id)
        .bind(&contribution.period)
        .bind(contribution.amount)
        .bind(contribution.currency)
        .bind(contribution.due_date)
        .bind(contribution.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if crate::utils::errors::is_unique_violation(&e) {
                RivayaError::Conflict(format!(
                    "A contribution for period {} already exists",
                    contribution.period
                ))
            } else {
                RivayaError::Database(e)
            }
        })?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Contribution>, RivayaError> {
        let contribution = sqlx::query_as::<_, Contribution>(
            "SELECT id, group_id, member_id, tier_id, period, amount, currency, status, due_date, paid_at, payment_id, notes, created_at, updated_at FROM contributions WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contribution)
    }

    /// Contributions of a group, optionally narrowed to one member
    pub async fn list_for_group(
        &self,
        group_id: Uuid,
        member_id: Option<Uuid>,
        status: Option<ContributionStatus>,
        period: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Contribution>, i64), RivayaError> {
        let contributions = sqlx::query_as::<_, Contribution>(
            r#"
            SELECT id, group_id, member_id, tier_id, period, amount, currency, status, due_date, paid_at, payment_id, notes, created_at, updated_at
            FROM contributions
            WHERE group_id = $1
              AND ($2::uuid IS NULL OR member_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::text IS NULL OR period = $4)
            ORDER BY due_date DESC, created_at DESC
            LIMIT $5 OFFSET $6
            "#
        )
        .bind(group_id)
        .bind(member_id)
        .bind(status)
        .bind(period)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM contributions
            WHERE group_id = $1
              AND ($2::uuid IS NULL OR member_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::text IS NULL OR period = $4)
            "#
        )
        .bind(group_id)
        .bind(member_id)
        .bind(status)
        .bind(period)
        .fetch_one(&self.pool)
        .await?;

        Ok((contributions, total.0))
    }

    /// Pending and overdue contributions of a user across all groups
    pub async fn outstanding_for_user(&self, user_id: Uuid) -> Result<Vec<Contribution>, RivayaError> {
        let contributions = sqlx::query_as::<_, Contribution>(
            r#"
            SELECT id, group_id, member_id, tier_id, period, amount, currency, status, due_date, paid_at, payment_id, notes, created_at, updated_at
            FROM contributions
            WHERE member_id = $1 AND status IN ('pending', 'overdue')
            ORDER BY due_date ASC
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(contributions)
    }

    /// Waive an outstanding contribution; `None` when it was not outstanding
    pub async fn waive(&self, id: Uuid, notes: Option<String>) -> Result<Option<Contribution>, RivayaError> {
        let contribution = sqlx::query_as::<_, Contribution>(
            r#"
            UPDATE contributions
            SET status = 'waived',
                notes = COALESCE($2, notes),
                updated_at = $3
            WHERE id = $1 AND status IN ('pending', 'overdue')
            RETURNING id, group_id, member_id, tier_id, period, amount, currency, status, due_date, paid_at, payment_id, notes, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(notes)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(contribution)
    }

    /// Mark pending contributions due before `today` as overdue
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, RivayaError> {
        let result = sqlx::query(
            "UPDATE contributions SET status = 'overdue', updated_at = $2 WHERE status = 'pending' AND due_date < $1"
        )
        .bind(today)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
