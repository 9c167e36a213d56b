//! Contribution tiers and member contributions

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContributionFrequency {
    Monthly,
    Quarterly,
    Yearly,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Pending,
    Paid,
    Overdue,
    Waived,
    Cancelled,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::Paid => "paid",
            ContributionStatus::Overdue => "overdue",
            ContributionStatus::Waived => "waived",
            ContributionStatus::Cancelled => "cancelled",
        }
    }

    /// Still owed by the member
    pub fn is_outstanding(&self) -> bool {
        matches!(self, ContributionStatus::Pending | ContributionStatus::Overdue)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContributionTier {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub frequency: ContributionFrequency,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: Uuid,
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub tier_id: Option<Uuid>,
    pub period: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: ContributionStatus,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTierRequest {
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub frequency: ContributionFrequency,
    #[serde(default)]
    pub is_default: bool,
}

impl CreateTierRequest {
    pub fn validate(&self) -> Result<()> {
        helpers::require_length("Tier name", &self.name, 1, 100)?;
        helpers::optional_max_length("Description", self.description.as_deref(), 500)?;
        if self.amount.is_sign_negative() {
            return Err(RivayaError::Validation(
                "Amount must be non-negative".to_string(),
            ));
        }
        if let Some(currency) = &self.currency {
            helpers::normalize_currency(currency)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContributionRequest {
    pub member_id: Uuid,
    pub tier_id: Option<Uuid>,
    pub period: String,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

impl CreateContributionRequest {
    pub fn validate(&self) -> Result<()> {
        if !helpers::is_valid_period(&self.period) {
            return Err(RivayaError::Validation(
                "Period must be in YYYY-MM format".to_string(),
            ));
        }
        if let Some(amount) = self.amount {
            validate_positive_amount(amount)?;
        }
        if self.amount.is_none() && self.tier_id.is_none() {
            return Err(RivayaError::Validation(
                "Either an amount or a tier is required".to_string(),
            ));
        }
        if let Some(currency) = &self.currency {
            helpers::normalize_currency(currency)?;
        }
        helpers::optional_max_length("Notes", self.notes.as_deref(), 500)?;
        Ok(())
    }
}

pub fn validate_positive_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(RivayaError::Validation("Amount must be positive".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WaiveRequest {
    pub notes: Option<String>,
}

impl WaiveRequest {
    pub fn validate(&self) -> Result<()> {
        helpers::optional_max_length("Notes", self.notes.as_deref(), 500)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ContributionListQuery {
    pub status: Option<ContributionStatus>,
    pub period: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn request() -> CreateContributionRequest {
        CreateContributionRequest {
            member_id: Uuid::new_v4(),
            tier_id: None,
            period: "2024-06".to_string(),
            amount: Some(Decimal::new(150000, 2)),
            currency: Some("KES".to_string()),
            due_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            notes: None,
        }
    }

    #[test]
    fn test_contribution_validation() {
        assert!(request().validate().is_ok());

        let bad_period = CreateContributionRequest { period: "June".to_string(), ..request() };
        assert!(bad_period.validate().is_err());

        let zero = CreateContributionRequest { amount: Some(Decimal::ZERO), ..request() };
        assert!(zero.validate().is_err());

        let nothing = CreateContributionRequest { amount: None, tier_id: None, ..request() };
        assert!(nothing.validate().is_err());

        let from_tier = CreateContributionRequest {
            amount: None,
            tier_id: Some(Uuid::new_v4()),
            ..request()
        };
        assert!(from_tier.validate().is_ok());
    }

    #[test]
    fn test_outstanding_statuses() {
        assert!(ContributionStatus::Pending.is_outstanding());
        assert!(ContributionStatus::Overdue.is_outstanding());
        assert!(!ContributionStatus::Paid.is_outstanding());
        assert!(!ContributionStatus::Waived.is_outstanding());
    }

    #[test]
    fn test_tier_amount_may_be_zero_not_negative() {
        let mut tier = CreateTierRequest {
            name: "Honorary".to_string(),
            description: None,
            amount: Decimal::ZERO,
            currency: None,
            frequency: ContributionFrequency::Yearly,
            is_default: false,
        };
        assert!(tier.validate().is_ok());
        tier.amount = Decimal::new(-1, 0);
        assert!(tier.validate().is_err());
    }
}
