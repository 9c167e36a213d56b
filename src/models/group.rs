//! Group and membership models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Family,
    Alumni,
    Sacco,
    Friends,
    Business,
    Community,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Active,
    Inactive,
    Archived,
    Suspended,
}

/// Role of a user inside one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Owner,
    Admin,
    Treasurer,
    Secretary,
    Member,
}

/// What a group role is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupPermission {
    View,
    ManageGroup,
    ManageMembers,
    ManageEvents,
    ManageFinances,
    Archive,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Owner => "owner",
            GroupRole::Admin => "admin",
            GroupRole::Treasurer => "treasurer",
            GroupRole::Secretary => "secretary",
            GroupRole::Member => "member",
        }
    }

    pub fn allows(&self, permission: GroupPermission) -> bool {
        use GroupPermission::*;

        match self {
            GroupRole::Owner => true,
            GroupRole::Admin => !matches!(permission, Archive),
            GroupRole::Treasurer => matches!(permission, View | ManageFinances),
            GroupRole::Secretary => matches!(permission, View | ManageEvents),
            GroupRole::Member => matches!(permission, View),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub group_type: GroupType,
    pub is_public: bool,
    pub status: GroupStatus,
    pub currency: String,
    pub max_members: Option<i32>,
    pub settings: serde_json::Value,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRole,
    pub tier_id: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
}

/// Member row joined with the user's public profile
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: GroupRole,
    pub tier_id: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub group_type: GroupType,
    #[serde(default)]
    pub is_public: bool,
    pub currency: Option<String>,
    pub max_members: Option<i32>,
    pub settings: Option<serde_json::Value>,
}

impl CreateGroupRequest {
    pub fn validate(&self) -> Result<()> {
        helpers::require_length("Group name", &self.name, 1, 100)?;
        helpers::optional_max_length("Description", self.description.as_deref(), 500)?;
        validate_max_members(self.max_members)?;
        if let Some(currency) = &self.currency {
            helpers::normalize_currency(currency)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub status: Option<GroupStatus>,
    pub max_members: Option<i32>,
    pub settings: Option<serde_json::Value>,
}

impl UpdateGroupRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            helpers::require_length("Group name", name, 1, 100)?;
        }
        helpers::optional_max_length("Description", self.description.as_deref(), 500)?;
        validate_max_members(self.max_members)?;
        if self.status == Some(GroupStatus::Archived) {
            return Err(RivayaError::Validation(
                "Use DELETE to archive a group".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_max_members(max_members: Option<i32>) -> Result<()> {
    match max_members {
        Some(n) if !(1..=10_000).contains(&n) => Err(RivayaError::Validation(
            "Max members must be between 1 and 10000".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupSearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub group_type: Option<GroupType>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub email: String,
    #[serde(default = "default_member_role")]
    pub role: GroupRole,
    pub tier_id: Option<Uuid>,
}

fn default_member_role() -> GroupRole {
    GroupRole::Member
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    pub role: Option<GroupRole>,
    pub tier_id: Option<Uuid>,
}

/// Group plus the caller's role in it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub member_count: i64,
    pub my_role: Option<GroupRole>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use GroupPermission::*;

    #[test]
    fn test_role_permissions() {
        assert!(GroupRole::Owner.allows(Archive));
        assert!(!GroupRole::Admin.allows(Archive));
        assert!(GroupRole::Admin.allows(ManageMembers));
        assert!(GroupRole::Admin.allows(ManageFinances));
        assert!(GroupRole::Treasurer.allows(ManageFinances));
        assert!(!GroupRole::Treasurer.allows(ManageEvents));
        assert!(GroupRole::Secretary.allows(ManageEvents));
        assert!(!GroupRole::Secretary.allows(ManageMembers));
        assert!(GroupRole::Member.allows(View));
        assert!(!GroupRole::Member.allows(ManageGroup));
    }

    #[test]
    fn test_create_group_validation() {
        let mut request = CreateGroupRequest {
            name: "Kamau Family".to_string(),
            description: None,
            group_type: GroupType::Family,
            is_public: false,
            currency: Some("kes".to_string()),
            max_members: Some(50),
            settings: None,
        };
        assert!(request.validate().is_ok());

        request.max_members = Some(0);
        assert!(request.validate().is_err());

        request.max_members = None;
        request.name = " ".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_add_member_defaults_to_member_role() {
        let request: AddMemberRequest =
            serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert_eq!(request.role, GroupRole::Member);

        let request: AddMemberRequest =
            serde_json::from_str(r#"{"email":"a@b.co","role":"treasurer"}"#).unwrap();
        assert_eq!(request.role, GroupRole::Treasurer);
    }
}
