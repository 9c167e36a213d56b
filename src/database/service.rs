//! Database service layer
//!
//! This module provides a high-level interface to database operations

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::database::{
    ContributionRepository, DatabasePool, EventRepository, GroupRepository, MediaRepository,
    PaymentRepository, UserRepository,
};
use crate::database::repositories::contribution::NewContribution;
use crate::models::*;
use crate::utils::errors::RivayaError;
use crate::utils::helpers;

const DASHBOARD_GROUPS: i64 = 50;
const DASHBOARD_EVENTS: i64 = 10;

/// Everything the home screen needs for one user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDashboard {
    pub user: User,
    pub groups: Vec<Group>,
    pub upcoming_events: Vec<Event>,
    pub outstanding_contributions: Vec<Contribution>,
}

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: DatabasePool,
    pub users: UserRepository,
    pub groups: GroupRepository,
    pub events: EventRepository,
    pub contributions: ContributionRepository,
    pub payments: PaymentRepository,
    pub media: MediaRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            groups: GroupRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            contributions: ContributionRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            media: MediaRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Get user's dashboard data
    pub async fn get_user_dashboard(&self, user_id: Uuid) -> Result<UserDashboard, RivayaError> {
        let user = self.users.find_by_id(user_id).await?
            .ok_or_else(|| RivayaError::not_found("User", user_id))?;

        let groups = self.groups.list_for_user(user_id, DASHBOARD_GROUPS, 0).await?;
        let upcoming_events = self.events.upcoming_for_user(user_id, DASHBOARD_EVENTS).await?;
        let outstanding_contributions = self.contributions.outstanding_for_user(user_id).await?;

        Ok(UserDashboard {
            user,
            groups,
            upcoming_events,
            outstanding_contributions,
        })
    }

    /// Load a group, failing with 404 when it does not exist
    pub async fn get_group(&self, group_id: Uuid) -> Result<Group, RivayaError> {
        self.groups.find_by_id(group_id).await?
            .ok_or_else(|| RivayaError::not_found("Group", group_id))
    }

    /// Load a group and the caller's membership in it
    pub async fn require_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(Group, GroupMember), RivayaError> {
        let group = self.get_group(group_id).await?;
        let member = self.groups.find_member(group_id, user_id).await?
            .ok_or_else(|| RivayaError::PermissionDenied("You are not a member of this group".to_string()))?;

        Ok((group, member))
    }

    /// Like [`require_member`](Self::require_member), also checking the member's role
    pub async fn authorize(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        permission: GroupPermission,
    ) -> Result<(Group, GroupMember), RivayaError> {
        let (group, member) = self.require_member(group_id, user_id).await?;
        if !member.role.allows(permission) {
            return Err(RivayaError::PermissionDenied(format!(
                "Role {} may not perform this action",
                member.role.as_str()
            )));
        }

        Ok((group, member))
    }

    /// Create a group owned by `owner_id`
    pub async fn create_group(&self, owner_id: Uuid, request: CreateGroupRequest) -> Result<Group, RivayaError> {
        request.validate()?;
        let currency = helpers::normalize_currency(request.currency.as_deref().unwrap_or("USD"))?;

        self.groups.create_with_owner(owner_id, request, currency).await
    }

    /// Group details as seen by `viewer`; private groups are visible to members only
    pub async fn group_details(&self, group_id: Uuid, viewer: Uuid) -> Result<GroupDetails, RivayaError> {
        let group = self.get_group(group_id).await?;
        let membership = self.groups.find_member(group_id, viewer).await?;

        if membership.is_none() && !(group.is_public && group.status == GroupStatus::Active) {
            return Err(RivayaError::not_found("Group", group_id));
        }

        let member_count = self.groups.member_count(group_id).await?;
        Ok(GroupDetails {
            group,
            member_count,
            my_role: membership.map(|m| m.role),
        })
    }

    /// Add an existing user to a group by email
    pub async fn add_member_by_email(&self, group_id: Uuid, actor: Uuid, request: AddMemberRequest) -> Result<GroupMember, RivayaError> {
        self.authorize(group_id, actor, GroupPermission::ManageMembers).await?;
        if request.role == GroupRole::Owner {
            return Err(RivayaError::Validation("The owner role cannot be assigned".to_string()));
        }
        if let Some(tier_id) = request.tier_id {
            self.require_group_tier(group_id, tier_id).await?;
        }

        let email = helpers::normalize_email(&request.email);
        let user = self.users.find_by_email(&email).await?
            .ok_or_else(|| RivayaError::not_found("User", &email))?;

        self.groups.add_member(group_id, user.id, request.role, request.tier_id).await
    }

    /// Change a member's role or tier
    pub async fn update_member(
        &self,
        group_id: Uuid,
        actor: Uuid,
        target: Uuid,
        request: UpdateMemberRequest,
    ) -> Result<GroupMember, RivayaError> {
        self.authorize(group_id, actor, GroupPermission::ManageMembers).await?;
        let current = self.groups.find_member(group_id, target).await?
            .ok_or_else(|| RivayaError::not_found("Member", target))?;

        if request.role == Some(GroupRole::Owner) {
            return Err(RivayaError::Validation("The owner role cannot be assigned".to_string()));
        }
        if current.role == GroupRole::Owner && request.role.is_some() {
            return Err(RivayaError::PermissionDenied("The group owner cannot be demoted".to_string()));
        }
        if let Some(tier_id) = request.tier_id {
            self.require_group_tier(group_id, tier_id).await?;
        }

        self.groups.update_member(group_id, target, request.role, request.tier_id).await
    }

    /// Remove a member; the owner can never be removed
    pub async fn remove_member(&self, group_id: Uuid, actor: Uuid, target: Uuid) -> Result<(), RivayaError> {
        self.authorize(group_id, actor, GroupPermission::ManageMembers).await?;
        let member = self.groups.find_member(group_id, target).await?
            .ok_or_else(|| RivayaError::not_found("Member", target))?;

        if member.role == GroupRole::Owner {
            return Err(RivayaError::PermissionDenied("The group owner cannot be removed".to_string()));
        }

        self.groups.remove_member(group_id, target).await?;
        Ok(())
    }

    /// Join a public, active group
    pub async fn join_group(&self, group_id: Uuid, user_id: Uuid) -> Result<GroupMember, RivayaError> {
        let group = self.get_group(group_id).await?;
        if !group.is_public || group.status != GroupStatus::Active {
            return Err(RivayaError::PermissionDenied("This group is not open for joining".to_string()));
        }

        let default_tier = self.contributions.list_tiers(group_id).await?
            .into_iter()
            .find(|t| t.is_default)
            .map(|t| t.id);

        self.groups.add_member(group_id, user_id, GroupRole::Member, default_tier).await
    }

    /// Leave a group; the owner must stay
    pub async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> Result<(), RivayaError> {
        let (_, member) = self.require_member(group_id, user_id).await?;
        if member.role == GroupRole::Owner {
            return Err(RivayaError::Conflict("The group owner cannot leave the group".to_string()));
        }

        self.groups.remove_member(group_id, user_id).await?;
        Ok(())
    }

    /// Create a contribution for a group member, defaulting amount and currency
    pub async fn create_contribution(&self, group: &Group, request: CreateContributionRequest) -> Result<Contribution, RivayaError> {
        request.validate()?;

        if self.groups.find_member(group.id, request.member_id).await?.is_none() {
            return Err(RivayaError::Validation("The member does not belong to this group".to_string()));
        }

        let tier = match request.tier_id {
            Some(tier_id) => Some(self.require_group_tier(group.id, tier_id).await?),
            None => None,
        };

        let amount = match (request.amount, &tier) {
            (Some(amount), _) => amount,
            (None, Some(tier)) => tier.amount,
            (None, None) => {
                return Err(RivayaError::Validation("Either an amount or a tier is required".to_string()))
            }
        };
        contribution::validate_positive_amount(amount)?;

        let currency = match (&request.currency, &tier) {
            (Some(currency), _) => helpers::normalize_currency(currency)?,
            (None, Some(tier)) => tier.currency.clone(),
            (None, None) => group.currency.clone(),
        };

        self.contributions
            .create(NewContribution {
                group_id: group.id,
                member_id: request.member_id,
                tier_id: request.tier_id,
                period: request.period,
                amount,
                currency,
                due_date: request.due_date,
                notes: request.notes,
            })
            .await
    }

    /// Mark every pending contribution due before `today` as overdue
    pub async fn mark_overdue_contributions(&self, today: NaiveDate) -> Result<u64, RivayaError> {
        self.contributions.mark_overdue(today).await
    }

    async fn require_group_tier(&self, group_id: Uuid, tier_id: Uuid) -> Result<ContributionTier, RivayaError> {
        self.contributions.find_tier(tier_id).await?
            .filter(|t| t.group_id == group_id)
            .ok_or_else(|| RivayaError::not_found("Contribution tier", tier_id))
    }
}
