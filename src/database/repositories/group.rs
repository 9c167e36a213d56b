//! Group repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;

use crate::models::group::{
    CreateGroupRequest, Group, GroupMember, GroupRole, GroupStatus, GroupType, MemberProfile,
    UpdateGroupRequest,
};
use crate::utils::errors::RivayaError;

#[derive(Clone, Debug)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a group and its owner membership in one transaction
    pub async fn create_with_owner(
        &self,
        owner_id: Uuid,
        request: CreateGroupRequest,
        currency: String,
    ) -> Result<Group, RivayaError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (id, name, description, group_type, is_public, status, currency, max_members, settings, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'active', $6, $7, $8, $9, $10, $10)
            RETURNING id, name, description, group_type, is_public, status, currency, max_members, settings, owner_id, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(request.description)
        .bind(request.group_type)
        .bind(request.is_public)
        .bind(currency)
        .bind(request.max_members)
        .bind(request.settings.unwrap_or_else(|| serde_json::json!({})))
        .bind(owner_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO group_members (id, group_id, user_id, role, joined_at) VALUES ($1, $2, $3, 'owner', $4)"
        )
        .bind(Uuid::new_v4())
        .bind(group.id)
        .bind(owner_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(group)
    }

    /// Find group by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, RivayaError> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, name, description, group_type, is_public, status, currency, max_members, settings, owner_id, created_at, updated_at FROM groups WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    /// Update group
    pub async fn update(&self, id: Uuid, request: UpdateGroupRequest) -> Result<Group, RivayaError> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_public = COALESCE($4, is_public),
                status = COALESCE($5, status),
                max_members = COALESCE($6, max_members),
                settings = COALESCE($7, settings),
                updated_at = $8
            WHERE id = $1
            RETURNING id, name, description, group_type, is_public, status, currency, max_members, settings, owner_id, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.name.map(|n| n.trim().to_string()))
        .bind(request.description)
        .bind(request.is_public)
        .bind(request.status)
        .bind(request.max_members)
        .bind(request.settings)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(group)
    }

    /// Set a group's status
    pub async fn set_status(&self, id: Uuid, status: GroupStatus) -> Result<Group, RivayaError> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, name, description, group_type, is_public, status, currency, max_members, settings, owner_id, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(group)
    }

    /// Groups a user belongs to, most recently joined first
    pub async fn list_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Group>, RivayaError> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.description, g.group_type, g.is_public, g.status, g.currency, g.max_members, g.settings, g.owner_id, g.created_at, g.updated_at
            FROM groups g
            INNER JOIN group_members gm ON g.id = gm.group_id
            WHERE gm.user_id = $1 AND g.status <> 'archived'
            ORDER BY gm.joined_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, RivayaError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM groups g
            INNER JOIN group_members gm ON g.id = gm.group_id
            WHERE gm.user_id = $1 AND g.status <> 'archived'
            "#
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// Public active groups whose name contains `query`
    pub async fn search_public(
        &self,
        query: Option<&str>,
        group_type: Option<GroupType>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Group>, i64), RivayaError> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));

        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, description, group_type, is_public, status, currency, max_members, settings, owner_id, created_at, updated_at
            FROM groups
            WHERE is_public = TRUE AND status = 'active'
              AND ($1::text IS NULL OR lower(name) LIKE $1)
              AND ($2::text IS NULL OR group_type = $2)
            ORDER BY name ASC
            LIMIT $3 OFFSET $4
            "#
        )
        .bind(&pattern)
        .bind(group_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM groups
            WHERE is_public = TRUE AND status = 'active'
              AND ($1::text IS NULL OR lower(name) LIKE $1)
              AND ($2::text IS NULL OR group_type = $2)
            "#
        )
        .bind(&pattern)
        .bind(group_type)
        .fetch_one(&self.pool)
        .await?;

        Ok((groups, total.0))
    }

    /// Count group members
    pub async fn member_count(&self, group_id: Uuid) -> Result<i64, RivayaError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM group_members WHERE group_id = $1")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Membership of a user in a group, if any
    pub async fn find_member(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupMember>, RivayaError> {
        let member = sqlx::query_as::<_, GroupMember>(
            "SELECT id, group_id, user_id, role, tier_id, joined_at FROM group_members WHERE group_id = $1 AND user_id = $2"
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    /// Get group members with their profiles
    pub async fn list_members(&self, group_id: Uuid) -> Result<Vec<MemberProfile>, RivayaError> {
        let members = sqlx::query_as::<_, MemberProfile>(
            r#"
            SELECT gm.user_id, u.email, u.full_name, gm.role, gm.tier_id, gm.joined_at
            FROM group_members gm
            INNER JOIN users u ON u.id = gm.user_id
            WHERE gm.group_id = $1
            ORDER BY gm.joined_at ASC
            "#
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Add member to group, enforcing `max_members` under a lock on the group row
    pub async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
        tier_id: Option<Uuid>,
    ) -> Result<GroupMember, RivayaError> {
        let mut tx = self.pool.begin().await?;

        let max_members: Option<(Option<i32>,)> =
            sqlx::query_as("SELECT max_members FROM groups WHERE id = $1 FOR UPDATE")
                .bind(group_id)
                .fetch_optional(&mut *tx)
                .await?;
        let max_members = max_members
            .ok_or_else(|| RivayaError::not_found("Group", group_id))?
            .0;

        if let Some(max) = max_members {
            let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM group_members WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&mut *tx)
                .await?;
            if count.0 >= max as i64 {
                return Err(RivayaError::Conflict("Group is full".to_string()));
            }
        }

        let member = sqlx::query_as::<_, GroupMember>(
            r#"
            INSERT INTO group_members (id, group_id, user_id, role, tier_id, joined_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (group_id, user_id) DO NOTHING
            RETURNING id, group_id, user_id, role, tier_id, joined_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .bind(tier_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RivayaError::Conflict("User is already a member of this group".to_string()))?;

        tx.commit().await?;
        Ok(member)
    }

    /// Update member role and tier
    pub async fn update_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: Option<GroupRole>,
        tier_id: Option<Uuid>,
    ) -> Result<GroupMember, RivayaError> {
        let member = sqlx::query_as::<_, GroupMember>(
            r#"
            UPDATE group_members
            SET role = COALESCE($3, role),
                tier_id = COALESCE($4, tier_id)
            WHERE group_id = $1 AND user_id = $2
            RETURNING id, group_id, user_id, role, tier_id, joined_at
            "#
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .bind(tier_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RivayaError::not_found("Member", user_id))?;

        Ok(member)
    }

    /// Remove member from group
    pub async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, RivayaError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Escape `LIKE` wildcards in user input
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
