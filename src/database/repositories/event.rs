//! Event repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;

use crate::models::event::{
    headcount, CreateEventRequest, Event, EventRsvp, EventStatus, RsvpRequest, UpdateEventRequest,
};
use crate::utils::errors::RivayaError;

#[derive(Clone, Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, group_id: Uuid, created_by: Uuid, request: CreateEventRequest) -> Result<Event, RivayaError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (id, group_id, title, description, event_type, status, starts_at, ends_at, location, max_attendees, is_public, requires_rsvp, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING id, group_id, title, description, event_type, status, starts_at, ends_at, location, max_attendees, is_public, requires_rsvp, created_by, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(request.title.trim())
        .bind(request.description)
        .bind(request.event_type)
        .bind(request.status.unwrap_or(EventStatus::Draft))
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.location)
        .bind(request.max_attendees)
        .bind(request.is_public)
        .bind(request.requires_rsvp)
        .bind(created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, RivayaError> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, group_id, title, description, event_type, status, starts_at, ends_at, location, max_attendees, is_public, requires_rsvp, created_by, created_at, updated_at FROM events WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Update event
    pub async fn update(&self, id: Uuid, request: UpdateEventRequest) -> Result<Event, RivayaError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                event_type = COALESCE($4, event_type),
                status = COALESCE($5, status),
                starts_at = COALESCE($6, starts_at),
                ends_at = COALESCE($7, ends_at),
                location = COALESCE($8, location),
                max_attendees = COALESCE($9, max_attendees),
                is_public = COALESCE($10, is_public),
                requires_rsvp = COALESCE($11, requires_rsvp),
                updated_at = $12
            WHERE id = $1
            RETURNING id, group_id, title, description, event_type, status, starts_at, ends_at, location, max_attendees, is_public, requires_rsvp, created_by, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.title.map(|t| t.trim().to_string()))
        .bind(request.description)
        .bind(request.event_type)
        .bind(request.status)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.location)
        .bind(request.max_attendees)
        .bind(request.is_public)
        .bind(request.requires_rsvp)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Events of a group, soonest first
    pub async fn list_for_group(
        &self,
        group_id: Uuid,
        status: Option<EventStatus>,
        upcoming_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Event>, i64), RivayaError> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, group_id, title, description, event_type, status, starts_at, ends_at, location, max_attendees, is_public, requires_rsvp, created_by, created_at, updated_at
            FROM events
            WHERE group_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND (NOT $3 OR starts_at >= NOW())
            ORDER BY starts_at ASC
            LIMIT $4 OFFSET $5
            "#
        )
        .bind(group_id)
        .bind(status)
        .bind(upcoming_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM events
            WHERE group_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND (NOT $3 OR starts_at >= NOW())
            "#
        )
        .bind(group_id)
        .bind(status)
        .bind(upcoming_only)
        .fetch_one(&self.pool)
        .await?;

        Ok((events, total.0))
    }

    /// Next published events across the groups a user belongs to
    pub async fn upcoming_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Event>, RivayaError> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT e.id, e.group_id, e.title, e.description, e.event_type, e.status, e.starts_at, e.ends_at, e.location, e.max_attendees, e.is_public, e.requires_rsvp, e.created_by, e.created_at, e.updated_at
            FROM events e
            INNER JOIN group_members gm ON gm.group_id = e.group_id
            WHERE gm.user_id = $1 AND e.status = 'published' AND e.starts_at >= NOW()
            ORDER BY e.starts_at ASC
            LIMIT $2
            "#
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Insert or replace a user's RSVP
    ///
    /// The event row is locked for the duration so concurrent confirmations
    /// cannot overbook `max_attendees`.
    pub async fn upsert_rsvp(&self, event_id: Uuid, user_id: Uuid, request: RsvpRequest) -> Result<EventRsvp, RivayaError> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>(
            "SELECT id, group_id, title, description, event_type, status, starts_at, ends_at, location, max_attendees, is_public, requires_rsvp, created_by, created_at, updated_at FROM events WHERE id = $1 FOR UPDATE"
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RivayaError::not_found("Event", event_id))?;

        if event.status != EventStatus::Published {
            return Err(RivayaError::Conflict(
                "RSVPs are only accepted for published events".to_string(),
            ));
        }

        let requested = headcount(request.status, request.plus_ones);
        if let (Some(max), true) = (event.max_attendees, requested > 0) {
            let taken: (Option<i64>,) = sqlx::query_as(
                r#"
                SELECT SUM(1 + plus_ones)::BIGINT FROM event_rsvps
                WHERE event_id = $1 AND status = 'confirmed' AND user_id <> $2
                "#
            )
            .bind(event_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

            if taken.0.unwrap_or(0) + requested > max as i64 {
                return Err(RivayaError::Conflict("Event is at capacity".to_string()));
            }
        }

        let now = Utc::now();
        let rsvp = sqlx::query_as::<_, EventRsvp>(
            r#"
            INSERT INTO event_rsvps (id, event_id, user_id, status, plus_ones, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (event_id, user_id) DO UPDATE
            SET status = EXCLUDED.status,
                plus_ones = EXCLUDED.plus_ones,
                notes = EXCLUDED.notes,
                updated_at = EXCLUDED.updated_at
            RETURNING id, event_id, user_id, status, plus_ones, notes, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(user_id)
        .bind(request.status)
        .bind(request.plus_ones)
        .bind(request.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rsvp)
    }

    /// Get all RSVPs for an event
    pub async fn list_rsvps(&self, event_id: Uuid) -> Result<Vec<EventRsvp>, RivayaError> {
        let rsvps = sqlx::query_as::<_, EventRsvp>(
            "SELECT id, event_id, user_id, status, plus_ones, notes, created_at, updated_at FROM event_rsvps WHERE event_id = $1 ORDER BY created_at ASC"
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rsvps)
    }
}
