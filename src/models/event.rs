//! Event model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;

pub const MAX_PLUS_ONES: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Meeting,
    Gathering,
    Celebration,
    Workshop,
    Trip,
    Fundraiser,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
    Postponed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Confirmed,
    Declined,
    Maybe,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub status: EventStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub max_attendees: Option<i32>,
    pub is_public: bool,
    pub requires_rsvp: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventRsvp {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: RsvpStatus,
    pub plus_ones: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRsvp {
    /// Seats this response takes from the event's capacity
    pub fn headcount(&self) -> i64 {
        headcount(self.status, self.plus_ones)
    }
}

pub fn headcount(status: RsvpStatus, plus_ones: i32) -> i64 {
    match status {
        RsvpStatus::Confirmed => 1 + plus_ones as i64,
        RsvpStatus::Declined | RsvpStatus::Maybe => 0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: EventType,
    pub status: Option<EventStatus>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub max_attendees: Option<i32>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub requires_rsvp: bool,
}

fn default_event_type() -> EventType {
    EventType::Other
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<()> {
        helpers::require_length("Title", &self.title, 1, 200)?;
        helpers::optional_max_length("Description", self.description.as_deref(), 2000)?;
        helpers::optional_max_length("Location", self.location.as_deref(), 300)?;
        validate_window(self.starts_at, self.ends_at)?;
        validate_capacity(self.max_attendees)?;
        if matches!(self.status, Some(EventStatus::Cancelled) | Some(EventStatus::Completed)) {
            return Err(RivayaError::Validation(
                "New events must be draft or published".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub max_attendees: Option<i32>,
    pub is_public: Option<bool>,
    pub requires_rsvp: Option<bool>,
}

impl UpdateEventRequest {
    /// Validate against the event being updated
    pub fn validate(&self, current: &Event) -> Result<()> {
        if let Some(title) = &self.title {
            helpers::require_length("Title", title, 1, 200)?;
        }
        helpers::optional_max_length("Description", self.description.as_deref(), 2000)?;
        validate_window(
            self.starts_at.unwrap_or(current.starts_at),
            self.ends_at.unwrap_or(current.ends_at),
        )?;
        validate_capacity(self.max_attendees)?;
        if current.status == EventStatus::Cancelled {
            return Err(RivayaError::InvalidStateTransition {
                from: "cancelled".to_string(),
                to: "updated".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if ends_at < starts_at {
        return Err(RivayaError::Validation(
            "End time must be after or equal to start time".to_string(),
        ));
    }
    Ok(())
}

fn validate_capacity(max_attendees: Option<i32>) -> Result<()> {
    match max_attendees {
        Some(n) if n < 1 => Err(RivayaError::Validation(
            "Max attendees must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpRequest {
    pub status: RsvpStatus,
    #[serde(default)]
    pub plus_ones: i32,
    pub notes: Option<String>,
}

impl RsvpRequest {
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_PLUS_ONES).contains(&self.plus_ones) {
            return Err(RivayaError::Validation(format!(
                "Plus ones must be between 0 and {}",
                MAX_PLUS_ONES
            )));
        }
        helpers::optional_max_length("Notes", self.notes.as_deref(), 500)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventListQuery {
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub upcoming: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Response tallies for an event
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RsvpSummary {
    pub confirmed_headcount: i64,
    pub confirmed: i64,
    pub declined: i64,
    pub maybe: i64,
}

impl RsvpSummary {
    pub fn from_rsvps(rsvps: &[EventRsvp]) -> Self {
        rsvps.iter().fold(Self::default(), |mut summary, rsvp| {
            match rsvp.status {
                RsvpStatus::Confirmed => summary.confirmed += 1,
                RsvpStatus::Declined => summary.declined += 1,
                RsvpStatus::Maybe => summary.maybe += 1,
            }
            summary.confirmed_headcount += rsvp.headcount();
            summary
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpList {
    pub rsvps: Vec<EventRsvp>,
    pub summary: RsvpSummary,
}
