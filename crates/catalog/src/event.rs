use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{DomainError, DomainResult, EventId, UserId, DirectionId};

/// An event applicants can apply to, through one of its directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub stage: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Application deadline.
    pub end_app_date: DateTime<Utc>,
    pub specialization: Option<i64>,
}

/// Writable event fields (create and full update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub stage: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub end_app_date: DateTime<Utc>,
    #[serde(default)]
    pub specialization: Option<i64>,
}

impl EventDraft {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("event name cannot be empty"));
        }
        if self.stage.trim().is_empty() {
            return Err(DomainError::validation("event stage cannot be empty"));
        }
        if self.end_date < self.start_date {
            return Err(DomainError::validation("end_date is before start_date"));
        }
        Ok(())
    }

    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            stage: self.stage,
            start_date: self.start_date,
            end_date: self.end_date,
            end_app_date: self.end_app_date,
            specialization: self.specialization,
        }
    }
}

impl Event {
    pub fn accepts_applications_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.end_app_date
    }
}

/// A track inside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction {
    pub id: DirectionId,
    pub event: EventId,
    pub name: String,
    pub description: String,
    pub leader: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub leader: Option<UserId>,
}

impl DirectionDraft {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("direction name cannot be empty"));
        }
        Ok(())
    }

    pub fn into_direction(self, id: DirectionId, event: EventId) -> Direction {
        Direction {
            id,
            event,
            name: self.name.trim().to_string(),
            description: self.description,
            leader: self.leader,
        }
    }
}
