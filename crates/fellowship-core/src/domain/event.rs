use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::check_length;
use crate::error::DomainError;

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 2000;
pub const LOCATION_MAX: usize = 200;

/// User-editable part of a calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_attendees: Option<i32>,
}

impl EventDraft {
    pub fn validated(mut self) -> Result<Self, DomainError> {
        self.title = self.title.trim().to_string();
        self.location = self.location.trim().to_string();
        check_length("title", &self.title, 1, TITLE_MAX)?;
        check_length("description", &self.description, 0, DESCRIPTION_MAX)?;
        check_length("location", &self.location, 0, LOCATION_MAX)?;

        match (self.latitude, self.longitude) {
            (None, None) => {}
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                    return Err(DomainError::validation("coordinates out of range"));
                }
            }
            _ => {
                return Err(DomainError::validation(
                    "latitude and longitude must be given together",
                ));
            }
        }

        if self.ends_at < self.starts_at {
            return Err(DomainError::validation("event cannot end before it starts"));
        }
        if matches!(self.max_attendees, Some(n) if n <= 0) {
            return Err(DomainError::validation("max_attendees must be positive"));
        }
        Ok(self)
    }
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            latitude: event.latitude,
            longitude: event.longitude,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            max_attendees: event.max_attendees,
        }
    }
}

/// Event entity - an entry in the shared calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_attendees: Option<i32>,
    pub attendee_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(created_by: Uuid, draft: EventDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            location: draft.location,
            latitude: draft.latitude,
            longitude: draft.longitude,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            max_attendees: draft.max_attendees,
            attendee_count: 0,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable fields. Lowering capacity below the current
    /// attendance is rejected rather than evicting anyone.
    pub fn revise(&mut self, draft: EventDraft) -> Result<(), DomainError> {
        if matches!(draft.max_attendees, Some(max) if max < self.attendee_count) {
            return Err(DomainError::validation(format!(
                "max_attendees cannot be lower than the {} people already attending",
                self.attendee_count
            )));
        }
        self.title = draft.title;
        self.description = draft.description;
        self.location = draft.location;
        self.latitude = draft.latitude;
        self.longitude = draft.longitude;
        self.starts_at = draft.starts_at;
        self.ends_at = draft.ends_at;
        self.max_attendees = draft.max_attendees;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn has_capacity(&self) -> bool {
        self.max_attendees
            .map(|max| self.attendee_count < max)
            .unwrap_or(true)
    }

    /// Whether the event overlaps the half-open range `[from, to)`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.starts_at < to && self.ends_at >= from
    }
}

/// Result of an attendance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendOutcome {
    /// Joined; carries the new attendee count.
    Joined(i32),
    AlreadyAttending,
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> EventDraft {
        let start = Utc::now() + Duration::days(1);
        EventDraft {
            title: "Youth retreat".into(),
            description: String::new(),
            location: "Camp".into(),
            latitude: None,
            longitude: None,
            starts_at: start,
            ends_at: start + Duration::hours(3),
            max_attendees: Some(2),
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validated().is_ok());
    }

    #[test]
    fn test_end_before_start() {
        let mut d = draft();
        d.ends_at = d.starts_at - Duration::minutes(1);
        assert!(d.validated().is_err());
    }

    #[test]
    fn test_coordinates_must_pair() {
        let mut d = draft();
        d.latitude = Some(37.5);
        assert!(d.clone().validated().is_err());
        d.longitude = Some(127.0);
        assert!(d.clone().validated().is_ok());
        d.longitude = Some(200.0);
        assert!(d.validated().is_err());
    }

    #[test]
    fn test_capacity() {
        let mut d = draft();
        d.max_attendees = Some(0);
        assert!(d.validated().is_err());

        let mut event = Event::new(Uuid::new_v4(), draft());
        assert!(event.has_capacity());
        event.attendee_count = 2;
        assert!(!event.has_capacity());

        let mut smaller = draft();
        smaller.max_attendees = Some(1);
        assert!(event.revise(smaller).is_err());
    }

    #[test]
    fn test_overlaps() {
        let event = Event::new(Uuid::new_v4(), draft());
        let day_start = event.starts_at - Duration::hours(1);
        assert!(event.overlaps(day_start, day_start + Duration::days(1)));
        assert!(!event.overlaps(event.ends_at + Duration::hours(1), event.ends_at + Duration::days(1)));
    }
}
