//! Shared calendar and attendance.

use actix_web::{HttpResponse, web};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use fellowship_core::domain::{AttendOutcome, Event, EventDraft};
use fellowship_core::ports::{BaseRepository, EventRepository};
use fellowship_core::{Action, Resource};
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::{AttendanceResponse, AttendeeResponse, EventRequest};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views;

/// Longest range a single calendar query may span.
const MAX_RANGE_DAYS: i64 = 400;
/// Span assumed when only one end of the range is given.
const DEFAULT_SPAN_DAYS: i64 = 31;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// First instant of the current month and of the next one.
fn current_month(now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let (year, month) = (now.year(), now.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    Some((month_start(year, month)?, month_start(next_year, next_month)?))
}

fn resolve_range(query: &RangeQuery, now: DateTime<Utc>) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let span = Duration::days(DEFAULT_SPAN_DAYS);
    let out_of_range = || AppError::BadRequest("date out of range".to_string());
    let (from, to) = match (query.from, query.to) {
        (Some(from), Some(to)) => (from, to),
        (Some(from), None) => (from, from.checked_add_signed(span).ok_or_else(out_of_range)?),
        (None, Some(to)) => (to.checked_sub_signed(span).ok_or_else(out_of_range)?, to),
        (None, None) => current_month(now)
            .ok_or_else(|| AppError::Internal("calendar month out of range".to_string()))?,
    };

    if to <= from {
        return Err(AppError::BadRequest("`to` must be after `from`".to_string()));
    }
    if to.signed_duration_since(from) > Duration::days(MAX_RANGE_DAYS) {
        return Err(AppError::BadRequest(format!(
            "range may span at most {MAX_RANGE_DAYS} days"
        )));
    }
    Ok((from, to))
}

fn draft_from(req: EventRequest) -> Result<EventDraft, AppError> {
    Ok(EventDraft {
        title: req.title,
        description: req.description,
        location: req.location,
        latitude: req.latitude,
        longitude: req.longitude,
        starts_at: req.starts_at,
        ends_at: req.ends_at,
        max_attendees: req.max_attendees,
    }
    .validated()?)
}

async fn load_event(state: &AppState, id: Uuid) -> AppResult<Event> {
    state
        .events
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

/// GET /api/events
pub async fn list(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<RangeQuery>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Event, Action::Read)
        .await?;
    let (from, to) = resolve_range(&query, Utc::now())?;

    let events = state.events.list_between(from, to).await?;
    let mut items = Vec::with_capacity(events.len());
    for event in events {
        let attending = state.events.is_attending(event.id, identity.user_id).await?;
        items.push(views::event(event, attending));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::ok(items)))
}

/// POST /api/events
pub async fn create(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<EventRequest>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Event, Action::Create)
        .await?;

    let draft = draft_from(body.into_inner())?;
    let event = state.events.save(Event::new(identity.user_id, draft)).await?;
    tracing::info!(event_id = %event.id, created_by = %event.created_by, starts_at = %event.starts_at, "Event created");

    if let Err(e) = state.notifier.announce_event(&event).await {
        tracing::warn!(error = %e, event_id = %event.id, "Event broadcast not queued");
    }

    Ok(HttpResponse::Created().json(ApiResponse::ok(views::event(event, false))))
}

/// GET /api/events/{id}
pub async fn get(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Event, Action::Read)
        .await?;
    let event = load_event(&state, path.into_inner()).await?;
    let attending = state.events.is_attending(event.id, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::event(event, attending))))
}

/// PUT /api/events/{id}
pub async fn update(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<EventRequest>,
) -> AppResult<HttpResponse> {
    let mut event = load_event(&state, path.into_inner()).await?;
    state
        .authorizer
        .require_owner_or_moderator(&identity, event.created_by, Resource::Event, Action::Update, event.id)
        .await?;

    event.revise(draft_from(body.into_inner())?)?;
    let event = state.events.save(event).await?;
    let attending = state.events.is_attending(event.id, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::event(event, attending))))
}

/// DELETE /api/events/{id}
pub async fn delete(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let event = load_event(&state, path.into_inner()).await?;
    state
        .authorizer
        .require_owner_or_moderator(&identity, event.created_by, Resource::Event, Action::Delete, event.id)
        .await?;

    state.events.delete(event.id).await?;
    tracing::info!(event_id = %event.id, deleted_by = %identity.user_id, "Event deleted");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Event deleted")))
}

/// POST /api/events/{id}/attendance
pub async fn attend(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Event, Action::Attend)
        .await?;
    let event = load_event(&state, path.into_inner()).await?;
    if event.ends_at < Utc::now() {
        return Err(AppError::BadRequest("Event has already ended".to_string()));
    }

    match state.events.attend(event.id, identity.user_id).await? {
        AttendOutcome::Joined(count) => Ok(HttpResponse::Ok().json(ApiResponse::ok(
            AttendanceResponse {
                attending: true,
                attendee_count: count,
            },
        ))),
        AttendOutcome::AlreadyAttending => {
            Err(AppError::Conflict("Already attending this event".to_string()))
        }
        AttendOutcome::Full => Err(AppError::Conflict("Event is full".to_string())),
    }
}

/// DELETE /api/events/{id}/attendance
pub async fn cancel(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Event, Action::Attend)
        .await?;
    let id = path.into_inner();

    if !state.events.cancel_attendance(id, identity.user_id).await? {
        return Err(AppError::NotFound("Not attending this event".to_string()));
    }
    let event = load_event(&state, id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(AttendanceResponse {
        attending: false,
        attendee_count: event.attendee_count,
    })))
}

/// GET /api/events/{id}/attendees
pub async fn attendees(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Event, Action::Read)
        .await?;
    let event = load_event(&state, path.into_inner()).await?;

    let mut attendees = Vec::new();
    for user_id in state.events.attendees(event.id).await? {
        if let Some(user) = state.users.find_by_id(user_id).await? {
            attendees.push(AttendeeResponse {
                user_id,
                display_name: user.display_name,
            });
        }
    }
    Ok(HttpResponse::Ok().json(ApiResponse::ok(attendees)))
}


#[cfg(test)]
mod range_tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_range_is_current_month() {
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 10, 0, 0).unwrap();
        let (from, to) = resolve_range(&RangeQuery { from: None, to: None }, now).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_range_validation() {
        let now = Utc::now();
        let backwards = RangeQuery {
            from: Some(now),
            to: Some(now - Duration::days(1)),
        };
        assert!(resolve_range(&backwards, now).is_err());

        let huge = RangeQuery {
            from: Some(now),
            to: Some(now + Duration::days(MAX_RANGE_DAYS + 1)),
        };
        assert!(resolve_range(&huge, now).is_err());

        let open = RangeQuery {
            from: Some(now),
            to: None,
        };
        let (_, to) = resolve_range(&open, now).unwrap();
        assert_eq!(to - now, Duration::days(DEFAULT_SPAN_DAYS));
    }

    #[test]
    fn test_open_range_at_calendar_limits() {
        let latest: DateTime<Utc> = serde_json::from_str("\"+262142-12-31T00:00:00Z\"").unwrap();
        let from_only = RangeQuery {
            from: Some(latest),
            to: None,
        };
        assert!(matches!(
            resolve_range(&from_only, Utc::now()),
            Err(AppError::BadRequest(_))
        ));

        let to_only = RangeQuery {
            from: None,
            to: Some(DateTime::<Utc>::MIN_UTC),
        };
        assert!(matches!(
            resolve_range(&to_only, Utc::now()),
            Err(AppError::BadRequest(_))
        ));
    }
}
