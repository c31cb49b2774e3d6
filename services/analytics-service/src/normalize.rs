use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{Event, EventPayload};

pub fn validate_and_normalize(payload: EventPayload) -> Result<Event, ValidationError> {
    normalize_at(payload, unix_now())
}

/// Checks the payload and enriches it into an [`Event`] stamped with `now`.
///
/// A new id is drawn on every call. When the client sent no installation id
/// (or an empty one) the new id doubles as the installation id, so the client
/// can reuse it on later events.
pub fn normalize_at(payload: EventPayload, now: i64) -> Result<Event, ValidationError> {
    let event_type = payload
        .event_type
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::EmptyEventType)?;
    // Text columns cannot hold NUL, catch it here instead of at insert time.
    if event_type.contains('\0') {
        return Err(ValidationError::NulCharacter("event type"));
    }
    if let Some(value) = &payload.installation_id {
        if value.contains('\0') {
            return Err(ValidationError::NulCharacter("installation id"));
        }
    }

    let id = Uuid::new_v4();
    let installation_id = match payload.installation_id {
        Some(value) if !value.is_empty() => value,
        _ => id.to_string(),
    };

    Ok(Event {
        id,
        installation_id,
        event_type,
        meta: payload.meta,
        created_at: payload.created_at,
        stored_at: now,
    })
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
