//! Validation of share payloads into location updates.

use chrono::{DateTime, Utc};

use super::types::{CrowdLevel, LocationUpdate, SharePayload};
use crate::error::ValidationError;

/// Maximum length of `user_id` and `route`.
pub const MAX_IDENTITY_LEN: usize = 128;

/// Maximum length of `startPoint` and `destination`.
pub const MAX_LABEL_LEN: usize = 256;

/// Maximum number of path points in one update.
pub const MAX_COORDINATES: usize = 10_000;

impl SharePayload {
    /// Checks the payload and builds the record to persist.
    ///
    /// The caller supplies the server-side `id` and `timestamp`; the result
    /// is always `active`.
    pub fn validate(
        self,
        id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<LocationUpdate, ValidationError> {
        let user_id = required("user_id", self.user_id)?;
        let route = required("route", self.route)?;
        let start_point = optional("startPoint", self.start_point)?;
        let destination = optional("destination", self.destination)?;

        if self.coordinates.len() > MAX_COORDINATES {
            return Err(ValidationError::TooManyCoordinates {
                count: self.coordinates.len(),
                max: MAX_COORDINATES,
            });
        }
        if let Some((index, bad)) = self
            .coordinates
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_valid())
        {
            return Err(ValidationError::CoordinateOutOfRange {
                index,
                latitude: bad.latitude,
                longitude: bad.longitude,
            });
        }

        let crowd = match self.crowd.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                CrowdLevel::parse(raw)
                    .ok_or_else(|| ValidationError::UnknownCrowdLevel(raw.to_string()))?,
            ),
        };

        Ok(LocationUpdate {
            id,
            user_id,
            route,
            coordinates: self.coordinates,
            crowd,
            start_point,
            destination,
            active: true,
            timestamp,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => check_label(field, v.trim(), MAX_IDENTITY_LEN),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn optional(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(v) => check_label(field, v.trim(), MAX_LABEL_LEN),
        None => Ok(String::new()),
    }
}

fn check_label(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters(field));
    }
    Ok(value.to_string())
}
