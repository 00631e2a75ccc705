//! Data types for shared journeys.
//!
//! Defines the location update that is persisted, queried and broadcast,
//! plus the ingestion payload it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// A single point on a shared path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// How full the vehicle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdLevel {
    Low,
    Medium,
    High,
}

impl CrowdLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdLevel::Low => "low",
            CrowdLevel::Medium => "medium",
            CrowdLevel::High => "high",
        }
    }

    /// Parses a crowd level, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(CrowdLevel::Low),
            "medium" => Some(CrowdLevel::Medium),
            "high" => Some(CrowdLevel::High),
            _ => None,
        }
    }
}

/// A persisted, broadcastable location update.
///
/// Created once by ingestion and never mutated afterwards: `active` is always
/// `true` and `timestamp` is always assigned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Server-generated UUID.
    pub id: String,

    /// Publishing vehicle or session.
    pub user_id: String,

    /// Route label (e.g. "R12").
    pub route: String,

    /// Path points in travel order.
    pub coordinates: Vec<Coordinate>,

    /// Occupancy, if the publisher reported it.
    pub crowd: Option<CrowdLevel>,

    #[serde(rename = "startPoint")]
    pub start_point: String,

    pub destination: String,

    pub active: bool,

    /// When the server accepted this update.
    pub timestamp: DateTime<Utc>,
}

/// Client-supplied body of a share request.
///
/// Every field is optional at decode time so that missing fields are reported
/// as validation errors rather than decoding failures. `id`, `active` and
/// `timestamp` are deliberately absent; clients cannot set them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SharePayload {
    pub user_id: Option<String>,
    pub route: Option<String>,
    pub coordinates: Vec<Coordinate>,
    pub crowd: Option<String>,
    #[serde(rename = "startPoint")]
    pub start_point: Option<String>,
    pub destination: Option<String>,
}

/// Hands out non-decreasing timestamps.
///
/// Wall-clock steps backwards are absorbed by repeating the last value.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    fn observe(&self, candidate: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let next = match *last {
            Some(previous) if previous > candidate => previous,
            _ => candidate,
        };
        *last = Some(next);
        next
    }
}
