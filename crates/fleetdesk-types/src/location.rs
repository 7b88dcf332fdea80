//! Live location values

use crate::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a ride
///
/// The backend sends ride ids either as strings or as bare numbers; both
/// deserialize to the same textual id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RideId(String);

impl RideId {
    /// Wrap a non-empty ride id
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] for a blank id.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "rideId" });
        }
        Ok(Self(id))
    }

    /// The id as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RideId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        let id = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        Self::new(id).map_err(serde::de::Error::custom)
    }
}

/// Identity an admin announces on the live channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AdminId(String);

impl AdminId {
    /// Wrap a non-empty admin id
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] for a blank id.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "adminId" });
        }
        Ok(Self(id))
    }

    /// The id as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdminId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AdminId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AdminId> for String {
    fn from(value: AdminId) -> Self {
        value.0
    }
}

/// A WGS84 position, carried on the wire as `[longitude, latitude]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    /// Degrees east, -180 to 180
    pub longitude: f64,
    /// Degrees north, -90 to 90
    pub latitude: f64,
}

impl Coordinates {
    /// Validate a longitude/latitude pair
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CoordinatesOutOfRange`] for non-finite or
    /// out of range values.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ValidationError> {
        if (-180.0..=180.0).contains(&longitude) && (-90.0..=90.0).contains(&latitude) {
            Ok(Self {
                longitude,
                latitude,
            })
        } else {
            Err(ValidationError::CoordinatesOutOfRange {
                longitude,
                latitude,
            })
        }
    }
}

impl TryFrom<[f64; 2]> for Coordinates {
    type Error = ValidationError;

    fn try_from([longitude, latitude]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(longitude, latitude)
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(value: Coordinates) -> Self {
        [value.longitude, value.latitude]
    }
}

/// Most recent known position of the driver on a ride
///
/// Never persisted; a newer update for the same ride replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    /// Ride the position belongs to
    pub ride_id: RideId,
    /// Driver position
    pub coordinates: Coordinates,
    /// When this client received the position
    pub timestamp: DateTime<Utc>,
}
