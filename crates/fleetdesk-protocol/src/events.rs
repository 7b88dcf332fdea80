//! Typed events of the live location channel

use crate::{FrameError, Packet};
use chrono::{DateTime, Utc};
use fleetdesk_types::{AdminId, Coordinates, LocationUpdate, RideId};
use serde::Deserialize;
use serde_json::{Value, json};

/// Event names used on the channel
pub mod names {
    /// Outbound: announce an admin observer
    pub const REGISTER_ADMIN: &str = "registerAdmin";
    /// Outbound: ask for the driver position of a ride
    pub const GET_DRIVER_LOCATION: &str = "getDriverLocationByRideId";
    /// Inbound: observer registration acknowledged
    pub const ADMIN_REGISTERED: &str = "adminRegistered";
    /// Inbound: driver position push
    pub const DRIVER_LOCATION: &str = "driverLocationForAdmin";
    /// Inbound: server side failure
    pub const ERROR: &str = "error";
}

/// Events this client emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `registerAdmin {adminId}`
    RegisterAdmin {
        /// Observer identity
        admin_id: AdminId,
    },
    /// `getDriverLocationByRideId {rideId, adminId}`
    RequestDriverLocation {
        /// Ride to locate
        ride_id: RideId,
        /// Observer identity
        admin_id: AdminId,
    },
}

impl ClientEvent {
    /// Event name on the wire
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegisterAdmin { .. } => names::REGISTER_ADMIN,
            Self::RequestDriverLocation { .. } => names::GET_DRIVER_LOCATION,
        }
    }

    /// JSON argument of the event
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::RegisterAdmin { admin_id } => json!({ "adminId": admin_id.as_str() }),
            Self::RequestDriverLocation { ride_id, admin_id } => json!({
                "rideId": ride_id.as_str(),
                "adminId": admin_id.as_str(),
            }),
        }
    }

    /// Engine packet carrying this event
    #[must_use]
    pub fn to_packet(&self) -> Packet {
        Packet::event(self.name(), vec![self.payload()])
    }
}

/// GeoJSON point as sent by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoPoint {
    /// `[longitude, latitude]`
    pub coordinates: Coordinates,

    /// GeoJSON type, normally `Point`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Argument of a `driverLocationForAdmin` push
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationPayload {
    /// Ride the push answers
    pub ride_id: RideId,

    /// Driver position, absent when the lookup failed
    #[serde(default)]
    pub location: Option<GeoPoint>,

    /// Whether the lookup succeeded
    #[serde(default = "default_success")]
    pub success: bool,

    /// Failure detail
    #[serde(default)]
    pub message: Option<String>,
}

const fn default_success() -> bool {
    true
}

impl DriverLocationPayload {
    /// Location update for a successful push
    #[must_use]
    pub fn to_update(&self, received_at: DateTime<Utc>) -> Option<LocationUpdate> {
        if !self.success {
            return None;
        }
        self.location.as_ref().map(|point| LocationUpdate {
            ride_id: self.ride_id.clone(),
            coordinates: point.coordinates,
            timestamp: received_at,
        })
    }
}

/// Events this client understands
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `adminRegistered`
    AdminRegistered(Value),
    /// `driverLocationForAdmin`
    DriverLocation(DriverLocationPayload),
    /// `error`
    Error(Value),
    /// Anything else
    Other {
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
    },
}

impl ServerEvent {
    /// Interpret a decoded event packet
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Payload`] when a known event carries a payload of
    /// the wrong shape.
    pub fn from_event(name: String, args: Vec<Value>) -> Result<Self, FrameError> {
        let first = args.first().cloned().unwrap_or(Value::Null);
        match name.as_str() {
            names::ADMIN_REGISTERED => Ok(Self::AdminRegistered(first)),
            names::DRIVER_LOCATION => Ok(Self::DriverLocation(serde_json::from_value(first)?)),
            names::ERROR => Ok(Self::Error(first)),
            _ => Ok(Self::Other { name, args }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::SocketPacket;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ride(id: &str) -> RideId {
        RideId::new(id).unwrap()
    }

    #[test]
    fn test_client_event_frames() {
        let admin_id = AdminId::new("adm-1").unwrap();
        let register = ClientEvent::RegisterAdmin {
            admin_id: admin_id.clone(),
        };
        assert_eq!(
            register.to_packet().encode().unwrap(),
            r#"42["registerAdmin",{"adminId":"adm-1"}]"#
        );

        let request = ClientEvent::RequestDriverLocation {
            ride_id: ride("r-9"),
            admin_id,
        };
        let Packet::Message(SocketPacket::Event { name, args, .. }) = request.to_packet() else {
            panic!("expected event packet");
        };
        assert_eq!(name, "getDriverLocationByRideId");
        assert_eq!(args, vec![json!({"rideId": "r-9", "adminId": "adm-1"})]);
    }

    #[test]
    fn test_driver_location_push() {
        let event = ServerEvent::from_event(
            names::DRIVER_LOCATION.to_string(),
            vec![json!({
                "rideId": "r-9",
                "location": {"type": "Point", "coordinates": [88.3639, 22.5726]},
                "success": true
            })],
        )
        .unwrap();

        let ServerEvent::DriverLocation(payload) = event else {
            panic!("expected driver location");
        };
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let update = payload.to_update(at).unwrap();
        assert_eq!(update.ride_id, ride("r-9"));
        assert_eq!(update.timestamp, at);
        assert!((update.coordinates.latitude - 22.5726).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_lookup_yields_no_update() {
        let payload: DriverLocationPayload = serde_json::from_value(json!({
            "rideId": 77,
            "success": false,
            "message": "Driver offline"
        }))
        .unwrap();
        assert_eq!(payload.ride_id, ride("77"));
        assert!(payload.to_update(Utc::now()).is_none());
    }

    #[test]
    fn test_malformed_location_is_error() {
        let result = ServerEvent::from_event(
            names::DRIVER_LOCATION.to_string(),
            vec![json!({"location": {"coordinates": [1.0, 2.0]}})],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_event_passes_through() {
        let event = ServerEvent::from_event("rideCancelled".to_string(), vec![json!(1)]).unwrap();
        assert_eq!(
            event,
            ServerEvent::Other {
                name: "rideCancelled".to_string(),
                args: vec![json!(1)],
            }
        );
    }
}
