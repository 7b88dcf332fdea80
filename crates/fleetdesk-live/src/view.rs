//! Latest location of the ride on screen

use fleetdesk_types::{LocationUpdate, RideId};

/// Holds the last location of one displayed ride
///
/// Pushes for rides that are no longer displayed keep arriving on the shared
/// event; [`LocationView::apply`] drops them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationView {
    ride: Option<RideId>,
    latest: Option<LocationUpdate>,
}

impl LocationView {
    /// View showing nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Display `ride`; a different ride discards the old location
    pub fn show_ride(&mut self, ride: RideId) {
        if self.ride.as_ref() != Some(&ride) {
            self.latest = None;
        }
        self.ride = Some(ride);
    }

    /// Offer a push; returns whether it changed the view
    pub fn apply(&mut self, update: LocationUpdate) -> bool {
        if self.ride.as_ref() != Some(&update.ride_id) {
            return false;
        }
        self.latest = Some(update);
        true
    }

    /// Displayed ride
    #[must_use]
    pub const fn ride(&self) -> Option<&RideId> {
        self.ride.as_ref()
    }

    /// Latest location of the displayed ride
    #[must_use]
    pub const fn current(&self) -> Option<&LocationUpdate> {
        self.latest.as_ref()
    }

    /// Stop displaying anything
    pub fn close(&mut self) {
        self.ride = None;
        self.latest = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetdesk_types::Coordinates;
    use pretty_assertions::assert_eq;

    fn update(ride: &str, lng: f64) -> LocationUpdate {
        LocationUpdate {
            ride_id: RideId::new(ride).unwrap(),
            coordinates: Coordinates::new(lng, 22.5).unwrap(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_other_ride_does_not_change_view() {
        let mut view = LocationView::new();
        view.show_ride(RideId::new("r-1").unwrap());

        assert!(view.apply(update("r-1", 88.0)));
        assert!(!view.apply(update("r-2", 10.0)));
        assert!((view.current().unwrap().coordinates.longitude - 88.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_last_write_wins() {
        let mut view = LocationView::new();
        view.show_ride(RideId::new("r-1").unwrap());
        view.apply(update("r-1", 88.0));
        view.apply(update("r-1", 88.5));
        assert!((view.current().unwrap().coordinates.longitude - 88.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_switching_ride_discards_location() {
        let mut view = LocationView::new();
        view.show_ride(RideId::new("r-1").unwrap());
        view.apply(update("r-1", 88.0));

        view.show_ride(RideId::new("r-1").unwrap());
        assert!(view.current().is_some());

        view.show_ride(RideId::new("r-2").unwrap());
        assert!(view.current().is_none());
        assert!(!view.apply(update("r-1", 88.0)));
    }

    #[test]
    fn test_closed_view_ignores_everything() {
        let mut view = LocationView::new();
        view.show_ride(RideId::new("r-1").unwrap());
        view.close();
        assert!(!view.apply(update("r-1", 88.0)));
        assert_eq!(view.ride(), None);
    }
}
