//! Pure validated types for the `FleetDesk` client
//!
//! Nothing in this crate performs I/O. Values are validated on construction so
//! the session and channel layers can rely on their invariants.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod challenge;
pub mod error;
pub mod location;
pub mod otp;
pub mod phone;
pub mod role;
pub mod session;

pub use challenge::{Challenge, Deadline};
pub use error::ValidationError;
pub use location::{AdminId, Coordinates, LocationUpdate, RideId};
pub use otp::OtpCode;
pub use phone::PhoneNumber;
pub use role::Role;
pub use session::{Session, UserProfile};
