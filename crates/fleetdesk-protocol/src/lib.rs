//! Wire formats spoken by the `FleetDesk` client
//!
//! Two protocols live here:
//!
//! - [`rest`]: request bodies and response envelopes of the OTP auth endpoints,
//!   parsed once at the boundary into typed values.
//! - [`frame`] and [`events`]: the Socket.IO (Engine.IO v4) text framing used
//!   by the live location channel, and the typed events carried over it.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod error;
pub mod events;
pub mod frame;
pub mod rest;

pub use error::{FrameError, ProtocolError};
pub use events::{ClientEvent, DriverLocationPayload, ServerEvent};
pub use frame::{OpenHandshake, Packet, SocketPacket};
pub use rest::{ApiEnvelope, AuthData, LoginRequest, ResendOtpRequest, VerifyOtpRequest};
