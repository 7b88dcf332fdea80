//! Live driver location channel for the `FleetDesk` client
//!
//! Admins observe rides in progress over a Socket.IO namespace: the client
//! registers as an observer, asks for a ride's driver location and receives
//! position pushes until it disconnects or the session ends.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod channel;
pub mod connection;
pub mod error;
pub mod view;

pub use channel::{ChannelEvent, ChannelState, LiveLocationChannel, LocationRequest, Subscription};
pub use connection::engine_url;
pub use error::{ChannelError, ChannelResult};
pub use view::LocationView;
