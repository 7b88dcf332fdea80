//! Socket.IO over Engine.IO v4 text framing
//!
//! An Engine.IO packet is one type digit followed by its payload. Type `4`
//! carries a Socket.IO packet, itself a type digit, an optional `/namespace,`
//! prefix, an optional ack id and a JSON payload:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                    ping / pong
//! 40 / 40{"sid":".."}                                      connect
//! 42["driverLocationForAdmin",{"rideId":"r1",..}]          event
//! 44{"message":"unauthorized"}                             connect error
//! ```

use crate::FrameError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Handshake sent by the server in the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine session id
    pub sid: String,

    /// Transports the server would upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,

    /// Interval between server pings, in milliseconds
    pub ping_interval: u64,

    /// Time the server waits for a pong, in milliseconds
    pub ping_timeout: u64,

    /// Largest payload the server accepts, in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// Silence after which the connection is considered dead
    #[must_use]
    pub const fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `0`: session handshake
    Open(OpenHandshake),
    /// `1`: transport close
    Close,
    /// `2`: heartbeat from the server
    Ping,
    /// `3`: heartbeat reply
    Pong,
    /// `4`: Socket.IO packet
    Message(SocketPacket),
    /// `5`: transport upgrade
    Upgrade,
    /// `6`: no-op
    Noop,
}

/// Socket.IO packet on the default namespace
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// `0`: namespace connect, with optional auth (client) or sid (server)
    Connect(Option<Value>),
    /// `1`: namespace disconnect
    Disconnect,
    /// `2`: named event
    Event {
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
        /// Acknowledgement id requested by the sender
        ack: Option<u64>,
    },
    /// `3`: acknowledgement
    Ack {
        /// Id of the acknowledged event
        id: u64,
        /// Acknowledgement arguments
        args: Vec<Value>,
    },
    /// `4`: namespace connect refused
    ConnectError(Value),
}

impl Packet {
    /// Shorthand for an event packet without ack
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Message(SocketPacket::Event {
            name: name.into(),
            args,
            ack: None,
        })
    }

    /// Decode a text frame
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] for unknown packet types, binary packets or
    /// payloads that are not the JSON their type requires.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(FrameError::Empty)?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '4' => SocketPacket::decode(rest).map(Self::Message),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(FrameError::UnknownEngineType(other)),
        }
    }

    /// Encode as a text frame
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Payload`] if a JSON payload cannot be serialized.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(match self {
            Self::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Self::Close => "1".to_string(),
            Self::Ping => "2".to_string(),
            Self::Pong => "3".to_string(),
            Self::Message(packet) => format!("4{}", packet.encode()?),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        })
    }
}

impl SocketPacket {
    fn decode(text: &str) -> Result<Self, FrameError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(FrameError::Empty)?;
        let rest = strip_namespace(chars.as_str());

        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (id, payload) = rest.split_at(digits);
        let ack = id.parse::<u64>().ok();

        match kind {
            '0' => Ok(Self::Connect(parse_optional(payload)?)),
            '1' => Ok(Self::Disconnect),
            '2' => {
                let items: Vec<Value> = serde_json::from_str(payload)?;
                let mut items = items.into_iter();
                let Some(Value::String(name)) = items.next() else {
                    return Err(FrameError::MissingEventName);
                };
                Ok(Self::Event {
                    name,
                    args: items.collect(),
                    ack,
                })
            }
            '3' => Ok(Self::Ack {
                id: ack.unwrap_or_default(),
                args: serde_json::from_str(payload)?,
            }),
            '4' => Ok(Self::ConnectError(
                parse_optional(payload)?.unwrap_or(Value::Null),
            )),
            '5' | '6' => Err(FrameError::BinaryUnsupported),
            other => Err(FrameError::UnknownSocketType(other)),
        }
    }

    fn encode(&self) -> Result<String, FrameError> {
        Ok(match self {
            Self::Connect(None) => "0".to_string(),
            Self::Connect(Some(auth)) => format!("0{}", serde_json::to_string(auth)?),
            Self::Disconnect => "1".to_string(),
            Self::Event { name, args, ack } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                let id = ack.map(|id| id.to_string()).unwrap_or_default();
                format!("2{id}{}", serde_json::to_string(&items)?)
            }
            Self::Ack { id, args } => format!("3{id}{}", serde_json::to_string(args)?),
            Self::ConnectError(payload) => format!("4{}", serde_json::to_string(payload)?),
        })
    }
}

/// Drop a `/namespace,` prefix; this client only uses the default namespace.
fn strip_namespace(text: &str) -> &str {
    if text.starts_with('/') {
        text.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        text
    }
}

fn parse_optional(payload: &str) -> Result<Option<Value>, FrameError> {
    if payload.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_str(payload)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet = Packet::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();

        let Packet::Open(handshake) = packet else {
            panic!("expected open packet");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.liveness_window(), Duration::from_secs(45));
        assert_eq!(handshake.max_payload, Some(1_000_000));
    }

    #[rstest]
    #[case("1", Packet::Close)]
    #[case("2", Packet::Ping)]
    #[case("3", Packet::Pong)]
    #[case("40", Packet::Message(SocketPacket::Connect(None)))]
    #[case("41", Packet::Message(SocketPacket::Disconnect))]
    #[case("6", Packet::Noop)]
    fn test_decode_control_packets(#[case] text: &str, #[case] expected: Packet) {
        assert_eq!(Packet::decode(text).unwrap(), expected);
    }

    #[test]
    fn test_decode_event() {
        let packet = Packet::decode(
            r#"42["driverLocationForAdmin",{"rideId":"r1","location":{"coordinates":[88.36,22.57]},"success":true}]"#,
        )
        .unwrap();

        let Packet::Message(SocketPacket::Event { name, args, ack }) = packet else {
            panic!("expected event");
        };
        assert_eq!(name, "driverLocationForAdmin");
        assert_eq!(args.len(), 1);
        assert_eq!(args.first().unwrap()["rideId"], "r1");
        assert_eq!(ack, None);
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let packet = Packet::decode(r#"42/admin,17["adminRegistered",{"ok":true}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Message(SocketPacket::Event {
                name: "adminRegistered".to_string(),
                args: vec![json!({"ok": true})],
                ack: Some(17),
            })
        );
    }

    #[test]
    fn test_decode_connect_with_sid_and_error() {
        assert_eq!(
            Packet::decode(r#"40{"sid":"abc"}"#).unwrap(),
            Packet::Message(SocketPacket::Connect(Some(json!({"sid": "abc"}))))
        );
        assert_eq!(
            Packet::decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::Message(SocketPacket::ConnectError(json!({"message": "Not authorized"})))
        );
    }

    #[rstest]
    #[case("")]
    #[case("9")]
    #[case("47")]
    #[case("45-[\"x\",{}]")]
    #[case("42[]")]
    #[case("42[7]")]
    #[case("42{not json")]
    #[case("0{}")]
    fn test_decode_rejects(#[case] text: &str) {
        assert!(Packet::decode(text).is_err(), "{text:?} should not decode");
    }

    #[test]
    fn test_encode_client_packets() {
        assert_eq!(Packet::Pong.encode().unwrap(), "3");
        assert_eq!(
            Packet::Message(SocketPacket::Connect(None)).encode().unwrap(),
            "40"
        );
        assert_eq!(
            Packet::Message(SocketPacket::Disconnect).encode().unwrap(),
            "41"
        );
        assert_eq!(
            Packet::event("registerAdmin", vec![json!({"adminId": "a1"})])
                .encode()
                .unwrap(),
            r#"42["registerAdmin",{"adminId":"a1"}]"#
        );
    }

    proptest! {
        #[test]
        fn event_frames_survive_encoding(
            name in "[a-zA-Z]{1,24}",
            ride in "[a-z0-9-]{1,12}",
            ack in proptest::option::of(0u64..10_000),
        ) {
            let packet = Packet::Message(SocketPacket::Event {
                name,
                args: vec![json!({"rideId": ride})],
                ack,
            });
            let text = packet.encode().unwrap();
            prop_assert_eq!(Packet::decode(&text).unwrap(), packet);
        }

        #[test]
        fn decode_never_panics(text in "\\PC{0,64}") {
            let _ = Packet::decode(&text);
        }
    }
}
