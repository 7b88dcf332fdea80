//! Engine.IO websocket transport

use crate::error::{ChannelError, ChannelResult};
use fleetdesk_protocol::{Packet, SocketPacket};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::debug;

/// Path of the Engine.IO endpoint
pub const ENGINE_PATH: &str = "/socket.io/";

/// Protocol revision and transport query
pub const ENGINE_QUERY: &str = "EIO=4&transport=websocket";

/// Websocket URL of the Engine.IO endpoint for a configured channel URL
///
/// `http` maps to `ws` and `https` to `wss`. A path already ending in
/// `/socket.io` is kept; otherwise the default path is appended.
///
/// # Errors
///
/// Returns [`ChannelError::InvalidUrl`] for other schemes or a missing host.
pub fn engine_url(base: &str) -> ChannelResult<String> {
    let invalid = || ChannelError::InvalidUrl {
        url: base.to_string(),
    };

    let (scheme, rest) = base.trim().split_once("://").ok_or_else(invalid)?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid()),
    };

    let rest = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    if rest.is_empty() || rest.starts_with('/') {
        return Err(invalid());
    }

    let path = if rest.ends_with("/socket.io") {
        format!("{rest}/")
    } else {
        format!("{rest}{ENGINE_PATH}")
    };
    Ok(format!("{scheme}://{path}?{ENGINE_QUERY}"))
}

/// Human readable text of a connect error payload
pub(crate) fn describe(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| payload.to_string(), ToString::to_string)
}

/// One established Engine.IO session
pub(crate) struct Connection {
    pub(crate) ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub(crate) sid: String,
    pub(crate) liveness: Duration,
    url: String,
}

impl Connection {
    /// Open the websocket and complete the Engine.IO and namespace handshakes
    pub(crate) async fn establish(url: &str, timeout: Duration) -> ChannelResult<Self> {
        let (ws, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| ChannelError::connect(url, "connection timed out"))?
            .map_err(|e| ChannelError::connect(url, e))?;

        let mut conn = Self {
            ws,
            sid: String::new(),
            liveness: Duration::ZERO,
            url: url.to_string(),
        };
        tokio::time::timeout(timeout, conn.open())
            .await
            .map_err(|_| ChannelError::connect(url, "handshake timed out"))??;
        Ok(conn)
    }

    async fn open(&mut self) -> ChannelResult<()> {
        let mut opened = false;
        while let Some(frame) = self.ws.next().await {
            let frame = frame.map_err(|e| ChannelError::connect(&self.url, e))?;
            let Message::Text(text) = frame else {
                continue;
            };
            match Packet::decode(&text)? {
                Packet::Open(handshake) => {
                    self.liveness = handshake.liveness_window();
                    self.sid = handshake.sid;
                    opened = true;
                    self.send(&Packet::Message(SocketPacket::Connect(None)))
                        .await?;
                }
                Packet::Ping => self.send(&Packet::Pong).await?,
                Packet::Message(SocketPacket::Connect(_)) if opened => return Ok(()),
                Packet::Message(SocketPacket::ConnectError(payload)) => {
                    return Err(ChannelError::Rejected {
                        message: describe(&payload),
                    });
                }
                other => debug!(?other, "frame ignored during handshake"),
            }
        }
        Err(ChannelError::connect(&self.url, "closed during handshake"))
    }

    /// Send one packet
    pub(crate) async fn send(&mut self, packet: &Packet) -> ChannelResult<()> {
        let text = packet.encode()?;
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::connect(&self.url, e))
    }

    /// Leave the namespace and close the websocket, ignoring failures
    pub(crate) async fn close(mut self) {
        if let Err(e) = self.send(&Packet::Message(SocketPacket::Disconnect)).await {
            debug!(error = %e, "disconnect packet not sent");
        }
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_engine_url_schemes() {
        assert_eq!(
            engine_url("http://localhost:5000").unwrap(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            engine_url("https://live.example.com/").unwrap(),
            "wss://live.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            engine_url("wss://live.example.com/rt/socket.io").unwrap(),
            "wss://live.example.com/rt/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_engine_url_rejects_other_schemes() {
        assert!(engine_url("ftp://example.com").is_err());
        assert!(engine_url("localhost:5000").is_err());
        assert!(engine_url("http://").is_err());
    }

    #[test]
    fn test_describe_connect_error() {
        assert_eq!(describe(&json!({"message": "unauthorized"})), "unauthorized");
        assert_eq!(describe(&json!("nope")), "\"nope\"");
    }
}
