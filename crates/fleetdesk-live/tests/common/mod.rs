//! In-process Socket.IO server for channel tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use fleetdesk_core::ChannelConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

/// How the server answers a namespace connect
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
    pub reject_with: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            ping_interval_ms: 25_000,
            ping_timeout_ms: 20_000,
            reject_with: None,
        }
    }
}

enum Command {
    Send(String),
    Drop,
}

/// Frame received from the client on connection `conn`
#[derive(Debug, Clone)]
pub struct Frame {
    pub conn: usize,
    pub text: String,
}

impl Frame {
    /// Event name and first argument of a `42[...]` frame
    pub fn event(&self) -> Option<(String, Value)> {
        let payload = self.text.strip_prefix("42")?;
        let items: Vec<Value> = serde_json::from_str(payload).ok()?;
        let mut items = items.into_iter();
        let name = items.next()?.as_str()?.to_string();
        Some((name, items.next().unwrap_or(Value::Null)))
    }
}

pub struct MockSocketServer {
    pub addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Frame>,
    connections: Arc<Mutex<Vec<mpsc::UnboundedSender<Command>>>>,
    accept: JoinHandle<()>,
}

impl MockSocketServer {
    pub async fn start() -> Self {
        Self::with_options(ServerOptions::default()).await
    }

    pub async fn with_options(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let connections = Arc::new(Mutex::new(Vec::new()));

        let accept = tokio::spawn({
            let connections = Arc::clone(&connections);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let Ok(ws) = accept_async(stream).await else {
                        continue;
                    };
                    let (tx, rx) = mpsc::unbounded_channel();
                    let conn = {
                        let mut connections = connections.lock().await;
                        connections.push(tx);
                        connections.len() - 1
                    };
                    tokio::spawn(serve(ws, conn, options.clone(), frames_tx.clone(), rx));
                }
            }
        });

        Self {
            addr,
            frames,
            connections,
            accept,
        }
    }

    /// Channel configuration pointing at this server
    pub fn config(&self) -> ChannelConfig {
        ChannelConfig {
            url: format!("http://{}", self.addr),
            reconnect_attempts: 3,
            reconnect_delay_ms: 50,
            connect_timeout_secs: 2,
            ..ChannelConfig::default()
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Push a raw frame to connection `conn`
    pub async fn send(&self, conn: usize, text: impl Into<String>) {
        let connections = self.connections.lock().await;
        connections
            .get(conn)
            .expect("no such connection")
            .send(Command::Send(text.into()))
            .unwrap();
    }

    /// Push an event to connection `conn`
    pub async fn emit(&self, conn: usize, name: &str, arg: Value) {
        let frame = format!("42{}", serde_json::json!([name, arg]));
        self.send(conn, frame).await;
    }

    /// Drop connection `conn` without a close handshake
    pub async fn drop_connection(&self, conn: usize) {
        let connections = self.connections.lock().await;
        let _ = connections.get(conn).expect("no such connection").send(Command::Drop);
    }

    /// Stop accepting new connections
    pub fn stop_accepting(&self) {
        self.accept.abort();
    }

    /// Next frame from any connection
    pub async fn next_frame(&mut self) -> Frame {
        tokio::time::timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("server stopped")
    }

    /// Next `42` event frame, skipping everything else
    pub async fn next_event(&mut self) -> (Frame, String, Value) {
        loop {
            let frame = self.next_frame().await;
            if let Some((name, arg)) = frame.event() {
                return (frame, name, arg);
            }
        }
    }

    /// Every event frame that arrives within `window`
    pub async fn events_within(&mut self, window: Duration) -> Vec<(Frame, String, Value)> {
        let deadline = tokio::time::Instant::now() + window;
        let mut events = Vec::new();
        while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, self.frames.recv()).await {
            if let Some((name, arg)) = frame.event() {
                events.push((frame, name, arg));
            }
        }
        events
    }

    /// Assert that no event frame arrives within `window`
    pub async fn assert_no_event(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, self.frames.recv()).await {
            assert!(frame.event().is_none(), "unexpected event {}", frame.text);
        }
    }
}

impl Drop for MockSocketServer {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

async fn serve(
    mut ws: WebSocketStream<TcpStream>,
    conn: usize,
    options: ServerOptions,
    frames: mpsc::UnboundedSender<Frame>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let open = format!(
        r#"0{{"sid":"engine-{conn}","upgrades":[],"pingInterval":{},"pingTimeout":{},"maxPayload":1000000}}"#,
        options.ping_interval_ms, options.ping_timeout_ms
    );
    if ws.send(Message::Text(open)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if ws.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Some(Command::Drop) | None => return,
            },
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if text == "40" {
                        let reply = options.reject_with.as_ref().map_or_else(
                            || format!(r#"40{{"sid":"socket-{conn}"}}"#),
                            |message| format!(r#"44{{"message":"{message}"}}"#),
                        );
                        if ws.send(Message::Text(reply)).await.is_err() {
                            return;
                        }
                    }
                    let _ = frames.send(Frame { conn, text });
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            },
        }
    }
}

/// Location push for `ride` in the backend's shape
pub fn location_push(ride: &str, lng: f64, lat: f64) -> Value {
    serde_json::json!({
        "success": true,
        "rideId": ride,
        "location": {"type": "Point", "coordinates": [lng, lat]}
    })
}
