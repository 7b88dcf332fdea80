//! Live location channel
//!
//! One websocket per [`LiveLocationChannel`], driven by a background task
//! that answers pings, dispatches server events to subscribers and
//! reconnects a bounded number of times when the transport drops.

use crate::connection::{Connection, describe, engine_url};
use crate::error::{ChannelError, ChannelResult};
use chrono::Utc;
use fleetdesk_core::ChannelConfig;
use fleetdesk_protocol::{ClientEvent, Packet, ServerEvent, SocketPacket};
use fleetdesk_types::{AdminId, LocationUpdate, RideId, Session};
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

const EVENT_CAPACITY: usize = 256;

/// Connection state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No transport
    Disconnected,
    /// First connection in progress
    Connecting,
    /// Namespace joined
    Connected,
    /// Transport lost, retrying
    Reconnecting {
        /// Current attempt, starting at 1
        attempt: u32,
    },
}

/// Everything the channel reports to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Namespace joined, after the first connect or a reconnect
    Connected,
    /// Transport lost; reconnection follows unless the server ended the session
    Disconnected {
        /// What happened
        reason: String,
    },
    /// Channel torn down for good
    Closed,
    /// Acknowledgement of `registerAdmin`
    AdminRegistered(Value),
    /// Driver position push
    Location(LocationUpdate),
    /// The server answered a location request without a position
    LocationUnavailable {
        /// Requested ride
        ride_id: RideId,
        /// Server message
        message: String,
    },
    /// `error` event from the server
    ServerError(Value),
}

/// Handle to a background listener; dropping it stops the listener
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop receiving
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the listener has stopped on its own
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A pending `getDriverLocationByRideId` request
#[derive(Debug)]
pub struct LocationRequest {
    ride_id: RideId,
    events: broadcast::Receiver<ChannelEvent>,
    deadline: Instant,
    timeout: Duration,
}

impl LocationRequest {
    /// Ride this request waits for
    #[must_use]
    pub const fn ride_id(&self) -> &RideId {
        &self.ride_id
    }

    /// Wait for the first push for the requested ride
    ///
    /// Pushes for other rides are skipped.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Timeout`] when nothing arrives in time,
    /// [`ChannelError::Unavailable`] when the server reports a failed lookup
    /// and [`ChannelError::Closed`] when the channel goes away first.
    pub async fn wait(mut self) -> ChannelResult<LocationUpdate> {
        let deadline = self.deadline;
        let outcome = tokio::time::timeout_at(deadline, self.next_match()).await;
        outcome.unwrap_or_else(|_| {
            Err(ChannelError::Timeout {
                ride_id: self.ride_id.clone(),
                seconds: self.timeout.as_secs(),
            })
        })
    }

    async fn next_match(&mut self) -> ChannelResult<LocationUpdate> {
        loop {
            match self.events.recv().await {
                Ok(ChannelEvent::Location(update)) if update.ride_id == self.ride_id => {
                    return Ok(update);
                }
                Ok(ChannelEvent::LocationUnavailable { ride_id, message })
                    if ride_id == self.ride_id =>
                {
                    return Err(ChannelError::Unavailable { ride_id, message });
                }
                Ok(ChannelEvent::Closed) | Err(broadcast::error::RecvError::Closed) => {
                    return Err(ChannelError::Closed);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "location request lagged behind the channel");
                }
            }
        }
    }
}

/// Socket.IO client for driver location pushes
#[derive(Debug, Clone)]
pub struct LiveLocationChannel {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: ChannelConfig,
    url: String,
    state: watch::Sender<ChannelState>,
    events: broadcast::Sender<ChannelEvent>,
    observer: Mutex<Option<AdminId>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    driver: tokio::sync::Mutex<Option<Driver>>,
}

#[derive(Debug)]
struct Driver {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Work queued for the driver task
#[derive(Debug)]
enum Outbound {
    Announce(AdminId),
    Packet(Packet),
}

enum Ended {
    Cancelled,
    ServerDisconnect,
    Lost(String),
}

impl LiveLocationChannel {
    /// Create a disconnected channel
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidUrl`] if the configured URL is unusable.
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        let url = engine_url(&config.url)?;
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                url,
                state,
                events,
                observer: Mutex::new(None),
                outbound: Mutex::new(None),
                driver: tokio::sync::Mutex::new(None),
            }),
        })
    }

    /// Engine URL the channel dials
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    /// Whether the namespace is currently joined
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Receiver notified on every state change
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// Raw event stream
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.events.subscribe()
    }

    /// Establish the channel unless it is already up
    ///
    /// # Errors
    ///
    /// [`ChannelError::Rejected`] when the server refuses the namespace and
    /// [`ChannelError::Exhausted`] when every attempt fails.
    #[instrument(skip(self), fields(url = %self.inner.url))]
    pub async fn connect(&self) -> ChannelResult<()> {
        let mut driver = self.inner.driver.lock().await;
        if driver.as_ref().is_some_and(|d| !d.task.is_finished()) {
            debug!("live channel already running");
            return Ok(());
        }

        let conn = self.inner.connect_with_retry().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        *self.inner.outbound.lock() = Some(tx);

        let task = tokio::spawn(Arc::clone(&self.inner).drive(conn, rx, cancel.clone()));
        *driver = Some(Driver { cancel, task });
        Ok(())
    }

    /// Announce the observing admin; repeated automatically after reconnects
    ///
    /// The admin is announced once per connection, however often this is
    /// called with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] without a live channel.
    pub fn register_observer(&self, admin_id: &AdminId) -> ChannelResult<()> {
        self.inner.send(Outbound::Announce(admin_id.clone()))?;
        *self.inner.observer.lock() = Some(admin_id.clone());
        info!(admin = %admin_id, "observer registered");
        Ok(())
    }

    /// Ask for the driver position of a ride; the answer arrives as a push
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotRegistered`] unless `admin_id` went through
    /// [`Self::register_observer`], [`ChannelError::NotConnected`] without a
    /// live channel.
    pub fn request_location(&self, ride_id: &RideId, admin_id: &AdminId) -> ChannelResult<()> {
        let registered = self.inner.observer.lock().as_ref() == Some(admin_id);
        if !registered {
            return Err(ChannelError::NotRegistered);
        }
        self.inner.send(Outbound::Packet(
            ClientEvent::RequestDriverLocation {
                ride_id: ride_id.clone(),
                admin_id: admin_id.clone(),
            }
            .to_packet(),
        ))?;
        debug!(ride = %ride_id, "location requested");
        Ok(())
    }

    /// Call `callback` for every location push until the subscription drops
    pub fn on_location_push<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(LocationUpdate) + Send + 'static,
    {
        let mut events = self.inner.events.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ChannelEvent::Location(update)) => callback(update),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "location subscriber lagged behind the channel");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { task }
    }

    /// Request a ride's location and return a handle that waits for it
    ///
    /// # Errors
    ///
    /// Same as [`Self::request_location`].
    pub fn watch_ride(
        &self,
        ride_id: RideId,
        admin_id: &AdminId,
        timeout: Duration,
    ) -> ChannelResult<LocationRequest> {
        let events = self.inner.events.subscribe();
        self.request_location(&ride_id, admin_id)?;
        Ok(LocationRequest {
            ride_id,
            events,
            deadline: Instant::now() + timeout,
            timeout,
        })
    }

    /// Tear the channel down; pending requests fail with [`ChannelError::Closed`]
    pub async fn disconnect(&self) {
        *self.inner.observer.lock() = None;
        self.inner.outbound.lock().take();

        let driver = self.inner.driver.lock().await.take();
        if let Some(driver) = driver {
            driver.cancel.cancel();
            if let Err(e) = driver.task.await {
                warn!(error = %e, "live channel task ended abnormally");
            }
            info!("live channel disconnected");
        }
        self.inner.set_state(ChannelState::Disconnected);
    }

    /// Disconnect as soon as the session is cleared
    ///
    /// A receiver that already holds no session disconnects right away.
    pub fn bind_session(&self, mut sessions: watch::Receiver<Option<Session>>) -> Subscription {
        let channel = self.clone();
        let task = tokio::spawn(async move {
            let mut signed_out = sessions.borrow_and_update().is_none();
            loop {
                if signed_out {
                    info!("session ended, closing live channel");
                    channel.disconnect().await;
                }
                if sessions.changed().await.is_err() {
                    break;
                }
                signed_out = sessions.borrow_and_update().is_none();
            }
        });
        Subscription { task }
    }
}

impl Inner {
    fn set_state(&self, next: ChannelState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    fn emit(&self, event: ChannelEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn send(&self, work: Outbound) -> ChannelResult<()> {
        let tx = self.outbound.lock().clone().ok_or(ChannelError::NotConnected)?;
        tx.send(work).map_err(|_| ChannelError::NotConnected)
    }

    async fn connect_with_retry(&self) -> ChannelResult<Connection> {
        let attempts = self.config.reconnect_attempts.max(1);
        self.set_state(ChannelState::Connecting);

        let mut last = String::new();
        for attempt in 1..=attempts {
            match Connection::establish(&self.url, self.config.connect_timeout()).await {
                Ok(conn) => {
                    info!(sid = %conn.sid, attempt, "live channel connected");
                    self.set_state(ChannelState::Connected);
                    self.emit(ChannelEvent::Connected);
                    return Ok(conn);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(error = %e, "live channel refused");
                    self.set_state(ChannelState::Disconnected);
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "live channel connect failed");
                    last = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.reconnect_delay()).await;
                    }
                }
            }
        }

        self.set_state(ChannelState::Disconnected);
        Err(ChannelError::Exhausted { attempts, last })
    }

    async fn reconnect(&self, cancel: &CancellationToken) -> Option<Connection> {
        let attempts = self.config.reconnect_attempts.max(1);
        for attempt in 1..=attempts {
            self.set_state(ChannelState::Reconnecting { attempt });
            tokio::select! {
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(self.config.reconnect_delay()) => {}
            }

            let result = tokio::select! {
                () = cancel.cancelled() => return None,
                result = Connection::establish(&self.url, self.config.connect_timeout()) => result,
            };
            match result {
                Ok(conn) => {
                    info!(sid = %conn.sid, attempt, "live channel reconnected");
                    self.set_state(ChannelState::Connected);
                    self.emit(ChannelEvent::Connected);
                    return Some(conn);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(error = %e, "live channel refused on reconnect");
                    return None;
                }
                Err(e) => warn!(attempt, attempts, error = %e, "live channel reconnect failed"),
            }
        }
        warn!(attempts, "live channel reconnection exhausted");
        None
    }

    async fn drive(
        self: Arc<Self>,
        mut conn: Connection,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        cancel: CancellationToken,
    ) {
        loop {
            match self.run(&mut conn, &mut outbound, &cancel).await {
                Ended::Cancelled => {
                    conn.close().await;
                    break;
                }
                Ended::ServerDisconnect => {
                    info!("server ended the live channel");
                    self.emit(ChannelEvent::Disconnected {
                        reason: "server disconnect".to_string(),
                    });
                    break;
                }
                Ended::Lost(reason) => {
                    warn!(%reason, "live channel lost");
                    self.emit(ChannelEvent::Disconnected { reason });
                    match self.reconnect(&cancel).await {
                        Some(next) => conn = next,
                        None => break,
                    }
                }
            }
        }

        self.set_state(ChannelState::Disconnected);
        self.emit(ChannelEvent::Closed);
    }

    async fn run(
        &self,
        conn: &mut Connection,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
        cancel: &CancellationToken,
    ) -> Ended {
        // Observer announced on this connection; queued announcements of the
        // same admin are dropped.
        let mut announced: Option<AdminId> = None;
        let observer = self.observer.lock().clone();
        if let Some(admin_id) = observer
            && let Err(e) = announce(conn, &mut announced, admin_id).await
        {
            return Ended::Lost(e.to_string());
        }

        let liveness = conn.liveness;
        let idle = tokio::time::sleep(liveness);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ended::Cancelled,
                () = &mut idle => return Ended::Lost("ping timeout".to_string()),
                work = outbound.recv() => {
                    let sent = match work {
                        None => return Ended::Cancelled,
                        Some(Outbound::Announce(admin_id)) => {
                            announce(conn, &mut announced, admin_id).await
                        }
                        Some(Outbound::Packet(packet)) => conn.send(&packet).await,
                    };
                    if let Err(e) = sent {
                        return Ended::Lost(e.to_string());
                    }
                }
                frame = conn.ws.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => {
                            return Ended::Lost("transport closed".to_string());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Ended::Lost(e.to_string()),
                    };
                    idle.as_mut().reset(Instant::now() + liveness);

                    match Packet::decode(&text) {
                        Ok(Packet::Ping) => {
                            if let Err(e) = conn.send(&Packet::Pong).await {
                                return Ended::Lost(e.to_string());
                            }
                        }
                        Ok(Packet::Close) => {
                            return Ended::Lost("server closed the transport".to_string());
                        }
                        Ok(Packet::Message(SocketPacket::Disconnect)) => return Ended::ServerDisconnect,
                        Ok(Packet::Message(SocketPacket::ConnectError(payload))) => {
                            return Ended::Lost(format!("connect error: {}", describe(&payload)));
                        }
                        Ok(Packet::Message(SocketPacket::Event { name, args, .. })) => {
                            self.dispatch(name, args);
                        }
                        Ok(other) => trace!(?other, "frame ignored"),
                        Err(e) => warn!(error = %e, "undecodable frame"),
                    }
                }
            }
        }
    }

    fn dispatch(&self, name: String, args: Vec<Value>) {
        match ServerEvent::from_event(name, args) {
            Ok(ServerEvent::DriverLocation(payload)) => match payload.to_update(Utc::now()) {
                Some(update) => {
                    debug!(ride = %update.ride_id, "location push");
                    self.emit(ChannelEvent::Location(update));
                }
                None => {
                    let message = payload
                        .message
                        .unwrap_or_else(|| "driver location unavailable".to_string());
                    debug!(ride = %payload.ride_id, %message, "location unavailable");
                    self.emit(ChannelEvent::LocationUnavailable {
                        ride_id: payload.ride_id,
                        message,
                    });
                }
            },
            Ok(ServerEvent::AdminRegistered(ack)) => {
                debug!("observer acknowledged");
                self.emit(ChannelEvent::AdminRegistered(ack));
            }
            Ok(ServerEvent::Error(payload)) => {
                warn!(%payload, "server error event");
                self.emit(ChannelEvent::ServerError(payload));
            }
            Ok(ServerEvent::Other { name, .. }) => trace!(%name, "unhandled event"),
            Err(e) => warn!(error = %e, "malformed event payload"),
        }
    }
}

async fn announce(
    conn: &mut Connection,
    announced: &mut Option<AdminId>,
    admin_id: AdminId,
) -> ChannelResult<()> {
    if announced.as_ref() == Some(&admin_id) {
        trace!(admin = %admin_id, "observer already announced");
        return Ok(());
    }
    debug!(admin = %admin_id, "announcing observer");
    conn.send(
        &ClientEvent::RegisterAdmin {
            admin_id: admin_id.clone(),
        }
        .to_packet(),
    )
    .await?;
    *announced = Some(admin_id);
    Ok(())
}
