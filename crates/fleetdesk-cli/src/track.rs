//! `track`: follow a ride's driver on the live channel

use crate::app::App;
use crate::error::{CliError, CliResult};
use fleetdesk_live::{ChannelError, ChannelEvent, LiveLocationChannel, LocationView};
use fleetdesk_types::{AdminId, LocationUpdate, RideId};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Options of one `track` run
#[derive(Debug, Clone)]
pub(crate) struct TrackOptions {
    pub(crate) ride: String,
    pub(crate) timeout: Duration,
    pub(crate) follow: Option<Duration>,
}

pub(crate) fn format_update(update: &LocationUpdate) -> String {
    format!(
        "ride {} at {:.6}, {:.6} ({})",
        update.ride_id,
        update.coordinates.latitude,
        update.coordinates.longitude,
        update.timestamp.format("%H:%M:%S")
    )
}

pub(crate) async fn run(app: &App, options: TrackOptions) -> CliResult<()> {
    let session = app.sessions.current().ok_or(CliError::NotSignedIn)?;
    let admin_id = session.admin_id().ok_or(CliError::AdminOnly)?;
    let ride_id = RideId::new(options.ride.as_str())?;

    let channel = LiveLocationChannel::new(app.config.channel.clone())?;
    let _session_binding = channel.bind_session(app.sessions.subscribe());
    channel.connect().await?;

    let result = locate(&channel, &admin_id, &ride_id, &options).await;
    channel.disconnect().await;
    result
}

async fn locate(
    channel: &LiveLocationChannel,
    admin_id: &AdminId,
    ride_id: &RideId,
    options: &TrackOptions,
) -> CliResult<()> {
    channel.register_observer(admin_id)?;

    let mut view = LocationView::new();
    view.show_ride(ride_id.clone());

    match channel
        .watch_ride(ride_id.clone(), admin_id, options.timeout)?
        .wait()
        .await
    {
        Ok(update) => {
            println!("{}", format_update(&update));
            view.apply(update);
        }
        Err(e @ (ChannelError::Timeout { .. } | ChannelError::Unavailable { .. }))
            if options.follow.is_some() =>
        {
            println!("{e}");
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(interval) = options.follow {
        follow(channel, admin_id, ride_id, interval, &mut view).await?;
    }
    Ok(())
}

async fn follow(
    channel: &LiveLocationChannel,
    admin_id: &AdminId,
    ride_id: &RideId,
    interval: Duration,
    view: &mut LocationView,
) -> CliResult<()> {
    let (tx, mut pushes) = mpsc::unbounded_channel();
    let _subscription = channel.on_location_push(move |update| {
        let _ = tx.send(update);
    });
    let mut events = channel.events();

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(ride = %ride_id, every = ?interval, "following ride, Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("stopping on Ctrl+C");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = channel.request_location(ride_id, admin_id) {
                    warn!(error = %e, "location request not sent");
                }
            }
            update = pushes.recv() => {
                let Some(update) = update else {
                    return Ok(());
                };
                let changed = view.apply(update);
                if let Some(current) = view.current().filter(|_| changed) {
                    println!("{}", format_update(current));
                }
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::Disconnected { reason }) => println!("connection lost: {reason}"),
                Ok(ChannelEvent::Connected) => println!("reconnected"),
                Ok(ChannelEvent::LocationUnavailable { ride_id: ride, message }) if ride == *ride_id => {
                    println!("{message}");
                }
                Ok(ChannelEvent::Closed) | Err(broadcast::error::RecvError::Closed) => {
                    return Err(ChannelError::Closed.into());
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleetdesk_types::Coordinates;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_update() {
        let update = LocationUpdate {
            ride_id: RideId::new("R-1").unwrap(),
            coordinates: Coordinates::new(88.363_9, 22.572_6).unwrap(),
            timestamp: Utc.with_ymd_and_hms(2026, 5, 1, 9, 15, 30).unwrap(),
        };
        assert_eq!(
            format_update(&update),
            "ride R-1 at 22.572600, 88.363900 (09:15:30)"
        );
    }
}
