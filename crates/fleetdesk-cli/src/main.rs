//! `FleetDesk` operator client
//!
//! Signs admins and franchise operators in with a phone number and OTP, and
//! lets admins follow a ride's driver on the live location channel.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

mod account;
mod app;
mod error;
mod login;
mod track;

use crate::app::App;
use crate::error::CliResult;
use clap::{Parser, Subcommand};
use fleetdesk_core::{Config, LogFormat, init_logging};
use fleetdesk_session::{LoginFlow, LoginStep};
use fleetdesk_types::Role;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

/// Command line interface for the `FleetDesk` client
#[derive(Parser)]
#[command(
    name = "fleetdesk",
    version = env!("CARGO_PKG_VERSION"),
    about = "FleetDesk operator client",
    long_about = "Sign in to the FleetDesk console with a phone number and OTP, and follow rides in progress on the live location channel."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overrides the configuration
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    json: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Sign in with a phone number and OTP
    Login {
        /// Console to sign in to (admin, franchise)
        #[arg(short, long)]
        role: Option<Role>,

        /// Phone number; prompted for when absent
        #[arg(short, long)]
        phone: Option<String>,
    },

    /// Show the signed-in operator
    Whoami,

    /// Sign out and forget the session
    Logout,

    /// Show a ride's driver location (admin only)
    Track {
        /// Ride to locate
        #[arg(long, value_name = "RIDE_ID")]
        ride: String,

        /// Seconds to wait for the first location
        #[arg(short, long, default_value = "15")]
        timeout: u64,

        /// Keep following the ride until Ctrl+C
        #[arg(short, long)]
        follow: bool,

        /// Seconds between location requests while following
        #[arg(long, default_value = "10")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.format = LogFormat::Json;
    }
    init_logging(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "fleetdesk starting");

    let app = App::build(config)?;

    match cli.command {
        Commands::Login { role, phone } => login(&app, role, phone).await,
        Commands::Whoami => account::whoami(&app),
        Commands::Logout => account::logout(&app),
        Commands::Track {
            ride,
            timeout,
            follow,
            interval,
        } => {
            let options = track::TrackOptions {
                ride,
                timeout: Duration::from_secs(timeout),
                follow: follow.then(|| Duration::from_secs(interval.max(1))),
            };
            track::run(&app, options).await
        }
    }
}

async fn login(app: &App, role: Option<Role>, phone: Option<String>) -> CliResult<()> {
    let mut flow = LoginFlow::resume(Arc::clone(&app.auth));
    if flow.step() == LoginStep::Authenticated {
        if let Some(session) = flow.session() {
            println!(
                "Already signed in as {} ({}); run `fleetdesk logout` to switch",
                session.user.id, session.role
            );
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let session = login::run(&mut flow, &mut lines, role, phone).await?;
    info!(role = %session.role, "signed in");
    println!("Signed in as {} ({})", session.user.id, session.role);
    Ok(())
}
