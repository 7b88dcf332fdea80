//! Configuration management for the `FleetDesk` client

use fleetdesk_types::{OtpCode, PhoneNumber};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use validator::Validate;

/// Environment variable prefix, e.g. `FLEETDESK_API__BASE_URL`
pub const ENV_PREFIX: &str = "FLEETDESK";

/// File looked up in the working directory when no path is given
pub const DEFAULT_FILE_STEM: &str = "fleetdesk";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// REST backend
    #[validate(nested)]
    pub api: ApiConfig,

    /// Live location channel
    #[validate(nested)]
    pub channel: ChannelConfig,

    /// OTP login
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Session persistence
    pub session: SessionConfig,

    /// Logging configuration
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// REST backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL the auth and data endpoints hang off
    #[validate(url)]
    pub base_url: String,

    /// Whole request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    #[validate(range(min = 1, max = 120))]
    pub connect_timeout_secs: u64,
}

/// Live location channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ChannelConfig {
    /// Socket server URL (`http`, `https`, `ws` or `wss`)
    #[validate(url)]
    pub url: String,

    /// Connection attempts before giving up
    #[validate(range(min = 1, max = 100))]
    pub reconnect_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[validate(range(max = 600_000))]
    pub reconnect_delay_ms: u64,

    /// How long a location request waits for its push, in seconds
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Websocket handshake timeout in seconds
    #[validate(range(min = 1, max = 120))]
    pub connect_timeout_secs: u64,
}

/// OTP login configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuthConfig {
    /// Validity of an OTP challenge in seconds
    #[validate(range(min = 1, max = 3600))]
    pub otp_window_secs: u64,

    /// Test numbers that skip the OTP backend
    #[validate(nested)]
    pub bypass: BypassConfig,
}

/// Allowlist of test phone numbers with a constant OTP
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BypassConfig {
    /// Allowlisted numbers; empty disables bypass
    #[validate(custom(function = "validate_phone_numbers"))]
    pub numbers: Vec<String>,

    /// The constant code
    #[validate(custom(function = "validate_otp_code"))]
    pub code: String,

    /// Verification id used in place of a backend issued one
    #[validate(length(min = 1))]
    pub verification_id: String,
}

/// Session persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session file; the platform data directory is used when unset
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[validate(length(min = 1))]
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_channel_url() -> String {
    "http://localhost:5000".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_connect_timeout() -> u64 {
    10
}

const fn default_reconnect_attempts() -> u32 {
    5
}

const fn default_reconnect_delay_ms() -> u64 {
    2_000
}

const fn default_location_timeout() -> u64 {
    15
}

const fn default_otp_window() -> u64 {
    90
}

fn default_bypass_code() -> String {
    "1234".to_string()
}

fn default_bypass_verification_id() -> String {
    "bypass-verification".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn validate_phone_numbers(numbers: &[String]) -> Result<(), validator::ValidationError> {
    if numbers.iter().all(|number| PhoneNumber::parse(number).is_ok()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("phone")
            .with_message("bypass numbers must be 10-digit phone numbers".into()))
    }
}

fn validate_otp_code(code: &str) -> Result<(), validator::ValidationError> {
    OtpCode::parse(code).map(|_| ()).map_err(|_| {
        validator::ValidationError::new("otp").with_message("bypass code must be 4 digits".into())
    })
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ApiConfig {
    /// Whole request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: default_channel_url(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            request_timeout_secs: default_location_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ChannelConfig {
    /// Delay between connection attempts
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Location request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Handshake timeout
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            otp_window_secs: default_otp_window(),
            bypass: BypassConfig::default(),
        }
    }
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            numbers: Vec::new(),
            code: default_bypass_code(),
            verification_id: default_bypass_verification_id(),
        }
    }
}

impl BypassConfig {
    /// Bypass for `numbers` with the default code
    #[must_use]
    pub fn allowing<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numbers: numbers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Whether `phone` is on the allowlist
    #[must_use]
    pub fn contains(&self, phone: &PhoneNumber) -> bool {
        self.numbers
            .iter()
            .any(|number| PhoneNumber::normalize(number) == phone.as_str())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file and the environment
    ///
    /// With `path` the file must exist; without it an optional `fleetdesk.*`
    /// file in the working directory is used. `FLEETDESK_*` variables override
    /// both, with `__` separating sections (`FLEETDESK_CHANNEL__URL`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let file = path.map_or_else(
            || config::File::with_name(DEFAULT_FILE_STEM).required(false),
            |path| config::File::from(path).required(true),
        );

        let config: Self = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!(
            api = %config.api.base_url,
            channel = %config.channel.url,
            "configuration loaded"
        );
        Ok(config)
    }
}
