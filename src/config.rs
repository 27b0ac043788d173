//! Configuration management

use anyhow::{self, Context, Result};

const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_LOGS_DIR: &str = "../logs";

/// Default minimum interval between Nominatim requests (public instance allows 1 req/s)
pub const DEFAULT_NOMINATIM_RATE_LIMIT_MS: u64 = 1500;
/// Default failures before the geocoding circuit breaker opens
pub const DEFAULT_NOMINATIM_CB_THRESHOLD: u32 = 3;
/// Default circuit breaker recovery time
pub const DEFAULT_NOMINATIM_CB_RECOVERY_SECS: u64 = 300;

/// Which geocoder implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocoderBackend {
    /// Deterministic fake coordinates, no network
    Mock,
    /// Rate-limited Nominatim
    Nominatim,
}

impl GeocoderBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "mock" => Ok(GeocoderBackend::Mock),
            "nominatim" => Ok(GeocoderBackend::Nominatim),
            other => anyhow::bail!("GEOCODER_BACKEND must be 'mock' or 'nominatim', got '{}'", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// Minimum interval between Nominatim requests
    pub nominatim_rate_limit_ms: u64,

    /// Consecutive failures before geocoding is paused
    pub nominatim_cb_threshold: u32,

    /// How long geocoding stays paused
    pub nominatim_cb_recovery_secs: u64,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable)
    pub valhalla_url: Option<String>,

    /// Geocoder implementation
    pub geocoder_backend: GeocoderBackend,

    /// Directory for rolling log files
    pub logs_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nats_url: DEFAULT_NATS_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            nominatim_rate_limit_ms: DEFAULT_NOMINATIM_RATE_LIMIT_MS,
            nominatim_cb_threshold: DEFAULT_NOMINATIM_CB_THRESHOLD,
            nominatim_cb_recovery_secs: DEFAULT_NOMINATIM_CB_RECOVERY_SECS,
            valhalla_url: None,
            geocoder_backend: GeocoderBackend::Mock,
            logs_dir: DEFAULT_LOGS_DIR.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let nats_url = var("NATS_URL").unwrap_or(defaults.nats_url);

        let nominatim_url = var("NOMINATIM_URL")
            .or_else(|| var("NOMINATIM_BASE_URL"))
            .unwrap_or(defaults.nominatim_url);

        let nominatim_rate_limit_ms = match var("NOMINATIM_RATE_LIMIT_MS") {
            Some(v) => v.trim().parse().context("NOMINATIM_RATE_LIMIT_MS must be an integer")?,
            None => defaults.nominatim_rate_limit_ms,
        };

        let nominatim_cb_threshold = match var("NOMINATIM_CB_THRESHOLD") {
            Some(v) => v.trim().parse().context("NOMINATIM_CB_THRESHOLD must be an integer")?,
            None => defaults.nominatim_cb_threshold,
        };

        let nominatim_cb_recovery_secs = match var("NOMINATIM_CB_RECOVERY_SECS") {
            Some(v) => v.trim().parse().context("NOMINATIM_CB_RECOVERY_SECS must be an integer")?,
            None => defaults.nominatim_cb_recovery_secs,
        };

        let valhalla_url = var("VALHALLA_URL");

        let geocoder_backend = match var("GEOCODER_BACKEND") {
            Some(v) => GeocoderBackend::parse(&v)?,
            None => defaults.geocoder_backend,
        };

        let logs_dir = var("LOGS_DIR").unwrap_or(defaults.logs_dir);

        Ok(Self {
            nats_url,
            nominatim_url,
            nominatim_rate_limit_ms,
            nominatim_cb_threshold,
            nominatim_cb_recovery_secs,
            valhalla_url,
            geocoder_backend,
            logs_dir,
        })
    }
}
