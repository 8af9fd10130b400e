use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use puzzle_core::scramble::{DEFAULT_MAX_EDGE, DEFAULT_QUALITY};
use puzzle_core::{OutputFormat, RenderOptions};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} must be set when {required_by} is")]
    Missing {
        name: &'static str,
        required_by: &'static str,
    },
}

/// Service settings, read from the environment at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// JSON snapshot of the catalog; nothing is persisted when unset.
    pub persist_path: Option<PathBuf>,
    /// Blob directory; blobs stay in memory when unset.
    pub blob_dir: Option<PathBuf>,
    pub public_base_url: String,
    pub max_edge: u32,
    pub output_format: OutputFormat,
    pub tick_interval: Duration,
    pub max_upload_bytes: usize,
    /// How long a finished session stays readable before eviction.
    pub session_grace: Duration,
    /// Sessions never started are evicted after this long.
    pub idle_session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            persist_path: None,
            blob_dir: None,
            public_base_url: "/blobs".to_string(),
            max_edge: DEFAULT_MAX_EDGE,
            output_format: OutputFormat::WebP,
            tick_interval: Duration::from_secs(1),
            max_upload_bytes: 20 * 1024 * 1024,
            session_grace: Duration::from_secs(120),
            idle_session_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_edge = non_zero(&lookup, "MAX_EDGE")?.unwrap_or(defaults.max_edge);
        let persist_path = lookup("PERSIST_PATH").map(PathBuf::from);
        let blob_dir = lookup("BLOB_DIR").map(PathBuf::from);
        // A reloaded catalog would point at blobs that died with the process.
        if persist_path.is_some() && blob_dir.is_none() {
            return Err(ConfigError::Missing {
                name: "BLOB_DIR",
                required_by: "PERSIST_PATH",
            });
        }
        Ok(Self {
            bind_addr: parse(&lookup, "BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            persist_path,
            blob_dir,
            public_base_url: lookup("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            max_edge,
            output_format: parse(&lookup, "OUTPUT_FORMAT")?.unwrap_or(defaults.output_format),
            tick_interval: non_zero::<u64>(&lookup, "TICK_MILLIS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            session_grace: parse(&lookup, "SESSION_GRACE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_grace),
            idle_session_ttl: parse(&lookup, "IDLE_SESSION_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_session_ttl),
        })
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            max_edge: self.max_edge,
            format: self.output_format,
            quality: DEFAULT_QUALITY,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}

fn non_zero<T: FromStr + Default + PartialEq>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match parse::<T>(lookup, name)? {
        Some(value) if value == T::default() => Err(ConfigError::Invalid {
            name,
            value: lookup(name).unwrap_or_default(),
        }),
        value => Ok(value),
    }
}
