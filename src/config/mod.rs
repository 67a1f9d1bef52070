//! Configuration for the logo cache service
//!
//! Durations accept either integer seconds or human-readable strings
//! (`"30s"`, `"1h"`). Configuration is loaded from a TOML file merged with
//! `LOGO_CACHE_`-prefixed environment variables, environment taking
//! precedence.

use anyhow::Result;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoCacheConfig {
    /// How long a cached logo is served without contacting the origin
    #[serde(default = "default_freshness", with = "duration_serde::duration")]
    pub freshness: Duration,

    /// How long an entry survives without any request before eviction.
    /// Stale entries inside this window are kept as a fallback for failed
    /// refreshes.
    #[serde(default = "default_retention", with = "duration_serde::duration")]
    pub retention: Duration,

    /// Connection timeout for logo fetches. No total request timeout is
    /// applied; a hung transfer delays resolution until the caller gives up.
    #[serde(
        default = "default_connect_timeout",
        with = "duration_serde::duration"
    )]
    pub connect_timeout: Duration,

    /// Largest accepted logo body in bytes. 0 disables the limit.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// User-Agent header sent with logo fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LogoCacheConfig {
    fn default() -> Self {
        Self {
            freshness: default_freshness(),
            retention: default_retention(),
            connect_timeout: default_connect_timeout(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl LogoCacheConfig {
    /// Load configuration from a TOML file, overlaid with
    /// `LOGO_CACHE_`-prefixed environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LOGO_CACHE_"))
            .extract()?;

        config.validate()?;

        info!(
            "Loaded logo cache config: freshness={} retention={} connect_timeout={}",
            humantime::format_duration(config.freshness),
            humantime::format_duration(config.retention),
            humantime::format_duration(config.connect_timeout),
        );

        Ok(config)
    }

    /// Check window invariants. The freshness window must fit inside the
    /// retention window, otherwise entries would be evicted while still
    /// fresh.
    pub fn validate(&self) -> crate::errors::LogoResult<()> {
        if self.freshness.is_zero() {
            return Err(crate::errors::LogoError::configuration(
                "freshness window must be greater than zero",
            ));
        }
        if self.retention < self.freshness {
            return Err(crate::errors::LogoError::configuration(format!(
                "retention window ({}) must be at least the freshness window ({})",
                humantime::format_duration(self.retention),
                humantime::format_duration(self.freshness),
            )));
        }
        Ok(())
    }
}
