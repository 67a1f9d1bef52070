//! Default values for logo cache configuration

use std::time::Duration;

pub fn default_freshness() -> Duration {
    Duration::from_secs(60 * 60)
}

pub fn default_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

pub fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn default_max_body_bytes() -> u64 {
    10 * 1024 * 1024
}

pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
