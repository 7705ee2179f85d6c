// Runtime environment summary logged at startup.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct EnvStats {
    pub package: &'static str,
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub cpus: usize,
    pub backend: String,
    pub device: String,
    pub timestamp: DateTime<Utc>,
}

impl EnvStats {
    pub fn collect(backend: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            package: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            backend: backend.into(),
            device: device.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("<unavailable: {e}>"))
    }
}
