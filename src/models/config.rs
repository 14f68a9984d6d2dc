// Connection Manager - Daemon Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Daemon configuration model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use super::connection::Uplink;
use super::{Error, Result};

/// Upper bound for every configured duration: one day.
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Connectivity probe strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// HTTP GET against a known page, checking for a marker string.
    #[default]
    Http,
    /// ICMP echo via the system `ping` binary.
    Ping,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Ping => "ping",
        }
    }
}

/// Connectivity probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Which probe to run.
    #[serde(default)]
    pub kind: ProbeKind,

    /// URL fetched by the HTTP probe.
    #[serde(default = "default_probe_url")]
    pub url: String,

    /// Text the HTTP response body must contain.
    #[serde(default = "default_probe_marker")]
    pub expected_marker: String,

    /// Host pinged by the ICMP probe.
    #[serde(default = "default_ping_target")]
    pub ping_target: String,

    /// Number of echo requests sent by the ICMP probe.
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Upper bound for a single probe, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            kind: ProbeKind::default(),
            url: default_probe_url(),
            expected_marker: default_probe_marker(),
            ping_target: default_ping_target(),
            ping_count: default_ping_count(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_probe_url() -> String {
    "http://network-test.debian.org/nm".to_string()
}

fn default_probe_marker() -> String {
    "NetworkManager is online".to_string()
}

fn default_ping_target() -> String {
    "8.8.8.8".to_string()
}

fn default_ping_count() -> u32 {
    3
}

fn default_probe_timeout() -> u64 {
    10
}

/// Poll and deadline settings shared by every bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Delay between two polls.
    pub poll_interval: Duration,
    /// How long to wait for an activation to reach `Activated`.
    pub activation: Duration,
    /// How long to wait for a deactivation to reach `Deactivated`.
    pub deactivation: Duration,
    /// How long to wait for a device to (re)appear.
    pub device: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        AppConfig::default().timeouts()
    }
}

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Delay between two check cycles, in seconds.
    #[serde(default = "default_check_period")]
    pub check_period_secs: u64,

    /// Minimum time between two activation attempts of the same uplink, in seconds.
    #[serde(default = "default_retry_cooldown")]
    pub activation_retry_secs: u64,

    /// Activation deadline, in seconds.
    #[serde(default = "default_wait_timeout")]
    pub activation_timeout_secs: u64,

    /// Deactivation deadline, in seconds.
    #[serde(default = "default_wait_timeout")]
    pub deactivation_timeout_secs: u64,

    /// Device (re)discovery deadline, in seconds.
    #[serde(default = "default_wait_timeout")]
    pub device_timeout_secs: u64,

    /// Poll interval for every bounded wait, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Uplinks, highest priority first.
    #[serde(default = "default_uplinks")]
    pub uplinks: Vec<Uplink>,

    /// Connectivity probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,
}

fn default_check_period() -> u64 {
    5
}

fn default_retry_cooldown() -> u64 {
    60
}

fn default_wait_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_uplinks() -> Vec<Uplink> {
    ["wb-eth0", "wb-eth1", "wb-wifi", "wb-gsm-sim1", "wb-gsm-sim2"]
        .into_iter()
        .map(Uplink::new)
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            check_period_secs: default_check_period(),
            activation_retry_secs: default_retry_cooldown(),
            activation_timeout_secs: default_wait_timeout(),
            deactivation_timeout_secs: default_wait_timeout(),
            device_timeout_secs: default_wait_timeout(),
            poll_interval_ms: default_poll_interval(),
            log_level: default_log_level(),
            uplinks: default_uplinks(),
            probe: ProbeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigReadFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.uplinks.is_empty() {
            return Err(Error::InvalidConfig("uplink list is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for uplink in &self.uplinks {
            if uplink.id.trim().is_empty() {
                return Err(Error::InvalidConfig("uplink with empty id".to_string()));
            }
            if !seen.insert(uplink.id.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate uplink '{}'", uplink.id)));
            }
            if uplink.sim_slot == Some(0) {
                return Err(Error::InvalidConfig(format!(
                    "uplink '{}': SIM slots are numbered from 1",
                    uplink.id
                )));
            }
        }

        let durations = [
            ("check_period_secs", self.check_period_secs),
            ("activation_timeout_secs", self.activation_timeout_secs),
            ("deactivation_timeout_secs", self.deactivation_timeout_secs),
            ("device_timeout_secs", self.device_timeout_secs),
            ("poll_interval_ms", self.poll_interval_ms),
            ("probe.timeout_secs", self.probe.timeout_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidConfig(format!("{} must be greater than zero", name)));
        }

        let seconds = [
            ("check_period_secs", self.check_period_secs),
            ("activation_retry_secs", self.activation_retry_secs),
            ("activation_timeout_secs", self.activation_timeout_secs),
            ("deactivation_timeout_secs", self.deactivation_timeout_secs),
            ("device_timeout_secs", self.device_timeout_secs),
            ("poll_interval_ms", self.poll_interval_ms / 1000),
            ("probe.timeout_secs", self.probe.timeout_secs),
        ];
        if let Some((name, _)) = seconds.iter().find(|(_, value)| *value > MAX_DURATION_SECS) {
            return Err(Error::InvalidConfig(format!(
                "{} must not exceed {} seconds",
                name, MAX_DURATION_SECS
            )));
        }

        match self.probe.kind {
            ProbeKind::Http if self.probe.url.is_empty() => {
                Err(Error::InvalidConfig("probe.url is empty".to_string()))
            }
            ProbeKind::Ping if self.probe.ping_target.is_empty() => {
                Err(Error::InvalidConfig("probe.ping_target is empty".to_string()))
            }
            ProbeKind::Ping if self.probe.ping_count == 0 => {
                Err(Error::InvalidConfig("probe.ping_count must be greater than zero".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.check_period_secs)
    }

    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.activation_retry_secs)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            activation: Duration::from_secs(self.activation_timeout_secs),
            deactivation: Duration::from_secs(self.deactivation_timeout_secs),
            device: Duration::from_secs(self.device_timeout_secs),
        }
    }
}
