// Connection Manager - Connectivity Probe
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! External reachability checks bound to a single link.
//!
//! NetworkManager's own connectivity state is not used: on cellular links
//! it kept reporting full connectivity for modems that could not reach
//! anything. Instead every probe sends real traffic out of the interface
//! under test, so the default route never decides the result.
//!
//! Probes fail closed. Any transport error means [`Connectivity::None`].

#![allow(async_fn_in_trait)]

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::dbus::NetworkService;
use crate::models::{ActiveConnection, Connectivity, ProbeConfig, ProbeKind};

/// Extra time granted to `ping` on top of its own deadline.
const PING_GRACE: Duration = Duration::from_secs(2);

/// A reachability check for one network interface.
pub trait ConnectivityProbe {
    async fn check(&self, interface: &str) -> Connectivity;
}

/// Fetches a known page and looks for a marker in the body.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    expected_marker: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, expected_marker: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            expected_marker: expected_marker.into(),
            timeout,
        }
    }

    fn client_for(&self, interface: &str) -> reqwest::Result<reqwest::Client> {
        let builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .no_proxy()
            .user_agent(concat!("connection-manager/", env!("CARGO_PKG_VERSION")));

        #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
        let builder = builder.interface(interface);
        #[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
        warn!("Cannot bind HTTP probe to {} on this platform", interface);

        builder.build()
    }

    /// Classify a response body.
    fn classify(&self, body: &str) -> Connectivity {
        if body.contains(&self.expected_marker) {
            Connectivity::Full
        } else {
            Connectivity::Limited
        }
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn check(&self, interface: &str) -> Connectivity {
        let client = match self.client_for(interface) {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build HTTP client for {}: {}", interface, e);
                return Connectivity::None;
            }
        };

        let response = match client.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("HTTP probe via {} failed: {}", interface, e);
                return Connectivity::None;
            }
        };

        match response.text().await {
            Ok(body) => {
                let result = self.classify(&body);
                debug!("HTTP probe via {}: {:?}", interface, result);
                result
            }
            Err(e) => {
                debug!("HTTP probe via {} could not read body: {}", interface, e);
                Connectivity::None
            }
        }
    }
}

/// Sends ICMP echo requests with the system `ping` binary.
#[derive(Debug, Clone)]
pub struct PingProbe {
    target: String,
    count: u32,
    deadline: Duration,
}

impl PingProbe {
    pub fn new(target: impl Into<String>, count: u32, deadline: Duration) -> Self {
        Self {
            target: target.into(),
            count,
            deadline,
        }
    }

    fn args(&self, interface: &str) -> Vec<String> {
        vec![
            "-I".to_string(),
            interface.to_string(),
            "-c".to_string(),
            self.count.to_string(),
            "-w".to_string(),
            self.deadline.as_secs().max(1).to_string(),
            self.target.clone(),
        ]
    }
}

impl ConnectivityProbe for PingProbe {
    async fn check(&self, interface: &str) -> Connectivity {
        let child = Command::new("ping")
            .args(self.args(interface))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.deadline + PING_GRACE, child).await {
            Ok(Ok(status)) if status.success() => Connectivity::Full,
            Ok(Ok(status)) => {
                debug!("Ping via {} failed: {}", interface, status);
                Connectivity::None
            }
            Ok(Err(e)) => {
                debug!("Ping command failed: {}", e);
                Connectivity::None
            }
            Err(_) => {
                debug!("Ping via {} did not finish in time", interface);
                Connectivity::None
            }
        }
    }
}

/// Probe selected by configuration.
#[derive(Debug, Clone)]
pub enum Prober {
    Http(HttpProbe),
    Ping(PingProbe),
}

impl Prober {
    pub fn from_config(config: &ProbeConfig) -> Self {
        match config.kind {
            ProbeKind::Http => Self::Http(HttpProbe::new(
                &config.url,
                &config.expected_marker,
                config.timeout(),
            )),
            ProbeKind::Ping => Self::Ping(PingProbe::new(
                &config.ping_target,
                config.ping_count,
                config.timeout(),
            )),
        }
    }
}

impl ConnectivityProbe for Prober {
    async fn check(&self, interface: &str) -> Connectivity {
        match self {
            Self::Http(probe) => probe.check(interface).await,
            Self::Ping(probe) => probe.check(interface).await,
        }
    }
}

/// Connectivity of an active connection over any of its interfaces.
pub async fn link_connectivity<N, P>(network: &N, probe: &P, handle: &ActiveConnection) -> Connectivity
where
    N: NetworkService,
    P: ConnectivityProbe,
{
    let interfaces = match network.active_device_interfaces(handle).await {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("Cannot resolve interfaces of {}: {}", handle, e);
            return Connectivity::None;
        }
    };

    let mut best = Connectivity::None;
    for interface in &interfaces {
        match probe.check(interface).await {
            Connectivity::Full => return Connectivity::Full,
            Connectivity::Limited => best = Connectivity::Limited,
            Connectivity::None => {}
        }
    }
    if interfaces.is_empty() {
        debug!("{} has no interfaces to probe", handle);
    }
    best
}
