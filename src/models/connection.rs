// Connection Manager - Connection Data Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Connection profiles, active connection handles and their lifecycle states.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker in a connection id selecting a SIM slot, e.g. `wb-gsm-sim2`.
static SIM_SLOT_MARKER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)sim(\d+)").ok());

/// Kind of uplink a connection profile describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// Wired Ethernet.
    Ethernet,
    /// Wireless (Wi-Fi) client.
    Wifi,
    /// Cellular modem (GSM/LTE).
    Cellular,
}

impl ConnectionType {
    /// Map a NetworkManager `connection.type` setting.
    pub fn from_nm_type(kind: &str) -> Option<Self> {
        match kind {
            "802-3-ethernet" => Some(Self::Ethernet),
            "802-11-wireless" => Some(Self::Wifi),
            "gsm" => Some(Self::Cellular),
            _ => None,
        }
    }

    /// NetworkManager `NMDeviceType` used when a profile is not bound to an interface.
    pub fn nm_device_type(&self) -> u32 {
        match self {
            Self::Ethernet => 1,
            Self::Wifi => 2,
            Self::Cellular => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethernet => "ethernet",
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
        }
    }
}

/// A statically configured connection profile known to NetworkManager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// Unique connection id (`connection.id`).
    pub id: String,
    /// Uplink kind.
    pub kind: ConnectionType,
    /// Bound interface name (`connection.interface-name`), if any.
    pub interface_name: Option<String>,
    /// Settings object path used for activation.
    pub path: String,
}

impl ConnectionProfile {
    pub fn new(id: impl Into<String>, kind: ConnectionType, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            interface_name: None,
            path: path.into(),
        }
    }

    /// Bind the profile to a specific interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface_name = Some(interface.into());
        self
    }
}

/// Handle of a running connection instance (NetworkManager active connection path).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveConnection(String);

impl ActiveConnection {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a network device (NetworkManager device path).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceRef(String);

impl DeviceRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an active connection (`NMActiveConnectionState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    Unknown,
    Activating,
    Activated,
    Deactivating,
    Deactivated,
}

impl From<u32> for ActiveState {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Activating,
            2 => Self::Activated,
            3 => Self::Deactivating,
            4 => Self::Deactivated,
            _ => Self::Unknown,
        }
    }
}

/// Result of probing a link for external reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// The reachability target answered as expected.
    Full,
    /// Something answered, but not the target (captive portal, proxy).
    Limited,
    /// Nothing answered.
    None,
}

impl Connectivity {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// One entry of the uplink priority list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uplink {
    /// Connection id as known to NetworkManager.
    pub id: String,

    /// SIM slot for cellular profiles. Derived from the id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_slot: Option<u32>,
}

impl Uplink {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sim_slot: None,
        }
    }

    pub fn with_sim_slot(mut self, slot: u32) -> Self {
        self.sim_slot = Some(slot);
        self
    }

    /// Effective SIM slot: the explicit setting, else a `simN` marker in the id, else 1.
    pub fn sim_slot(&self) -> u32 {
        self.sim_slot
            .or_else(|| sim_slot_from_id(&self.id))
            .unwrap_or(1)
    }
}

/// Extract the slot number from a `simN` marker in a connection id.
fn sim_slot_from_id(id: &str) -> Option<u32> {
    let re = SIM_SLOT_MARKER.as_ref()?;
    re.captures(id)?.get(1)?.as_str().parse().ok()
}
