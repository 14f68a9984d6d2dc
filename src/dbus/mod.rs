// Connection Manager - D-Bus Clients
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Narrow client contracts for the system services the daemon drives.
//!
//! The failover services only see the [`NetworkService`] and
//! [`ModemService`] traits. The zbus-backed implementations talk to
//! NetworkManager and ModemManager on the system bus. Every call may fail
//! transiently; callers decide how a failure affects the current cycle.

#![allow(async_fn_in_trait)]

pub mod modem_manager;
pub mod network_manager;

use std::collections::HashMap;

use crate::models::{ActiveConnection, ActiveState, ConnectionProfile, DeviceRef, Result};

pub use modem_manager::MmClient;
pub use network_manager::NmClient;

/// Queries and mutates network connections and devices.
pub trait NetworkService {
    /// Currently active connections, keyed by connection id.
    async fn list_active_connections(&self) -> Result<HashMap<String, ActiveConnection>>;

    /// Look up a connection profile by id.
    async fn find_profile(&self, id: &str) -> Result<Option<ConnectionProfile>>;

    /// Find the device a profile would run on: by interface name, else by device type.
    async fn find_device(&self, profile: &ConnectionProfile) -> Result<Option<DeviceRef>>;

    /// Device `Udi` property. For modems this is the ModemManager object path.
    async fn device_udi(&self, device: &DeviceRef) -> Result<String>;

    /// Device `ActiveConnection` property.
    async fn device_active_connection(&self, device: &DeviceRef) -> Result<Option<ActiveConnection>>;

    /// Connection id of an active connection.
    async fn active_connection_id(&self, handle: &ActiveConnection) -> Result<String>;

    /// Start activating a profile on a device.
    async fn activate(&self, profile: &ConnectionProfile, device: &DeviceRef) -> Result<ActiveConnection>;

    /// Request deactivation. Deactivating a connection that is already gone is `Ok`.
    async fn deactivate(&self, handle: &ActiveConnection) -> Result<()>;

    /// Lifecycle state. Fails with `Error::ObjectVanished` once the connection is gone.
    async fn active_state(&self, handle: &ActiveConnection) -> Result<ActiveState>;

    /// IP interface names of the devices carrying an active connection.
    async fn active_device_interfaces(&self, handle: &ActiveConnection) -> Result<Vec<String>>;
}

/// Controls cellular modem hardware.
pub trait ModemService {
    /// Make `slot` the primary SIM slot of `modem`.
    ///
    /// Returns `false` when nothing changed; callers must not assume success then.
    async fn set_primary_sim_slot(&self, modem: &str, slot: u32) -> Result<bool>;
}
