// Connection Manager - Shared Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Connection Manager Models
//!
//! Types shared by the D-Bus clients and the failover services:
//!
//! - **Connection**: profiles, handles, lifecycle states, uplink entries
//! - **Config**: daemon configuration loaded from TOML
//! - **Error**: shared error types

pub mod config;
pub mod connection;
pub mod error;

pub use config::{AppConfig, ProbeConfig, ProbeKind, Timeouts};
pub use connection::{
    ActiveConnection, ActiveState, Connectivity, ConnectionProfile, ConnectionType, DeviceRef,
    Uplink,
};
pub use error::{Error, Result};

/// Configuration directory.
pub const CONFIG_DIR: &str = "/etc/connection-manager";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

