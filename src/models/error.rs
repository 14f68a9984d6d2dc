// Connection Manager - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for the connection manager.

use thiserror::Error;

/// Result type alias for connection manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// D-Bus error names meaning the remote object is already gone.
const VANISHED_ERROR_NAMES: &[&str] = &[
    "org.freedesktop.DBus.Error.UnknownMethod",
    "org.freedesktop.DBus.Error.UnknownObject",
    "org.freedesktop.NetworkManager.ConnectionNotActive",
];

/// Main error type for connection manager operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Connection Errors
    // ========================================
    #[error("Unsupported connection type '{kind}' for {id}")]
    UnsupportedConnectionType { id: String, kind: String },

    #[error("Malformed connection settings: {0}")]
    MalformedSettings(String),

    // ========================================
    // D-Bus Errors
    // ========================================
    #[error("D-Bus error: {0}")]
    Dbus(String),

    #[error("D-Bus object vanished: {0}")]
    ObjectVanished(String),

    #[error("Invalid D-Bus object path: {0}")]
    InvalidObjectPath(String),

    #[error("D-Bus connection failed: {0}")]
    DbusConnectionFailed(String),

    #[error("NetworkManager unavailable: {0}")]
    NetworkManagerUnavailable(String),

    // ========================================
    // Configuration Errors
    // ========================================
    #[error("Failed to read configuration: {0}")]
    ConfigReadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

}

impl Error {
    /// Check if this error means the remote object no longer exists.
    pub fn is_object_vanished(&self) -> bool {
        matches!(self, Self::ObjectVanished(_))
    }
}

/// Check whether a zbus error reports that the target object has gone away.
pub fn is_vanished_dbus_error(err: &zbus::Error) -> bool {
    match err {
        zbus::Error::MethodError(name, _, _) => VANISHED_ERROR_NAMES.contains(&name.as_str()),
        zbus::Error::FDO(fdo) => matches!(
            **fdo,
            zbus::fdo::Error::UnknownMethod(_) | zbus::fdo::Error::UnknownObject(_)
        ),
        _ => false,
    }
}

// Convert from zbus errors
impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        if is_vanished_dbus_error(&err) {
            Error::ObjectVanished(err.to_string())
        } else {
            Error::Dbus(err.to_string())
        }
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}
