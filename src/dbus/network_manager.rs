// Connection Manager - NetworkManager Client
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! NetworkManager D-Bus client.

use std::collections::HashMap;
use tracing::{debug, error, info};
use zbus::proxy::CacheProperties;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{proxy, Connection};

use super::NetworkService;
use crate::models::{
    ActiveConnection, ActiveState, ConnectionProfile, ConnectionType, DeviceRef, Error, Result,
};

/// Object path NetworkManager uses for "no object".
const NULL_OBJECT_PATH: &str = "/";

#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager",
    gen_blocking = false
)]
trait NetworkManager {
    fn get_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn activate_connection(
        &self,
        connection: &ObjectPath<'_>,
        device: &ObjectPath<'_>,
        specific_object: &ObjectPath<'_>,
    ) -> zbus::Result<OwnedObjectPath>;

    fn deactivate_connection(&self, active_connection: &ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(property)]
    fn active_connections(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    #[zbus(property)]
    fn version(&self) -> zbus::Result<String>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager/Settings",
    gen_blocking = false
)]
trait Settings {
    fn list_connections(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings.Connection",
    default_service = "org.freedesktop.NetworkManager",
    gen_blocking = false
)]
trait SettingsConnection {
    fn get_settings(&self) -> zbus::Result<HashMap<String, HashMap<String, OwnedValue>>>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Connection.Active",
    default_service = "org.freedesktop.NetworkManager",
    gen_blocking = false
)]
trait ActiveConnectionObject {
    #[zbus(property)]
    fn id(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn state(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager",
    gen_blocking = false
)]
trait Device {
    #[zbus(property)]
    fn interface(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn ip_interface(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn device_type(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn udi(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn active_connection(&self) -> zbus::Result<OwnedObjectPath>;
}

/// NetworkManager client on the system bus.
///
/// Property reads bypass the zbus cache: the daemon polls states that
/// change underneath it and must always see NetworkManager's current view.
#[derive(Clone)]
pub struct NmClient {
    connection: Connection,
}

impl NmClient {
    /// Connect to the system bus and make sure NetworkManager answers.
    pub async fn connect() -> Result<Self> {
        let connection = match Connection::system().await {
            Ok(conn) => {
                debug!("Connected to system D-Bus");
                conn
            }
            Err(e) => {
                error!("Failed to connect to system D-Bus: {}", e);
                return Err(Error::DbusConnectionFailed(e.to_string()));
            }
        };

        let client = Self { connection };
        match client.manager().await?.version().await {
            Ok(version) => info!("NetworkManager {} reachable", version),
            Err(e) => {
                error!("NetworkManager is not reachable: {}", e);
                return Err(Error::NetworkManagerUnavailable(e.to_string()));
            }
        }
        Ok(client)
    }

    /// Underlying bus connection, shared with the ModemManager client.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    async fn manager(&self) -> Result<NetworkManagerProxy<'static>> {
        Ok(NetworkManagerProxy::builder(&self.connection)
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn settings(&self) -> Result<SettingsProxy<'static>> {
        Ok(SettingsProxy::builder(&self.connection)
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn settings_connection<'a>(&self, path: &'a str) -> Result<SettingsConnectionProxy<'a>> {
        Ok(SettingsConnectionProxy::builder(&self.connection)
            .path(path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn active<'a>(&self, path: &'a str) -> Result<ActiveConnectionObjectProxy<'a>> {
        Ok(ActiveConnectionObjectProxy::builder(&self.connection)
            .path(path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn device<'a>(&self, path: &'a str) -> Result<DeviceProxy<'a>> {
        Ok(DeviceProxy::builder(&self.connection)
            .path(path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    /// Whether a device matches the profile's selection key.
    async fn device_matches(&self, path: &str, profile: &ConnectionProfile) -> Result<bool> {
        let device = self.device(path).await?;
        match &profile.interface_name {
            Some(name) => Ok(&device.interface().await? == name),
            None => Ok(device.device_type().await? == profile.kind.nm_device_type()),
        }
    }
}

impl NetworkService for NmClient {
    async fn list_active_connections(&self) -> Result<HashMap<String, ActiveConnection>> {
        let mut result = HashMap::new();
        for path in self.manager().await?.active_connections().await? {
            // Connections may disappear between listing and reading.
            match self.active(path.as_str()).await?.id().await {
                Ok(id) => {
                    result.insert(id, ActiveConnection::new(path.as_str()));
                }
                Err(e) => debug!("Skipping active connection {}: {}", path.as_str(), e),
            }
        }
        Ok(result)
    }

    async fn find_profile(&self, id: &str) -> Result<Option<ConnectionProfile>> {
        for path in self.settings().await?.list_connections().await? {
            let settings = match self.settings_connection(path.as_str()).await?.get_settings().await {
                Ok(settings) => settings,
                Err(e) => {
                    debug!("Skipping settings object {}: {}", path.as_str(), e);
                    continue;
                }
            };
            if connection_setting(&settings, "id").as_deref() == Some(id) {
                return profile_from_settings(path.as_str(), &settings).map(Some);
            }
        }
        Ok(None)
    }

    async fn find_device(&self, profile: &ConnectionProfile) -> Result<Option<DeviceRef>> {
        for path in self.manager().await?.get_devices().await? {
            match self.device_matches(path.as_str(), profile).await {
                Ok(true) => return Ok(Some(DeviceRef::new(path.as_str()))),
                Ok(false) => {}
                Err(e) => debug!("Skipping device {}: {}", path.as_str(), e),
            }
        }
        debug!("Device for connection \"{}\" is not found", profile.id);
        Ok(None)
    }

    async fn device_udi(&self, device: &DeviceRef) -> Result<String> {
        Ok(self.device(device.path()).await?.udi().await?)
    }

    async fn device_active_connection(&self, device: &DeviceRef) -> Result<Option<ActiveConnection>> {
        let path = self.device(device.path()).await?.active_connection().await?;
        if path.as_str() == NULL_OBJECT_PATH {
            Ok(None)
        } else {
            Ok(Some(ActiveConnection::new(path.as_str())))
        }
    }

    async fn active_connection_id(&self, handle: &ActiveConnection) -> Result<String> {
        Ok(self.active(handle.path()).await?.id().await?)
    }

    async fn activate(&self, profile: &ConnectionProfile, device: &DeviceRef) -> Result<ActiveConnection> {
        let path = self
            .manager()
            .await?
            .activate_connection(
                &object_path(&profile.path)?,
                &object_path(device.path())?,
                &object_path(NULL_OBJECT_PATH)?,
            )
            .await?;
        debug!("Activation of \"{}\" started as {}", profile.id, path.as_str());
        Ok(ActiveConnection::new(path.as_str()))
    }

    async fn deactivate(&self, handle: &ActiveConnection) -> Result<()> {
        let result = self
            .manager()
            .await?
            .deactivate_connection(&object_path(handle.path())?)
            .await
            .map_err(Error::from);

        match result {
            Err(e) if e.is_object_vanished() => {
                debug!("{} is already deactivated", handle);
                Ok(())
            }
            other => other,
        }
    }

    async fn active_state(&self, handle: &ActiveConnection) -> Result<ActiveState> {
        let raw = self.active(handle.path()).await?.state().await?;
        Ok(ActiveState::from(raw))
    }

    async fn active_device_interfaces(&self, handle: &ActiveConnection) -> Result<Vec<String>> {
        let mut interfaces = Vec::new();
        for path in self.active(handle.path()).await?.devices().await? {
            let interface = self.device(path.as_str()).await?.ip_interface().await?;
            if !interface.is_empty() {
                interfaces.push(interface);
            }
        }
        Ok(interfaces)
    }
}

/// Parse an object path coming from our own models.
fn object_path(path: &str) -> Result<ObjectPath<'_>> {
    ObjectPath::try_from(path).map_err(|e| Error::InvalidObjectPath(format!("{}: {}", path, e)))
}

/// Build a profile from a `GetSettings` reply.
fn profile_from_settings(
    path: &str,
    settings: &HashMap<String, HashMap<String, OwnedValue>>,
) -> Result<ConnectionProfile> {
    let id = connection_setting(settings, "id")
        .ok_or_else(|| Error::MalformedSettings(format!("{}: missing connection.id", path)))?;
    let kind_name = connection_setting(settings, "type")
        .ok_or_else(|| Error::MalformedSettings(format!("{}: missing connection.type", id)))?;
    let Some(kind) = ConnectionType::from_nm_type(&kind_name) else {
        return Err(Error::UnsupportedConnectionType { id, kind: kind_name });
    };

    let mut profile = ConnectionProfile::new(id, kind, path);
    if let Some(interface) = connection_setting(settings, "interface-name") {
        if !interface.is_empty() {
            profile = profile.with_interface(interface);
        }
    }
    Ok(profile)
}

/// String value from the `connection` settings section.
fn connection_setting(
    settings: &HashMap<String, HashMap<String, OwnedValue>>,
    key: &str,
) -> Option<String> {
    let value = settings.get("connection")?.get(key)?;
    match &**value {
        Value::Str(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}
