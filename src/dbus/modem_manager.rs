// Connection Manager - ModemManager Client
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! ModemManager D-Bus client for SIM slot selection.

use tracing::{debug, info, warn};
use zbus::proxy::CacheProperties;
use zbus::{proxy, Connection};

use super::ModemService;
use crate::models::{Error, Result};

#[proxy(
    interface = "org.freedesktop.ModemManager1.Modem",
    default_service = "org.freedesktop.ModemManager1",
    gen_blocking = false
)]
trait Modem {
    fn set_primary_sim_slot(&self, sim_slot: u32) -> zbus::Result<()>;

    #[zbus(property)]
    fn primary_sim_slot(&self) -> zbus::Result<u32>;
}

/// ModemManager client on the system bus.
#[derive(Clone)]
pub struct MmClient {
    connection: Connection,
}

impl MmClient {
    /// Create a client sharing an existing bus connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    async fn modem<'a>(&self, path: &'a str) -> Result<ModemProxy<'a>> {
        Ok(ModemProxy::builder(&self.connection)
            .path(path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }
}

impl ModemService for MmClient {
    async fn set_primary_sim_slot(&self, modem: &str, slot: u32) -> Result<bool> {
        let proxy = self.modem(modem).await?;

        let current = proxy.primary_sim_slot().await?;
        if current == 0 {
            warn!("Modem {} does not support multiple SIM slots", modem);
            return Ok(false);
        }
        if current == slot {
            debug!("SIM slot {} is already primary on {}", slot, modem);
            return Ok(true);
        }

        info!("Switching {} from SIM slot {} to {}", modem, current, slot);
        let result = proxy.set_primary_sim_slot(slot).await.map_err(Error::from);
        switch_outcome(modem, slot, result)
    }
}

/// Interpret the reply to `SetPrimarySimSlot`. Only a successful reply confirms the switch.
fn switch_outcome(modem: &str, slot: u32, result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_object_vanished() => {
            warn!("Modem {} went away before confirming SIM slot {}", modem, slot);
            Ok(false)
        }
        Err(Error::Dbus(reason)) => {
            warn!("Modem {} rejected SIM slot {}: {}", modem, slot, reason);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
