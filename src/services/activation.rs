// Connection Manager - Activation Sequencer
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Type-specific protocols for bringing a connection profile up.
//!
//! Ethernet and Wi-Fi profiles are activated directly on their device.
//! Cellular profiles first free the modem, switch it to the profile's SIM
//! slot, wait for ModemManager to recreate the device and only then
//! activate. Each step runs only after the previous one succeeded.

use std::ops::ControlFlow;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::poll::poll_until;
use super::uptime::UpTimeTracker;
use crate::dbus::{ModemService, NetworkService};
use crate::models::{
    ActiveConnection, ActiveState, ConnectionProfile, ConnectionType, DeviceRef, Result, Timeouts,
    Uplink,
};

/// How a profile gets activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStrategy {
    /// Resolve the device and activate on it.
    Generic,
    /// Switch the modem to `sim_slot` first.
    Cellular { sim_slot: u32 },
}

impl ActivationStrategy {
    pub fn for_profile(profile: &ConnectionProfile, uplink: &Uplink) -> Self {
        match profile.kind {
            ConnectionType::Ethernet | ConnectionType::Wifi => Self::Generic,
            ConnectionType::Cellular => Self::Cellular {
                sim_slot: uplink.sim_slot(),
            },
        }
    }
}

/// Outcome of one activation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// Handle of the activated connection, `None` if the attempt failed.
    pub handle: Option<ActiveConnection>,
    /// Connection taken down to make room on a shared modem.
    pub displaced: Option<String>,
}

#[cfg(test)]
impl Activation {
    pub fn is_activated(&self) -> bool {
        self.handle.is_some()
    }
}

/// Runs activation protocols against NetworkManager and ModemManager.
pub struct ActivationSequencer<M> {
    modem: M,
    timeouts: Timeouts,
}

impl<M: ModemService> ActivationSequencer<M> {
    pub fn new(modem: M, timeouts: Timeouts) -> Self {
        Self { modem, timeouts }
    }

    /// Try to bring `uplink` up.
    ///
    /// Never fails: errors are logged and reported as a failed activation.
    /// A connection displaced on the way has its cooldown expired in `uptime`.
    pub async fn activate<N: NetworkService>(
        &self,
        network: &N,
        uplink: &Uplink,
        uptime: &mut UpTimeTracker,
    ) -> Activation {
        let mut activation = Activation::default();
        match self.try_activate(network, uplink, uptime, &mut activation).await {
            Ok(handle) => activation.handle = handle,
            Err(e) => warn!("Activation of \"{}\" failed: {}", uplink.id, e),
        }
        activation
    }

    async fn try_activate<N: NetworkService>(
        &self,
        network: &N,
        uplink: &Uplink,
        uptime: &mut UpTimeTracker,
        activation: &mut Activation,
    ) -> Result<Option<ActiveConnection>> {
        let Some(profile) = network.find_profile(&uplink.id).await? else {
            debug!("\"{}\" not found", uplink.id);
            return Ok(None);
        };

        info!("Activate {} connection \"{}\"", profile.kind.as_str(), profile.id);
        match ActivationStrategy::for_profile(&profile, uplink) {
            ActivationStrategy::Generic => self.activate_generic(network, &profile).await,
            ActivationStrategy::Cellular { sim_slot } => {
                self.activate_cellular(network, &profile, sim_slot, uptime, activation)
                    .await
            }
        }
    }

    async fn activate_generic<N: NetworkService>(
        &self,
        network: &N,
        profile: &ConnectionProfile,
    ) -> Result<Option<ActiveConnection>> {
        let Some(device) = network.find_device(profile).await? else {
            debug!("Device for connection \"{}\" is not found", profile.id);
            return Ok(None);
        };
        self.activate_on(network, profile, &device).await
    }

    async fn activate_cellular<N: NetworkService>(
        &self,
        network: &N,
        profile: &ConnectionProfile,
        sim_slot: u32,
        uptime: &mut UpTimeTracker,
        activation: &mut Activation,
    ) -> Result<Option<ActiveConnection>> {
        let Some(device) = network.find_device(profile).await? else {
            debug!("Device for connection \"{}\" is not found", profile.id);
            return Ok(None);
        };
        let modem = network.device_udi(&device).await?;
        debug!("Device path \"{}\"", modem);

        // Switching the SIM while a connection is up can make NetworkManager restart.
        if let Some(current) = network.device_active_connection(&device).await? {
            let current_id = network.active_connection_id(&current).await?;
            if current_id == profile.id {
                debug!("\"{}\" is already active on {}", profile.id, device);
                return Ok(Some(current));
            }

            info!("Deactivate active connection \"{}\"", current_id);
            let deactivated = deactivate_and_wait(network, &current, self.timeouts).await?;
            uptime.force_eligible(&current_id, Instant::now());
            activation.displaced = Some(current_id);
            if !deactivated {
                warn!("Modem {} is still busy, not switching SIM", modem);
                return Ok(None);
            }
        }

        if !self.modem.set_primary_sim_slot(&modem, sim_slot).await? {
            warn!("SIM slot {} was not selected for \"{}\"", sim_slot, profile.id);
            return Ok(None);
        }

        // ModemManager recreates the device under a new path after a SIM switch.
        let Some(device) = self.wait_for_device(network, profile).await else {
            debug!("Device for connection \"{}\" did not come back", profile.id);
            return Ok(None);
        };
        debug!("Device path after SIM switching \"{}\"", device);

        self.activate_on(network, profile, &device).await
    }

    async fn activate_on<N: NetworkService>(
        &self,
        network: &N,
        profile: &ConnectionProfile,
        device: &DeviceRef,
    ) -> Result<Option<ActiveConnection>> {
        let handle = network.activate(profile, device).await?;
        if wait_for_activation(network, &handle, self.timeouts).await {
            info!("\"{}\" activated", profile.id);
            Ok(Some(handle))
        } else {
            warn!("\"{}\" did not activate in time", profile.id);
            Ok(None)
        }
    }

    async fn wait_for_device<N: NetworkService>(
        &self,
        network: &N,
        profile: &ConnectionProfile,
    ) -> Option<DeviceRef> {
        debug!("Waiting for device");
        poll_until(self.timeouts.poll_interval, self.timeouts.device, || async move {
            match network.find_device(profile).await {
                Ok(Some(device)) => ControlFlow::Break(device),
                Ok(None) => ControlFlow::Continue(()),
                Err(e) => {
                    debug!("Device lookup failed: {}", e);
                    ControlFlow::Continue(())
                }
            }
        })
        .await
    }
}

/// Wait until `handle` reaches `Activated`. Any lookup error ends the wait.
async fn wait_for_activation<N: NetworkService>(
    network: &N,
    handle: &ActiveConnection,
    timeouts: Timeouts,
) -> bool {
    debug!("Waiting for connection activation");
    poll_until(timeouts.poll_interval, timeouts.activation, || async move {
        match network.active_state(handle).await {
            Ok(ActiveState::Activated) => ControlFlow::Break(true),
            Ok(ActiveState::Deactivated) => ControlFlow::Break(false),
            Ok(_) => ControlFlow::Continue(()),
            Err(e) => {
                debug!("{}", e);
                ControlFlow::Break(false)
            }
        }
    })
    .await
    .unwrap_or(false)
}

/// Request deactivation and wait until `handle` is down.
///
/// A connection that is already gone counts as deactivated. Returns
/// `false` if it was still up at the deadline.
pub async fn deactivate_and_wait<N: NetworkService>(
    network: &N,
    handle: &ActiveConnection,
    timeouts: Timeouts,
) -> Result<bool> {
    network.deactivate(handle).await?;

    debug!("Waiting for connection deactivation");
    let done = poll_until(timeouts.poll_interval, timeouts.deactivation, || async move {
        match network.active_state(handle).await {
            Ok(ActiveState::Deactivated) => ControlFlow::Break(()),
            Ok(_) => ControlFlow::Continue(()),
            Err(e) if e.is_object_vanished() => ControlFlow::Break(()),
            Err(e) => {
                debug!("{}", e);
                ControlFlow::Continue(())
            }
        }
    })
    .await;
    Ok(done.is_some())
}
