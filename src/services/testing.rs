// Connection Manager - Test Doubles
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! In-memory NetworkManager, ModemManager and probe fakes that record calls.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::dbus::{ModemService, NetworkService};
use crate::models::{
    ActiveConnection, ActiveState, Connectivity, ConnectionProfile, ConnectionType, DeviceRef,
    Error, Result,
};
use crate::services::connectivity::ConnectivityProbe;

const ACTIVE_PREFIX: &str = "/org/freedesktop/NetworkManager/ActiveConnection/";
const DEVICE_PREFIX: &str = "/org/freedesktop/NetworkManager/Devices/";
const SETTINGS_PREFIX: &str = "/org/freedesktop/NetworkManager/Settings/";

/// A recorded client call, identified by connection id where one is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListActive,
    FindProfile(String),
    FindDevice(String),
    DeviceUdi(String),
    DeviceActiveConnection(String),
    ActiveConnectionId(String),
    Activate(String),
    Deactivate(String),
    ActiveState(String),
    Interfaces(String),
    SetSimSlot(u32),
}

impl Call {
    /// Connection id the call was about, if any.
    pub fn connection_id(&self) -> Option<&str> {
        match self {
            Self::FindProfile(id)
            | Self::FindDevice(id)
            | Self::ActiveConnectionId(id)
            | Self::Activate(id)
            | Self::Deactivate(id)
            | Self::ActiveState(id)
            | Self::Interfaces(id) => Some(id),
            _ => None,
        }
    }
}

/// What the fake modem does when asked to switch SIM slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimSwitch {
    /// Slot switched; the device is recreated under a new path.
    Changed,
    /// Modem reports nothing changed.
    Unchanged,
    /// Slot switched but the device never comes back.
    DeviceLost,
    /// The call itself fails.
    Fails,
}

#[derive(Debug, Clone)]
struct FakeDevice {
    path: String,
    interface: String,
    kind: ConnectionType,
    udi: String,
    active: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeActive {
    id: String,
    state: ActiveState,
    interfaces: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    profiles: HashMap<String, ConnectionProfile>,
    devices: Vec<FakeDevice>,
    active: HashMap<String, FakeActive>,
    activation_results: HashMap<String, ActiveState>,
    failing_activations: HashSet<String>,
    stuck_deactivations: HashSet<String>,
    fail_listing: bool,
    next_object: u32,
    calls: Vec<Call>,
}

impl State {
    fn next_path(&mut self, prefix: &str) -> String {
        self.next_object += 1;
        format!("{}{}", prefix, self.next_object)
    }

    fn active_id(&self, path: &str) -> String {
        self.active
            .get(path)
            .map(|a| a.id.clone())
            .unwrap_or_else(|| path.to_string())
    }

    fn device_mut(&mut self, path: &str) -> Result<&mut FakeDevice> {
        self.devices
            .iter_mut()
            .find(|d| d.path == path)
            .ok_or_else(|| Error::ObjectVanished(path.to_string()))
    }
}

/// In-memory NetworkManager.
#[derive(Debug, Clone, Default)]
pub struct FakeNetwork {
    state: Rc<RefCell<State>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection profile.
    pub fn add_profile(&self, id: &str, kind: ConnectionType, interface: Option<&str>) {
        let mut state = self.state.borrow_mut();
        let mut profile = ConnectionProfile::new(id, kind, state.next_path(SETTINGS_PREFIX));
        if let Some(interface) = interface {
            profile = profile.with_interface(interface);
        }
        state.profiles.insert(id.to_string(), profile);
    }

    /// Register a device and return its reference.
    pub fn add_device(&self, interface: &str, kind: ConnectionType, udi: &str) -> DeviceRef {
        let mut state = self.state.borrow_mut();
        let path = state.next_path(DEVICE_PREFIX);
        state.devices.push(FakeDevice {
            path: path.clone(),
            interface: interface.to_string(),
            kind,
            udi: udi.to_string(),
            active: None,
        });
        DeviceRef::new(path)
    }

    /// Mark a connection as already activated, not bound to any device.
    pub fn add_active(&self, id: &str, interfaces: &[&str]) -> ActiveConnection {
        let mut state = self.state.borrow_mut();
        let path = state.next_path(ACTIVE_PREFIX);
        state.active.insert(
            path.clone(),
            FakeActive {
                id: id.to_string(),
                state: ActiveState::Activated,
                interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            },
        );
        ActiveConnection::new(path)
    }

    /// Mark a connection as activated on a device.
    pub fn add_active_on(&self, id: &str, device: &DeviceRef) -> ActiveConnection {
        let interface = {
            let state = self.state.borrow();
            state
                .devices
                .iter()
                .find(|d| d.path == device.path())
                .map(|d| d.interface.clone())
                .unwrap_or_default()
        };
        let handle = self.add_active(id, &[interface.as_str()]);
        if let Ok(dev) = self.state.borrow_mut().device_mut(device.path()) {
            dev.active = Some(handle.path().to_string());
        }
        handle
    }

    /// State an activation of `id` ends up in (defaults to `Activated`).
    pub fn set_activation_result(&self, id: &str, result: ActiveState) {
        self.state
            .borrow_mut()
            .activation_results
            .insert(id.to_string(), result);
    }

    /// Make `activate` fail with a D-Bus error for `id`.
    pub fn fail_activation(&self, id: &str) {
        self.state.borrow_mut().failing_activations.insert(id.to_string());
    }

    /// Keep `id` in `Deactivating` after a deactivation request.
    pub fn stick_deactivation(&self, id: &str) {
        self.state.borrow_mut().stuck_deactivations.insert(id.to_string());
    }

    /// Make listing active connections fail.
    pub fn fail_listing(&self) {
        self.state.borrow_mut().fail_listing = true;
    }

    /// Ids of connections currently in `Activated` state, sorted.
    pub fn activated_ids(&self) -> Vec<String> {
        let state = self.state.borrow();
        let mut ids: Vec<String> = state
            .active
            .values()
            .filter(|a| a.state == ActiveState::Activated)
            .map(|a| a.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Path of the device currently bound to `interface`.
    pub fn device_path(&self, interface: &str) -> Option<String> {
        self.state
            .borrow()
            .devices
            .iter()
            .find(|d| d.interface == interface)
            .map(|d| d.path.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Calls that concern connection `id`.
    pub fn calls_for(&self, id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.connection_id() == Some(id))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Modem fake sharing this network's devices.
    pub fn modem(&self, behaviour: SimSwitch) -> FakeModem {
        FakeModem {
            state: Rc::clone(&self.state),
            behaviour,
        }
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl NetworkService for FakeNetwork {
    async fn list_active_connections(&self) -> Result<HashMap<String, ActiveConnection>> {
        self.record(Call::ListActive);
        let state = self.state.borrow();
        if state.fail_listing {
            return Err(Error::Dbus("NetworkManager is restarting".to_string()));
        }
        Ok(state
            .active
            .iter()
            .filter(|(_, a)| a.state != ActiveState::Deactivated)
            .map(|(path, a)| (a.id.clone(), ActiveConnection::new(path.as_str())))
            .collect())
    }

    async fn find_profile(&self, id: &str) -> Result<Option<ConnectionProfile>> {
        self.record(Call::FindProfile(id.to_string()));
        Ok(self.state.borrow().profiles.get(id).cloned())
    }

    async fn find_device(&self, profile: &ConnectionProfile) -> Result<Option<DeviceRef>> {
        self.record(Call::FindDevice(profile.id.clone()));
        let state = self.state.borrow();
        let found = state.devices.iter().find(|d| match &profile.interface_name {
            Some(name) => &d.interface == name,
            None => d.kind == profile.kind,
        });
        Ok(found.map(|d| DeviceRef::new(d.path.as_str())))
    }

    async fn device_udi(&self, device: &DeviceRef) -> Result<String> {
        self.record(Call::DeviceUdi(device.path().to_string()));
        let mut state = self.state.borrow_mut();
        Ok(state.device_mut(device.path())?.udi.clone())
    }

    async fn device_active_connection(&self, device: &DeviceRef) -> Result<Option<ActiveConnection>> {
        self.record(Call::DeviceActiveConnection(device.path().to_string()));
        let mut state = self.state.borrow_mut();
        let active = state.device_mut(device.path())?.active.clone();
        Ok(active.map(ActiveConnection::new))
    }

    async fn active_connection_id(&self, handle: &ActiveConnection) -> Result<String> {
        let id = self.state.borrow().active_id(handle.path());
        self.record(Call::ActiveConnectionId(id));
        self.state
            .borrow()
            .active
            .get(handle.path())
            .map(|a| a.id.clone())
            .ok_or_else(|| Error::ObjectVanished(handle.to_string()))
    }

    async fn activate(&self, profile: &ConnectionProfile, device: &DeviceRef) -> Result<ActiveConnection> {
        self.record(Call::Activate(profile.id.clone()));
        let mut state = self.state.borrow_mut();
        if state.failing_activations.contains(&profile.id) {
            return Err(Error::Dbus(format!("activation of {} refused", profile.id)));
        }

        let result = state
            .activation_results
            .get(&profile.id)
            .copied()
            .unwrap_or(ActiveState::Activated);
        let path = state.next_path(ACTIVE_PREFIX);
        let dev = state.device_mut(device.path())?;
        dev.active = Some(path.clone());
        let interfaces = vec![dev.interface.clone()];
        state.active.insert(
            path.clone(),
            FakeActive {
                id: profile.id.clone(),
                state: result,
                interfaces,
            },
        );
        Ok(ActiveConnection::new(path))
    }

    async fn deactivate(&self, handle: &ActiveConnection) -> Result<()> {
        let id = self.state.borrow().active_id(handle.path());
        self.record(Call::Deactivate(id.clone()));
        let mut state = self.state.borrow_mut();
        if state.stuck_deactivations.contains(&id) {
            if let Some(active) = state.active.get_mut(handle.path()) {
                active.state = ActiveState::Deactivating;
            }
            return Ok(());
        }
        // NetworkManager unexports the object once it is down.
        state.active.remove(handle.path());
        for device in state.devices.iter_mut() {
            if device.active.as_deref() == Some(handle.path()) {
                device.active = None;
            }
        }
        Ok(())
    }

    async fn active_state(&self, handle: &ActiveConnection) -> Result<ActiveState> {
        let id = self.state.borrow().active_id(handle.path());
        self.record(Call::ActiveState(id));
        self.state
            .borrow()
            .active
            .get(handle.path())
            .map(|a| a.state)
            .ok_or_else(|| Error::ObjectVanished(handle.to_string()))
    }

    async fn active_device_interfaces(&self, handle: &ActiveConnection) -> Result<Vec<String>> {
        let id = self.state.borrow().active_id(handle.path());
        self.record(Call::Interfaces(id));
        self.state
            .borrow()
            .active
            .get(handle.path())
            .map(|a| a.interfaces.clone())
            .ok_or_else(|| Error::ObjectVanished(handle.to_string()))
    }
}

/// In-memory ModemManager bound to a [`FakeNetwork`].
#[derive(Debug, Clone)]
pub struct FakeModem {
    state: Rc<RefCell<State>>,
    behaviour: SimSwitch,
}

impl ModemService for FakeModem {
    async fn set_primary_sim_slot(&self, modem: &str, slot: u32) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::SetSimSlot(slot));
        match self.behaviour {
            SimSwitch::Unchanged => Ok(false),
            SimSwitch::Fails => Err(Error::Dbus("modem is busy".to_string())),
            SimSwitch::DeviceLost => {
                state.devices.retain(|d| d.udi != modem);
                Ok(true)
            }
            SimSwitch::Changed => {
                let new_path = state.next_path(DEVICE_PREFIX);
                if let Some(device) = state.devices.iter_mut().find(|d| d.udi == modem) {
                    device.path = new_path;
                    device.active = None;
                }
                Ok(true)
            }
        }
    }
}

/// Probe answering from a fixed per-interface table; unknown interfaces are unreachable.
#[derive(Debug, Default)]
pub struct FakeProbe {
    results: HashMap<String, Connectivity>,
    probed: RefCell<Vec<String>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, interface: &str, result: Connectivity) -> Self {
        self.results.insert(interface.to_string(), result);
        self
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.borrow().clone()
    }
}

impl ConnectivityProbe for FakeProbe {
    async fn check(&self, interface: &str) -> Connectivity {
        self.probed.borrow_mut().push(interface.to_string());
        self.results
            .get(interface)
            .copied()
            .unwrap_or(Connectivity::None)
    }
}
