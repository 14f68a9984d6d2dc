// Connection Manager - Failover Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Services driving uplink failover.
//!
//! - Failover: the periodic priority walk deciding which uplink stays up
//! - Activation: per-type activation protocols, including SIM switching
//! - Connectivity: reachability probes bound to one interface
//! - Uptime: activation cooldown bookkeeping
//! - Poll: the bounded wait shared by every state transition

pub mod activation;
pub mod connectivity;
pub mod failover;
pub mod poll;
pub mod uptime;

#[cfg(test)]
pub mod testing;

pub use connectivity::Prober;
pub use failover::{CycleReport, FailoverEngine};
