// Connection Manager - Failover Engine
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Priority-based uplink reconciliation.
//!
//! Each [`FailoverEngine::check`] walks the uplinks from highest to lowest
//! priority and stops at the first one that is up and reaches the outside
//! world. Everything ranked below it is taken down.

use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::activation::{deactivate_and_wait, ActivationSequencer};
use super::connectivity::{link_connectivity, ConnectivityProbe};
use super::uptime::UpTimeTracker;
use crate::dbus::{ModemService, NetworkService};
use crate::models::{ActiveConnection, AppConfig, Result, Timeouts, Uplink};

/// What happened during one check cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Uplink left as the active route, if one reached full connectivity.
    pub selected: Option<String>,
    /// Uplinks an activation was attempted for.
    pub attempted: Vec<String>,
    /// Connections deactivated by the engine.
    pub deactivated: Vec<String>,
    /// Connection displaced by a cellular activation, which ended the walk early.
    pub displaced: Option<String>,
}

/// Result of handling one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    /// Up with full connectivity.
    Selected,
    /// Not usable right now; try the next one.
    Rejected,
    /// Another connection was taken down; the active snapshot is stale.
    Displaced(String),
}

/// Decides which uplink should be up.
pub struct FailoverEngine<N, M, P> {
    network: N,
    sequencer: ActivationSequencer<M>,
    probe: P,
    uplinks: Vec<Uplink>,
    uptime: UpTimeTracker,
    timeouts: Timeouts,
}

impl<N, M, P> FailoverEngine<N, M, P>
where
    N: NetworkService,
    M: ModemService,
    P: ConnectivityProbe,
{
    pub fn new(network: N, modem: M, probe: P, config: &AppConfig) -> Self {
        let timeouts = config.timeouts();
        Self {
            network,
            sequencer: ActivationSequencer::new(modem, timeouts),
            probe,
            uplinks: config.uplinks.clone(),
            uptime: UpTimeTracker::new(config.retry_cooldown()),
            timeouts,
        }
    }

    pub fn uptime(&self) -> &UpTimeTracker {
        &self.uptime
    }

    /// Run one reconciliation cycle.
    ///
    /// Only a failure to list active connections is returned as an error.
    /// Problems with a single candidate are logged and the walk moves on.
    pub async fn check(&mut self) -> Result<CycleReport> {
        let active = self.network.list_active_connections().await?;
        debug!("Active connections: {:?}", active.keys().collect::<Vec<_>>());

        let mut report = CycleReport::default();
        for index in 0..self.uplinks.len() {
            let uplink = self.uplinks[index].clone();

            let outcome = match active.get(&uplink.id) {
                Some(handle) => {
                    debug!("\"{}\" is active", uplink.id);
                    if self.settle(&uplink.id, handle, &mut report).await {
                        Candidate::Selected
                    } else {
                        Candidate::Rejected
                    }
                }
                None => self.try_activate(&uplink, &mut report).await,
            };

            match outcome {
                Candidate::Selected => {
                    self.deactivate_lower_priority(index, &active, &mut report).await;
                    info!("\"{}\" is the active uplink", uplink.id);
                    report.selected = Some(uplink.id);
                    return Ok(report);
                }
                Candidate::Rejected => {}
                Candidate::Displaced(id) => {
                    info!("\"{}\" was displaced, re-evaluating next cycle", id);
                    report.displaced = Some(id);
                    return Ok(report);
                }
            }
        }

        info!("No uplink with full connectivity");
        Ok(report)
    }

    /// Activate an inactive uplink if its cooldown allows it.
    async fn try_activate(&mut self, uplink: &Uplink, report: &mut CycleReport) -> Candidate {
        if !self.uptime.is_eligible(&uplink.id, Instant::now()) {
            debug!("\"{}\" is cooling down", uplink.id);
            return Candidate::Rejected;
        }

        report.attempted.push(uplink.id.clone());
        let activation = self
            .sequencer
            .activate(&self.network, uplink, &mut self.uptime)
            .await;
        // Recorded even on failure so a broken uplink cannot be hammered.
        self.uptime.record_attempt(&uplink.id, Instant::now());

        if let Some(handle) = &activation.handle {
            if self.settle(&uplink.id, handle, report).await {
                return Candidate::Selected;
            }
        }

        match activation.displaced {
            Some(id) => Candidate::Displaced(id),
            None => Candidate::Rejected,
        }
    }

    /// Keep a running uplink if it has full connectivity, else take it down.
    async fn settle(&self, id: &str, handle: &ActiveConnection, report: &mut CycleReport) -> bool {
        let connectivity = link_connectivity(&self.network, &self.probe, handle).await;
        debug!("\"{}\" connectivity: {:?}", id, connectivity);
        if connectivity.is_full() {
            return true;
        }

        info!("\"{}\" has no full connectivity, deactivating", id);
        self.deactivate(id, handle, report).await;
        false
    }

    /// Take down every active uplink ranked below `index`.
    async fn deactivate_lower_priority(
        &self,
        index: usize,
        active: &HashMap<String, ActiveConnection>,
        report: &mut CycleReport,
    ) {
        for uplink in &self.uplinks[index + 1..] {
            if let Some(handle) = active.get(&uplink.id) {
                info!("Deactivate connection \"{}\"", uplink.id);
                self.deactivate(&uplink.id, handle, report).await;
            }
        }
    }

    /// Best-effort deactivation.
    async fn deactivate(&self, id: &str, handle: &ActiveConnection, report: &mut CycleReport) {
        match deactivate_and_wait(&self.network, handle, self.timeouts).await {
            Ok(true) => {}
            Ok(false) => warn!("\"{}\" did not deactivate in time", id),
            Err(e) => warn!("Failed to deactivate \"{}\": {}", id, e),
        }
        report.deactivated.push(id.to_string());
    }
}
