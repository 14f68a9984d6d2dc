// Connection Manager - Activation Cooldown Tracking
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Per-connection activation cooldown bookkeeping.
//!
//! Only the failover engine and the activation sequencer touch the
//! tracker. Records never expire on their own.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Last activation attempt per connection id.
#[derive(Debug, Clone)]
pub struct UpTimeTracker {
    cooldown: Duration,
    attempts: HashMap<String, Instant>,
}

impl UpTimeTracker {
    /// Create a tracker enforcing `cooldown` between two attempts.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            attempts: HashMap::new(),
        }
    }

    /// Timestamp of the last attempt, if any.
    pub fn last_attempt(&self, id: &str) -> Option<Instant> {
        self.attempts.get(id).copied()
    }

    /// Record an activation attempt at `now`.
    pub fn record_attempt(&mut self, id: &str, now: Instant) {
        self.attempts.insert(id.to_string(), now);
    }

    /// Whether `id` may be activated at `now`.
    pub fn is_eligible(&self, id: &str, now: Instant) -> bool {
        match self.attempts.get(id) {
            // A cooldown past the end of the clock never expires.
            Some(last) => last.checked_add(self.cooldown).map_or(false, |t| now >= t),
            None => true,
        }
    }

    /// Back-date the record so `id` is eligible right away.
    pub fn force_eligible(&mut self, id: &str, now: Instant) {
        match now.checked_sub(self.cooldown) {
            Some(expired) => {
                self.attempts.insert(id.to_string(), expired);
            }
            // No earlier instant exists; no record means the same thing.
            None => {
                self.attempts.remove(id);
            }
        }
    }
}
