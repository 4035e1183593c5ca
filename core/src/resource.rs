// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The resource meter.
//!
//! Tracks the three independent per-block budgets: disk bytes, network
//! bytes, and compute ticks. Counters only ever decrease while a block or
//! query is live; sessions snapshot and restore them for rollback.

use basalt_shared::resource::ResourceLimitData;

use crate::error::Result;
use crate::syscall_error;

/// Remaining budgets at a point in time. Captured when a session opens and
/// restored when it closes with rollback.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MeterSnapshot {
    pub disk_storage_remaining: u64,
    pub network_bandwidth_remaining: u64,
    pub compute_bandwidth_remaining: u64,
}

#[derive(Debug)]
pub struct ResourceMeter {
    limit_data: ResourceLimitData,
    disk_storage_remaining: u64,
    network_bandwidth_remaining: u64,
    compute_bandwidth_remaining: u64,
}

impl Default for ResourceMeter {
    fn default() -> Self {
        ResourceMeter::new(ResourceLimitData::default())
    }
}

impl ResourceMeter {
    pub fn new(limit_data: ResourceLimitData) -> Self {
        ResourceMeter {
            disk_storage_remaining: limit_data.disk_storage_limit,
            network_bandwidth_remaining: limit_data.network_bandwidth_limit,
            compute_bandwidth_remaining: limit_data.compute_bandwidth_limit,
            limit_data,
        }
    }

    pub fn set_resource_limit_data(&mut self, limit_data: ResourceLimitData) {
        self.disk_storage_remaining = limit_data.disk_storage_limit;
        self.network_bandwidth_remaining = limit_data.network_bandwidth_limit;
        self.compute_bandwidth_remaining = limit_data.compute_bandwidth_limit;
        self.limit_data = limit_data;
    }

    pub fn limit_data(&self) -> &ResourceLimitData {
        &self.limit_data
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            disk_storage_remaining: self.disk_storage_remaining,
            network_bandwidth_remaining: self.network_bandwidth_remaining,
            compute_bandwidth_remaining: self.compute_bandwidth_remaining,
        }
    }

    pub fn restore(&mut self, snapshot: MeterSnapshot) {
        self.disk_storage_remaining = snapshot.disk_storage_remaining;
        self.network_bandwidth_remaining = snapshot.network_bandwidth_remaining;
        self.compute_bandwidth_remaining = snapshot.compute_bandwidth_remaining;
    }

    pub fn use_disk_storage(&mut self, bytes: u64) -> Result<()> {
        if bytes > self.disk_storage_remaining {
            self.disk_storage_remaining = 0;
            return Err(syscall_error!(DiskStorageExceeded;
                "disk storage limit exceeded by {} bytes", bytes));
        }
        self.disk_storage_remaining -= bytes;
        Ok(())
    }

    pub fn disk_storage_used(&self) -> u64 {
        self.limit_data.disk_storage_limit - self.disk_storage_remaining
    }

    pub fn disk_storage_remaining(&self) -> u64 {
        self.disk_storage_remaining
    }

    pub fn use_network_bandwidth(&mut self, bytes: u64) -> Result<()> {
        if bytes > self.network_bandwidth_remaining {
            self.network_bandwidth_remaining = 0;
            return Err(syscall_error!(NetworkBandwidthExceeded;
                "network bandwidth limit exceeded by {} bytes", bytes));
        }
        self.network_bandwidth_remaining -= bytes;
        Ok(())
    }

    pub fn network_bandwidth_used(&self) -> u64 {
        self.limit_data.network_bandwidth_limit - self.network_bandwidth_remaining
    }

    pub fn network_bandwidth_remaining(&self) -> u64 {
        self.network_bandwidth_remaining
    }

    pub fn use_compute_bandwidth(&mut self, ticks: u64) -> Result<()> {
        if ticks > self.compute_bandwidth_remaining {
            self.compute_bandwidth_remaining = 0;
            return Err(syscall_error!(TickMeterExhausted;
                "compute bandwidth exhausted, needed {} more ticks", ticks));
        }
        log::trace!("charged {ticks} compute ticks");
        self.compute_bandwidth_remaining -= ticks;
        Ok(())
    }

    pub fn compute_bandwidth_used(&self) -> u64 {
        self.limit_data.compute_bandwidth_limit - self.compute_bandwidth_remaining
    }

    pub fn compute_bandwidth_remaining(&self) -> u64 {
        self.compute_bandwidth_remaining
    }

    /// Resource credits consumed between `from` and the present state, at
    /// the configured per-unit costs.
    pub fn rc_used_since(&self, from: &MeterSnapshot) -> u64 {
        let disk = from.disk_storage_remaining - self.disk_storage_remaining;
        let network = from.network_bandwidth_remaining - self.network_bandwidth_remaining;
        let compute = from.compute_bandwidth_remaining - self.compute_bandwidth_remaining;
        disk * self.limit_data.disk_storage_cost
            + network * self.limit_data.network_bandwidth_cost
            + compute * self.limit_data.compute_bandwidth_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ResourceLimitData {
        ResourceLimitData {
            disk_storage_limit: 100,
            disk_storage_cost: 2,
            network_bandwidth_limit: 200,
            network_bandwidth_cost: 3,
            compute_bandwidth_limit: 1_000,
            compute_bandwidth_cost: 1,
        }
    }

    #[test]
    fn budgets_are_independent_and_never_underflow() {
        let mut m = ResourceMeter::new(limits());
        m.use_disk_storage(60).unwrap();
        assert_eq!(m.disk_storage_used(), 60);
        assert_eq!(m.network_bandwidth_used(), 0);

        assert!(m.use_disk_storage(41).is_err());
        // Exhaustion clamps to zero rather than wrapping.
        assert_eq!(m.disk_storage_remaining(), 0);
        assert!(m.use_disk_storage(1).is_err());
    }

    #[test]
    fn compute_at_zero_traps_on_next_charge() {
        let mut m = ResourceMeter::new(limits());
        m.use_compute_bandwidth(1_000).unwrap();
        assert_eq!(m.compute_bandwidth_remaining(), 0);
        assert!(m.use_compute_bandwidth(1).is_err());
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut m = ResourceMeter::new(limits());
        let snap = m.snapshot();
        m.use_disk_storage(10).unwrap();
        m.use_network_bandwidth(20).unwrap();
        m.use_compute_bandwidth(30).unwrap();
        assert_eq!(m.rc_used_since(&snap), 10 * 2 + 20 * 3 + 30);
        m.restore(snap);
        assert_eq!(m.disk_storage_used(), 0);
        assert_eq!(m.rc_used_since(&snap), 0);
    }
}
