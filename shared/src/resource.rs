// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Resource limit records stored under the metadata space.

use serde::{Deserialize, Serialize};

/// Per-block budgets and per-unit rc costs for the three metered resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimitData {
    pub disk_storage_limit: u64,
    pub disk_storage_cost: u64,
    pub network_bandwidth_limit: u64,
    pub network_bandwidth_cost: u64,
    pub compute_bandwidth_limit: u64,
    pub compute_bandwidth_cost: u64,
}

impl Default for ResourceLimitData {
    fn default() -> Self {
        ResourceLimitData {
            disk_storage_limit: 1 << 20,
            disk_storage_cost: 10,
            network_bandwidth_limit: 1 << 20,
            network_bandwidth_cost: 5,
            compute_bandwidth_limit: 100_000_000,
            compute_bandwidth_cost: 1,
        }
    }
}

/// The rc ceiling for any single account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxAccountResources {
    pub value: u64,
}

impl Default for MaxAccountResources {
    fn default() -> Self {
        MaxAccountResources { value: 10_000_000 }
    }
}
