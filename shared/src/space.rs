// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Object spaces partition the state key/value store per contract.
//!
//! A space is `(zone, id, system)`. The zone is a contract id, or empty for
//! the kernel. Spaces order lexicographically on `(zone, system, id)`, which
//! puts the kernel's spaces first in any full-state scan.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectSpace {
    pub zone: Vec<u8>,
    pub id: u32,
    pub system: bool,
}

impl ObjectSpace {
    pub fn new(zone: Vec<u8>, id: u32, system: bool) -> Self {
        ObjectSpace { zone, id, system }
    }

    /// A kernel space: empty zone, `system` set.
    pub fn kernel(id: u32) -> Self {
        ObjectSpace {
            zone: Vec::new(),
            id,
            system: true,
        }
    }

    pub fn is_kernel(&self) -> bool {
        self.system && self.zone.is_empty()
    }
}

impl PartialOrd for ObjectSpace {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectSpace {
    fn cmp(&self, other: &Self) -> Ordering {
        self.zone
            .cmp(&other.zone)
            .then(self.system.cmp(&other.system))
            .then(self.id.cmp(&other.id))
    }
}

/// Kernel-reserved object spaces (`system = true`, empty zone).
pub mod kernel {
    use super::ObjectSpace;

    pub const CONTRACT_BYTECODE_ID: u32 = 0;
    pub const CONTRACT_METADATA_ID: u32 = 1;
    pub const SYSTEM_CALL_DISPATCH_ID: u32 = 2;
    pub const METADATA_ID: u32 = 3;
    pub const TRANSACTION_NONCE_ID: u32 = 4;

    pub fn contract_bytecode() -> ObjectSpace {
        ObjectSpace::kernel(CONTRACT_BYTECODE_ID)
    }

    pub fn contract_metadata() -> ObjectSpace {
        ObjectSpace::kernel(CONTRACT_METADATA_ID)
    }

    pub fn system_call_dispatch() -> ObjectSpace {
        ObjectSpace::kernel(SYSTEM_CALL_DISPATCH_ID)
    }

    pub fn metadata() -> ObjectSpace {
        ObjectSpace::kernel(METADATA_ID)
    }

    pub fn transaction_nonce() -> ObjectSpace {
        ObjectSpace::kernel(TRANSACTION_NONCE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_zone_then_system_then_id() {
        let kernel = ObjectSpace::kernel(7);
        let user_low = ObjectSpace::new(b"aaa".to_vec(), 0, false);
        let user_sys = ObjectSpace::new(b"aaa".to_vec(), 0, true);
        let user_high = ObjectSpace::new(b"aab".to_vec(), 0, false);

        assert!(kernel < user_low);
        assert!(user_low < user_sys);
        assert!(user_sys < user_high);
        assert!(ObjectSpace::kernel(1) < ObjectSpace::kernel(2));
    }

    #[test]
    fn kernel_spaces_are_kernel() {
        assert!(kernel::metadata().is_kernel());
        assert!(!ObjectSpace::new(b"z".to_vec(), 0, true).is_kernel());
    }
}
