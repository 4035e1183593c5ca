// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Sessions: nested resource-and-effect scopes.
//!
//! A session captures the meter and the chronicler sequence when it opens
//! and buffers every effect produced underneath it: events, logs, and the
//! state delta entries observed for receipts. Closing with rollback restores
//! the snapshots and drops the buffers; closing with commit folds the
//! buffers into the parent session, or into the chronicler at the outermost
//! level.
//!
//! One concrete type serves as the resource, event, and log sink; the
//! original's abstract session hierarchy is collapsed into this struct plus
//! the close logic in the execution context.

use basalt_shared::receipt::StateDeltaEntry;
use basalt_statedb::NodeHandle;

use crate::chronicler::EventBundle;
use crate::resource::MeterSnapshot;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CloseMode {
    Commit,
    Rollback,
}

#[derive(Debug)]
pub struct Session {
    /// Meter state at open; restored on rollback.
    pub begin: MeterSnapshot,
    /// Chronicler sequence at open; restored on rollback.
    pub seq_at_open: u32,
    /// Resource credits this session may consume.
    pub rc_budget: u64,
    /// Anonymous child node isolating this session's writes; squashed into
    /// its parent on commit, discarded on rollback.
    pub node: Option<NodeHandle>,
    /// The node the context returns to when this session closes.
    pub prev_node: Option<NodeHandle>,
    pub events: Vec<EventBundle>,
    pub logs: Vec<String>,
    pub state_delta: Vec<StateDeltaEntry>,
}

impl Session {
    pub fn open(begin: MeterSnapshot, seq_at_open: u32, rc_budget: u64) -> Self {
        Session {
            begin,
            seq_at_open,
            rc_budget,
            node: None,
            prev_node: None,
            events: Vec::new(),
            logs: Vec::new(),
            state_delta: Vec::new(),
        }
    }
}

/// What a closed session produced. On rollback the buffers are empty and
/// only `rc_used` (zero) remains meaningful.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub rc_used: u64,
    pub events: Vec<EventBundle>,
    pub logs: Vec<String>,
    pub state_delta: Vec<StateDeltaEntry>,
}
