// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The chronicler: the single writer for the totally ordered event stream
//! and the parallel log record.
//!
//! Sequence numbers are assigned at push time and stay dense across a block:
//! a session that rolls back returns the numbers it consumed.

use basalt_shared::receipt::EventData;
use basalt_shared::TransactionId;

use crate::session::Session;

pub type EventBundle = (Option<TransactionId>, EventData);

#[derive(Debug, Default)]
pub struct Chronicler {
    events: Vec<EventBundle>,
    logs: Vec<String>,
    seq: u32,
}

impl Chronicler {
    /// Stamp and record an event. With a session attached the event is
    /// buffered there until the session commits; the chronicler remains the
    /// authority on ordering either way.
    pub fn push_event(
        &mut self,
        session: Option<&mut Session>,
        transaction_id: Option<TransactionId>,
        mut event: EventData,
    ) {
        event.sequence = self.seq;
        self.seq += 1;
        match session {
            Some(s) => s.events.push((transaction_id, event)),
            None => self.events.push((transaction_id, event)),
        }
    }

    pub fn push_log(&mut self, session: Option<&mut Session>, message: String) {
        match session {
            Some(s) => s.logs.push(message),
            None => self.logs.push(message),
        }
    }

    /// Fold a committed outermost session into the authoritative record.
    pub fn absorb(&mut self, events: Vec<EventBundle>, logs: Vec<String>) {
        self.events.extend(events);
        self.logs.extend(logs);
    }

    pub(crate) fn sequence(&self) -> u32 {
        self.seq
    }

    /// Return the sequence counter to a session-open snapshot on rollback,
    /// keeping receipt sequences dense.
    pub(crate) fn restore_sequence(&mut self, seq: u32) {
        self.seq = seq;
    }

    pub fn events(&self) -> &[EventBundle] {
        &self.events
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> EventData {
        EventData {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn sequences_are_dense_and_increasing() {
        let mut c = Chronicler::default();
        c.push_event(None, None, event("a"));
        c.push_event(None, Some(vec![1]), event("b"));
        let seqs: Vec<u32> = c.events().iter().map(|(_, e)| e.sequence).collect();
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn session_buffers_and_rollback_returns_sequences() {
        let mut c = Chronicler::default();
        c.push_event(None, None, event("outside"));

        let mut s = Session::open(Default::default(), c.sequence(), 0);
        c.push_event(Some(&mut s), Some(vec![9]), event("inside"));
        assert_eq!(c.events().len(), 1);
        assert_eq!(s.events[0].1.sequence, 1);

        // Rollback: the buffered event vanishes and its number is reissued.
        c.restore_sequence(s.seq_at_open);
        drop(s);
        c.push_event(None, None, event("replacement"));
        assert_eq!(c.events()[1].1.sequence, 1);
    }

    #[test]
    fn absorb_preserves_order() {
        let mut c = Chronicler::default();
        let mut s = Session::open(Default::default(), c.sequence(), 0);
        c.push_event(Some(&mut s), Some(vec![1]), event("one"));
        c.push_event(Some(&mut s), Some(vec![1]), event("two"));
        c.absorb(std::mem::take(&mut s.events), std::mem::take(&mut s.logs));
        let names: Vec<&str> = c.events().iter().map(|(_, e)| e.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }
}
