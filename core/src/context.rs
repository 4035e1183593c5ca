// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The execution context: one stack of contract frames over one state node,
//! with a resource meter, a chronicler, and a session stack.
//!
//! The context is moved by value into the WASM store for the duration of an
//! invocation (host calls get it back through the store data), so the public
//! type is a thin shell around an optional boxed body. Everything observable
//! lives in [`ContextInner`]; the shell dereferences to it and panics only
//! if used after being poisoned by a caller that never returned it.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use basalt_shared::block::{Block, ContractMetadata, Transaction};
use basalt_shared::crypto;
use basalt_shared::error::ErrorNumber;
use basalt_shared::receipt::{EventData, StateDeltaEntry, TransactionReceipt};
use basalt_shared::resource::MaxAccountResources;
use basalt_shared::space::{kernel, ObjectSpace};
use basalt_shared::{keys, Address, ContractId, TransactionId, AUTHORIZE_ENTRY_POINT, MAX_OBJECT_SIZE};
use basalt_statedb::{NodeHandle, StateDb};

use crate::chronicler::Chronicler;
use crate::error::{ClassifyResult, ExecutionError, Result};
use crate::resource::ResourceMeter;
use crate::runtime::Runtime;
use crate::session::{CloseMode, Session, SessionReport};
use crate::syscall_error;
use crate::thunks::types::AuthorizeArguments;

/// Deepest allowed contract call stack.
pub const MAX_FRAME_DEPTH: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Privilege {
    Kernel,
    User,
}

#[derive(Clone, Debug)]
pub struct StackFrame {
    pub contract_id: ContractId,
    pub privilege: Privilege,
    pub entry_point: u32,
    pub arguments: Vec<u8>,
    pub result: Vec<u8>,
}

/// What this context was built to do. Gates writes and the block-level
/// thunks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    BlockApplication,
    TransactionApplication,
    ReadOnly,
}

pub struct ExecutionContext {
    inner: Option<Box<ContextInner>>,
}

pub struct ContextInner {
    pub runtime: Arc<Runtime>,
    pub db: Arc<StateDb>,
    pub intent: Intent,
    pub meter: ResourceMeter,
    pub chronicler: Chronicler,
    pub sessions: Vec<Session>,
    pub frames: Vec<StackFrame>,
    /// The state node all reads and writes go through.
    pub node: Option<NodeHandle>,
    /// The block being applied, if any.
    pub block: Option<Block>,
    /// The transaction being applied, if any.
    pub transaction: Option<Transaction>,
    /// Wall-clock milliseconds supplied by the caller for timestamp checks.
    pub now: u64,
    /// Receipts of the transactions applied so far in this block.
    pub transaction_receipts: Vec<TransactionReceipt>,
    /// Per-block account rc consumption.
    rc_consumed: HashMap<Address, u64>,
}

impl Deref for ExecutionContext {
    type Target = ContextInner;

    fn deref(&self) -> &ContextInner {
        self.inner.as_ref().expect("context poisoned")
    }
}

impl DerefMut for ExecutionContext {
    fn deref_mut(&mut self) -> &mut ContextInner {
        self.inner.as_mut().expect("context poisoned")
    }
}

impl ExecutionContext {
    pub fn new(runtime: Arc<Runtime>, db: Arc<StateDb>, intent: Intent) -> Self {
        ExecutionContext {
            inner: Some(Box::new(ContextInner {
                runtime,
                db,
                intent,
                meter: ResourceMeter::default(),
                chronicler: Chronicler::default(),
                sessions: Vec::new(),
                frames: Vec::new(),
                node: None,
                block: None,
                transaction: None,
                now: 0,
                transaction_receipts: Vec::new(),
                rc_consumed: HashMap::new(),
            })),
        }
    }

    pub(crate) fn take_body(&mut self) -> Box<ContextInner> {
        self.inner.take().expect("context poisoned")
    }

    pub(crate) fn restore_body(&mut self, body: Box<ContextInner>) {
        debug_assert!(self.inner.is_none());
        self.inner = Some(body);
    }

    pub(crate) fn from_body(body: Box<ContextInner>) -> Self {
        ExecutionContext { inner: Some(body) }
    }

    /// Push a frame for `contract_id` and run its bytecode to completion.
    /// Returns the frame result on success or a clean exit with code zero.
    pub fn call_contract(
        &mut self,
        contract_id: ContractId,
        entry_point: u32,
        arguments: Vec<u8>,
        privilege: Privilege,
    ) -> Result<Vec<u8>> {
        let bytecode = self.bytecode_of(&contract_id)?;
        let cache_id = self
            .contract_metadata(&contract_id)?
            .map(|m| m.hash)
            .unwrap_or_else(|| crypto::hash(&bytecode).to_vec());

        self.push_frame(StackFrame {
            contract_id,
            privilege,
            entry_point,
            arguments,
            result: Vec::new(),
        })?;

        let vm = self.runtime.vm.clone();
        let outcome = vm.run(self, &bytecode, &cache_id);
        let frame = self.pop_frame()?;

        match outcome {
            Ok(()) | Err(ExecutionError::Exit(0)) => Ok(frame.result),
            Err(e) => Err(e),
        }
    }

    /// Consult the payer's authority: an authorizing contract when one is
    /// registered, a recovered signature otherwise.
    pub fn require_authority(&mut self, account: &Address) -> Result<()> {
        let metadata = self.contract_metadata(account)?;
        if let Some(metadata) = metadata {
            if metadata.authorizes_transactions {
                let args = bcs::to_bytes(&AuthorizeArguments {
                    entry_point: self.frames.last().map(|f| f.entry_point).unwrap_or(0),
                })
                .expect("arguments serialize");
                let ret =
                    self.call_contract(account.clone(), AUTHORIZE_ENTRY_POINT, args, Privilege::User)?;
                let authorized: bool = bcs::from_bytes(&ret)?;
                return if authorized {
                    Ok(())
                } else {
                    Err(syscall_error!(AuthorizationFailure;
                        "account contract refused authorization"))
                };
            }
        }

        let transaction = self
            .transaction
            .as_ref()
            .ok_or_else(|| syscall_error!(AuthorizationFailure; "no transaction in scope"))?;
        let id = transaction.id.clone();
        for signature in &transaction.signatures {
            if let Ok(public_key) = crypto::recover_public_key(signature, &id) {
                if &crypto::address_of(&public_key) == account {
                    return Ok(());
                }
            }
        }
        Err(syscall_error!(AuthorizationFailure;
            "no signature recovers to account {}", hex::encode(account)))
    }
}

impl ContextInner {
    pub fn node(&self) -> Result<NodeHandle> {
        self.node
            .ok_or_else(|| ExecutionError::fatal(anyhow::anyhow!("no state node attached")))
    }

    // ---- frames ----------------------------------------------------------

    pub fn push_frame(&mut self, frame: StackFrame) -> Result<()> {
        if self.frames.len() >= MAX_FRAME_DEPTH {
            return Err(syscall_error!(StackOverflow;
                "call stack exceeds {} frames", MAX_FRAME_DEPTH));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Result<StackFrame> {
        self.frames
            .pop()
            .ok_or_else(|| ExecutionError::fatal(anyhow::anyhow!("frame stack underflow")))
    }

    pub fn current_frame(&self) -> Result<&StackFrame> {
        self.frames
            .last()
            .ok_or_else(|| ExecutionError::fatal(anyhow::anyhow!("no frame in scope")))
    }

    pub fn current_frame_mut(&mut self) -> Result<&mut StackFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| ExecutionError::fatal(anyhow::anyhow!("no frame in scope")))
    }

    /// Kernel privilege: the current frame's, or kernel when the controller
    /// itself is calling with no contract on the stack.
    pub fn is_kernel(&self) -> bool {
        self.frames
            .last()
            .map(|f| f.privilege == Privilege::Kernel)
            .unwrap_or(true)
    }

    /// The invoking contract, one frame below the current one.
    pub fn caller(&self) -> ContractId {
        if self.frames.len() >= 2 {
            self.frames[self.frames.len() - 2].contract_id.clone()
        } else {
            Vec::new()
        }
    }

    pub fn contract_id(&self) -> ContractId {
        self.frames
            .last()
            .map(|f| f.contract_id.clone())
            .unwrap_or_default()
    }

    // ---- metering --------------------------------------------------------

    pub fn use_compute_bandwidth(&mut self, ticks: u64) -> Result<()> {
        self.meter.use_compute_bandwidth(ticks)?;
        self.enforce_rc_budget()
    }

    pub fn use_disk_storage(&mut self, bytes: u64) -> Result<()> {
        self.meter.use_disk_storage(bytes)?;
        self.enforce_rc_budget()
    }

    pub fn use_network_bandwidth(&mut self, bytes: u64) -> Result<()> {
        self.meter.use_network_bandwidth(bytes)?;
        self.enforce_rc_budget()
    }

    fn enforce_rc_budget(&self) -> Result<()> {
        if let Some(session) = self.sessions.last() {
            let used = self.meter.rc_used_since(&session.begin);
            if used > session.rc_budget {
                return Err(syscall_error!(InsufficientRc;
                    "session rc budget of {} exhausted", session.rc_budget));
            }
        }
        Ok(())
    }

    // ---- sessions --------------------------------------------------------

    /// Open a session funded with `rc`. A nested session cannot exceed what
    /// remains of its parent's budget. Writes made under the session land on
    /// an anonymous child node until the session commits.
    pub fn open_session(&mut self, rc: u64) -> Result<()> {
        let budget = match self.sessions.last() {
            Some(parent) => {
                let parent_used = self.meter.rc_used_since(&parent.begin);
                rc.min(parent.rc_budget.saturating_sub(parent_used))
            }
            None => rc,
        };
        let mut session = Session::open(
            self.meter.snapshot(),
            self.chronicler.sequence(),
            budget,
        );
        if let Some(current) = self.node {
            let child = self.db.create_writable_node(current)?;
            session.node = Some(child);
            session.prev_node = Some(current);
            self.node = Some(child);
        }
        self.sessions.push(session);
        Ok(())
    }

    pub fn close_session(&mut self, mode: CloseMode) -> Result<SessionReport> {
        let session = self
            .sessions
            .pop()
            .ok_or_else(|| ExecutionError::fatal(anyhow::anyhow!("no session to close")))?;

        if let Some(child) = session.node {
            match mode {
                CloseMode::Commit => self.db.squash_node(child)?,
                CloseMode::Rollback => self.db.discard_node(child)?,
            }
            self.node = session.prev_node;
        }

        match mode {
            CloseMode::Rollback => {
                self.meter.restore(session.begin);
                self.chronicler.restore_sequence(session.seq_at_open);
                Ok(SessionReport::default())
            }
            CloseMode::Commit => {
                let rc_used = self.meter.rc_used_since(&session.begin);
                let report = SessionReport {
                    rc_used,
                    events: session.events.clone(),
                    logs: session.logs.clone(),
                    state_delta: session.state_delta.clone(),
                };
                match self.sessions.last_mut() {
                    Some(parent) => {
                        parent.events.extend(session.events);
                        parent.logs.extend(session.logs);
                        parent.state_delta.extend(session.state_delta);
                    }
                    None => self.chronicler.absorb(session.events, session.logs),
                }
                Ok(report)
            }
        }
    }

    // ---- events and logs -------------------------------------------------

    pub fn push_event(&mut self, name: String, payload: Vec<u8>, impacted: Vec<Address>) -> Result<()> {
        self.use_network_bandwidth((name.len() + payload.len()) as u64)?;
        let event = EventData {
            sequence: 0,
            source: self.contract_id(),
            name,
            payload,
            impacted,
        };
        let transaction_id = self.transaction_id();
        self.chronicler
            .push_event(self.sessions.last_mut(), transaction_id, event);
        Ok(())
    }

    pub fn push_log(&mut self, message: String) {
        self.chronicler.push_log(self.sessions.last_mut(), message);
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction.as_ref().map(|t| t.id.clone())
    }

    // ---- state access ----------------------------------------------------

    /// Zone discipline for contract-visible state access: a user frame may
    /// only touch the non-system space whose zone is its own contract id.
    pub fn assert_permissions(&self, space: &ObjectSpace) -> Result<()> {
        if self.is_kernel() {
            return Ok(());
        }
        let id = self.contract_id();
        if !space.system && space.zone == id {
            return Ok(());
        }
        Err(syscall_error!(InsufficientPrivileges;
            "contract {} cannot access space ({}, {}, {})",
            hex::encode(&id), hex::encode(&space.zone), space.id, space.system))
    }

    fn assert_writable(&self) -> Result<()> {
        if self.intent == Intent::ReadOnly {
            return Err(syscall_error!(ReadOnlyContext; "writes forbidden in read-only context"));
        }
        Ok(())
    }

    pub fn get_object(&self, space: &ObjectSpace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.assert_permissions(space)?;
        Ok(self.db.get(self.node()?, space, key)?)
    }

    pub fn get_next_object(
        &self,
        space: &ObjectSpace,
        key: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.assert_permissions(space)?;
        Ok(self.db.get_next(self.node()?, space, key)?)
    }

    pub fn get_prev_object(
        &self,
        space: &ObjectSpace,
        key: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.assert_permissions(space)?;
        Ok(self.db.get_prev(self.node()?, space, key)?)
    }

    /// Write an object, charging disk for growth and recording the delta for
    /// the enclosing receipt. Returns whether the key already existed.
    pub fn put_object(&mut self, space: &ObjectSpace, key: &[u8], value: Vec<u8>) -> Result<bool> {
        self.assert_writable()?;
        self.assert_permissions(space)?;
        if value.len() as u64 > MAX_OBJECT_SIZE as u64 {
            return Err(syscall_error!(ObjectTooLarge;
                "object of {} bytes exceeds the {} byte cap", value.len(), MAX_OBJECT_SIZE));
        }
        let node = self.node()?;
        let previous = self.db.put(node, space, key, value.clone())?;
        let growth = match previous {
            Some(prev) => value.len().saturating_sub(prev),
            None => key.len() + value.len(),
        };
        if growth > 0 {
            self.use_disk_storage(growth as u64)?;
        }
        if let Some(session) = self.sessions.last_mut() {
            session.state_delta.push(StateDeltaEntry {
                space: space.clone(),
                key: key.to_vec(),
                value: Some(value),
            });
        }
        Ok(previous.is_some())
    }

    /// Record a tombstone. Returns whether the key existed.
    pub fn remove_object(&mut self, space: &ObjectSpace, key: &[u8]) -> Result<bool> {
        self.assert_writable()?;
        self.assert_permissions(space)?;
        let node = self.node()?;
        let previous = self.db.erase(node, space, key)?;
        if let Some(session) = self.sessions.last_mut() {
            session.state_delta.push(StateDeltaEntry {
                space: space.clone(),
                key: key.to_vec(),
                value: None,
            });
        }
        Ok(previous.is_some())
    }

    // ---- kernel-space helpers (internal reads bypass the zone check) -----

    pub fn read_metadata(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(self.node()?, &kernel::metadata(), key)?)
    }

    pub fn chain_id(&self) -> Result<Vec<u8>> {
        self.read_metadata(&keys::CHAIN_ID)?
            .or_error(ErrorNumber::InvalidChainId)
    }

    pub fn bytecode_of(&self, contract_id: &ContractId) -> Result<Vec<u8>> {
        self.db
            .get(self.node()?, &kernel::contract_bytecode(), contract_id)?
            .or_error(ErrorNumber::UnknownContract)
    }

    pub fn contract_metadata(&self, contract_id: &ContractId) -> Result<Option<ContractMetadata>> {
        match self
            .db
            .get(self.node()?, &kernel::contract_metadata(), contract_id)?
        {
            Some(bytes) => Ok(Some(bcs::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    // ---- accounts --------------------------------------------------------

    pub fn account_nonce(&self, account: &Address) -> Result<u64> {
        match self
            .db
            .get(self.node()?, &kernel::transaction_nonce(), account)?
        {
            Some(bytes) => Ok(bcs::from_bytes(&bytes)?),
            None => Ok(0),
        }
    }

    pub fn set_account_nonce(&mut self, account: &Address, nonce: u64) -> Result<()> {
        let node = self.node()?;
        self.db.put(
            node,
            &kernel::transaction_nonce(),
            account,
            bcs::to_bytes(&nonce).expect("nonce serializes"),
        )?;
        Ok(())
    }

    /// Credits available to an account: the chain-wide ceiling less what the
    /// account consumed earlier in this block.
    pub fn account_rc(&self, account: &Address) -> Result<u64> {
        let max = match self.read_metadata(&keys::MAX_ACCOUNT_RESOURCES)? {
            Some(bytes) => bcs::from_bytes::<MaxAccountResources>(&bytes)?.value,
            None => MaxAccountResources::default().value,
        };
        Ok(max.saturating_sub(*self.rc_consumed.get(account).unwrap_or(&0)))
    }

    pub fn consume_account_rc(&mut self, account: &Address, rc: u64) -> Result<()> {
        let available = self.account_rc(account)?;
        if rc > available {
            return Err(syscall_error!(InsufficientRc;
                "account {} has {} rc, needs {}", hex::encode(account), available, rc));
        }
        *self.rc_consumed.entry(account.clone()).or_insert(0) += rc;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use basalt_shared::block::GenesisData;
    use basalt_statedb::FifoForkChoice;

    use super::*;
    use crate::session::CloseMode;
    use crate::vm::VmBackend;

    struct NullVm;

    impl VmBackend for NullVm {
        fn backend_name(&self) -> &'static str {
            "null"
        }

        fn initialize(&self) -> Result<()> {
            Ok(())
        }

        fn run(&self, _ctx: &mut ExecutionContext, _bytecode: &[u8], _id: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn test_context(intent: Intent) -> ExecutionContext {
        let db = Arc::new(
            StateDb::open(None, &GenesisData::default(), Box::new(FifoForkChoice), false)
                .unwrap(),
        );
        let node = db.create_writable_node(db.root().handle).unwrap();
        let runtime = Arc::new(Runtime::new(Arc::new(NullVm)).unwrap());
        let mut ctx = ExecutionContext::new(runtime, db, intent);
        ctx.node = Some(node);
        ctx
    }

    fn user_space(id: &[u8]) -> ObjectSpace {
        ObjectSpace::new(id.to_vec(), 0, false)
    }

    #[test]
    fn session_rollback_discards_state_and_restores_meter() {
        let mut ctx = test_context(Intent::BlockApplication);
        let space = user_space(b"");

        ctx.open_session(1_000_000).unwrap();
        ctx.put_object(&space, b"k", b"v".to_vec()).unwrap();
        assert_eq!(ctx.get_object(&space, b"k").unwrap(), Some(b"v".to_vec()));
        assert!(ctx.meter.disk_storage_used() > 0);

        ctx.close_session(CloseMode::Rollback).unwrap();
        assert_eq!(ctx.get_object(&space, b"k").unwrap(), None);
        assert_eq!(ctx.meter.disk_storage_used(), 0);
    }

    #[test]
    fn session_commit_folds_state_into_parent_node() {
        let mut ctx = test_context(Intent::BlockApplication);
        let space = user_space(b"");
        let block_node = ctx.node().unwrap();

        ctx.open_session(1_000_000).unwrap();
        ctx.put_object(&space, b"k", b"v".to_vec()).unwrap();
        let report = ctx.close_session(CloseMode::Commit).unwrap();

        assert_eq!(ctx.node().unwrap(), block_node);
        assert_eq!(ctx.get_object(&space, b"k").unwrap(), Some(b"v".to_vec()));
        assert!(report.rc_used > 0);
        assert_eq!(report.state_delta.len(), 1);
    }

    #[test]
    fn nested_session_budget_cannot_exceed_parent_remainder() {
        let mut ctx = test_context(Intent::BlockApplication);
        ctx.open_session(500).unwrap();
        ctx.open_session(1_000_000).unwrap();
        assert_eq!(ctx.sessions.last().unwrap().rc_budget, 500);
        ctx.close_session(CloseMode::Rollback).unwrap();
        ctx.close_session(CloseMode::Rollback).unwrap();
    }

    #[test]
    fn session_rc_budget_is_enforced() {
        let mut ctx = test_context(Intent::BlockApplication);
        ctx.open_session(10).unwrap();
        // Compute cost 1 per tick, so 100 ticks blows the 10 rc budget.
        let err = ctx.use_compute_bandwidth(100).unwrap_err();
        assert_eq!(err.number(), basalt_shared::error::ErrorNumber::InsufficientRc);
    }

    #[test]
    fn user_frames_cannot_touch_foreign_zones() {
        let mut ctx = test_context(Intent::BlockApplication);
        ctx.push_frame(StackFrame {
            contract_id: b"contract-a".to_vec(),
            privilege: Privilege::User,
            entry_point: 0,
            arguments: vec![],
            result: vec![],
        })
        .unwrap();

        // Own zone works.
        ctx.put_object(&user_space(b"contract-a"), b"k", b"v".to_vec())
            .unwrap();
        // Foreign and kernel zones are rejected.
        assert!(ctx
            .put_object(&user_space(b"contract-b"), b"k", b"v".to_vec())
            .is_err());
        assert!(ctx
            .get_object(&kernel::metadata(), b"k")
            .is_err());
    }

    #[test]
    fn read_only_context_rejects_writes() {
        let mut ctx = test_context(Intent::ReadOnly);
        let err = ctx
            .put_object(&user_space(b""), b"k", b"v".to_vec())
            .unwrap_err();
        assert_eq!(
            err.number(),
            basalt_shared::error::ErrorNumber::ReadOnlyContext
        );
    }

    #[test]
    fn oversized_objects_are_rejected() {
        let mut ctx = test_context(Intent::BlockApplication);
        let err = ctx
            .put_object(
                &user_space(b""),
                b"k",
                vec![0; MAX_OBJECT_SIZE as usize + 1],
            )
            .unwrap_err();
        assert_eq!(
            err.number(),
            basalt_shared::error::ErrorNumber::ObjectTooLarge
        );
    }

    #[test]
    fn frame_stack_depth_is_bounded() {
        let mut ctx = test_context(Intent::BlockApplication);
        for _ in 0..MAX_FRAME_DEPTH {
            ctx.push_frame(StackFrame {
                contract_id: vec![],
                privilege: Privilege::Kernel,
                entry_point: 0,
                arguments: vec![],
                result: vec![],
            })
            .unwrap();
        }
        let err = ctx
            .push_frame(StackFrame {
                contract_id: vec![],
                privilege: Privilege::Kernel,
                entry_point: 0,
                arguments: vec![],
                result: vec![],
            })
            .unwrap_err();
        assert_eq!(
            err.number(),
            basalt_shared::error::ErrorNumber::StackOverflow
        );
    }
}
