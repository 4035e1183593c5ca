// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! The controller: the serialized entry point that turns submitted blocks
//! into state transitions.
//!
//! A block flows: open a writable child on its parent's node, build an
//! execution context, dispatch `apply_block` through the system-call table,
//! assemble the receipt, finalize the node under the block id, consult the
//! fork-choice rule, and commit whatever fell below the irreversibility
//! threshold. Failures discard the anonymous node and leave no residue.

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use basalt_shared::block::GenesisData;
use basalt_shared::error::ErrorNumber;
use basalt_shared::keys;
use basalt_shared::receipt::BlockReceipt;
use basalt_shared::resource::ResourceLimitData;
use basalt_shared::space::kernel;
use basalt_shared::DEFAULT_IRREVERSIBLE_THRESHOLD;
use basalt_statedb::{
    BlockTimeForkChoice, FifoForkChoice, ForkChoice, NodeHandle, NodeSummary, PobForkChoice,
    StateDb,
};

use crate::bus::BusClient;
use crate::context::{ExecutionContext, Intent, Privilege};
use crate::error::{ClassifyResult, Result};
use crate::rectify::{maybe_rectify_state, StatePatch};
use crate::rpc::*;
use crate::runtime::Runtime;
use crate::session::CloseMode;
use crate::syscall_error;
use crate::syscalls;
use crate::thunks::{apply, ids, types::ApplyBlockArguments};

/// The pluggable head-selection rule.
pub enum ForkResolutionAlgorithm {
    /// Insertion order.
    Fifo,
    /// Earliest block timestamp.
    BlockTime,
    /// Proof-of-burn: an externally supplied weight.
    Pob(Box<dyn Fn(&NodeSummary) -> u128 + Send + Sync>),
}

pub struct Config {
    /// Compute budget for read-only calls.
    pub read_compute_bandwidth_limit: u64,
    /// Depth below head at which blocks become irreversible.
    pub irreversible_threshold: u64,
    /// Deterministic corrections for known historical anomalies.
    pub patches: Vec<StatePatch>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            read_compute_bandwidth_limit: 10_000_000,
            irreversible_threshold: DEFAULT_IRREVERSIBLE_THRESHOLD,
            patches: Vec::new(),
        }
    }
}

pub struct Controller {
    db: Arc<StateDb>,
    runtime: Arc<Runtime>,
    config: Config,
    client: RwLock<Option<Arc<dyn BusClient>>>,
    /// Serializes all mutating operations.
    submission: Mutex<()>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl Controller {
    /// Load or initialize the chain at `path` (`None` for in-memory) and
    /// stand up the runtime.
    pub fn open(
        path: Option<&Path>,
        genesis: &GenesisData,
        algo: ForkResolutionAlgorithm,
        reset: bool,
        config: Config,
    ) -> Result<Controller> {
        let chooser: Box<dyn ForkChoice> = match algo {
            ForkResolutionAlgorithm::Fifo => Box::new(FifoForkChoice),
            ForkResolutionAlgorithm::BlockTime => Box::new(BlockTimeForkChoice),
            ForkResolutionAlgorithm::Pob(weight) => {
                Box::new(PobForkChoice::new(move |s| weight(s)))
            }
        };
        let db = Arc::new(StateDb::open(path, genesis, chooser, reset)?);
        let runtime = Arc::new(Runtime::with_wasmtime()?);
        log::info!(
            "chain opened at height {} with head {}",
            db.head().height,
            hex::encode(db.head().block_id.clone().unwrap_or_default())
        );
        Ok(Controller {
            db,
            runtime,
            config,
            client: RwLock::new(None),
            submission: Mutex::new(()),
        })
    }

    pub fn set_client(&self, client: Arc<dyn BusClient>) {
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);
    }

    fn client(&self) -> Option<Arc<dyn BusClient>> {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn state_db(&self) -> &Arc<StateDb> {
        &self.db
    }

    fn context(&self, intent: Intent, node: NodeHandle) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(self.runtime.clone(), self.db.clone(), intent);
        ctx.node = Some(node);
        ctx
    }

    /// Apply `block` on a fresh child of its parent. On success the child is
    /// left anonymous for the caller to finalize or discard.
    fn apply_block_on_child(
        &self,
        block: &basalt_shared::block::Block,
        now: u64,
    ) -> Result<(NodeHandle, BlockReceipt)> {
        let parent = self.db.node(&block.header.previous).ok_or_else(
            || syscall_error!(UnknownPreviousBlock;
                "previous block {} not found", hex::encode(&block.header.previous)),
        )?;
        let node = self.db.create_writable_node(parent)?;
        let mut ctx = self.context(Intent::BlockApplication, node);
        ctx.now = now;

        let args = ApplyBlockArguments {
            block: block.clone(),
        };
        let outcome = syscalls::invoke_system_call(
            &mut ctx,
            ids::APPLY_BLOCK,
            &bcs::to_bytes(&args).expect("arguments serialize"),
        );

        if let Err(e) = outcome {
            let _ = self.db.discard_node(node);
            log::warn!("block {} rejected: {e}", hex::encode(&block.id));
            return Err(e);
        }

        let mut receipt = BlockReceipt {
            id: block.id.clone(),
            height: block.header.height,
            disk_storage_used: ctx.meter.disk_storage_used(),
            network_bandwidth_used: ctx.meter.network_bandwidth_used(),
            compute_bandwidth_used: ctx.meter.compute_bandwidth_used(),
            compute_bandwidth_charged: ctx.meter.compute_bandwidth_used(),
            state_merkle_root: Vec::new(),
            events: ctx.chronicler.events().iter().map(|(_, e)| e.clone()).collect(),
            transaction_receipts: std::mem::take(&mut ctx.transaction_receipts),
            logs: ctx.chronicler.logs().to_vec(),
            state_delta_entries: self.db.delta_entries(node)?,
        };

        if let Err(e) = maybe_rectify_state(&self.db, node, block, &mut receipt, &self.config.patches)
        {
            let _ = self.db.discard_node(node);
            return Err(e);
        }
        receipt.state_merkle_root = self.db.merkle_root(node)?;

        Ok((node, receipt))
    }

    pub fn submit_block(&self, request: SubmitBlockRequest) -> Result<SubmitBlockResponse> {
        self.submit_block_at(request, 0, now_ms())
    }

    /// Submit with indexing hints: while `index_to` is ahead of the block's
    /// height, bus publication is suppressed (bulk replay).
    pub fn submit_block_at(
        &self,
        request: SubmitBlockRequest,
        index_to: u64,
        now: u64,
    ) -> Result<SubmitBlockResponse> {
        let _guard = self.submission.lock().unwrap_or_else(|e| e.into_inner());
        let block = request.block;
        let (node, receipt) = self.apply_block_on_child(&block, now)?;

        if let Err(e) = self
            .db
            .finalize_node(node, block.id.clone(), block.header.clone())
        {
            let _ = self.db.discard_node(node);
            return Err(e.into());
        }
        let head_moved = self.db.maybe_advance_head(node)?;
        if head_moved {
            log::debug!(
                "head advanced to {} at height {}",
                hex::encode(&block.id),
                block.header.height
            );
        }

        let head = self.db.head();
        if head.height > self.config.irreversible_threshold {
            self.db
                .commit_irreversible(head.height - self.config.irreversible_threshold)?;
        }

        let indexing = index_to > block.header.height;
        if !indexing {
            if let Some(client) = self.client() {
                client.block_accepted(&receipt);
                for tx_receipt in &receipt.transaction_receipts {
                    if tx_receipt.reverted {
                        client.transaction_failed(&tx_receipt.id);
                    }
                }
                client.fork_heads_updated(&self.fork_heads_response());
            }
        }

        Ok(SubmitBlockResponse { receipt })
    }

    /// The same pipeline as a submission, but the node is always discarded:
    /// a dry run that cannot move head.
    pub fn propose_block(&self, request: ProposeBlockRequest) -> Result<ProposeBlockResponse> {
        let _guard = self.submission.lock().unwrap_or_else(|e| e.into_inner());
        let (node, receipt) = self.apply_block_on_child(&request.block, now_ms())?;
        self.db.discard_node(node)?;
        Ok(SubmitBlockResponse { receipt })
    }

    /// Dry-apply a transaction against a child of head and report its
    /// receipt. All state effects are discarded.
    pub fn submit_transaction(
        &self,
        request: SubmitTransactionRequest,
    ) -> Result<SubmitTransactionResponse> {
        let _guard = self.submission.lock().unwrap_or_else(|e| e.into_inner());
        let node = self.db.create_writable_node(self.db.head().handle)?;
        let mut ctx = self.context(Intent::TransactionApplication, node);

        let limits = self.stored_limits(node)?;
        ctx.meter.set_resource_limit_data(limits);

        let outcome = apply::apply_transaction_in_block(&mut ctx, request.transaction);
        let receipt = ctx.transaction_receipts.pop();
        self.db.discard_node(node)?;
        outcome?;

        let receipt = receipt
            .ok_or_else(|| syscall_error!(MalformedObject; "transaction produced no receipt"))?;
        Ok(SubmitTransactionResponse { receipt })
    }

    pub fn get_head_info(&self) -> Result<GetHeadInfoResponse> {
        let head = self.db.head();
        let previous = self
            .db
            .block_header(head.handle)?
            .map(|h| h.previous)
            .unwrap_or_default();
        Ok(GetHeadInfoResponse {
            head_topology: BlockTopology {
                id: head.block_id.unwrap_or_default(),
                height: head.height,
                previous,
            },
            last_irreversible_block: self.db.root().height,
            head_block_time: head.timestamp,
        })
    }

    pub fn get_chain_id(&self) -> Result<GetChainIdResponse> {
        let head = self.db.head();
        let chain_id = self
            .db
            .get(head.handle, &kernel::metadata(), &keys::CHAIN_ID)?
            .or_error(ErrorNumber::InvalidChainId)?;
        Ok(GetChainIdResponse { chain_id })
    }

    fn fork_heads_response(&self) -> GetForkHeadsResponse {
        let root = self.db.root();
        let fork_heads = self
            .db
            .fork_heads()
            .into_iter()
            .map(|s| {
                let previous = self
                    .db
                    .block_header(s.handle)
                    .ok()
                    .flatten()
                    .map(|h| h.previous)
                    .unwrap_or_default();
                BlockTopology {
                    id: s.block_id.unwrap_or_default(),
                    height: s.height,
                    previous,
                }
            })
            .collect();
        GetForkHeadsResponse {
            fork_heads,
            last_irreversible_block: BlockTopology {
                id: root.block_id.unwrap_or_default(),
                height: root.height,
                previous: Vec::new(),
            },
        }
    }

    pub fn get_fork_heads(&self) -> Result<GetForkHeadsResponse> {
        Ok(self.fork_heads_response())
    }

    fn stored_limits(&self, node: NodeHandle) -> Result<ResourceLimitData> {
        match self
            .db
            .get(node, &kernel::metadata(), &keys::RESOURCE_LIMIT_DATA)?
        {
            Some(bytes) => Ok(bcs::from_bytes(&bytes)?),
            None => Ok(ResourceLimitData::default()),
        }
    }

    fn read_context(&self) -> Result<(NodeHandle, ExecutionContext)> {
        let node = self.db.create_writable_node(self.db.head().handle)?;
        let mut ctx = self.context(Intent::ReadOnly, node);
        let mut limits = self.stored_limits(node)?;
        limits.compute_bandwidth_limit = self.config.read_compute_bandwidth_limit;
        ctx.meter.set_resource_limit_data(limits);
        Ok((node, ctx))
    }

    /// Run a contract entry point in a sandbox on an ephemeral child of
    /// head; every mutation is discarded on completion.
    pub fn read_contract(&self, request: ReadContractRequest) -> Result<ReadContractResponse> {
        let (node, mut ctx) = self.read_context()?;
        ctx.open_session(u64::MAX)?;
        let outcome = ctx.call_contract(
            request.contract_id,
            request.entry_point,
            request.args,
            Privilege::User,
        );
        let report = ctx.close_session(CloseMode::Commit)?;
        self.db.discard_node(node)?;
        let result = outcome?;
        Ok(ReadContractResponse {
            result,
            logs: report.logs,
            events: report.events.into_iter().map(|(_, e)| e).collect(),
        })
    }

    /// Read-only dispatch of an arbitrary system call.
    pub fn invoke_system_call(
        &self,
        request: InvokeSystemCallRequest,
    ) -> Result<InvokeSystemCallResponse> {
        let (node, mut ctx) = self.read_context()?;
        ctx.open_session(u64::MAX)?;
        let outcome = syscalls::invoke_system_call(&mut ctx, request.id, &request.args);
        let _ = ctx.close_session(CloseMode::Rollback)?;
        self.db.discard_node(node)?;
        Ok(InvokeSystemCallResponse { value: outcome? })
    }

    pub fn get_account_nonce(
        &self,
        request: GetAccountNonceRequest,
    ) -> Result<GetAccountNonceResponse> {
        let (node, ctx) = self.read_context()?;
        let nonce = ctx.account_nonce(&request.account);
        self.db.discard_node(node)?;
        Ok(GetAccountNonceResponse { nonce: nonce? })
    }

    pub fn get_account_rc(&self, request: GetAccountRcRequest) -> Result<GetAccountRcResponse> {
        let (node, ctx) = self.read_context()?;
        let rc = ctx.account_rc(&request.account);
        self.db.discard_node(node)?;
        Ok(GetAccountRcResponse { rc: rc? })
    }

    pub fn get_resource_limits(&self) -> Result<GetResourceLimitsResponse> {
        let head = self.db.head();
        Ok(GetResourceLimitsResponse {
            limits: self.stored_limits(head.handle)?,
        })
    }
}
