// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Block, transaction, and operation application.
//!
//! These thunks implement the state-transition function. The controller
//! never mutates state itself: it builds a context and dispatches
//! `apply_block` through the system-call table like any other call, so even
//! the transition function is override-aware.

use basalt_shared::block::{ContractMetadata, Operation, Transaction};
use basalt_shared::error::ErrorNumber;
use basalt_shared::receipt::TransactionReceipt;
use basalt_shared::{crypto, keys};

use crate::context::{ExecutionContext, Intent};
use crate::error::{ClassifyResult, Context as _, ExecutionError, Result};
use crate::session::CloseMode;
use crate::syscall_error;
use crate::syscalls;
use crate::thunks::{ids, types::*, ThunkDispatcher};

/// How far into the future a block timestamp may run ahead of the
/// submitter's clock.
pub const BLOCK_TIME_TOLERANCE_MS: u64 = 60_000;

pub fn apply_block(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    if ctx.intent != Intent::BlockApplication {
        return Err(ExecutionError::fatal(anyhow::anyhow!(
            "apply_block outside a block-application context"
        )));
    }
    let args: ApplyBlockArguments = bcs::from_bytes(args)?;
    let block = args.block;

    if block.id != block.header.id() {
        return Err(syscall_error!(MalformedBlock; "block id does not match its header"));
    }

    let parent = ctx
        .db
        .node(&block.header.previous)
        .ok_or_else(|| syscall_error!(UnknownPreviousBlock;
            "previous block {} not found", hex::encode(&block.header.previous)))?;
    let parent_summary = ctx.db.summary(parent)?;

    if block.header.height != parent_summary.height + 1 {
        return Err(syscall_error!(BlockHeightMismatch;
            "expected height {}, got {}", parent_summary.height + 1, block.header.height));
    }
    if block.header.timestamp <= parent_summary.timestamp && parent_summary.height > 0 {
        return Err(syscall_error!(TimestampOutOfBounds;
            "timestamp {} does not advance past parent", block.header.timestamp));
    }
    if ctx.now > 0 && block.header.timestamp > ctx.now + BLOCK_TIME_TOLERANCE_MS {
        return Err(syscall_error!(TimestampOutOfBounds;
            "timestamp {} is too far in the future", block.header.timestamp));
    }
    if block.header.previous_state_merkle_root != ctx.db.merkle_root(parent)? {
        return Err(syscall_error!(StateRootMismatch;
            "previous state merkle root does not match the parent node"));
    }

    let leaves: Vec<Vec<u8>> = block.transactions.iter().map(|t| t.id.clone()).collect();
    if block.header.transaction_merkle_root != crypto::merkle_root(&leaves) {
        return Err(syscall_error!(TransactionRootMismatch;
            "transaction merkle root does not cover the transactions"));
    }

    let signer_key = crypto::recover_public_key(&block.signature, &block.id)
        .or_error(ErrorNumber::InvalidSignature)?;
    if crypto::address_of(&signer_key) != block.header.signer {
        return Err(syscall_error!(InvalidSignature;
            "block signature does not recover to the signer"));
    }

    let limits = super::resource::limit_data(ctx)?;
    ctx.meter.set_resource_limit_data(limits);

    let block_size = bcs::to_bytes(&block).expect("block serializes").len() as u64;
    ctx.use_network_bandwidth(block_size)
        .context("charging block network bandwidth")?;

    ctx.block = Some(block.clone());
    for transaction in &block.transactions {
        apply_transaction_in_block(ctx, transaction.clone())?;
    }

    // Finalization hooks: the block charges its own totals so governance can
    // swap the policy, then the committed head metadata advances.
    let consumed = ConsumeBlockResourcesArguments {
        disk_storage: ctx.meter.disk_storage_used(),
        network_bandwidth: ctx.meter.network_bandwidth_used(),
        compute_bandwidth: ctx.meter.compute_bandwidth_used(),
    };
    syscalls::invoke_system_call(
        ctx,
        ids::CONSUME_BLOCK_RESOURCES,
        &bcs::to_bytes(&consumed).expect("arguments serialize"),
    )
    .context("consuming block resources")?;

    let node = ctx.node()?;
    ctx.db.put(
        node,
        &basalt_shared::space::kernel::metadata(),
        &keys::HEAD_BLOCK,
        bcs::to_bytes(&block.header).expect("header serializes"),
    )?;

    Ok(Vec::new())
}

/// Run one transaction inside its own session, producing a receipt either
/// way. Only fatal errors abort the enclosing block.
pub(crate) fn apply_transaction_in_block(
    ctx: &mut ExecutionContext,
    transaction: Transaction,
) -> Result<()> {
    let payer = transaction.header.payer.clone();
    let max_payer_rc = ctx.account_rc(&payer)?;
    let rc_limit = transaction.header.rc_limit;

    let mut receipt = TransactionReceipt {
        id: transaction.id.clone(),
        payer: payer.clone(),
        max_payer_rc,
        rc_limit,
        ..Default::default()
    };

    if rc_limit > max_payer_rc {
        receipt.reverted = true;
        receipt.code = ErrorNumber::InsufficientRc as u32;
        receipt.logs.push(format!(
            "transaction reverted: rc limit {rc_limit} exceeds available {max_payer_rc}"
        ));
        ctx.transaction_receipts.push(receipt);
        return Ok(());
    }

    let before = ctx.meter.snapshot();
    ctx.open_session(rc_limit)?;
    let args = ApplyTransactionArguments {
        transaction: transaction.clone(),
    };
    let outcome = syscalls::invoke_system_call(
        ctx,
        ids::APPLY_TRANSACTION,
        &bcs::to_bytes(&args).expect("arguments serialize"),
    );
    ctx.transaction = None;

    match outcome {
        Ok(_) => {
            let report = ctx.close_session(CloseMode::Commit)?;
            let after = ctx.meter.snapshot();
            receipt.rc_used = report.rc_used;
            receipt.disk_storage_used =
                before.disk_storage_remaining - after.disk_storage_remaining;
            receipt.network_bandwidth_used =
                before.network_bandwidth_remaining - after.network_bandwidth_remaining;
            receipt.compute_bandwidth_used =
                before.compute_bandwidth_remaining - after.compute_bandwidth_remaining;
            receipt.events = report.events.into_iter().map(|(_, e)| e).collect();
            receipt.logs = report.logs;
            receipt.state_delta_entries = report.state_delta;
            ctx.consume_account_rc(&payer, receipt.rc_used)?;
        }
        Err(e) if e.is_recoverable() => {
            let diagnostics = ctx
                .sessions
                .last()
                .map(|s| s.logs.clone())
                .unwrap_or_default();
            ctx.close_session(CloseMode::Rollback)?;
            log::warn!(
                "transaction {} reverted: {e}",
                hex::encode(&transaction.id)
            );
            receipt.reverted = true;
            receipt.code = e.number() as u32;
            receipt.logs = diagnostics;
            receipt.logs.push(format!("transaction reverted: {e}"));
        }
        Err(e) => {
            ctx.close_session(CloseMode::Rollback)?;
            return Err(e);
        }
    }

    ctx.transaction_receipts.push(receipt);
    Ok(())
}

pub fn apply_transaction(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    if ctx.intent == Intent::ReadOnly {
        return Err(syscall_error!(ReadOnlyContext; "cannot apply a transaction read-only"));
    }
    let args: ApplyTransactionArguments = bcs::from_bytes(args)?;
    let transaction = args.transaction;

    if transaction.id != transaction.header.id() {
        return Err(syscall_error!(MalformedObject; "transaction id does not match its header"));
    }
    if transaction.header.operation_merkle_root != transaction.operation_merkle_root() {
        return Err(syscall_error!(MalformedObject;
            "operation merkle root does not cover the operations"));
    }
    if transaction.header.chain_id != ctx.chain_id()? {
        return Err(syscall_error!(InvalidChainId; "transaction targets another chain"));
    }

    let size = bcs::to_bytes(&transaction).expect("transaction serializes").len() as u64;
    ctx.use_network_bandwidth(size)
        .context("charging transaction network bandwidth")?;

    let payer = transaction.header.payer.clone();
    let operations = transaction.operations.clone();
    ctx.transaction = Some(transaction);

    ctx.require_authority(&payer)
        .context("authorizing the payer")?;

    let expected = ctx.account_nonce(&payer)? + 1;
    let nonce = ctx
        .transaction
        .as_ref()
        .map(|t| t.header.nonce)
        .unwrap_or_default();
    if nonce != expected {
        return Err(syscall_error!(InvalidNonce; "expected nonce {}, got {}", expected, nonce));
    }
    ctx.set_account_nonce(&payer, nonce)?;

    for operation in operations {
        match operation {
            Operation::UploadContract(op) => {
                let args = ApplyUploadContractOperationArguments { operation: op };
                syscalls::invoke_system_call(
                    ctx,
                    ids::APPLY_UPLOAD_CONTRACT_OPERATION,
                    &bcs::to_bytes(&args).expect("arguments serialize"),
                )?;
            }
            Operation::CallContract(op) => {
                let args = ApplyCallContractOperationArguments { operation: op };
                syscalls::invoke_system_call(
                    ctx,
                    ids::APPLY_CALL_CONTRACT_OPERATION,
                    &bcs::to_bytes(&args).expect("arguments serialize"),
                )?;
            }
            Operation::SetSystemCall(op) => {
                let args = ApplySetSystemCallOperationArguments { operation: op };
                syscalls::invoke_system_call(
                    ctx,
                    ids::APPLY_SET_SYSTEM_CALL_OPERATION,
                    &bcs::to_bytes(&args).expect("arguments serialize"),
                )?;
            }
        }
    }

    Ok(Vec::new())
}

pub fn apply_upload_contract_operation(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: ApplyUploadContractOperationArguments = bcs::from_bytes(args)?;
    let op = args.operation;

    // Only the account that owns the contract id may upload to it.
    ctx.require_authority(&op.contract_id)
        .context("authorizing contract upload")?;

    let metadata = ContractMetadata {
        hash: crypto::hash(&op.bytecode).to_vec(),
        authorizes_transactions: op.authorizes_transactions,
    };
    ctx.put_object(
        &basalt_shared::space::kernel::contract_bytecode(),
        &op.contract_id,
        op.bytecode,
    )?;
    ctx.put_object(
        &basalt_shared::space::kernel::contract_metadata(),
        &op.contract_id,
        bcs::to_bytes(&metadata).expect("metadata serializes"),
    )?;
    log::debug!("contract {} uploaded", hex::encode(&op.contract_id));
    Ok(Vec::new())
}

pub fn apply_call_contract_operation(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: ApplyCallContractOperationArguments = bcs::from_bytes(args)?;
    let op = args.operation;
    ctx.call_contract(
        op.contract_id,
        op.entry_point,
        op.args,
        crate::context::Privilege::User,
    )?;
    Ok(Vec::new())
}

pub fn apply_set_system_call_operation(ctx: &mut ExecutionContext, args: &[u8]) -> Result<Vec<u8>> {
    let args: ApplySetSystemCallOperationArguments = bcs::from_bytes(args)?;
    let op = args.operation;

    // Rerouting the dispatch table is reserved to the genesis authority.
    let payer = ctx
        .transaction
        .as_ref()
        .map(|t| t.header.payer.clone())
        .unwrap_or_default();
    let genesis_key = ctx.read_metadata(&keys::GENESIS_KEY)?;
    if genesis_key.as_deref() != Some(payer.as_slice()) {
        return Err(syscall_error!(InsufficientPrivileges;
            "system call registration requires the genesis authority"));
    }

    let thunk_args = SetSystemCallArguments {
        call_id: op.call_id,
        target: op.target,
    };
    ThunkDispatcher::instance().call_thunk(
        ctx,
        ids::SET_SYSTEM_CALL,
        &bcs::to_bytes(&thunk_args).expect("arguments serialize"),
    )?;
    Ok(Vec::new())
}
