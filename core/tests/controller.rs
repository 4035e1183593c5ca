// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! End-to-end controller scenarios over an in-memory state database.

use std::sync::{Arc, Mutex};

use basalt::bus::BusClient;
use basalt::rpc::*;
use basalt::thunks::{ids, types::LogArguments};
use basalt::{Config, Controller, ForkResolutionAlgorithm};
use basalt_shared::block::*;
use basalt_shared::error::ErrorNumber;
use basalt_shared::receipt::BlockReceipt;
use basalt_shared::space::kernel;
use basalt_shared::{crypto, keys, TransactionId};

const CHAIN_ID: [u8; 32] = [0xAA; 32];

fn genesis_secret() -> [u8; 32] {
    let mut k = [0u8; 32];
    k[31] = 7;
    k
}

fn address(secret: &[u8; 32]) -> Vec<u8> {
    crypto::address_of(&crypto::public_key_of(secret).unwrap())
}

fn genesis() -> GenesisData {
    GenesisData {
        entries: vec![
            GenesisEntry {
                space: kernel::metadata(),
                key: keys::CHAIN_ID.clone(),
                value: CHAIN_ID.to_vec(),
            },
            GenesisEntry {
                space: kernel::metadata(),
                key: keys::GENESIS_KEY.clone(),
                value: address(&genesis_secret()),
            },
        ],
    }
}

fn open_controller(algo: ForkResolutionAlgorithm) -> Controller {
    Controller::open(None, &genesis(), algo, false, Config::default()).unwrap()
}

fn make_transaction(secret: &[u8; 32], nonce: u64, operations: Vec<Operation>) -> Transaction {
    let mut tx = Transaction {
        id: Vec::new(),
        header: TransactionHeader {
            chain_id: CHAIN_ID.to_vec(),
            rc_limit: 1_000_000,
            nonce,
            payer: address(secret),
            payee: None,
            operation_merkle_root: Vec::new(),
        },
        operations,
        signatures: Vec::new(),
    };
    tx.header.operation_merkle_root = tx.operation_merkle_root();
    tx.id = tx.header.id();
    tx.signatures = vec![crypto::sign(secret, &tx.id).unwrap()];
    tx
}

fn make_block(
    controller: &Controller,
    secret: &[u8; 32],
    timestamp: u64,
    transactions: Vec<Transaction>,
) -> Block {
    let db = controller.state_db();
    let head = db.head();
    let parent_id = head.block_id.clone().unwrap();
    let parent = db.node(&parent_id).unwrap();

    make_block_on(controller, &parent_id, db.merkle_root(parent).unwrap(), head.height + 1, secret, timestamp, transactions)
}

fn make_block_on(
    _controller: &Controller,
    previous: &[u8],
    previous_state_merkle_root: Vec<u8>,
    height: u64,
    secret: &[u8; 32],
    timestamp: u64,
    transactions: Vec<Transaction>,
) -> Block {
    let leaves: Vec<Vec<u8>> = transactions.iter().map(|t| t.id.clone()).collect();
    let header = BlockHeader {
        previous: previous.to_vec(),
        height,
        timestamp,
        previous_state_merkle_root,
        transaction_merkle_root: crypto::merkle_root(&leaves).to_vec(),
        signer: address(secret),
    };
    let id = header.id();
    let signature = crypto::sign(secret, &id).unwrap();
    Block {
        id,
        header,
        transactions,
        signature,
    }
}

fn submit(controller: &Controller, block: Block) -> BlockReceipt {
    controller
        .submit_block(SubmitBlockRequest { block })
        .unwrap()
        .receipt
}

#[derive(Default)]
struct RecordingBus {
    accepted: Mutex<Vec<Vec<u8>>>,
    failed: Mutex<Vec<TransactionId>>,
    fork_updates: Mutex<usize>,
}

impl BusClient for RecordingBus {
    fn block_accepted(&self, receipt: &BlockReceipt) {
        self.accepted.lock().unwrap().push(receipt.id.clone());
    }

    fn transaction_failed(&self, id: &TransactionId) {
        self.failed.lock().unwrap().push(id.clone());
    }

    fn fork_heads_updated(&self, _heads: &GetForkHeadsResponse) {
        *self.fork_updates.lock().unwrap() += 1;
    }
}

// A contract that terminates immediately with a distinctive return value.
fn override_contract_bytecode() -> Vec<u8> {
    wat::parse_str(
        r#"
        (module
          (import "env" "exit" (func $exit (param i32 i32 i32)))
          (memory (export "memory") 1)
          (data (i32.const 0) "overridden")
          (func (export "_start")
            (call $exit (i32.const 0) (i32.const 0) (i32.const 10))))
        "#,
    )
    .unwrap()
}

fn looping_contract_bytecode() -> Vec<u8> {
    wat::parse_str(
        r#"
        (module
          (memory (export "memory") 1)
          (func (export "_start")
            (loop $forever (br $forever))))
        "#,
    )
    .unwrap()
}

#[test]
fn genesis_bootstrap() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);

    let chain_id = controller.get_chain_id().unwrap();
    assert_eq!(chain_id.chain_id, CHAIN_ID.to_vec());

    let info = controller.get_head_info().unwrap();
    assert_eq!(info.head_topology.height, 0);
    assert_eq!(info.last_irreversible_block, 0);
}

#[test]
fn linear_advance() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let block = make_block(&controller, &genesis_secret(), 1_000, vec![]);
    let block_id = block.id.clone();

    let receipt = submit(&controller, block);
    assert_eq!(receipt.height, 1);

    let info = controller.get_head_info().unwrap();
    assert_eq!(info.head_topology.id, block_id);
    assert_eq!(info.head_topology.height, 1);
    assert_eq!(info.last_irreversible_block, 0);
}

#[test]
fn block_validation_rejects_bad_parents_and_signatures() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);

    // Unknown parent.
    let orphan = make_block_on(
        &controller,
        &[9u8; 32],
        vec![0; 32],
        1,
        &genesis_secret(),
        1_000,
        vec![],
    );
    let err = controller
        .submit_block(SubmitBlockRequest { block: orphan })
        .unwrap_err();
    assert_eq!(err.number(), ErrorNumber::UnknownPreviousBlock);

    // Corrupt signature.
    let mut block = make_block(&controller, &genesis_secret(), 1_000, vec![]);
    block.signature[10] ^= 0xFF;
    let err = controller
        .submit_block(SubmitBlockRequest { block })
        .unwrap_err();
    assert!(matches!(
        err.number(),
        ErrorNumber::InvalidSignature
    ));

    // A rejected block leaves no residue.
    assert_eq!(controller.get_head_info().unwrap().head_topology.height, 0);
    assert_eq!(controller.state_db().fork_heads().len(), 1);
}

#[test]
fn fork_and_reorg_under_block_time() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);

    let b1 = make_block(&controller, &genesis_secret(), 2_000, vec![]);
    let b1_id = b1.id.clone();
    submit(&controller, b1);
    assert_eq!(
        controller.get_head_info().unwrap().head_topology.id,
        b1_id
    );

    // Sibling with an earlier timestamp wins under block-time fork choice.
    let db = controller.state_db();
    let genesis_id = db.root().block_id.clone().unwrap();
    let root_merkle = db.merkle_root(db.root().handle).unwrap();
    let b1p = make_block_on(
        &controller,
        &genesis_id,
        root_merkle,
        1,
        &genesis_secret(),
        1_000,
        vec![],
    );
    let b1p_id = b1p.id.clone();
    submit(&controller, b1p);

    let info = controller.get_head_info().unwrap();
    assert_eq!(info.head_topology.id, b1p_id);

    let heads = controller.get_fork_heads().unwrap();
    let ids: Vec<Vec<u8>> = heads.fork_heads.iter().map(|t| t.id.clone()).collect();
    assert_eq!(heads.fork_heads.len(), 2);
    assert!(ids.contains(&b1_id));
    assert!(ids.contains(&b1p_id));
    // The losing subtree remains until irreversibility passes it.
    assert!(controller.state_db().node(&b1_id).is_some());
}

#[test]
fn failed_transaction_rolls_back_and_reports() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let bus = Arc::new(RecordingBus::default());
    controller.set_client(bus.clone());

    // Rerouting a system call requires the genesis authority; a random payer
    // must be rejected with insufficient privileges.
    let mut intruder = [0u8; 32];
    intruder[31] = 99;
    let tx = make_transaction(
        &intruder,
        1,
        vec![Operation::SetSystemCall(SetSystemCallOperation {
            call_id: ids::LOG,
            target: SystemCallTarget::Thunk(ids::LOG),
        })],
    );
    let tx_id = tx.id.clone();

    let block = make_block(&controller, &genesis_secret(), 1_000, vec![tx]);
    let receipt = submit(&controller, block);

    assert_eq!(receipt.transaction_receipts.len(), 1);
    let tx_receipt = &receipt.transaction_receipts[0];
    assert!(tx_receipt.reverted);
    assert_eq!(
        tx_receipt.code,
        ErrorNumber::InsufficientPrivileges as u32
    );
    assert!(tx_receipt.state_delta_entries.is_empty());
    assert!(tx_receipt.events.is_empty());

    // The failure reached the bus.
    assert_eq!(bus.failed.lock().unwrap().as_slice(), &[tx_id]);
    assert_eq!(bus.accepted.lock().unwrap().len(), 1);

    // The nonce write was rolled back with the session.
    let nonce = controller
        .get_account_nonce(GetAccountNonceRequest {
            account: address(&intruder),
        })
        .unwrap();
    assert_eq!(nonce.nonce, 0);
}

#[test]
fn override_of_non_overridable_syscall_is_rejected() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);

    let tx = make_transaction(
        &genesis_secret(),
        1,
        vec![Operation::SetSystemCall(SetSystemCallOperation {
            call_id: ids::GET_ARGUMENTS,
            target: SystemCallTarget::Thunk(ids::LOG),
        })],
    );
    let block = make_block(&controller, &genesis_secret(), 1_000, vec![tx]);
    let receipt = submit(&controller, block);

    let tx_receipt = &receipt.transaction_receipts[0];
    assert!(tx_receipt.reverted);
    assert_eq!(
        tx_receipt.code,
        ErrorNumber::SyscallNotOverridable as u32
    );
    // The dispatch registry is untouched.
    assert!(tx_receipt.state_delta_entries.is_empty());
}

#[test]
fn syscall_override_routes_and_discard_restores() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let producer = genesis_secret();
    let contract_id = address(&producer);

    // One block uploads the contract and reroutes the log syscall to it.
    let upload = make_transaction(
        &producer,
        1,
        vec![Operation::UploadContract(UploadContractOperation {
            contract_id: contract_id.clone(),
            bytecode: override_contract_bytecode(),
            authorizes_transactions: false,
        })],
    );
    let reroute = make_transaction(
        &producer,
        2,
        vec![Operation::SetSystemCall(SetSystemCallOperation {
            call_id: ids::LOG,
            target: SystemCallTarget::Contract {
                id: contract_id.clone(),
                entry_point: 0,
            },
        })],
    );
    let b1 = make_block(&controller, &producer, 2_000, vec![upload, reroute]);
    let b1_id = b1.id.clone();
    let receipt = submit(&controller, b1);
    assert!(receipt.transaction_receipts.iter().all(|r| !r.reverted));

    // The overridden syscall now runs the contract.
    let args = bcs::to_bytes(&LogArguments {
        message: "hello".into(),
    })
    .unwrap();
    let response = controller
        .invoke_system_call(InvokeSystemCallRequest {
            id: ids::LOG,
            args: args.clone(),
        })
        .unwrap();
    assert_eq!(response.value, b"overridden".to_vec());

    // Reorg away from the registering block and drop it: the thunk path is
    // restored because resolution is per state node.
    let db = controller.state_db();
    let genesis_id = db.root().block_id.clone().unwrap();
    let root_merkle = db.merkle_root(db.root().handle).unwrap();
    let b1p = make_block_on(
        &controller,
        &genesis_id,
        root_merkle,
        1,
        &producer,
        1_000,
        vec![],
    );
    submit(&controller, b1p);
    let b1_handle = db.node(&b1_id).unwrap();
    db.discard_node(b1_handle).unwrap();

    let response = controller
        .invoke_system_call(InvokeSystemCallRequest {
            id: ids::LOG,
            args,
        })
        .unwrap();
    assert_eq!(response.value, Vec::<u8>::new());
}

#[test]
fn read_contract_is_bounded_by_the_tick_meter() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let producer = genesis_secret();
    let contract_id = address(&producer);

    let upload = make_transaction(
        &producer,
        1,
        vec![Operation::UploadContract(UploadContractOperation {
            contract_id: contract_id.clone(),
            bytecode: looping_contract_bytecode(),
            authorizes_transactions: false,
        })],
    );
    let b1 = make_block(&controller, &producer, 1_000, vec![upload]);
    submit(&controller, b1);

    let err = controller
        .read_contract(ReadContractRequest {
            contract_id,
            entry_point: 0,
            args: vec![],
        })
        .unwrap_err();
    assert_eq!(err.number(), ErrorNumber::TickMeterExhausted);

    // The sandbox left no residue behind.
    assert_eq!(controller.get_head_info().unwrap().head_topology.height, 1);
}

#[test]
fn irreversibility_commits_at_threshold() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let producer = genesis_secret();

    let mut first_id = None;
    for height in 1..=61u64 {
        let block = make_block(&controller, &producer, height * 1_000, vec![]);
        if height == 1 {
            first_id = Some(block.id.clone());
        }
        submit(&controller, block);
    }
    let first_id = first_id.unwrap();

    let info = controller.get_head_info().unwrap();
    assert_eq!(info.head_topology.height, 61);
    assert_eq!(info.last_irreversible_block, 1);

    // Block 1 is now the committed root of the tree.
    let db = controller.state_db();
    assert_eq!(db.root().block_id, Some(first_id));
    assert_eq!(db.root().height, 1);
}

#[test]
fn block_application_is_deterministic() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let block = make_block(&controller, &genesis_secret(), 1_000, vec![]);

    let a = controller
        .propose_block(SubmitBlockRequest {
            block: block.clone(),
        })
        .unwrap()
        .receipt;
    let b = controller
        .propose_block(SubmitBlockRequest { block })
        .unwrap()
        .receipt;

    assert_eq!(bcs::to_bytes(&a).unwrap(), bcs::to_bytes(&b).unwrap());
    // Proposals never advance head.
    assert_eq!(controller.get_head_info().unwrap().head_topology.height, 0);
}

#[test]
fn submit_transaction_dry_runs_against_head() {
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let producer = genesis_secret();

    let tx = make_transaction(&producer, 1, vec![]);
    let receipt = controller
        .submit_transaction(SubmitTransactionRequest {
            transaction: tx.clone(),
        })
        .unwrap()
        .receipt;
    assert!(!receipt.reverted);
    assert!(receipt.rc_used > 0);

    // Dry runs leave no state behind: the nonce is unchanged and the same
    // transaction applies for real later.
    let nonce = controller
        .get_account_nonce(GetAccountNonceRequest {
            account: address(&producer),
        })
        .unwrap();
    assert_eq!(nonce.nonce, 0);

    let block = make_block(&controller, &producer, 1_000, vec![tx]);
    let receipt = submit(&controller, block);
    assert!(!receipt.transaction_receipts[0].reverted);
    let nonce = controller
        .get_account_nonce(GetAccountNonceRequest {
            account: address(&producer),
        })
        .unwrap();
    assert_eq!(nonce.nonce, 1);
}

#[test]
fn event_sequences_are_dense_within_a_receipt() {
    // Two successful transactions; any events they emit (none here) plus
    // receipt bookkeeping must keep sequences dense from zero.
    let controller = open_controller(ForkResolutionAlgorithm::BlockTime);
    let producer = genesis_secret();
    let tx1 = make_transaction(&producer, 1, vec![]);
    let tx2 = make_transaction(&producer, 2, vec![]);
    let block = make_block(&controller, &producer, 1_000, vec![tx1, tx2]);
    let receipt = submit(&controller, block);

    for (expected, event) in receipt.events.iter().enumerate() {
        assert_eq!(event.sequence as usize, expected);
    }
}
