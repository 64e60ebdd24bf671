//! End-to-end state transition scenarios, driven through the applicator
//! with signed transactions on chain id 99.

use std::collections::BTreeMap;

use bytes::Bytes;
use ethereum_types::{Address, Bloom, H256, U256};
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use uevm_common::types::{Account, Transaction, TxKind};
use uevm_common::utils::{create_address, keccak};
use uevm_vm::db::{InMemoryStore, StateDb};
use uevm_vm::environment::Environment;
use uevm_vm::state_transition::{apply_transactions, BatchOutput};
use uevm_vm::tracing::{NoOpTracer, StructLogger, TraceConfig, Tracer};

const CHAIN_ID: u64 = 99;
const CONTRACT: Address = Address::repeat_byte(0xcc);

fn signer() -> (SecretKey, Address) {
    let secret_key = SecretKey::from_slice(&[0xaa; 32]).unwrap();
    let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
    let hash = keccak(&public_key.serialize_uncompressed()[1..]);
    (secret_key, Address::from_slice(&hash.as_bytes()[12..]))
}

fn env() -> Environment {
    Environment {
        chain_id: CHAIN_ID,
        block_gas_limit: 10_000_000,
        block_number: 1,
        timestamp: 10,
        coinbase: Address::from_low_u64_be(0xba5e),
        ..Default::default()
    }
}

struct Harness {
    db: StateDb,
    sender: Address,
    secret_key: SecretKey,
}

impl Harness {
    /// Pre-state: a funded sender plus one contract with the given code.
    fn new(contract_code: &[u8]) -> Self {
        Self::with_accounts(contract_code, vec![])
    }

    fn with_accounts(contract_code: &[u8], extra: Vec<(Address, Account)>) -> Self {
        let (secret_key, sender) = signer();
        let mut accounts = BTreeMap::new();
        accounts.insert(
            sender,
            Account::new(U256::from(10_000_000u64), 0, Bytes::new(), BTreeMap::new()),
        );
        if !contract_code.is_empty() {
            accounts.insert(
                CONTRACT,
                Account::new(
                    U256::zero(),
                    1,
                    Bytes::copy_from_slice(contract_code),
                    BTreeMap::new(),
                ),
            );
        }
        accounts.extend(extra);
        Harness {
            db: StateDb::new(Box::new(InMemoryStore::new(accounts))),
            sender,
            secret_key,
        }
    }

    fn call_tx(&self, nonce: u64, gas: u64, value: u64, data: &[u8]) -> Transaction {
        let mut tx = Transaction {
            nonce,
            gas_price: U256::one(),
            gas,
            to: TxKind::Call(CONTRACT),
            value: U256::from(value),
            data: Bytes::copy_from_slice(data),
            ..Default::default()
        };
        tx.sign(&self.secret_key, CHAIN_ID);
        tx
    }

    fn run(&mut self, txs: &[Transaction], tracer: &mut dyn Tracer) -> BatchOutput {
        apply_transactions(&mut self.db, &env(), txs, tracer).unwrap()
    }
}

/// S1: PUSH1 3, PUSH1 5, ADD. The stack at STOP holds 0x08 and the
/// transaction costs 21000 + 3 + 3 + 3.
#[test]
fn s1_add_trace() {
    let mut harness = Harness::new(&[0x60, 0x03, 0x60, 0x05, 0x01]);
    let tx = harness.call_tx(0, 100_000, 0, &[]);
    let mut tracer = StructLogger::new(TraceConfig::default());
    let output = harness.run(&[tx], &mut tracer);

    assert_eq!(output.receipts.len(), 1);
    assert!(output.receipts[0].status);
    assert_eq!(output.receipts[0].gas_used, 21009);

    // PUSH1, PUSH1, ADD, implicit STOP.
    assert_eq!(tracer.logs.len(), 4);
    let stop = tracer.logs.last().unwrap();
    assert_eq!(stop.op, 0x00);
    assert_eq!(stop.stack.as_deref(), Some(&["0x8".to_string()][..]));
    assert_eq!(tracer.gas_used, 21009);
}

/// S2: 1 / 0 leaves zero on the stack and is not an error.
#[test]
fn s2_division_by_zero() {
    let mut harness = Harness::new(&[0x60, 0x00, 0x60, 0x01, 0x04]);
    let tx = harness.call_tx(0, 100_000, 0, &[]);
    let mut tracer = StructLogger::new(TraceConfig::default());
    let output = harness.run(&[tx], &mut tracer);

    assert!(output.receipts[0].status);
    let stop = tracer.logs.last().unwrap();
    assert_eq!(stop.stack.as_deref(), Some(&["0x0".to_string()][..]));
    assert!(tracer.logs.iter().all(|log| log.err.is_none()));
}

/// S3: a JUMP to a non-JUMPDEST offset fails the frame, producing a
/// status-0 receipt that consumed the whole gas limit.
#[test]
fn s3_invalid_jump() {
    let mut harness = Harness::new(&[0x60, 0x03, 0x56]);
    let tx = harness.call_tx(0, 100_000, 0, &[]);
    let mut tracer = NoOpTracer;
    let output = harness.run(&[tx], &mut tracer);

    assert_eq!(output.rejected.len(), 0);
    let receipt = &output.receipts[0];
    assert!(!receipt.status);
    assert_eq!(receipt.gas_used, 100_000);
}

/// S4: an SSTORE behind a STATICCALL fails the sub-call with write
/// protection; the caller sees 0 and the state is unchanged.
#[test]
fn s4_staticcall_write_protection() {
    // Callee at 0xdd..dd: PUSH1 1, PUSH1 0, SSTORE.
    let callee = Address::repeat_byte(0xdd);
    let callee_account = Account::new(
        U256::zero(),
        1,
        Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0x55]),
        BTreeMap::new(),
    );
    // Caller: STATICCALL(0xffff, callee, 0, 0, 0, 0).
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73];
    code.extend_from_slice(callee.as_bytes());
    code.extend_from_slice(&[0x61, 0xff, 0xff, 0xfa]);

    let mut harness = Harness::with_accounts(&code, vec![(callee, callee_account)]);
    let tx = harness.call_tx(0, 200_000, 0, &[]);
    let mut tracer = StructLogger::new(TraceConfig::default());
    let output = harness.run(&[tx], &mut tracer);

    // The caller itself succeeds; the sub-call's status on its stack is 0.
    assert!(output.receipts[0].status);
    let stop = tracer.logs.last().unwrap();
    assert_eq!(stop.depth, 1);
    assert_eq!(stop.stack.as_deref(), Some(&["0x0".to_string()][..]));
    assert_eq!(
        harness.db.get_state(callee, H256::zero()).unwrap(),
        U256::zero()
    );
}

/// S5: a creation transaction at nonce 7 deploys to
/// Keccak(RLP([sender, 7]))[12..], moves the value there, and bumps the
/// sender nonce.
#[test]
fn s5_contract_creation_address() {
    let (secret_key, sender) = signer();
    let mut accounts = BTreeMap::new();
    accounts.insert(
        sender,
        Account::new(U256::from(10_000_000u64), 7, Bytes::new(), BTreeMap::new()),
    );
    let mut db = StateDb::new(Box::new(InMemoryStore::new(accounts)));

    // Init code PUSH1 0: runs to the implicit STOP, deploying empty code.
    let mut tx = Transaction {
        nonce: 7,
        gas_price: U256::one(),
        gas: 200_000,
        to: TxKind::Create,
        value: U256::from(123u64),
        data: Bytes::from_static(&[0x60, 0x00]),
        ..Default::default()
    };
    tx.sign(&secret_key, CHAIN_ID);

    let mut tracer = NoOpTracer;
    let output = apply_transactions(&mut db, &env(), &[tx], &mut tracer).unwrap();

    let expected = create_address(sender, 7);
    let receipt = &output.receipts[0];
    assert!(receipt.status);
    assert_eq!(receipt.contract_address, Some(expected));
    assert_eq!(db.get_balance(expected).unwrap(), U256::from(123u64));
    assert_eq!(db.get_nonce(expected).unwrap(), 1);
    assert_eq!(db.get_nonce(sender).unwrap(), 8);
    assert!(db.get_code(expected).unwrap().is_empty());
}

/// S6: a frame that reverts undoes its writes but keeps its unspent gas;
/// the receipt shows partial consumption, not the full limit.
#[test]
fn s6_revert_preserves_gas() {
    // PUSH1 1, PUSH1 0, SSTORE, PUSH1 0, PUSH1 0, REVERT.
    let code = [0x60, 0x01, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xfd];
    let mut harness = Harness::new(&code);
    let tx = harness.call_tx(0, 100_000, 0, &[]);
    let mut tracer = NoOpTracer;
    let output = harness.run(&[tx], &mut tracer);

    let receipt = &output.receipts[0];
    assert!(!receipt.status);
    // 21000 intrinsic + 3 + 3 + 20000 (fresh slot) + 3 + 3; the zero-size
    // revert range costs no memory expansion.
    assert_eq!(receipt.gas_used, 41012);
    assert_eq!(
        harness.db.get_state(CONTRACT, H256::zero()).unwrap(),
        U256::zero()
    );
}

/// Logs vanish when their frame reverts, and bloom filters only cover what
/// survived.
#[test]
fn reverted_logs_do_not_reach_the_receipt() {
    // LOG0 over an empty range, then REVERT.
    let code = [
        0x60, 0x00, 0x60, 0x00, 0xa0, // LOG0(0, 0)
        0x60, 0x00, 0x60, 0x00, 0xfd, // REVERT(0, 0)
    ];
    let mut harness = Harness::new(&code);
    let tx = harness.call_tx(0, 100_000, 0, &[]);
    let mut tracer = NoOpTracer;
    let output = harness.run(&[tx], &mut tracer);

    let receipt = &output.receipts[0];
    assert!(!receipt.status);
    assert!(receipt.logs.is_empty());
    assert_eq!(receipt.bloom, Bloom::default());
}

/// A successful LOG lands in the receipt with the emitting address and the
/// bloom bits set.
#[test]
fn successful_logs_reach_the_receipt() {
    // PUSH1 0xaa (topic), PUSH1 0, PUSH1 0, LOG1.
    let code = [0x60, 0xaa, 0x60, 0x00, 0x60, 0x00, 0xa1];
    let mut harness = Harness::new(&code);
    let tx = harness.call_tx(0, 100_000, 0, &[]);
    let mut tracer = NoOpTracer;
    let output = harness.run(&[tx], &mut tracer);

    let receipt = &output.receipts[0];
    assert!(receipt.status);
    assert_eq!(receipt.logs.len(), 1);
    assert_eq!(receipt.logs[0].address, CONTRACT);
    assert_eq!(receipt.logs[0].topics[0].0[31], 0xaa);
    assert_ne!(receipt.bloom, Bloom::default());
}

/// The storage-clearing refund is capped at half the gas used.
#[test]
fn sstore_clear_refund_is_applied() {
    // Slot 0 starts at 1; PUSH1 0, PUSH1 0, SSTORE clears it.
    let mut storage = BTreeMap::new();
    storage.insert(H256::zero(), U256::one());
    let contract = Account::new(
        U256::zero(),
        1,
        Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0x55]),
        storage,
    );
    let mut harness = Harness::with_accounts(&[], vec![(CONTRACT, contract)]);
    let tx = harness.call_tx(0, 100_000, 0, &[]);
    let mut tracer = NoOpTracer;
    let output = harness.run(&[tx], &mut tracer);

    let receipt = &output.receipts[0];
    assert!(receipt.status);
    // 21000 + 3 + 3 + 5000 = 26006 used, minus the 15000 refund capped at
    // 26006 / 2 = 13003.
    assert_eq!(receipt.gas_used, 26006 - 13003);
    assert_eq!(
        harness.db.get_state(CONTRACT, H256::zero()).unwrap(),
        U256::zero()
    );
}

/// Gas conservation for a frame with a sub-call: what the parent pays is
/// what the child uses plus what flows back.
#[test]
fn call_refunds_unspent_gas() {
    // Callee: STOP (empty code). Caller: CALL(0x1000, callee, 0, 0,0,0,0).
    let callee = Address::repeat_byte(0xdd);
    let callee_account = Account::new(U256::zero(), 1, Bytes::new(), BTreeMap::new());
    let mut code = vec![
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73,
    ];
    code.extend_from_slice(callee.as_bytes());
    code.extend_from_slice(&[0x61, 0x10, 0x00, 0xf1]);

    let mut harness = Harness::with_accounts(&code, vec![(callee, callee_account)]);
    let tx = harness.call_tx(0, 200_000, 0, &[]);
    let mut tracer = StructLogger::new(TraceConfig::default());
    let output = harness.run(&[tx], &mut tracer);

    let receipt = &output.receipts[0];
    assert!(receipt.status);
    // Five pushes + PUSH20 + PUSH2 (7 * 3) + CALL base 700; the callee ran
    // nothing, so every forwarded unit returned.
    assert_eq!(receipt.gas_used, 21000 + 21 + 700);
    // The sub-call reported success on the caller's stack.
    let stop = tracer.logs.last().unwrap();
    assert_eq!(stop.stack.as_deref(), Some(&["0x1".to_string()][..]));
}
