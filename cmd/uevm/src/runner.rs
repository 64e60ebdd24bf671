//! Loads a fixture, applies its transactions and renders the result:
//! pretty JSON on stdout, traces and the state root line on stderr.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use ethereum_types::{Address, H256};
use serde::Serialize;
use thiserror::Error;
use uevm_common::types::{Account, Receipt};
use uevm_common::utils::keccak;
use uevm_vm::db::{InMemoryStore, StateDb, StateDump};
use uevm_vm::environment::Environment;
use uevm_vm::state_transition::{apply_transactions, BatchOutput};
use uevm_vm::tracing::{JsonLogger, NoOpTracer, StructLogger, TraceConfig, Tracer};

use crate::fixture::{Fixture, FixtureError};

/// The signer of this harness is fixed to chain id 99.
pub const CHAIN_ID: u64 = 99;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub debug: bool,
    pub json: bool,
    pub disable_memory: bool,
    pub disable_stack: bool,
    pub dump: bool,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed reading file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed unmarshaling file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

/// The top-level output object: an error, or the post state, receipts and
/// rejected transaction hashes.
#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateDump>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub receipts: Vec<Receipt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<H256>,
}

pub fn apply(path: &Path, options: &RunOptions) -> Result<(), RunnerError> {
    let source = std::fs::read_to_string(path)?;
    let result = run_source(&source, options, &mut std::io::stderr())?;
    // Pretty-printed with two-space indentation.
    println!(
        "{}",
        serde_json::to_string_pretty(&result).map_err(RunnerError::Parse)?
    );
    Ok(())
}

/// Parses and runs one fixture. Trace output and the final state root line
/// go to `trace_sink`; VM-level failures land in the result's error field
/// rather than failing the run.
pub fn run_source(
    source: &str,
    options: &RunOptions,
    trace_sink: &mut dyn Write,
) -> Result<ExecutionResult, RunnerError> {
    let fixture: Fixture = serde_json::from_str(source)?;
    let transactions = fixture.transactions.into_transactions()?;

    let accounts: BTreeMap<Address, Account> = fixture
        .pre
        .into_iter()
        .map(|(address, account)| (address, account.into()))
        .collect();
    let mut db = StateDb::new(Box::new(InMemoryStore::new(accounts)));

    let env = Environment {
        origin: Address::zero(),
        gas_price: Default::default(),
        chain_id: CHAIN_ID,
        coinbase: fixture.env.coinbase,
        difficulty: fixture.env.difficulty,
        block_gas_limit: fixture.env.gas_limit,
        block_number: fixture.env.number,
        timestamp: fixture.env.timestamp,
        block_hash_fn: block_hash,
    };

    let config = TraceConfig {
        disable_memory: options.disable_memory,
        disable_stack: options.disable_stack,
        disable_storage: false,
    };

    let outcome = if options.json {
        let mut tracer = JsonLogger::new(&mut *trace_sink, config);
        apply_transactions(&mut db, &env, &transactions, &mut tracer)
    } else if options.debug {
        let mut tracer = StructLogger::new(config);
        let outcome = apply_transactions(&mut db, &env, &transactions, &mut tracer);
        let _ = tracer.write_trace(trace_sink);
        outcome
    } else {
        let mut tracer = NoOpTracer;
        apply_transactions(&mut db, &env, &transactions, &mut tracer)
    };

    let result = match outcome {
        Ok(BatchOutput {
            root,
            receipts,
            rejected,
        }) => {
            if options.json {
                let _ = writeln!(trace_sink, "{{\"stateRoot\":\"{root:#x}\"}}");
            }
            let state = if options.dump {
                db.dump().ok()
            } else {
                None
            };
            ExecutionResult {
                error: None,
                state,
                receipts,
                rejected,
            }
        }
        Err(error) => ExecutionResult {
            error: Some(format!("Error: {error}")),
            state: None,
            receipts: Vec::new(),
            rejected: Vec::new(),
        },
    };
    Ok(result)
}

/// The harness's deterministic block hash: Keccak-256 of the decimal string
/// of the block number.
fn block_hash(number: u64) -> H256 {
    keccak(number.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ethereum_types::U256;
    use secp256k1::{PublicKey, SecretKey, SECP256K1};
    use uevm_common::types::{Transaction, TxKind};

    fn signed_tx_json(nonce: u64, to: Address, value: u64) -> (String, H256) {
        let secret_key = SecretKey::from_slice(&[0x27u8; 32]).unwrap();
        let mut tx = Transaction {
            nonce,
            gas_price: U256::one(),
            gas: 100_000,
            to: TxKind::Call(to),
            value: U256::from(value),
            data: Bytes::new(),
            ..Default::default()
        };
        tx.sign(&secret_key, CHAIN_ID);
        let json = format!(
            r#"{{ "nonce": "{:#x}", "gasPrice": "0x1", "gasLimit": "0x186a0",
                 "to": "{:?}", "value": "{:#x}", "data": "0x",
                 "v": "{:#x}", "r": "{:#x}", "s": "{:#x}" }}"#,
            tx.nonce, to, tx.value, tx.v, tx.r, tx.s
        );
        (json, tx.hash())
    }

    fn sender_address() -> Address {
        let secret_key = SecretKey::from_slice(&[0x27u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
        let hash = keccak(&public_key.serialize_uncompressed()[1..]);
        Address::from_slice(&hash.as_bytes()[12..])
    }

    fn fixture_with_tx(tx_json: &str) -> String {
        format!(
            r#"{{
                "env": {{
                    "currentCoinbase": "0x00000000000000000000000000000000000000ba",
                    "currentDifficulty": "0x20000",
                    "currentGasLimit": "0x989680",
                    "currentNumber": "0x1",
                    "currentTimestamp": "0x3e8"
                }},
                "pre": {{
                    "{:?}": {{ "nonce": "0x0", "balance": "0x989680", "code": "0x", "storage": {{}} }}
                }},
                "transactions": [ {} ]
            }}"#,
            sender_address(),
            tx_json
        )
    }

    #[test]
    fn transfer_fixture_produces_a_receipt_and_state_root_line() {
        let (tx_json, tx_hash) = signed_tx_json(0, Address::from_low_u64_be(0xaa), 5);
        let source = fixture_with_tx(&tx_json);
        let options = RunOptions {
            json: true,
            dump: true,
            ..Default::default()
        };
        let mut sink = Vec::new();
        let result = run_source(&source, &options, &mut sink).unwrap();

        assert!(result.error.is_none());
        assert!(result.rejected.is_empty());
        assert_eq!(result.receipts.len(), 1);
        assert_eq!(result.receipts[0].tx_hash, tx_hash);
        assert_eq!(result.receipts[0].gas_used, 21000);

        let state = result.state.expect("dump requested");
        assert!(state
            .accounts
            .contains_key(&Address::from_low_u64_be(0xaa)));

        let stderr = String::from_utf8(sink).unwrap();
        assert!(stderr.lines().last().unwrap().starts_with("{\"stateRoot\":\"0x"));
    }

    #[test]
    fn unsigned_transaction_lands_on_the_rejected_list() {
        let tx_json = r#"{ "nonce": "0x0", "gasPrice": "0x1", "gasLimit": "0x186a0",
                           "to": "0x00000000000000000000000000000000000000aa" }"#;
        let source = fixture_with_tx(tx_json);
        let mut sink = Vec::new();
        let result = run_source(&source, &RunOptions::default(), &mut sink).unwrap();
        assert!(result.receipts.is_empty());
        assert_eq!(result.rejected.len(), 1);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut sink = Vec::new();
        assert!(run_source("{", &RunOptions::default(), &mut sink).is_err());
    }

    #[test]
    fn block_hash_is_keccak_of_the_decimal_string() {
        assert_eq!(block_hash(7), keccak(b"7"));
    }
}
