//! The transaction applicator: drives an ordered batch against the state,
//! producing receipts for applied transactions and a rejected list for the
//! ones that never make it to execution.

use std::time::Instant;

use ethereum_types::{Address, H256, U256};
use thiserror::Error;
// The crate has its own `tracing` module; the leading colons pick the log
// facade.
use ::tracing::warn;
use uevm_common::types::{Receipt, Transaction, TxKind};
use uevm_common::utils::create_address;

use crate::db::StateDb;
use crate::environment::Environment;
use crate::errors::{ExecutionReport, TxValidationError, VMError};
use crate::gas_cost;
use crate::tracing::Tracer;
use crate::vm::Vm;

/// Block-level gas budget shared by the batch.
#[derive(Debug, Clone, Copy)]
pub struct GasPool(u64);

impl GasPool {
    pub fn new(limit: u64) -> Self {
        GasPool(limit)
    }

    pub fn sub_gas(&mut self, amount: u64) -> Result<(), TxValidationError> {
        if self.0 < amount {
            return Err(TxValidationError::GasLimitReached);
        }
        self.0 -= amount;
        Ok(())
    }

    pub fn add_gas(&mut self, amount: u64) {
        self.0 += amount;
    }

    pub fn remaining(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum TxError {
    #[error(transparent)]
    Validation(#[from] TxValidationError),
    #[error(transparent)]
    Vm(#[from] VMError),
}

/// Result of applying a whole batch.
#[derive(Debug)]
pub struct BatchOutput {
    pub root: H256,
    pub receipts: Vec<Receipt>,
    pub rejected: Vec<H256>,
}

/// Applies `transactions` in order against `db`. Pre-execution failures
/// reject the transaction (no receipt); execution failures settle into a
/// status-0 receipt. Commits at the end and returns the state root.
pub fn apply_transactions(
    db: &mut StateDb,
    env: &Environment,
    transactions: &[Transaction],
    tracer: &mut dyn Tracer,
) -> Result<BatchOutput, VMError> {
    let mut gas_pool = GasPool::new(env.block_gas_limit);
    let mut receipts = Vec::new();
    let mut rejected = Vec::new();
    let mut cumulative_gas_used = 0u64;

    for (index, tx) in transactions.iter().enumerate() {
        let tx_hash = tx.hash();
        let sender = match tx.recover_sender(env.chain_id) {
            Ok(sender) => sender,
            Err(error) => {
                warn!("rejected tx {tx_hash:?}: could not recover sender: {error}");
                rejected.push(tx_hash);
                continue;
            }
        };

        db.prepare(tx_hash, index);
        let snapshot = db.snapshot();
        match apply_message(db, env, tx, sender, &mut gas_pool, tracer) {
            Ok(report) => {
                cumulative_gas_used += report.gas_used;
                let mut receipt = Receipt::new(
                    report.is_success(),
                    cumulative_gas_used,
                    report.gas_used,
                    tx_hash,
                    db.logs(tx_hash),
                );
                if tx.is_create() {
                    receipt.contract_address = Some(create_address(sender, tx.nonce));
                }
                receipts.push(receipt);
                db.finalize_tx(true);
            }
            Err(TxError::Validation(error)) => {
                db.revert_to(snapshot);
                warn!("rejected tx {tx_hash:?} from {sender:?}: {error}");
                rejected.push(tx_hash);
            }
            Err(TxError::Vm(error)) => return Err(error),
        }
    }

    let root = db.commit(true)?;
    Ok(BatchOutput {
        root,
        receipts,
        rejected,
    })
}

/// Applies a single recovered transaction: buys gas, checks the nonce, runs
/// the call or creation, settles refunds and fees. A VM failure is not an
/// error here; it lands in the report with the gas fully accounted.
pub fn apply_message(
    db: &mut StateDb,
    env: &Environment,
    tx: &Transaction,
    sender: Address,
    gas_pool: &mut GasPool,
    tracer: &mut dyn Tracer,
) -> Result<ExecutionReport, TxError> {
    let intrinsic = gas_cost::intrinsic_gas(&tx.data, tx.is_create())?;
    if tx.gas < intrinsic {
        return Err(TxValidationError::IntrinsicGasTooLow {
            intrinsic,
            limit: tx.gas,
        }
        .into());
    }

    let expected = db.get_nonce(sender)?;
    if expected != tx.nonce {
        return Err(TxValidationError::NonceMismatch {
            expected,
            actual: tx.nonce,
        }
        .into());
    }

    let max_gas_fee = tx
        .gas_price
        .checked_mul(U256::from(tx.gas))
        .ok_or(TxValidationError::InsufficientFunds)?;
    let upfront = max_gas_fee
        .checked_add(tx.value)
        .ok_or(TxValidationError::InsufficientFunds)?;
    if db.get_balance(sender)? < upfront {
        return Err(TxValidationError::InsufficientFunds.into());
    }

    gas_pool.sub_gas(tx.gas)?;
    db.sub_balance(sender, max_gas_fee)?;

    let coinbase = env.coinbase;
    let gas_for_execution = tx.gas - intrinsic;
    let started = Instant::now();
    let (result, created_address) = {
        let mut tx_env = env.clone();
        tx_env.origin = sender;
        tx_env.gas_price = tx.gas_price;
        let mut vm = Vm::new(tx_env, db, tracer);
        match &tx.to {
            TxKind::Call(to) => {
                vm.db.increment_nonce(sender)?;
                let result = vm.execute_call_message(
                    sender,
                    *to,
                    tx.value,
                    tx.data.clone(),
                    gas_for_execution,
                )?;
                (result, None)
            }
            TxKind::Create => vm.execute_create_message(
                sender,
                tx.value,
                tx.data.clone(),
                gas_for_execution,
                tx.nonce,
            )?,
        }
    };
    let elapsed = started.elapsed();

    let mut gas_used = intrinsic + result.gas_used;
    let refund = db.get_refund().min(gas_used / 2);
    gas_used -= refund;

    let remaining = tx.gas - gas_used;
    db.add_balance(sender, tx.gas_price * U256::from(remaining))?;
    db.add_balance(coinbase, tx.gas_price * U256::from(gas_used))?;
    gas_pool.add_gas(remaining);

    tracer.capture_end(&result.output, gas_used, elapsed);

    Ok(ExecutionReport {
        result: result.result,
        gas_used,
        gas_refunded: refund,
        output: result.output,
        created_address,
    })
}
