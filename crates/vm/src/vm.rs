//! The dispatch loop and call-frame recursion. One [`Vm`] lives for the
//! duration of a transaction; sub-calls recurse through the host stack,
//! bounded by the frame depth limit.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use uevm_common::types::code_hash;
use uevm_common::utils::{create2_address, create_address};

use crate::call_frame::CallFrame;
use crate::constants::{FAIL, MAX_CALL_DEPTH, MAX_CODE_SIZE, SUCCESS};
use crate::db::StateDb;
use crate::environment::Environment;
use crate::errors::{
    ContextResult, ExceptionalHalt, OpcodeResult, TxResult, VMError,
};
use crate::gas_cost;
use crate::jumpdest::JumpdestCache;
use crate::opcodes::{OpcodeInfo, OPCODE_TABLE};
use crate::precompiles;
use crate::stack::Stack;
use crate::tracing::{StructLog, Tracer};
use crate::utils::address_to_word;
use crate::word::Word256;
use crate::word_pool::WordPool;

pub struct Vm<'a> {
    pub env: Environment,
    pub db: &'a mut StateDb,
    pub tracer: &'a mut dyn Tracer,
    pub jumpdest_cache: JumpdestCache,
    pub word_pool: WordPool,
}

impl<'a> Vm<'a> {
    pub fn new(env: Environment, db: &'a mut StateDb, tracer: &'a mut dyn Tracer) -> Self {
        Vm {
            env,
            db,
            tracer,
            jumpdest_cache: JumpdestCache::new(),
            word_pool: WordPool::new(),
        }
    }

    /// Runs one frame to completion. Consensus failures settle into the
    /// returned [`ContextResult`]; only internal and database errors
    /// surface as `Err`.
    pub fn run_frame(&mut self, frame: &mut CallFrame) -> Result<ContextResult, VMError> {
        loop {
            let opcode = frame.next_opcode();
            let info = OPCODE_TABLE[opcode as usize];
            match self.execute_step(opcode, &info, frame) {
                Ok(OpcodeResult::Continue { pc_increment }) => {
                    frame.pc += pc_increment;
                }
                Ok(OpcodeResult::Halt) => {
                    return Ok(ContextResult {
                        result: TxResult::Success,
                        gas_used: frame.gas_used,
                        output: frame.output.clone(),
                    });
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    if error.consumes_all_gas() {
                        frame.gas_used = frame.gas_limit;
                    }
                    return Ok(ContextResult {
                        result: TxResult::Revert(error),
                        gas_used: frame.gas_used,
                        output: frame.output.clone(),
                    });
                }
            }
        }
    }

    /// One fetch-validate-execute step, with the tracer fed the pre-step
    /// machine state and the step's measured cost.
    fn execute_step(
        &mut self,
        opcode: u8,
        info: &OpcodeInfo,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        if !self.tracer.enabled() {
            return self.dispatch(info, frame);
        }

        let config = self.tracer.config();
        let pc = frame.pc as u64;
        let gas = frame.gas_remaining();
        let memory = (!config.disable_memory).then(|| hex::encode(frame.memory.data()));
        let stack = (!config.disable_stack).then(|| {
            frame
                .stack
                .values()
                .iter()
                .map(|value| format!("{value:#x}"))
                .collect()
        });

        let result = self.dispatch(info, frame);

        let err = result.as_ref().err().map(ToString::to_string);
        self.tracer.capture_state(StructLog {
            pc,
            op: opcode,
            gas,
            gas_cost: gas.saturating_sub(frame.gas_remaining()),
            memory,
            stack,
            storage: None,
            depth: frame.depth + 1,
            err,
        });
        result
    }

    fn dispatch(
        &mut self,
        info: &OpcodeInfo,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.require(info.min_stack)?;
        if frame.stack.len() > info.max_stack {
            return Err(ExceptionalHalt::StackOverflow.into());
        }
        (info.handler)(self, frame)
    }

    /// Common tail of the CALL family: builds the sub-frame, recurses,
    /// settles gas, writes the status flag and the return window.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn generic_call(
        &mut self,
        frame: &mut CallFrame,
        forwarded: u64,
        stipend: u64,
        value: Word256,
        child_caller: Address,
        to: Address,
        code_address: Address,
        should_transfer: bool,
        is_static: bool,
        calldata: Bytes,
        return_offset: usize,
        return_len: usize,
    ) -> Result<OpcodeResult, VMError> {
        frame.return_data = Bytes::new();

        // Failures before the callee runs hand the forwarded gas back.
        if frame.depth + 1 >= MAX_CALL_DEPTH {
            frame.refund_gas(forwarded);
            frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        if should_transfer && self.db.get_balance(frame.to)? < value.into() {
            frame.refund_gas(forwarded);
            frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        let gas_limit = forwarded + stipend;
        let transfer = should_transfer.then_some((frame.to, to, U256::from(value)));
        let result = self.run_call_inner(
            child_caller,
            to,
            code_address,
            value,
            calldata,
            gas_limit,
            is_static,
            frame.depth + 1,
            transfer,
        )?;

        // Unused gas, including any stipend remainder, returns to the
        // caller.
        frame.refund_gas(gas_limit - result.gas_used);

        if !result.output.is_empty() {
            let window = return_len.min(result.output.len());
            frame.memory.store_data(return_offset, &result.output[..window]);
        }
        frame
            .stack
            .push(if result.is_success() { SUCCESS } else { FAIL })?;
        frame.return_data = result.output;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    /// Runs a call target under a fresh snapshot: value transfer, then
    /// either a precompile or a new frame. Failure reverts the snapshot.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run_call_inner(
        &mut self,
        caller: Address,
        to: Address,
        code_address: Address,
        value: Word256,
        calldata: Bytes,
        gas_limit: u64,
        is_static: bool,
        depth: usize,
        transfer: Option<(Address, Address, U256)>,
    ) -> Result<ContextResult, VMError> {
        let snapshot = self.db.snapshot();

        if let Some((from, dest, amount)) = transfer {
            if let Err(error) = self.db.transfer(from, dest, amount) {
                if error.is_fatal() {
                    return Err(error);
                }
                self.db.revert_to(snapshot);
                return Ok(ContextResult {
                    result: TxResult::Revert(error),
                    gas_used: gas_limit,
                    output: Bytes::new(),
                });
            }
        }

        if precompiles::is_precompile(&code_address) {
            return match precompiles::execute_precompile(code_address, &calldata, gas_limit) {
                Ok((output, gas_used)) => Ok(ContextResult {
                    result: TxResult::Success,
                    gas_used,
                    output,
                }),
                Err(error) if error.is_fatal() => Err(error),
                Err(error) => {
                    self.db.revert_to(snapshot);
                    Ok(ContextResult {
                        result: TxResult::Revert(error),
                        gas_used: gas_limit,
                        output: Bytes::new(),
                    })
                }
            };
        }

        let code = self.db.get_code(code_address)?;
        let hash = self.db.get_code_hash(code_address)?;
        let jumpdests = self.jumpdest_cache.get(hash, &code);
        let mut child = CallFrame::new(
            caller,
            to,
            code_address,
            code,
            hash,
            calldata,
            value,
            gas_limit,
            Stack::new(self.word_pool.acquire()),
            jumpdests,
            is_static,
            false,
            depth,
        );
        let run = self.run_frame(&mut child);
        self.word_pool.release(child.stack.into_buffer());
        let result = run?;
        if !result.is_success() {
            self.db.revert_to(snapshot);
        }
        Ok(result)
    }

    /// Common tail of CREATE/CREATE2.
    pub(crate) fn generic_create(
        &mut self,
        frame: &mut CallFrame,
        forwarded: u64,
        value: Word256,
        init_code: Bytes,
        salt: Option<Word256>,
    ) -> Result<OpcodeResult, VMError> {
        frame.return_data = Bytes::new();

        if frame.depth + 1 >= MAX_CALL_DEPTH {
            frame.refund_gas(forwarded);
            frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        if self.db.get_balance(frame.to)? < value.into() {
            frame.refund_gas(forwarded);
            frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }

        let created = match salt {
            Some(salt) => create2_address(frame.to, H256::from(salt), &init_code),
            None => create_address(frame.to, self.db.get_nonce(frame.to)?),
        };
        let (result, address) =
            self.run_create_inner(frame.to, value, init_code, forwarded, created, frame.depth + 1)?;

        frame.refund_gas(forwarded - result.gas_used);
        match address {
            Some(address) => frame.stack.push(address_to_word(address))?,
            None => frame.stack.push(FAIL)?,
        }
        // Only revert data is observable through RETURNDATACOPY after a
        // create.
        if matches!(result.result, TxResult::Revert(VMError::Revert)) {
            frame.return_data = result.output;
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }

    /// Creates an account and runs its init code. The creator's nonce bump
    /// survives failure; everything else reverts with the snapshot.
    pub(crate) fn run_create_inner(
        &mut self,
        caller: Address,
        value: Word256,
        init_code: Bytes,
        gas_limit: u64,
        created: Address,
        depth: usize,
    ) -> Result<(ContextResult, Option<Address>), VMError> {
        self.db.increment_nonce(caller)?;

        if self.db.get_nonce(created)? != 0 || self.db.get_code_size(created)? != 0 {
            return Ok((
                failure(ExceptionalHalt::AddressCollision, gas_limit),
                None,
            ));
        }

        let snapshot = self.db.snapshot();
        // Created accounts start at nonce 1 (EIP-161).
        self.db.set_nonce(created, 1)?;
        if let Err(error) = self.db.transfer(caller, created, value.into()) {
            if error.is_fatal() {
                return Err(error);
            }
            self.db.revert_to(snapshot);
            return Ok((
                ContextResult {
                    result: TxResult::Revert(error),
                    gas_used: gas_limit,
                    output: Bytes::new(),
                },
                None,
            ));
        }

        let hash = code_hash(&init_code);
        let jumpdests = self.jumpdest_cache.get(hash, &init_code);
        let mut child = CallFrame::new(
            caller,
            created,
            created,
            init_code,
            hash,
            Bytes::new(),
            value,
            gas_limit,
            Stack::new(self.word_pool.acquire()),
            jumpdests,
            false,
            true,
            depth,
        );
        let run = self.run_frame(&mut child);
        self.word_pool.release(child.stack.into_buffer());
        let mut result = run?;

        match result.result {
            TxResult::Success => {
                let deployed = result.output.clone();
                if deployed.len() > MAX_CODE_SIZE {
                    self.db.revert_to(snapshot);
                    return Ok((
                        failure(ExceptionalHalt::MaxCodeSizeExceeded, gas_limit),
                        None,
                    ));
                }
                let deposit = gas_cost::code_deposit(deployed.len())?;
                if result.gas_used + deposit > gas_limit {
                    self.db.revert_to(snapshot);
                    return Ok((failure(ExceptionalHalt::OutOfGas, gas_limit), None));
                }
                result.gas_used += deposit;
                self.db.set_code(created, deployed)?;
                Ok((result, Some(created)))
            }
            TxResult::Revert(_) => {
                self.db.revert_to(snapshot);
                Ok((result, None))
            }
        }
    }

    /// Entry point for a message-call transaction's outermost frame.
    pub fn execute_call_message(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        calldata: Bytes,
        gas_limit: u64,
    ) -> Result<ContextResult, VMError> {
        self.run_call_inner(
            caller,
            to,
            to,
            Word256::from(value),
            calldata,
            gas_limit,
            false,
            0,
            Some((caller, to, value)),
        )
    }

    /// Entry point for a contract-creation transaction's init frame.
    /// `nonce` is the transaction nonce the created address derives from.
    pub fn execute_create_message(
        &mut self,
        caller: Address,
        value: U256,
        init_code: Bytes,
        gas_limit: u64,
        nonce: u64,
    ) -> Result<(ContextResult, Option<Address>), VMError> {
        let created = create_address(caller, nonce);
        self.run_create_inner(caller, Word256::from(value), init_code, gas_limit, created, 0)
    }
}

fn failure(halt: ExceptionalHalt, gas_limit: u64) -> ContextResult {
    ContextResult {
        result: TxResult::Revert(halt.into()),
        gas_used: gas_limit,
        output: Bytes::new(),
    }
}
