//! # Logging operations (`LOG0` through `LOG4`)

use bytes::Bytes;
use ethereum_types::H256;
use uevm_common::types::Log;

use crate::call_frame::CallFrame;
use crate::errors::{ExceptionalHalt, OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::opcode_handlers::OpcodeHandler;
use crate::opcodes::Opcode;
use crate::utils::size_offset_to_usize;
use crate::vm::Vm;

/// One handler serves LOG0 through LOG4; the topic count comes from the
/// opcode byte itself. Logging is a state write, barred in static frames.
pub struct OpLogHandler;
impl OpcodeHandler for OpLogHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }

        let topic_count = (frame.next_opcode() - Opcode::LOG0 as u8) as usize;
        let [offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        frame.increase_consumed_gas(gas_cost::log(
            new_memory_size,
            frame.memory.len(),
            size,
            topic_count as u64,
        )?)?;

        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            topics.push(H256::from(frame.stack.pop1()?));
        }

        let data = frame.memory.load_range(offset, size);
        vm.db.add_log(Log {
            address: frame.to,
            topics,
            data: Bytes::from(data),
            block_number: vm.env.block_number,
        });

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::tests::run_code_with_db;

    #[test]
    fn log2_records_topics_in_stack_order() {
        // PUSH1 0xbb, PUSH1 0xaa, PUSH1 0, PUSH1 0, LOG2
        let (db, tx_hash, result) =
            run_code_with_db(&[0x60, 0xbb, 0x60, 0xaa, 0x60, 0x00, 0x60, 0x00, 0xa2]);
        assert!(result.is_success());
        let logs = db.logs(tx_hash);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].topics.len(), 2);
        assert_eq!(logs[0].topics[0].0[31], 0xaa);
        assert_eq!(logs[0].topics[1].0[31], 0xbb);
        assert!(logs[0].data.is_empty());
    }
}
