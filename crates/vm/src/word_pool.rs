use crate::constants::STACK_LIMIT;
use crate::word::Word256;

const POOL_LIMIT: usize = 32;

/// Bounded reuse pool for the stack buffers of transient call frames.
/// Purely an allocation contract: a frame acquires a cleared buffer on
/// entry and releases it on exit, so deep call trees stop hitting the
/// allocator once the pool is warm. Correctness never depends on it.
#[derive(Debug, Default)]
pub struct WordPool {
    buffers: Vec<Vec<Word256>>,
}

impl WordPool {
    pub fn new() -> Self {
        WordPool::default()
    }

    /// Hands out an empty buffer, recycled when one is available.
    pub fn acquire(&mut self) -> Vec<Word256> {
        self.buffers
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(STACK_LIMIT))
    }

    /// Returns a buffer to the pool. Buffers beyond the bound are dropped.
    pub fn release(&mut self, mut buffer: Vec<Word256>) {
        if self.buffers.len() >= POOL_LIMIT {
            return;
        }
        buffer.clear();
        self.buffers.push(buffer);
    }
}
