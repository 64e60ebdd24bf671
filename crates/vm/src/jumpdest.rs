use std::rc::Rc;

use ethereum_types::H256;
use rustc_hash::FxHashMap;

/// Valid jump targets of one code blob, as a bitmap over code offsets.
/// An offset is valid when the byte there is JUMPDEST (0x5b) and it is not
/// inside a PUSH immediate.
#[derive(Debug, Default)]
pub struct Jumpdests {
    bitmap: Vec<u64>,
}

const JUMPDEST: u8 = 0x5b;
const PUSH1: u8 = 0x60;
const PUSH32: u8 = 0x7f;

impl Jumpdests {
    pub fn analyze(code: &[u8]) -> Self {
        let mut bitmap = vec![0u64; code.len().div_ceil(64)];
        let mut pc = 0;
        while pc < code.len() {
            let opcode = code[pc];
            if opcode == JUMPDEST {
                bitmap[pc / 64] |= 1 << (pc % 64);
                pc += 1;
            } else if (PUSH1..=PUSH32).contains(&opcode) {
                // Skip the immediate; a 0x5b inside it is data.
                pc += 2 + (opcode - PUSH1) as usize;
            } else {
                pc += 1;
            }
        }
        Jumpdests { bitmap }
    }

    pub fn has(&self, offset: usize) -> bool {
        self.bitmap
            .get(offset / 64)
            .is_some_and(|limb| limb >> (offset % 64) & 1 == 1)
    }
}

/// Memoizes jump destination analysis per code hash, so a contract called
/// many times in a batch is analyzed once.
#[derive(Debug, Default)]
pub struct JumpdestCache {
    cache: FxHashMap<H256, Rc<Jumpdests>>,
}

impl JumpdestCache {
    pub fn new() -> Self {
        JumpdestCache::default()
    }

    pub fn get(&mut self, code_hash: H256, code: &[u8]) -> Rc<Jumpdests> {
        self.cache
            .entry(code_hash)
            .or_insert_with(|| Rc::new(Jumpdests::analyze(code)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_jumpdest_is_valid() {
        // PUSH1 0x03, JUMP, JUMPDEST
        let code = [0x60, 0x03, 0x56, 0x5b];
        let jumpdests = Jumpdests::analyze(&code);
        assert!(jumpdests.has(3));
        assert!(!jumpdests.has(0));
        assert!(!jumpdests.has(2));
    }

    #[test]
    fn jumpdest_byte_inside_a_push_immediate_is_data() {
        // PUSH1 0x5b, JUMPDEST
        let code = [0x60, 0x5b, 0x5b];
        let jumpdests = Jumpdests::analyze(&code);
        assert!(!jumpdests.has(1));
        assert!(jumpdests.has(2));
    }

    #[test]
    fn push32_shadows_a_full_word_of_immediates() {
        let mut code = vec![0x7f];
        code.extend([0x5b; 32]);
        code.push(0x5b);
        let jumpdests = Jumpdests::analyze(&code);
        for offset in 1..33 {
            assert!(!jumpdests.has(offset));
        }
        assert!(jumpdests.has(33));
    }

    #[test]
    fn truncated_push_immediate_ends_the_analysis() {
        // PUSH2 with only one immediate byte present.
        let code = [0x61, 0x5b];
        let jumpdests = Jumpdests::analyze(&code);
        assert!(!jumpdests.has(1));
    }

    #[test]
    fn out_of_range_offsets_are_invalid() {
        let jumpdests = Jumpdests::analyze(&[0x5b]);
        assert!(jumpdests.has(0));
        assert!(!jumpdests.has(1));
        assert!(!jumpdests.has(1000));
    }

    #[test]
    fn cache_returns_the_same_analysis_per_hash() {
        let mut cache = JumpdestCache::new();
        let code = [0x5b];
        let hash = H256::repeat_byte(1);
        let first = cache.get(hash, &code);
        let second = cache.get(hash, &code);
        assert!(Rc::ptr_eq(&first, &second));
    }
}
