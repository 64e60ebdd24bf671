//! Keccak-256 merkle root over an ordered leaf set. Stands in for the
//! Merkle-Patricia trie of a full node: callers hash their (sorted) entries
//! into leaves and fold them pairwise.

use ethereum_types::H256;

use crate::utils::keccak;

/// Compute a merkle root by pairwise keccak reduction. An odd element is
/// promoted to the next level unchanged. The empty set hashes to zero.
pub fn compute_merkle_root(hashes: &[H256]) -> H256 {
    match hashes {
        [] => H256::zero(),
        [single] => *single,
        _ => {
            let mut current_level: Vec<H256> = hashes.to_vec();
            while current_level.len() > 1 {
                current_level = merkle_next_level(&current_level);
            }
            current_level.first().copied().unwrap_or_default()
        }
    }
}

fn merkle_next_level(current_level: &[H256]) -> Vec<H256> {
    let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));
    for pair in current_level.chunks(2) {
        match pair {
            [left, right] => next_level.push(hash_pair(left, right)),
            [single] => next_level.push(*single),
            _ => {}
        }
    }
    next_level
}

fn hash_pair(a: &H256, b: &H256) -> H256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(a.as_bytes());
    data[32..].copy_from_slice(b.as_bytes());
    keccak(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_hashes_to_zero() {
        assert_eq!(compute_merkle_root(&[]), H256::zero());
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let leaf = keccak(b"leaf");
        assert_eq!(compute_merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn root_depends_on_order() {
        let a = keccak(b"a");
        let b = keccak(b"b");
        assert_ne!(compute_merkle_root(&[a, b]), compute_merkle_root(&[b, a]));
    }

    #[test]
    fn odd_leaf_is_promoted() {
        let leaves = [keccak(b"a"), keccak(b"b"), keccak(b"c")];
        let left = compute_merkle_root(&leaves[..2]);
        let expected = compute_merkle_root(&[left, leaves[2]]);
        assert_eq!(compute_merkle_root(&leaves), expected);
    }
}
