use meshledger_types::Hash;

/// Leaf hash of one payload in a Merkle commitment.
pub fn leaf_hash(payload: &[u8]) -> Hash {
    Hash::compute(payload)
}

/// Parent node over two children, `blake3(left || right)`.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    Hash::compute_multi(&[left.as_bytes(), right.as_bytes()])
}
