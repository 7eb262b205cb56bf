//! Binary Merkle commitment over an ordered sequence of payloads.
//!
//! Leaves are `blake3(payload)`. An odd-sized level pairs its last node with itself, and a
//! single leaf is its own root. An empty sequence has no root.

use crate::hash::{hash_pair, leaf_hash};
use meshledger_types::Hash;

/// Binary Merkle tree using blake3.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// Every level, leaves first, root last
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a Merkle tree from precomputed leaf hashes.
    pub fn from_leaves(leaves: &[Hash]) -> Self {
        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves.to_vec()];
        let mut current = leaves.to_vec();

        // Build tree bottom-up
        while current.len() > 1 {
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|chunk| {
                    let left = &chunk[0];
                    let right = chunk.get(1).unwrap_or(left);
                    hash_pair(left, right)
                })
                .collect();
            levels.push(next.clone());
            current = next;
        }

        Self { levels }
    }

    /// Build a Merkle tree whose leaves are the blake3 hashes of `payloads`.
    pub fn from_payloads<'a, I>(payloads: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let leaves: Vec<Hash> = payloads.into_iter().map(leaf_hash).collect();
        Self::from_leaves(&leaves)
    }

    /// Root hash, `None` for an empty tree.
    pub fn root(&self) -> Option<Hash> {
        self.levels.last().and_then(|level| level.first()).copied()
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaf = *self.levels.first()?.get(index)?;
        let mut siblings = Vec::with_capacity(self.levels.len());
        let mut position = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = position ^ 1;
            // Odd tail pairs with itself
            let sibling = level.get(sibling_index).unwrap_or(&level[position]);
            siblings.push(*sibling);
            position /= 2;
        }

        Some(MerkleProof {
            leaf,
            index,
            siblings,
        })
    }

    /// Verify a leaf is in the tree at `index`
    pub fn verify_leaf(&self, index: usize, leaf: &Hash) -> bool {
        self.levels
            .first()
            .and_then(|leaves| leaves.get(index))
            .map_or(false, |stored| stored == leaf)
    }
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Hash,
    pub index: usize,
    pub siblings: Vec<Hash>,
}

impl MerkleProof {
    /// Verify this proof against an expected root.
    pub fn verify(&self, root: &Hash) -> bool {
        &self.compute_root() == root
    }

    /// Compute the root from this proof.
    pub fn compute_root(&self) -> Hash {
        let mut current = self.leaf;
        let mut index = self.index;

        for sibling in &self.siblings {
            current = if index % 2 == 0 {
                hash_pair(&current, sibling)
            } else {
                hash_pair(sibling, &current)
            };
            index /= 2;
        }

        current
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Root over an ordered payload sequence, `None` when the sequence is empty.
pub fn merkle_root<'a, I>(payloads: I) -> Option<Hash>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    MerkleTree::from_payloads(payloads).root()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Hash> {
        (0..n)
            .map(|i| Hash::compute(format!("leaf{}", i).as_bytes()))
            .collect()
    }

    #[test]
    fn test_merkle_tree_empty() {
        let tree = MerkleTree::from_leaves(&[]);
        assert_eq!(tree.root(), None);
        assert!(tree.is_empty());
        assert_eq!(merkle_root(Vec::<&[u8]>::new()), None);
    }

    #[test]
    fn test_merkle_tree_single_leaf() {
        let leaf = Hash::compute(b"single");
        let tree = MerkleTree::from_leaves(&[leaf]);
        assert_eq!(tree.root(), Some(leaf));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_merkle_tree_two_leaves() {
        let l = leaves(2);
        let tree = MerkleTree::from_leaves(&l);
        assert_eq!(tree.root(), Some(hash_pair(&l[0], &l[1])));
    }

    #[test]
    fn test_merkle_tree_three_leaves_duplicates_tail() {
        let l = leaves(3);
        let tree = MerkleTree::from_leaves(&l);
        let expected = hash_pair(&hash_pair(&l[0], &l[1]), &hash_pair(&l[2], &l[2]));
        assert_eq!(tree.root(), Some(expected));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_from_payloads_hashes_leaves() {
        let payloads: Vec<&[u8]> = vec![b"a", b"b"];
        let tree = MerkleTree::from_payloads(payloads);
        assert_eq!(
            tree.root(),
            Some(hash_pair(&Hash::compute(b"a"), &Hash::compute(b"b")))
        );
    }

    #[test]
    fn test_order_changes_root() {
        let forward: Vec<&[u8]> = vec![b"a", b"b", b"c"];
        let backward: Vec<&[u8]> = vec![b"c", b"b", b"a"];
        assert_ne!(merkle_root(forward), merkle_root(backward));
    }

    #[test]
    fn test_merkle_proof_all_sizes() {
        for n in 1..=9 {
            let l = leaves(n);
            let tree = MerkleTree::from_leaves(&l);
            let root = tree.root().unwrap();

            for (i, leaf) in l.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert_eq!(proof.leaf, *leaf);
                assert!(proof.verify(&root), "n={} i={}", n, i);
                assert!(!proof.verify(&Hash::compute(b"wrong")));
            }
        }
    }

    #[test]
    fn test_merkle_proof_depth() {
        let tree = MerkleTree::from_leaves(&leaves(8));
        assert_eq!(tree.proof(0).unwrap().depth(), 3);
    }

    #[test]
    fn test_merkle_proof_out_of_bounds() {
        let tree = MerkleTree::from_leaves(&leaves(4));
        assert!(tree.proof(4).is_none());
        assert!(tree.proof(100).is_none());
    }

    #[test]
    fn test_verify_leaf() {
        let l = leaves(4);
        let tree = MerkleTree::from_leaves(&l);
        assert!(tree.verify_leaf(0, &l[0]));
        assert!(tree.verify_leaf(3, &l[3]));
        assert!(!tree.verify_leaf(0, &Hash::compute(b"wrong")));
        assert!(!tree.verify_leaf(10, &l[0]));
    }
}
