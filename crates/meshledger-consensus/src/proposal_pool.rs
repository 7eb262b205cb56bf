//! Competing block proposals for one consensus round.

use meshledger_types::Block;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Multiset of proposals, de-duplicated by full block equality and grouped by block
/// number for plurality counting.
///
/// Each distinct proposal also remembers how many times it was seen. That tally only
/// picks the representative inside the winning height; it never affects `count_for`.
#[derive(Clone, Debug, Default)]
pub struct BlockProposalPool {
    proposals: HashMap<Block, usize>,
}

impl BlockProposalPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a proposal. Returns `false` when an identical proposal was already present.
    pub fn add(&mut self, block: Block) -> bool {
        let seen = self.proposals.entry(block).or_insert(0);
        *seen += 1;
        *seen == 1
    }

    /// Number of distinct proposals targeting the same height as `block`.
    pub fn count_for(&self, block: &Block) -> usize {
        self.count_at(block.number())
    }

    pub fn count_at(&self, number: u64) -> usize {
        self.proposals.keys().filter(|b| b.number() == number).count()
    }

    /// How many times this exact proposal was received.
    pub fn times_seen(&self, block: &Block) -> usize {
        self.proposals.get(block).copied().unwrap_or(0)
    }

    pub fn all_items(&self) -> Vec<Block> {
        self.proposals.keys().cloned().collect()
    }

    /// Representative of the largest height bucket.
    ///
    /// Within the bucket the most-seen proposal wins, then the smallest block hash. Two
    /// equally large buckets are ambiguous and yield `None`.
    pub fn max_item(&self) -> Option<Block> {
        let mut buckets: BTreeMap<u64, Vec<(&Block, usize)>> = BTreeMap::new();
        for (block, seen) in &self.proposals {
            buckets.entry(block.number()).or_default().push((block, *seen));
        }

        let largest = buckets.values().map(Vec::len).max()?;
        let mut winners = buckets.iter().filter(|(_, b)| b.len() == largest);
        let (number, bucket) = winners.next()?;

        let tied: Vec<u64> = winners.map(|(n, _)| *n).collect();
        if !tied.is_empty() {
            warn!(
                height = number,
                tied_with = ?tied,
                size = largest,
                "Proposal buckets tied, no plurality this round"
            );
            return None;
        }

        bucket
            .iter()
            .max_by(|(a, seen_a), (b, seen_b)| {
                seen_a.cmp(seen_b).then_with(|| b.hash().cmp(&a.hash()))
            })
            .map(|(block, _)| (*block).clone())
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn clear(&mut self) {
        self.proposals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshledger_types::{Address, BlockHeader, Hash};

    fn proposal(number: u64, miner: u8) -> Block {
        let header = BlockHeader::new(number, Hash::compute(&number.to_le_bytes()), Address::from_bytes([miner; 20]), 1000);
        Block::new(header, Vec::new(), Vec::new())
    }

    #[test]
    fn test_identical_proposal_is_absorbed() {
        let mut pool = BlockProposalPool::new();
        assert!(pool.add(proposal(5, 1)));
        assert_eq!(pool.count_for(&proposal(5, 1)), 1);

        assert!(!pool.add(proposal(5, 1)));
        assert_eq!(pool.count_for(&proposal(5, 1)), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.times_seen(&proposal(5, 1)), 2);
    }

    #[test]
    fn test_variant_miner_grows_bucket() {
        let mut pool = BlockProposalPool::new();
        pool.add(proposal(5, 1));
        pool.add(proposal(5, 2));
        pool.add(proposal(6, 1));

        assert_eq!(pool.count_for(&proposal(5, 1)), 2);
        assert_eq!(pool.count_at(6), 1);
        assert_eq!(pool.all_items().len(), 3);
    }

    #[test]
    fn test_two_x_one_y_selects_x() {
        let x = proposal(5, 1);
        let y = proposal(5, 2);
        let mut pool = BlockProposalPool::new();
        pool.add(x.clone());
        pool.add(y.clone());
        pool.add(x.clone());

        assert_eq!(pool.count_for(&x), 2);
        assert_eq!(pool.max_item(), Some(x));
    }

    #[test]
    fn test_max_item_prefers_largest_bucket() {
        let mut pool = BlockProposalPool::new();
        pool.add(proposal(4, 1));
        pool.add(proposal(5, 1));
        pool.add(proposal(5, 2));

        assert_eq!(pool.max_item().map(|b| b.number()), Some(5));
    }

    #[test]
    fn test_equal_seen_counts_pick_smallest_hash() {
        let a = proposal(5, 1);
        let b = proposal(5, 2);
        let expected = if a.hash() < b.hash() { a.clone() } else { b.clone() };

        let mut forward = BlockProposalPool::new();
        forward.add(a.clone());
        forward.add(b.clone());
        let mut backward = BlockProposalPool::new();
        backward.add(b);
        backward.add(a);

        assert_eq!(forward.max_item(), Some(expected.clone()));
        assert_eq!(backward.max_item(), Some(expected));
    }

    #[test]
    fn test_tied_buckets_have_no_winner() {
        let mut pool = BlockProposalPool::new();
        pool.add(proposal(5, 1));
        pool.add(proposal(6, 1));
        assert_eq!(pool.max_item(), None);
    }

    #[test]
    fn test_empty_and_clear() {
        let mut pool = BlockProposalPool::new();
        assert_eq!(pool.max_item(), None);
        pool.add(proposal(1, 1));
        pool.clear();
        assert!(pool.is_empty());
    }
}
