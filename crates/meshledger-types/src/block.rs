use crate::account::Account;
use crate::address::Address;
use crate::hash::Hash;
use crate::transaction::SignedTransaction;
use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt;

/// Block header; the header-only projection handed back to callers after a commit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    /// Block number (height)
    pub number: u64,
    /// Hash of the parent block header
    pub parent_hash: Hash,
    /// Merkle root of the transaction ledger after this block
    pub transactions_root: Hash,
    /// Merkle root of the account ledger after this block
    pub state_root: Hash,
    /// Reserved; always Hash::ZERO until receipts are generated
    pub receipts_root: Hash,
    /// Address of the peer whose proposal won the round
    pub miner: Address,
    /// Unix millis at proposal time
    pub timestamp: u64,
}

impl BlockHeader {
    pub fn new(number: u64, parent_hash: Hash, miner: Address, timestamp: u64) -> Self {
        Self {
            number,
            parent_hash,
            transactions_root: Hash::ZERO,
            state_root: Hash::ZERO,
            receipts_root: Hash::ZERO,
            miner,
            timestamp,
        }
    }

    /// Compute the hash of this block header
    pub fn compute_hash(&self) -> Hash {
        let mut data = Vec::with_capacity(8 + 32 * 4 + 20 + 8);
        data.extend_from_slice(&self.number.to_le_bytes());
        data.extend_from_slice(self.parent_hash.as_bytes());
        data.extend_from_slice(self.transactions_root.as_bytes());
        data.extend_from_slice(self.state_root.as_bytes());
        data.extend_from_slice(self.receipts_root.as_bytes());
        data.extend_from_slice(self.miner.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        Hash::compute(&data)
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }

    /// True when `self` directly extends `parent`.
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.compute_hash()
    }
}

/// Complete block with its transaction and account snapshot. Immutable once committed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<SignedTransaction>,
    /// Accounts touched by this block, post-state
    pub accounts: Vec<Account>,
}

impl Block {
    pub fn new(
        header: BlockHeader,
        transactions: Vec<SignedTransaction>,
        accounts: Vec<Account>,
    ) -> Self {
        Self {
            header,
            transactions,
            accounts,
        }
    }

    /// An empty-bodied candidate for the block after `parent` (genesis when `None`).
    pub fn proposal(parent: Option<&BlockHeader>, miner: Address, timestamp: u64) -> Self {
        let header = match parent {
            Some(parent) => BlockHeader::new(parent.number + 1, parent.compute_hash(), miner, timestamp),
            None => BlockHeader::new(0, Hash::ZERO, miner, timestamp),
        };
        Self::new(header, Vec::new(), Vec::new())
    }

    pub fn hash(&self) -> Hash {
        self.header.compute_hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {{ number: {}, hash: {}, txs: {}, accounts: {} }}",
            self.number(),
            self.hash(),
            self.tx_count(),
            self.accounts.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn miner() -> Address {
        Address::from_bytes([1u8; 20])
    }

    #[test]
    fn test_genesis_proposal() {
        let genesis = Block::proposal(None, miner(), 0);
        assert!(genesis.is_genesis());
        assert_eq!(genesis.parent_hash(), Hash::ZERO);
        assert_eq!(genesis.header.receipts_root, Hash::ZERO);
    }

    #[test]
    fn test_proposal_extends_parent() {
        let genesis = Block::proposal(None, miner(), 0);
        let next = Block::proposal(Some(&genesis.header), miner(), 10);
        assert_eq!(next.number(), 1);
        assert!(next.header.extends(&genesis.header));
        assert!(!genesis.header.extends(&next.header));
    }

    #[test]
    fn test_header_hash_deterministic() {
        let header = BlockHeader::new(3, Hash::compute(b"parent"), miner(), 1_000);
        assert_eq!(header.compute_hash(), header.clone().compute_hash());

        let mut other = header.clone();
        other.miner = Address::from_bytes([2u8; 20]);
        assert_ne!(header.compute_hash(), other.compute_hash());
    }

    #[test]
    fn test_structural_equality() {
        let a = Block::proposal(None, miner(), 5);
        let b = Block::proposal(None, miner(), 5);
        let c = Block::proposal(None, Address::from_bytes([2u8; 20]), 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
