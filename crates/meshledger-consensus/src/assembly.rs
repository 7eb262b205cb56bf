//! Block assembly and chain-sync import.

use crate::error::ConsensusError;
use crate::events::LedgerEvent;
use crate::execution::execute;
use crate::orchestrator::{height_of, until_cancelled, Orchestrator};
use meshledger_storage::LedgerStore;
use meshledger_types::{Account, Address, Block, BlockHeader, Hash, SignedTransaction};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl Orchestrator {
    /// Check that `proposal` directly extends `tip` (or is genesis on an empty chain).
    pub fn validate_proposal(proposal: &Block, tip: Option<&Block>) -> Result<(), ConsensusError> {
        let (number, parent_hash) = match tip {
            Some(tip) => (tip.number() + 1, tip.hash()),
            None => (0, Hash::ZERO),
        };

        if proposal.number() != number {
            return Err(ConsensusError::ConsensusMismatch(format!(
                "block {} does not follow tip, expected {}",
                proposal.number(),
                number
            )));
        }
        if proposal.parent_hash() != parent_hash {
            return Err(ConsensusError::ConsensusMismatch(format!(
                "block {} has parent {}, tip is {}",
                proposal.number(),
                proposal.parent_hash(),
                parent_hash
            )));
        }
        Ok(())
    }

    /// Resolve the round's winning proposal and commit the validated transactions on top
    /// of it. Returns the committed header, or `None` when the round is skipped: no
    /// proposals, a plurality tie, or a winner that does not extend the tip. Skipped rounds
    /// leave every ledger untouched.
    pub async fn assemble_block(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<BlockHeader>, ConsensusError> {
        let mut guard = until_cancelled(cancel, self.state.lock()).await?;
        let state = &mut *guard;
        let tip = until_cancelled(cancel, self.store.latest_block()).await??;

        let candidates = state.proposals.len();
        let winner = state.proposals.max_item();
        state.proposals.clear();

        let Some(winner) = winner else {
            debug!(candidates, "No winning proposal this round");
            return Ok(None);
        };
        if let Err(e) = Self::validate_proposal(&winner, tip.as_ref()) {
            warn!(number = winner.number(), error = %e, "Winning proposal rejected, retrying next round");
            return Ok(None);
        }

        let mut staged = state.ledger.clone();
        let mut transactions: Vec<(Hash, SignedTransaction)> = Vec::new();
        let mut touched: BTreeMap<Address, Account> = BTreeMap::new();

        for entry in state.validated.ordered() {
            let result = execute(&entry.tx, self.config.chain_id, |addr| {
                Ok(staged.account(addr)?)
            });
            match result {
                Ok(accounts) => {
                    for account in accounts {
                        staged.upsert_account(&account)?;
                        touched.insert(account.address, account);
                    }
                    staged.upsert_transaction(&entry.fingerprint, entry.encoded);
                    transactions.push((entry.fingerprint, entry.tx));
                }
                Err(e) => {
                    warn!(fingerprint = %entry.fingerprint, error = %e, "Skipping transaction that no longer applies");
                }
            }
        }

        let (state_root, transactions_root, receipts_root) = staged.roots().header_fields();
        let mut header = winner.header;
        header.state_root = state_root;
        header.transactions_root = transactions_root;
        header.receipts_root = receipts_root;

        let block = Block::new(
            header.clone(),
            transactions.iter().map(|(_, tx)| tx.clone()).collect(),
            touched.into_values().collect(),
        );

        if cancel.is_cancelled() {
            return Err(ConsensusError::Cancelled);
        }
        self.store.commit_block(&block, &transactions).await?;

        state.ledger = staged;
        state.validated.clear();

        info!(
            number = header.number,
            hash = %block.hash(),
            miner = %header.miner,
            txs = block.tx_count(),
            "Block committed"
        );
        self.publish(LedgerEvent::BlockCreated(header.clone()));
        Ok(Some(header))
    }

    /// Import blocks received from a peer. Blocks at or below the tip are skipped; the
    /// rest must chain one after another from the tip. Returns how many were imported.
    pub async fn import_blocks(
        &self,
        mut blocks: Vec<Block>,
        cancel: &CancellationToken,
    ) -> Result<usize, ConsensusError> {
        blocks.sort_by_key(Block::number);

        let mut guard = until_cancelled(cancel, self.state.lock()).await?;
        let state = &mut *guard;
        let mut tip = until_cancelled(cancel, self.store.latest_block()).await??;
        let mut imported = 0;

        for block in blocks {
            if tip.as_ref().map_or(false, |t| block.number() <= t.number()) {
                continue;
            }
            if let Err(e) = Self::validate_proposal(&block, tip.as_ref()) {
                warn!(number = block.number(), error = %e, "Stopping import at non-chaining block");
                if imported == 0 {
                    return Err(e);
                }
                break;
            }
            if cancel.is_cancelled() {
                return Err(ConsensusError::Cancelled);
            }

            let mut staged = state.ledger.clone();
            let transactions = self.replay_block(&mut staged, &block)?;
            if let Err(e) = staged.verify_against(&block.header) {
                warn!(number = block.number(), error = %e, "Imported block roots diverge from local ledger");
            }

            self.store.commit_block(&block, &transactions).await?;
            state.ledger = staged;
            imported += 1;
            tip = Some(block);
        }

        if imported > 0 {
            let dropped = state.validated.rebase(&state.ledger, self.config.chain_id);
            let height = height_of(tip.as_ref());
            info!(imported, height, dropped = dropped.len(), "Imported blocks");
            self.publish(LedgerEvent::SyncCompleted { height });
        }
        Ok(imported)
    }

    /// Write a committed block's accounts and transactions into `ledger`.
    pub(crate) fn replay_block(
        &self,
        ledger: &mut LedgerStore,
        block: &Block,
    ) -> Result<Vec<(Hash, SignedTransaction)>, ConsensusError> {
        for account in &block.accounts {
            ledger.upsert_account(account)?;
        }

        let mut transactions = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let fingerprint = self.codec.fingerprint(tx)?;
            ledger.upsert_transaction(&fingerprint, self.codec.encode_transaction(tx)?);
            transactions.push((fingerprint, tx.clone()));
        }
        Ok(transactions)
    }
}
