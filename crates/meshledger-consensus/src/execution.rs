//! State transition for a single validated transaction.

use crate::error::ConsensusError;
use meshledger_types::{Account, Address, ContractMethod, SignedTransaction};

/// Apply `tx` to the accounts visible through `lookup` and return the touched accounts,
/// post-state. Nothing is written; callers decide where the result goes.
pub fn execute<F>(
    tx: &SignedTransaction,
    chain_id: u64,
    lookup: F,
) -> Result<Vec<Account>, ConsensusError>
where
    F: Fn(&Address) -> Result<Option<Account>, ConsensusError>,
{
    let method = tx.tx.extra_data()?.contract_method()?;

    if tx.tx.chain_id != chain_id {
        return Err(ConsensusError::ChainIdMismatch {
            expected: chain_id,
            got: tx.tx.chain_id,
        });
    }

    let from = tx.claimed_sender();
    match method {
        ContractMethod::Transfer => {
            let to = tx
                .tx
                .to
                .ok_or_else(|| ConsensusError::Decoding("transfer without recipient".to_string()))?;

            let mut sender =
                lookup(&from)?.ok_or_else(|| ConsensusError::UnknownAccount(from.to_string()))?;

            if tx.tx.nonce != sender.nonce {
                return Err(ConsensusError::InvalidNonce {
                    expected: sender.nonce,
                    got: tx.tx.nonce,
                });
            }
            if !sender.can_afford(tx.tx.value) {
                return Err(ConsensusError::InsufficientBalance {
                    required: tx.tx.value,
                    have: sender.balance,
                });
            }

            sender.sub_balance(tx.tx.value);
            sender.increment_nonce();

            if to == from {
                sender.add_balance(tx.tx.value);
                return Ok(vec![sender]);
            }

            let mut recipient = lookup(&to)?.unwrap_or_else(|| Account::new(to, 0));
            recipient.add_balance(tx.tx.value);
            Ok(vec![sender, recipient])
        }
        ContractMethod::CreateAccount => {
            if lookup(&from)?.is_some() {
                return Err(ConsensusError::AccountExists(from.to_string()));
            }
            Ok(vec![Account::new(from, tx.tx.value)])
        }
    }
}

/// A transfer whose nonce is ahead of the sender's, as opposed to a replayed one.
pub fn is_nonce_gap(e: &ConsensusError) -> bool {
    matches!(e, ConsensusError::InvalidNonce { expected, got } if got > expected)
}
