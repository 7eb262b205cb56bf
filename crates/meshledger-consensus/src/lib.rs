//! MeshLedger Consensus - transaction validation and plurality block assembly.
//!
//! The [`Orchestrator`] owns one node's [`LedgerStore`](meshledger_storage::LedgerStore),
//! its validated-transaction pool and the round's [`BlockProposalPool`]. Inbound
//! transactions run through a staged pipeline; once per round the most-proposed height
//! wins and the validated operations are committed as a block.

pub mod error;
pub mod events;
pub mod execution;
pub mod pipeline;
pub mod proposal_pool;
pub mod validated_pool;
pub mod sync;
pub mod orchestrator;
mod assembly;

#[cfg(test)]
mod test_support;

pub use error::ConsensusError;
pub use events::LedgerEvent;
pub use pipeline::{PipelineReport, PipelineStage};
pub use proposal_pool::BlockProposalPool;
pub use validated_pool::{ValidatedPool, ValidatedTx};
pub use sync::{ChainSync, NoSync};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
