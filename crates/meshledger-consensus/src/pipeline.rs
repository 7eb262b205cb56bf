//! Stages of the inbound transaction pipeline.

use crate::error::ConsensusError;
use meshledger_types::{Address, Hash};

/// Position of a transaction in the validation pipeline.
///
/// `Received → SignatureVerified → Deduplicated → HeightChecked → Dispatched → Applied`,
/// with `Failed` reachable from any non-terminal stage.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineStage {
    Received,
    SignatureVerified,
    Deduplicated,
    HeightChecked,
    Dispatched,
    Applied,
    Failed(ConsensusError),
}

impl PipelineStage {
    /// The stage after this one on the success path.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Received => Some(PipelineStage::SignatureVerified),
            PipelineStage::SignatureVerified => Some(PipelineStage::Deduplicated),
            PipelineStage::Deduplicated => Some(PipelineStage::HeightChecked),
            PipelineStage::HeightChecked => Some(PipelineStage::Dispatched),
            PipelineStage::Dispatched => Some(PipelineStage::Applied),
            PipelineStage::Applied | PipelineStage::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

/// Outcome of one run through the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineReport {
    stage: PipelineStage,
    pub fingerprint: Option<Hash>,
    pub sender: Option<Address>,
}

impl PipelineReport {
    pub fn new() -> Self {
        Self {
            stage: PipelineStage::Received,
            fingerprint: None,
            sender: None,
        }
    }

    pub fn stage(&self) -> &PipelineStage {
        &self.stage
    }

    /// Move to the next success stage. Terminal reports do not move.
    pub fn advance(&mut self) -> &PipelineStage {
        if let Some(next) = self.stage.next() {
            self.stage = next;
        }
        &self.stage
    }

    /// End the run with `error`, unless it already ended.
    pub fn fail(&mut self, error: ConsensusError) {
        if !self.stage.is_terminal() {
            self.stage = PipelineStage::Failed(error);
        }
    }

    pub fn is_applied(&self) -> bool {
        self.stage == PipelineStage::Applied
    }

    pub fn error(&self) -> Option<&ConsensusError> {
        match &self.stage {
            PipelineStage::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl Default for PipelineReport {
    fn default() -> Self {
        Self::new()
    }
}
