//! Re-injection path for grounded computations.
//!
//! A rule evaluator that needs an external computation (network, model)
//! hands a [`GroundingHandle`] to that computation and returns immediately.
//! The result arrives on the memory's inbox and is drained without blocking
//! at the start of a later cycle, exactly like external input.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::GroundingFailure;
use crate::sentence::RawSentence;

#[derive(Debug, Clone, PartialEq)]
pub enum GroundedResult {
    Answer(RawSentence),
    Failed(GroundingFailure),
}

#[derive(Clone, Debug)]
pub struct GroundingHandle {
    tx: UnboundedSender<GroundedResult>,
}

impl GroundingHandle {
    /// Returns false once the memory behind the handle is gone.
    pub fn answer(&self, raw: RawSentence) -> bool {
        self.tx.send(GroundedResult::Answer(raw)).is_ok()
    }

    pub fn fail(&self, source_name: &str, reason: &str) -> bool {
        self.tx
            .send(GroundedResult::Failed(GroundingFailure {
                source_name: source_name.to_string(),
                reason: reason.to_string(),
            }))
            .is_ok()
    }
}

pub(crate) struct GroundingInbox {
    tx: UnboundedSender<GroundedResult>,
    rx: UnboundedReceiver<GroundedResult>,
}

impl GroundingInbox {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub(crate) fn handle(&self) -> GroundingHandle {
        GroundingHandle {
            tx: self.tx.clone(),
        }
    }

    /// Everything that has arrived so far; never waits.
    pub(crate) fn drain(&mut self) -> Vec<GroundedResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        results
    }
}
