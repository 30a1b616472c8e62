//! Human-input channel for `ask target=human` nodes.
//!
//! The scheduler delivers questions here instead of launching a subprocess;
//! the driver drains the queue, collects answers, and writes them back as
//! the ask node's result.

use std::sync::Mutex;

use cord_core::{NodeId, Result, Status};
use cord_store::Store;
use tokio::sync::mpsc;

/// A question awaiting the operator.
#[derive(Clone, Debug)]
pub struct PendingAsk {
    pub id: NodeId,
    pub question: String,
    pub default: Option<String>,
    pub timeout_ms: Option<u64>,
}

pub struct HumanChannel {
    tx: mpsc::UnboundedSender<PendingAsk>,
    rx: Mutex<mpsc::UnboundedReceiver<PendingAsk>>,
}

impl Default for HumanChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Queue a question for the operator.
    pub fn deliver(&self, ask: PendingAsk) {
        let _ = self.tx.send(ask);
    }

    /// Next queued question, if any.
    pub fn try_next(&self) -> Option<PendingAsk> {
        self.rx.lock().ok()?.try_recv().ok()
    }
}

/// Record the operator's answer as the ask node's result.
pub fn answer_ask(store: &Store, id: NodeId, answer: &str) -> Result<()> {
    store.transition(id, Status::Active, Status::Complete, Some(answer))
}

/// A timed-out ask completes with its declared default, else fails.
pub fn expire_ask(store: &Store, ask: &PendingAsk) -> Result<()> {
    match &ask.default {
        Some(default) => store.transition(ask.id, Status::Active, Status::Complete, Some(default)),
        None => store.transition(ask.id, Status::Active, Status::Failed, None),
    }
}
