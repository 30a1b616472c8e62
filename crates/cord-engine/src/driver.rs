//! Driver - the top-level run loop.
//!
//! Seeds the root goal, ticks the scheduler until the tree terminates, and
//! services the human-input channel in between. On a restarted store, any
//! `active` node is an orphan from a previous process and gets cancelled;
//! the engine recovers its whole view by re-reading the store.

use std::sync::Arc;

use cord_core::{NodeId, Result, Returns, Status};
use cord_store::Store;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::human::{answer_ask, expire_ask, HumanChannel};
use crate::scheduler;
use crate::supervisor::Supervisor;

/// Terminal state of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub root: NodeId,
    pub status: Status,
    pub result: Option<String>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == Status::Complete
    }
}

pub struct Driver {
    store: Arc<Store>,
    supervisor: Supervisor,
    human: HumanChannel,
    config: Arc<EngineConfig>,
}

impl Driver {
    pub fn new(store: Arc<Store>, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let supervisor = Supervisor::new(store.clone(), config.clone());
        Self {
            store,
            supervisor,
            human: HumanChannel::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Seed (or re-open) the root and drive the tree to termination.
    pub async fn run(&self, goal: &str, prompt: &str) -> Result<RunOutcome> {
        let root = match self.store.root()? {
            Some(node) => {
                self.recover()?;
                node.id
            }
            None => {
                let id = self.store.create_root(goal, prompt, Returns::Text)?;
                info!(root = %id, "seeded root goal");
                id
            }
        };

        loop {
            let report =
                scheduler::tick(&self.store, &self.supervisor, &self.human, &self.config).await?;
            self.service_asks().await;
            if report.done {
                break;
            }
            tokio::time::sleep(self.config.tick).await;
        }

        let node = self.store.node(root)?;
        info!(root = %root, status = %node.status, "run finished");
        Ok(RunOutcome {
            root,
            status: node.status,
            result: node.result,
        })
    }

    /// Orphan recovery: nodes left `active` by a dead engine have no live
    /// process behind them; cancel their subtrees.
    fn recover(&self) -> Result<()> {
        for id in self.store.active_nodes()? {
            warn!(node = %id, "orphaned active node from a previous run, cancelling");
            let _ = self.store.cancel_subtree(id)?;
        }
        Ok(())
    }

    /// Drain queued human asks: print the question, read one answer line
    /// from stdin (bounded by the ask's timeout when it has one).
    async fn service_asks(&self) {
        while let Some(ask) = self.human.try_next() {
            println!("{} asks: {}", ask.id, ask.question);
            let answer = read_answer(ask.timeout_ms).await;
            let outcome = match answer {
                Some(line) => answer_ask(&self.store, ask.id, line.trim()),
                None => {
                    warn!(node = %ask.id, "ask timed out");
                    expire_ask(&self.store, &ask)
                }
            };
            if let Err(e) = outcome {
                warn!(node = %ask.id, error = %e, "could not record ask outcome");
            }
        }
    }
}

async fn read_answer(timeout_ms: Option<u64>) -> Option<String> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match timeout_ms {
        Some(ms) => {
            let deadline = std::time::Duration::from_millis(ms);
            match tokio::time::timeout(deadline, lines.next_line()).await {
                Ok(Ok(line)) => line,
                Ok(Err(_)) | Err(_) => None,
            }
        }
        None => lines.next_line().await.ok().flatten(),
    }
}
