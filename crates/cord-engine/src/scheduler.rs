//! Ready-set scheduler - one stateless tick over the store.
//!
//! Launch order is ascending node id, the stable tie-break that makes runs
//! deterministic in the absence of agent nondeterminism. The scheduler
//! holds nothing across ticks; the store is re-read every time.

use std::sync::Arc;

use cord_core::{AskTarget, Kind, NodeId, Result, Status};
use cord_store::Store;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::human::{HumanChannel, PendingAsk};
use crate::prompt;
use crate::supervisor::Supervisor;

/// What one tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub launched: Vec<NodeId>,
    pub asked: Vec<NodeId>,
    pub synthesis: Vec<NodeId>,
    pub done: bool,
}

/// One scheduler tick: launch ready nodes under the concurrency cap, divert
/// human asks, trigger synthesis relaunches, and check termination.
pub async fn tick(
    store: &Arc<Store>,
    supervisor: &Supervisor,
    human: &HumanChannel,
    config: &EngineConfig,
) -> Result<TickReport> {
    let mut report = TickReport::default();

    for id in store.ready_set()? {
        if supervisor.running() >= config.max_agents {
            debug!(cap = config.max_agents, "concurrency cap reached");
            break;
        }
        let node = store.node(id)?;

        // Human asks never get a subprocess: they go to the operator.
        if node.kind == Kind::Ask && node.ask_target == Some(AskTarget::Human) {
            if store
                .transition(id, Status::Pending, Status::Active, None)
                .is_err()
            {
                continue;
            }
            human.deliver(PendingAsk {
                id,
                question: node.prompt.clone(),
                default: node.ask_default.clone(),
                timeout_ms: node.ask_timeout_ms,
            });
            info!(node = %id, "ask routed to human");
            report.asked.push(id);
            continue;
        }

        let text = if node.synthesized {
            // Relaunched parent: children's results in ordinal order.
            prompt::assemble_synthesis(&node, &store.children(id)?)
        } else {
            prompt::assemble(&node, &store.ancestors(id)?, &store.needs_of(id)?)
        };

        match supervisor.launch(id, text) {
            Ok(()) => report.launched.push(id),
            Err(e) => warn!(node = %id, error = %e, "launch skipped"),
        }
    }

    // Completed parents whose children all terminated get their single
    // synthesis relaunch; the next tick picks them up from the ready set.
    for parent in store.synthesis_candidates()? {
        match store.begin_synthesis(parent) {
            Ok(()) => {
                info!(parent = %parent, "synthesis scheduled");
                report.synthesis.push(parent);
            }
            Err(e) => debug!(parent = %parent, error = %e, "synthesis raced"),
        }
    }

    report.done = store.is_finished()?;
    Ok(report)
}
