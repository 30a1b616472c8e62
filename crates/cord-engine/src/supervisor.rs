//! Process supervision - launch, signal, and reap agent subprocesses.
//!
//! The supervisor owns live process handles keyed by node id and nothing
//! else; all authoritative state lives in the store. Each launch binds a
//! fresh tool-server endpoint, performs the `pending -> active` transition
//! before the child exists, and leaves a reaper task to record the outcome.

use std::process::Stdio;
use std::sync::Arc;

use cord_core::{Error, NodeId, Result, Status};
use cord_store::Store;
use cord_tools::{serve, ProcessControl, ToolContext};
use dashmap::DashMap;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;

/// Terminate tokens for live children, shared with the tool layer.
type ProcMap = Arc<DashMap<i64, CancellationToken>>;

/// Signal delivery handle given to each tool server. Holding only the
/// process map keeps the tool layer decoupled from the supervisor itself.
struct SignalHub {
    procs: ProcMap,
}

#[async_trait::async_trait]
impl ProcessControl for SignalHub {
    async fn terminate(&self, id: NodeId) {
        if let Some(token) = self.procs.get(&id.as_i64()) {
            token.cancel();
        }
    }
}

pub struct Supervisor {
    store: Arc<Store>,
    config: Arc<EngineConfig>,
    procs: ProcMap,
}

impl Supervisor {
    pub fn new(store: Arc<Store>, config: Arc<EngineConfig>) -> Self {
        Self {
            store,
            config,
            procs: Arc::new(DashMap::new()),
        }
    }

    /// Number of live agent subprocesses.
    pub fn running(&self) -> usize {
        self.procs.len()
    }

    /// Signal-delivery handle for a tool server.
    pub fn control(&self) -> Arc<dyn ProcessControl> {
        Arc::new(SignalHub {
            procs: self.procs.clone(),
        })
    }

    /// Deliver a terminate signal to the live process for `id`, if any.
    pub fn signal(&self, id: NodeId) {
        if let Some(token) = self.procs.get(&id.as_i64()) {
            token.cancel();
        }
    }

    /// Cancel `id`'s subtree in the store and signal every live process in it.
    pub fn cancel_tree(&self, id: NodeId) -> Result<()> {
        let live = self.store.cancel_subtree(id)?;
        for node in live {
            self.signal(node);
        }
        Ok(())
    }

    /// Launch the agent subprocess for `id` with the assembled prompt.
    ///
    /// The `pending -> active` transition happens before the child exists;
    /// a bind or spawn failure transitions the node to `failed` with a
    /// diagnostic in the log.
    pub fn launch(&self, id: NodeId, prompt: String) -> Result<()> {
        if self.procs.len() >= self.config.max_agents {
            return Err(Error::storage(format!(
                "launch rejected: {} agents already running",
                self.procs.len()
            )));
        }
        self.store.transition(id, Status::Pending, Status::Active, None)?;

        if let Err(e) = std::fs::create_dir_all(&self.config.run_dir) {
            self.fail_launch(id, &format!("run dir: {}", e));
            return Err(Error::Io(e));
        }

        let socket_path = self.config.run_dir.join(format!("node-{}.sock", id.as_i64()));
        let listener = match cord_tools::bind_endpoint(&socket_path) {
            Ok(l) => l,
            Err(e) => {
                self.fail_launch(id, &format!("bind {}: {}", socket_path.display(), e));
                return Err(Error::Io(e));
            }
        };

        let log_path = self.config.run_dir.join(format!("node-{}.log", id.as_i64()));
        let stderr = match std::fs::File::create(&log_path) {
            Ok(f) => Stdio::from(f),
            Err(e) => {
                self.fail_launch(id, &format!("log file: {}", e));
                return Err(Error::Io(e));
            }
        };

        let mut cmd = Command::new(&self.config.runtime);
        cmd.arg(&prompt)
            .env("CORD_NODE_ID", id.as_i64().to_string())
            .env("CORD_TOOL_SOCKET", &socket_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true);
        if let Some(model) = &self.config.model {
            cmd.env("CORD_MODEL", model);
        }
        if let Some(budget) = self.config.budget {
            cmd.env("CORD_BUDGET", budget.to_string());
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                self.fail_launch(id, &format!("spawn {}: {}", self.config.runtime, e));
                let _ = std::fs::remove_file(&socket_path);
                return Err(Error::Io(e));
            }
        };

        info!(node = %id, runtime = %self.config.runtime, "launched agent");

        let term = CancellationToken::new();
        self.procs.insert(id.as_i64(), term.clone());

        // Tool server lives until the reaper cancels it.
        let server_done = CancellationToken::new();
        let ctx = ToolContext {
            agent: id,
            store: self.store.clone(),
            control: self.control(),
        };
        tokio::spawn(serve(listener, ctx, server_done.clone()));

        // Reaper: collect stdout, wait for exit (or a signal, or the
        // runtime ceiling), record the outcome, clean up.
        let store = self.store.clone();
        let procs = self.procs.clone();
        let max_runtime = self.config.max_runtime;
        tokio::spawn(async move {
            let mut stdout = Vec::new();
            let out_pipe = child.stdout.take();
            let read_task = tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Some(mut pipe) = out_pipe {
                    let _ = pipe.read_to_end(&mut buf).await;
                }
                buf
            });

            let exit = tokio::select! {
                status = child.wait() => status,
                _ = term.cancelled() => {
                    let _ = child.start_kill();
                    child.wait().await
                }
                _ = runtime_ceiling(max_runtime) => {
                    warn!(node = %id, "runtime ceiling exceeded, cancelling");
                    let live = store.cancel_subtree(id).unwrap_or_default();
                    for n in live {
                        if let Some(t) = procs.get(&n.as_i64()) {
                            t.cancel();
                        }
                    }
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            if let Ok(buf) = read_task.await {
                stdout = buf;
            }

            reap(&store, id, exit.ok(), &stdout);

            procs.remove(&id.as_i64());
            server_done.cancel();
            let _ = std::fs::remove_file(&socket_path);
        });

        Ok(())
    }

    fn fail_launch(&self, id: NodeId, diagnostic: &str) {
        warn!(node = %id, diagnostic, "launch failed");
        if let Err(e) = self
            .store
            .transition(id, Status::Active, Status::Failed, None)
        {
            warn!(node = %id, error = %e, "could not record launch failure");
        }
    }
}

/// Pending-forever when no ceiling is configured.
async fn runtime_ceiling(max: Option<std::time::Duration>) {
    match max {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

/// Record a child's outcome in the store.
///
/// Already-terminal and `paused` statuses are honored as-is: the agent
/// completed through the tool, or a cancel/pause signal landed first. An
/// `active` node that exited cleanly with output gets the
/// implicit-completion fallback; everything else is a failure.
fn reap(store: &Store, id: NodeId, exit: Option<std::process::ExitStatus>, stdout: &[u8]) {
    let node = match store.node(id) {
        Ok(n) => n,
        Err(e) => {
            warn!(node = %id, error = %e, "reap: node vanished");
            return;
        }
    };

    match node.status {
        Status::Complete | Status::Cancelled | Status::Failed | Status::Paused => {
            debug!(node = %id, status = %node.status, "reaped");
        }
        Status::Active => {
            let exit_ok = exit.map(|s| s.success()).unwrap_or(false);
            let out = String::from_utf8_lossy(stdout).trim().to_string();
            let outcome = if exit_ok && !out.is_empty() {
                store.transition(id, Status::Active, Status::Complete, Some(&out))
            } else {
                store.transition(id, Status::Active, Status::Failed, None)
            };
            match outcome {
                Ok(()) => info!(
                    node = %id,
                    implicit = exit_ok && !out.is_empty(),
                    "reaped exited agent"
                ),
                // A concurrent transition beat us; the store already holds
                // the authoritative outcome.
                Err(Error::Conflict(_)) => debug!(node = %id, "reap lost transition race"),
                Err(e) => warn!(node = %id, error = %e, "reap transition failed"),
            }
        }
        Status::Pending => {
            debug!(node = %id, "reaped while pending (resumed elsewhere)");
        }
    }
}
