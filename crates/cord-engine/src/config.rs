//! Engine configuration

use std::path::PathBuf;
use std::time::Duration;

/// Knobs for a single run. The agent runtime is an external binary; the
/// engine only launches it with a prompt, a tool-server address, and the
/// budget/model parameters.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Agent CLI binary to launch per node.
    pub runtime: String,
    /// Model name passed through to the agent (CORD_MODEL).
    pub model: Option<String>,
    /// Per-process budget cap in USD, passed through (CORD_BUDGET).
    /// Enforcement is the agent's responsibility.
    pub budget: Option<f64>,
    /// Global cap on concurrent agent subprocesses.
    pub max_agents: usize,
    /// Scheduler inter-tick sleep.
    pub tick: Duration,
    /// Directory for per-agent sockets and log files, keyed by node id.
    pub run_dir: PathBuf,
    /// Optional wall-clock ceiling per process; a cancel signal is
    /// delivered when exceeded. No timeout by default.
    pub max_runtime: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runtime: "claude".to_string(),
            model: None,
            budget: None,
            max_agents: 4,
            tick: Duration::from_secs(1),
            run_dir: std::env::temp_dir().join("cord-run"),
            max_runtime: None,
        }
    }
}
