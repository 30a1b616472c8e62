//! Cord Tools - the per-agent tool server.
//!
//! One server instance per agent process. The agent's identity is a property
//! of which server it connected to, not a request parameter: the Supervisor
//! binds a fresh Unix socket for each node before the agent launches, and
//! every inbound call is evaluated from that principal's perspective.

pub mod router;
pub mod server;

pub use router::{route_tool, ToolContext};
pub use server::{bind_endpoint, serve};

use cord_core::NodeId;

/// Signal delivery, implemented by the engine's Supervisor. The tool layer
/// depends on this trait so `stop`/`pause` can reach live processes without
/// a dependency on the engine crate.
#[async_trait::async_trait]
pub trait ProcessControl: Send + Sync {
    /// Deliver a terminate signal to the live process for `id`, if any.
    async fn terminate(&self, id: NodeId);
}
