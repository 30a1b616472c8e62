//! Framed transport for the tool server.
//!
//! Length-delimited JSON frames over a Unix socket. Single client: the
//! agent this server was spawned for. The Supervisor binds the endpoint
//! before launching the agent and cancels the serve task on reap.

use std::path::Path;

use cord_core::{ToolError, ToolRequest, ToolResponse, MAX_FRAME_LEN};
use futures::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::router::{route_tool, ToolContext};

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Bind the per-agent endpoint, replacing any stale socket file.
pub fn bind_endpoint(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    UnixListener::bind(path)
}

/// Accept the single agent connection and serve tool calls until the agent
/// disconnects or `shutdown` fires.
pub async fn serve(listener: UnixListener, ctx: ToolContext, shutdown: CancellationToken) {
    let stream = tokio::select! {
        accepted = listener.accept() => match accepted {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!(agent = %ctx.agent, error = %e, "tool server accept failed");
                return;
            }
        },
        _ = shutdown.cancelled() => return,
    };
    debug!(agent = %ctx.agent, "agent connected to tool server");
    serve_stream(stream, ctx, shutdown).await;
}

async fn serve_stream(stream: UnixStream, ctx: ToolContext, shutdown: CancellationToken) {
    let mut framed = Framed::new(stream, codec());
    loop {
        let frame = tokio::select! {
            frame = framed.next() => frame,
            _ = shutdown.cancelled() => break,
        };
        let bytes = match frame {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                warn!(agent = %ctx.agent, error = %e, "tool server frame error");
                break;
            }
            None => break,
        };

        let response = match serde_json::from_slice::<ToolRequest>(&bytes) {
            Ok(request) => {
                let id = request.id;
                match route_tool(&request.method, request.params, &ctx).await {
                    Ok(result) => ToolResponse::ok(id, result),
                    Err(error) => ToolResponse::err(id, error),
                }
            }
            Err(e) => ToolResponse::err(
                0,
                ToolError::invalid_request(format!("unparseable request: {}", e)),
            ),
        };

        let payload = match serde_json::to_vec(&response) {
            Ok(p) => p,
            Err(e) => {
                warn!(agent = %ctx.agent, error = %e, "tool response encode failed");
                break;
            }
        };
        if framed.send(Bytes::from(payload)).await.is_err() {
            break;
        }
    }
    debug!(agent = %ctx.agent, "tool server closed");
}
