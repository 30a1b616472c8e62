//! Tool router - dispatches tool calls to handlers after authority checks.
//!
//! Each tool (create, complete, stop, ...) is handled by a dedicated async
//! function. Authority violations return a structured error; the router
//! never silently drops or cascade-fixes a denied call.

use std::sync::Arc;

use cord_core::{AskTarget, Error, Kind, NodeId, Returns, Status, ToolError};
use cord_store::Store;
use serde_json::{json, Value};
use tracing::debug;

use crate::ProcessControl;

/// Per-agent context. `agent` is the principal every call is judged against.
pub struct ToolContext {
    pub agent: NodeId,
    pub store: Arc<Store>,
    pub control: Arc<dyn ProcessControl>,
}

/// Result type for tool handlers.
pub type ToolResult = Result<Value, ToolError>;

/// Route a tool call to the appropriate handler.
pub async fn route_tool(method: &str, params: Value, ctx: &ToolContext) -> ToolResult {
    debug!(agent = %ctx.agent, tool = method, "tool call");
    match method {
        "read_tree" => handle_read_tree(ctx),
        "read_node" => handle_read_node(params, ctx),
        "create" => handle_create(params, ctx),
        "complete" => handle_complete(params, ctx),
        "stop" => handle_stop(params, ctx).await,
        "pause" => handle_pause(params, ctx).await,
        "resume" => handle_resume(params, ctx),
        "modify" => handle_modify(params, ctx),
        "ask" => handle_ask(params, ctx),
        _ => Err(ToolError::method_not_found(method)),
    }
}

// ---------------------------------------------------------------------------
// Param helpers
// ---------------------------------------------------------------------------

fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    params[key]
        .as_str()
        .ok_or_else(|| ToolError::invalid_request(format!("missing required param: {}", key)))
}

fn require_id(params: &Value, key: &str) -> Result<NodeId, ToolError> {
    params[key]
        .as_i64()
        .map(NodeId)
        .ok_or_else(|| ToolError::invalid_request(format!("missing required param: {}", key)))
}

/// Subtree authority: the target must be a strict descendant of the caller.
fn require_subtree(ctx: &ToolContext, target: NodeId) -> Result<(), ToolError> {
    if target == ctx.agent {
        return Err(Error::authority_denied(ctx.agent, "may not target itself".to_string()).into());
    }
    if !ctx.store.is_ancestor(ctx.agent, target).map_err(ToolError::from)? {
        return Err(Error::authority_denied(
            ctx.agent,
            format!("may only target nodes in its own subtree; {} is outside it", target),
        )
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// read_tree / read_node
// ---------------------------------------------------------------------------

fn handle_read_tree(ctx: &ToolContext) -> ToolResult {
    let snapshot = ctx.store.snapshot().map_err(ToolError::from)?;
    serde_json::to_value(&snapshot).map_err(|e| ToolError::new("internal", e.to_string()))
}

fn handle_read_node(params: Value, ctx: &ToolContext) -> ToolResult {
    let id = require_id(&params, "id")?;
    let node = ctx.store.node(id).map_err(ToolError::from)?;
    serde_json::to_value(&node).map_err(|e| ToolError::new("internal", e.to_string()))
}

// ---------------------------------------------------------------------------
// create - new child of the calling agent
// ---------------------------------------------------------------------------

fn handle_create(params: Value, ctx: &ToolContext) -> ToolResult {
    let goal = require_str(&params, "goal")?;
    let prompt = params["prompt"].as_str().unwrap_or(goal);
    let returns = match params["returns"].as_str() {
        Some(s) => Returns::parse(s)
            .ok_or_else(|| ToolError::invalid_request(format!("unknown returns type: {}", s)))?,
        None => Returns::Text,
    };
    let kind = match params["kind"].as_str() {
        Some(s) => match Kind::parse(s) {
            Some(Kind::Goal) | None => {
                return Err(ToolError::invalid_request(format!(
                    "kind must be task, serial, or ask, not {}",
                    s
                )))
            }
            Some(k) => k,
        },
        None => Kind::Task,
    };
    let needs: Vec<NodeId> = match params.get("needs") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_i64()
                    .map(NodeId)
                    .ok_or_else(|| ToolError::invalid_request("needs must be an array of node ids"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(ToolError::invalid_request("needs must be an array of node ids")),
    };

    let id = if kind == Kind::Ask {
        // create(kind=ask) is the sibling-directed form: the ask runs as an
        // agent under the caller, same as ask(target=children).
        ctx.store
            .create_ask(ctx.agent, goal, prompt, AskTarget::Children, None, None)
    } else {
        ctx.store
            .create_child(ctx.agent, kind, goal, prompt, returns, &needs)
    }
    .map_err(ToolError::from)?;

    Ok(json!({ "id": id.as_i64() }))
}

// ---------------------------------------------------------------------------
// complete - the caller finishes its own node
// ---------------------------------------------------------------------------

fn handle_complete(params: Value, ctx: &ToolContext) -> ToolResult {
    let result = require_str(&params, "result")?;
    let node = ctx.store.node(ctx.agent).map_err(ToolError::from)?;
    if node.status != Status::Active {
        return Err(Error::invalid_status(ctx.agent, node.status).into());
    }
    ctx.store
        .transition(ctx.agent, Status::Active, Status::Complete, Some(result))
        .map_err(ToolError::from)?;
    Ok(json!({ "ok": true }))
}

// ---------------------------------------------------------------------------
// stop - cascading cancel of a descendant
// ---------------------------------------------------------------------------

async fn handle_stop(params: Value, ctx: &ToolContext) -> ToolResult {
    let id = require_id(&params, "id")?;
    require_subtree(ctx, id)?;

    let live = ctx.store.cancel_subtree(id).map_err(ToolError::from)?;
    for node in &live {
        ctx.control.terminate(*node).await;
    }
    // Idempotent: an already-terminal target cancels nothing and succeeds.
    Ok(json!({ "ok": true, "signalled": live.len() }))
}

// ---------------------------------------------------------------------------
// pause / resume
// ---------------------------------------------------------------------------

async fn handle_pause(params: Value, ctx: &ToolContext) -> ToolResult {
    let id = require_id(&params, "id")?;
    require_subtree(ctx, id)?;

    let node = ctx.store.node(id).map_err(ToolError::from)?;
    if node.status != Status::Active {
        return Err(Error::invalid_status(id, node.status).into());
    }
    // Status first so the reap honors `paused` when the signal lands.
    ctx.store
        .transition(id, Status::Active, Status::Paused, None)
        .map_err(ToolError::from)?;
    ctx.control.terminate(id).await;
    Ok(json!({ "ok": true }))
}

fn handle_resume(params: Value, ctx: &ToolContext) -> ToolResult {
    let id = require_id(&params, "id")?;
    require_subtree(ctx, id)?;

    let node = ctx.store.node(id).map_err(ToolError::from)?;
    if node.status != Status::Paused {
        return Err(Error::invalid_status(id, node.status).into());
    }
    // Back through `pending`: the scheduler re-evaluates needs and relaunches.
    ctx.store
        .transition(id, Status::Paused, Status::Pending, None)
        .map_err(ToolError::from)?;
    Ok(json!({ "ok": true }))
}

// ---------------------------------------------------------------------------
// modify
// ---------------------------------------------------------------------------

fn handle_modify(params: Value, ctx: &ToolContext) -> ToolResult {
    let id = require_id(&params, "id")?;
    require_subtree(ctx, id)?;

    let goal = params["goal"].as_str();
    let prompt = params["prompt"].as_str();
    if goal.is_none() && prompt.is_none() {
        return Err(ToolError::invalid_request("modify requires goal and/or prompt"));
    }
    ctx.store.modify(id, goal, prompt).map_err(ToolError::from)?;
    Ok(json!({ "ok": true }))
}

// ---------------------------------------------------------------------------
// ask - question routing
// ---------------------------------------------------------------------------

fn handle_ask(params: Value, ctx: &ToolContext) -> ToolResult {
    let question = require_str(&params, "question")?;
    let target = AskTarget::parse(require_str(&params, "target")?)
        .ok_or_else(|| ToolError::invalid_request("target must be human, parent, or children"))?;
    let options: Vec<&str> = match params.get("options") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| ToolError::invalid_request("options must be an array of strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(ToolError::invalid_request("options must be an array of strings")),
    };
    let default = params["default"].as_str();
    let timeout_ms = params["timeout"].as_u64().map(|secs| secs * 1000);

    // Escalation is the one exception to the child-of-self rule: the ask
    // node lands under the caller's parent.
    let parent = match target {
        AskTarget::Parent => {
            let me = ctx.store.node(ctx.agent).map_err(ToolError::from)?;
            me.parent_id.ok_or_else(|| {
                ToolError::from(Error::authority_denied(
                    ctx.agent,
                    "is the root and has no parent to escalate to".to_string(),
                ))
            })?
        }
        AskTarget::Human | AskTarget::Children => ctx.agent,
    };

    let prompt = render_question(question, &options, default);
    let id = ctx
        .store
        .create_ask(parent, question, &prompt, target, default, timeout_ms)
        .map_err(ToolError::from)?;
    Ok(json!({ "id": id.as_i64() }))
}

fn render_question(question: &str, options: &[&str], default: Option<&str>) -> String {
    let mut out = question.to_string();
    if !options.is_empty() {
        out.push_str("\nOptions: ");
        out.push_str(&options.join(", "));
    }
    if let Some(d) = default {
        out.push_str(&format!("\nDefault: {}", d));
    }
    out
}
