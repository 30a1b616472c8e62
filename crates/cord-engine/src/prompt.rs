//! Prompt assembly - pure functions from store state to agent prompt text.
//!
//! Section order is fixed: identity, goal chain, own goal, instruction text,
//! need results, the returns contract, tool usage. A synthesis relaunch
//! swaps the need results for the children's results.

use cord_core::{Node, Returns};

/// Fixed tool-usage footer. Tool names and parameter shapes are part of the
/// protocol; agents discover everything else by reading the tree.
const TOOL_INSTRUCTIONS: &str = "\
You coordinate through the tool server at the address in CORD_TOOL_SOCKET. Tools:
- read_tree() -> full tree snapshot
- read_node(id) -> one node
- create(goal, prompt, returns?, needs?, kind?) -> spawn a child task under you; \
needs is a list of node ids that must complete first; kind is task, serial, or ask
- complete(result) -> finish your own node with its result; call this exactly once, then exit 0
- stop(id) / pause(id) / resume(id) -> control nodes in your own subtree
- modify(id, goal?, prompt?) -> rewrite a pending or paused descendant
- ask(question, target, options?, default?, timeout?) -> route a question to \
human, parent, or children";

/// Assemble the launch prompt for `node` from its ancestor chain (root
/// first) and the resolved targets of its satisfied needs.
pub fn assemble(node: &Node, ancestors: &[Node], needs: &[Node]) -> String {
    let mut sections = Vec::new();
    sections.push(format!("You are {}.", node.id));
    sections.push(goal_chain(ancestors, node));
    sections.push(format!("Your goal: {}", node.goal));
    sections.push(node.prompt.clone());

    for need in needs {
        sections.push(format!(
            "Result from {} \"{}\": {}",
            need.id,
            need.goal,
            need.result.as_deref().unwrap_or("")
        ));
    }

    sections.push(returns_contract(node.returns));
    sections.push(TOOL_INSTRUCTIONS.to_string());
    sections.join("\n\n")
}

/// Assemble the synthesis relaunch prompt: the children's results replace
/// the need results, in ordinal order.
pub fn assemble_synthesis(node: &Node, children: &[Node]) -> String {
    let mut sections = Vec::new();
    sections.push(format!("You are {}.", node.id));
    sections.push(format!("Your goal: {}", node.goal));
    sections.push(node.prompt.clone());
    sections.push(
        "Your decomposed children have completed; produce the final synthesis.".to_string(),
    );

    for child in children {
        sections.push(format!(
            "Result from {} \"{}\": {}",
            child.id,
            child.goal,
            child.result.as_deref().unwrap_or("")
        ));
    }

    sections.push(returns_contract(node.returns));
    sections.push(TOOL_INSTRUCTIONS.to_string());
    sections.join("\n\n")
}

/// Goal chain rendered as a nested indent tree, root at the top, the node
/// itself on the last line.
fn goal_chain(ancestors: &[Node], node: &Node) -> String {
    let mut out = String::from("Goal chain:");
    let mut depth = 0;
    for a in ancestors {
        out.push_str(&format!("\n{}{} {}", "  ".repeat(depth + 1), a.id, a.goal));
        depth += 1;
    }
    out.push_str(&format!(
        "\n{}{} {} (you)",
        "  ".repeat(depth + 1),
        node.id,
        node.goal
    ));
    out
}

fn returns_contract(returns: Returns) -> String {
    let instruction = match returns {
        Returns::Text => "Return plain text.",
        Returns::Boolean => "Return exactly \"true\" or \"false\".",
        Returns::List => "Return one item per line.",
        Returns::Structured => "Return a single JSON document.",
        Returns::File => "Return the path of the file you produced.",
        Returns::Approval => "Return the chosen option.",
    };
    format!("Declared return type: {}. {}", returns.as_str(), instruction)
}
