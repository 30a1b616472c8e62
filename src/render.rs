//! Final status-model rendering: a plain indented tree, failing branches
//! marked so the operator can spot the break at a glance.

use cord_core::{Node, Status, TreeSnapshot};

pub fn print_tree(snapshot: &TreeSnapshot) {
    let Some(root) = snapshot.root() else {
        return;
    };
    print_node(snapshot, root, 0);
}

fn print_node(snapshot: &TreeSnapshot, node: &Node, depth: usize) {
    let marker = if branch_failed(snapshot, node) { "!" } else { " " };
    let mut line = format!(
        "{}{}{} [{}] {}",
        marker,
        "  ".repeat(depth + 1),
        node.id,
        node.status,
        node.goal
    );
    if let Some(result) = &node.result {
        let preview: String = result.chars().take(60).collect();
        if preview.len() < result.len() {
            line.push_str(&format!(" -> {}...", preview));
        } else {
            line.push_str(&format!(" -> {}", preview));
        }
    }
    println!("{}", line);
    for child in snapshot.children_of(node.id) {
        print_node(snapshot, child, depth + 1);
    }
}

/// A branch has failed when the node or anything below it is `failed`.
fn branch_failed(snapshot: &TreeSnapshot, node: &Node) -> bool {
    node.status == Status::Failed
        || snapshot
            .children_of(node.id)
            .iter()
            .any(|c| branch_failed(snapshot, c))
}
