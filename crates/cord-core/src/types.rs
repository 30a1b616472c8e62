//! Core types for the coordination tree

use serde::{Deserialize, Serialize};

/// Node identifier - dense monotonic integer issued by the store, rendered `#N`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Node kind
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Goal,
    Task,
    Serial,
    Ask,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Goal => "goal",
            Kind::Task => "task",
            Kind::Serial => "serial",
            Kind::Ask => "ask",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "goal" => Some(Kind::Goal),
            "task" => Some(Kind::Task),
            "serial" => Some(Kind::Serial),
            "ask" => Some(Kind::Ask),
            _ => None,
        }
    }
}

/// Node lifecycle status
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Active,
    Paused,
    Complete,
    Cancelled,
    Failed,
}

impl Status {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Cancelled | Status::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Active => "active",
            Status::Paused => "paused",
            Status::Complete => "complete",
            Status::Cancelled => "cancelled",
            Status::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Status::Pending),
            "active" => Some(Status::Active),
            "paused" => Some(Status::Paused),
            "complete" => Some(Status::Complete),
            "cancelled" => Some(Status::Cancelled),
            "failed" => Some(Status::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared result contract. Not validated against the payload.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Returns {
    #[default]
    Text,
    Boolean,
    List,
    Structured,
    File,
    Approval,
}

impl Returns {
    pub fn as_str(&self) -> &'static str {
        match self {
            Returns::Text => "text",
            Returns::Boolean => "boolean",
            Returns::List => "list",
            Returns::Structured => "structured",
            Returns::File => "file",
            Returns::Approval => "approval",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Returns::Text),
            "boolean" => Some(Returns::Boolean),
            "list" => Some(Returns::List),
            "structured" => Some(Returns::Structured),
            "file" => Some(Returns::File),
            "approval" => Some(Returns::Approval),
            _ => None,
        }
    }
}

/// Routing target of an `ask` node.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AskTarget {
    Human,
    Parent,
    Children,
}

impl AskTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            AskTarget::Human => "human",
            AskTarget::Parent => "parent",
            AskTarget::Children => "children",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "human" => Some(AskTarget::Human),
            "parent" => Some(AskTarget::Parent),
            "children" => Some(AskTarget::Children),
            _ => None,
        }
    }
}

/// A node in the coordination tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub ordinal: i64,
    pub goal: String,
    pub prompt: String,
    pub returns: Returns,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub synthesized: bool,
    /// Needs edges declared by this node, in insertion order.
    pub needs: Vec<NodeId>,
    /// Routing target, only set for `kind = ask`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_target: Option<AskTarget>,
    /// Declared answer fallback for a timed-out ask.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_default: Option<String>,
    /// Answer deadline for a human ask, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_timeout_ms: Option<u64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Consistent full read of the tree, nodes in ascending id order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub nodes: Vec<Node>,
}

impl TreeSnapshot {
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.parent_id.is_none())
    }

    pub fn children_of(&self, id: NodeId) -> Vec<&Node> {
        let mut kids: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|n| n.parent_id == Some(id))
            .collect();
        kids.sort_by_key(|n| n.ordinal);
        kids
    }
}
