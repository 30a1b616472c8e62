//! The coordination store. Single writer per transaction, concurrent readers.

use std::path::Path;
use std::sync::Mutex;

use cord_core::{AskTarget, Error, Kind, Node, NodeId, Result, Returns, Status, TreeSnapshot};
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id             INTEGER PRIMARY KEY,
    kind           TEXT NOT NULL,
    parent_id      INTEGER REFERENCES nodes(id),
    ordinal        INTEGER NOT NULL,
    goal           TEXT NOT NULL,
    prompt         TEXT NOT NULL,
    returns        TEXT NOT NULL,
    status         TEXT NOT NULL,
    result         TEXT,
    synthesized    INTEGER NOT NULL DEFAULT 0,
    ask_target     TEXT,
    ask_default    TEXT,
    ask_timeout_ms INTEGER,
    created_at     INTEGER NOT NULL,
    updated_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id);
CREATE INDEX IF NOT EXISTS idx_nodes_status ON nodes(status);

CREATE TABLE IF NOT EXISTS dependencies (
    from_id INTEGER NOT NULL REFERENCES nodes(id),
    to_id   INTEGER NOT NULL REFERENCES nodes(id),
    PRIMARY KEY (from_id, to_id)
);

CREATE TABLE IF NOT EXISTS ticks (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    tick INTEGER NOT NULL
);
INSERT OR IGNORE INTO ticks (id, tick) VALUES (1, 0);
"#;

fn db_err(e: rusqlite::Error) -> Error {
    Error::storage(e.to_string())
}

/// Legal status edges. `complete -> pending` is deliberately absent: the
/// synthesis relaunch goes through [`Store::begin_synthesis`] and nowhere else.
fn edge_allowed(from: Status, to: Status) -> bool {
    use Status::*;
    matches!(
        (from, to),
        (Pending, Active)
            | (Pending, Cancelled)
            | (Active, Complete)
            | (Active, Failed)
            | (Active, Cancelled)
            | (Active, Paused)
            | (Paused, Pending)
            | (Paused, Cancelled)
    )
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if necessary) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // journal_mode returns a row; query it instead of pragma_update.
        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))
            .map_err(db_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(db_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::storage("store mutex poisoned"))
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Insert the singleton `goal` root. Fails if one already exists.
    pub fn create_root(&self, goal: &str, prompt: &str, returns: Returns) -> Result<NodeId> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM nodes WHERE kind = 'goal'", [], |r| r.get(0))
            .optional()
            .map_err(db_err)?;
        if let Some(id) = existing {
            return Err(Error::AlreadyExists(format!("root node #{}", id)));
        }

        let tick = next_tick(&tx)?;
        tx.execute(
            "INSERT INTO nodes (kind, parent_id, ordinal, goal, prompt, returns, status, \
             synthesized, created_at, updated_at) \
             VALUES ('goal', NULL, 0, ?1, ?2, ?3, 'pending', 0, ?4, ?4)",
            params![goal, prompt, returns.as_str(), tick],
        )
        .map_err(db_err)?;
        let id = NodeId(tx.last_insert_rowid());
        tx.commit().map_err(db_err)?;
        Ok(id)
    }

    /// Insert a child under `parent` at the next ordinal, with its dependency
    /// edges, atomically. Every element of `needs` must be a strict
    /// descendant of `parent` (prior siblings included); anything else fails
    /// with `invalid_needs`. A child of a `serial` parent also receives an
    /// implicit edge on its predecessor sibling.
    pub fn create_child(
        &self,
        parent: NodeId,
        kind: Kind,
        goal: &str,
        prompt: &str,
        returns: Returns,
        needs: &[NodeId],
    ) -> Result<NodeId> {
        self.insert_child(parent, kind, goal, prompt, returns, needs, None, None, None)
    }

    /// Insert an `ask` node. Asks carry no explicit needs; the routing
    /// target, answer default, and timeout travel with the node.
    pub fn create_ask(
        &self,
        parent: NodeId,
        goal: &str,
        prompt: &str,
        target: AskTarget,
        default: Option<&str>,
        timeout_ms: Option<u64>,
    ) -> Result<NodeId> {
        self.insert_child(
            parent,
            Kind::Ask,
            goal,
            prompt,
            Returns::Text,
            &[],
            Some(target),
            default,
            timeout_ms,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_child(
        &self,
        parent: NodeId,
        kind: Kind,
        goal: &str,
        prompt: &str,
        returns: Returns,
        needs: &[NodeId],
        ask_target: Option<AskTarget>,
        ask_default: Option<&str>,
        ask_timeout_ms: Option<u64>,
    ) -> Result<NodeId> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let parent_kind: Option<String> = tx
            .query_row(
                "SELECT kind FROM nodes WHERE id = ?1",
                params![parent.0],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        let parent_kind = match parent_kind {
            Some(k) => k,
            None => return Err(Error::NotFound(parent)),
        };

        for need in needs {
            if !node_exists(&tx, *need)? || !is_strict_descendant(&tx, *need, parent)? {
                return Err(Error::InvalidNeeds {
                    parent,
                    reference: *need,
                });
            }
        }

        let ordinal: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE parent_id = ?1",
                params![parent.0],
                |r| r.get(0),
            )
            .map_err(db_err)?;

        let tick = next_tick(&tx)?;
        tx.execute(
            "INSERT INTO nodes (kind, parent_id, ordinal, goal, prompt, returns, status, \
             synthesized, ask_target, ask_default, ask_timeout_ms, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 0, ?7, ?8, ?9, ?10, ?10)",
            params![
                kind.as_str(),
                parent.0,
                ordinal,
                goal,
                prompt,
                returns.as_str(),
                ask_target.map(|t| t.as_str()),
                ask_default,
                ask_timeout_ms.map(|t| t as i64),
                tick,
            ],
        )
        .map_err(db_err)?;
        let id = NodeId(tx.last_insert_rowid());

        for need in needs {
            tx.execute(
                "INSERT OR IGNORE INTO dependencies (from_id, to_id) VALUES (?1, ?2)",
                params![id.0, need.0],
            )
            .map_err(db_err)?;
        }

        // Serial ordering is modeled as an implicit edge on the predecessor.
        if parent_kind == "serial" && ordinal > 0 {
            let prev: i64 = tx
                .query_row(
                    "SELECT id FROM nodes WHERE parent_id = ?1 AND ordinal = ?2",
                    params![parent.0, ordinal - 1],
                    |r| r.get(0),
                )
                .map_err(db_err)?;
            tx.execute(
                "INSERT OR IGNORE INTO dependencies (from_id, to_id) VALUES (?1, ?2)",
                params![id.0, prev],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Compare-and-swap status transition. `result` is accepted only on
    /// `active -> complete`; a stale `from` yields `conflict`.
    pub fn transition(
        &self,
        id: NodeId,
        from: Status,
        to: Status,
        result: Option<&str>,
    ) -> Result<()> {
        if result.is_some() && !(from == Status::Active && to == Status::Complete) {
            return Err(Error::storage("result only accepted on active -> complete"));
        }
        if !edge_allowed(from, to) {
            return Err(Error::invalid_status(id, from));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let current = current_status(&tx, id)?;
        if current != from {
            return Err(Error::Conflict(id));
        }

        let tick = next_tick(&tx)?;
        match result {
            Some(r) => {
                tx.execute(
                    "UPDATE nodes SET status = ?1, result = ?2, updated_at = ?3 WHERE id = ?4",
                    params![to.as_str(), r, tick, id.0],
                )
                .map_err(db_err)?;
            }
            None => {
                tx.execute(
                    "UPDATE nodes SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![to.as_str(), tick, id.0],
                )
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Update goal and/or prompt. Permitted only in `pending` or `paused`.
    pub fn modify(&self, id: NodeId, goal: Option<&str>, prompt: Option<&str>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let status = current_status(&tx, id)?;
        if !matches!(status, Status::Pending | Status::Paused) {
            return Err(Error::invalid_status(id, status));
        }

        let tick = next_tick(&tx)?;
        if let Some(g) = goal {
            tx.execute(
                "UPDATE nodes SET goal = ?1, updated_at = ?2 WHERE id = ?3",
                params![g, tick, id.0],
            )
            .map_err(db_err)?;
        }
        if let Some(p) = prompt {
            tx.execute(
                "UPDATE nodes SET prompt = ?1, updated_at = ?2 WHERE id = ?3",
                params![p, tick, id.0],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Cancel `id` and every non-terminal descendant in one transaction.
    /// Returns the ids that were `active`, for signal delivery. No-op on an
    /// already-terminal target.
    pub fn cancel_subtree(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let status = current_status(&tx, id)?;
        if status.is_terminal() {
            return Ok(Vec::new());
        }

        let ids = collect_subtree(&tx, id)?;
        let tick = next_tick(&tx)?;
        let mut live = Vec::new();
        for nid in &ids {
            let st = current_status(&tx, *nid)?;
            if st.is_terminal() {
                continue;
            }
            if st == Status::Active {
                live.push(*nid);
            }
            tx.execute(
                "UPDATE nodes SET status = 'cancelled', updated_at = ?1 WHERE id = ?2",
                params![tick, nid.0],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(live)
    }

    /// Return a completed parent to `pending` for its single synthesis
    /// relaunch. Requires: status `complete`, not yet synthesized, at least
    /// one child, every child terminal.
    pub fn begin_synthesis(&self, id: NodeId) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let (status, synthesized): (String, bool) = tx
            .query_row(
                "SELECT status, synthesized FROM nodes WHERE id = ?1",
                params![id.0],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(db_err)?
            .ok_or(Error::NotFound(id))?;
        let status = parse_status(&status)?;

        if status != Status::Complete || synthesized {
            return Err(Error::invalid_status(id, status));
        }

        let children: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE parent_id = ?1",
                params![id.0],
                |r| r.get(0),
            )
            .map_err(db_err)?;
        let unfinished: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE parent_id = ?1 \
                 AND status NOT IN ('complete', 'cancelled', 'failed')",
                params![id.0],
                |r| r.get(0),
            )
            .map_err(db_err)?;
        if children == 0 || unfinished > 0 {
            return Err(Error::Conflict(id));
        }

        let tick = next_tick(&tx)?;
        tx.execute(
            "UPDATE nodes SET status = 'pending', synthesized = 1, updated_at = ?1 WHERE id = ?2",
            params![tick, id.0],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Load a single node with its needs.
    pub fn node(&self, id: NodeId) -> Result<Node> {
        let conn = self.lock()?;
        load_node(&conn, id)
    }

    /// The singleton `goal` root, if seeded.
    pub fn root(&self) -> Result<Option<Node>> {
        let conn = self.lock()?;
        let id: Option<i64> = conn
            .query_row("SELECT id FROM nodes WHERE kind = 'goal'", [], |r| r.get(0))
            .optional()
            .map_err(db_err)?;
        match id {
            Some(id) => Ok(Some(load_node(&conn, NodeId(id))?)),
            None => Ok(None),
        }
    }

    /// Pending nodes whose every need is `complete` and whose parent is
    /// either the `goal` root or itself `active` (parents must be alive to
    /// supervise their subtree). Ascending id: the scheduler's tie-break.
    pub fn ready_set(&self) -> Result<Vec<NodeId>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT n.id FROM nodes n \
                 WHERE n.status = 'pending' \
                 AND NOT EXISTS ( \
                     SELECT 1 FROM dependencies d JOIN nodes t ON t.id = d.to_id \
                     WHERE d.from_id = n.id AND t.status != 'complete') \
                 AND (n.parent_id IS NULL OR EXISTS ( \
                     SELECT 1 FROM nodes p WHERE p.id = n.parent_id \
                     AND (p.kind = 'goal' OR p.status = 'active'))) \
                 ORDER BY n.id",
            )
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(ids.into_iter().map(NodeId).collect())
    }

    /// Completed, not-yet-synthesized parents whose every child is terminal.
    pub fn synthesis_candidates(&self) -> Result<Vec<NodeId>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT n.id FROM nodes n \
                 WHERE n.status = 'complete' AND n.synthesized = 0 \
                 AND EXISTS (SELECT 1 FROM nodes c WHERE c.parent_id = n.id) \
                 AND NOT EXISTS ( \
                     SELECT 1 FROM nodes c WHERE c.parent_id = n.id \
                     AND c.status NOT IN ('complete', 'cancelled', 'failed')) \
                 ORDER BY n.id",
            )
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(ids.into_iter().map(NodeId).collect())
    }

    /// `id` plus all transitive descendants, ascending id.
    pub fn subtree(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let conn = self.lock()?;
        if !node_exists(&conn, id)? {
            return Err(Error::NotFound(id));
        }
        collect_subtree(&conn, id)
    }

    /// True when `a` is a strict ancestor of `b`.
    pub fn is_ancestor(&self, a: NodeId, b: NodeId) -> Result<bool> {
        let conn = self.lock()?;
        if !node_exists(&conn, b)? {
            return Err(Error::NotFound(b));
        }
        is_strict_descendant(&conn, b, a)
    }

    /// Ancestor chain of `id`, root first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<Node>> {
        let conn = self.lock()?;
        let mut chain = Vec::new();
        let mut current = load_node(&conn, id)?;
        while let Some(parent) = current.parent_id {
            current = load_node(&conn, parent)?;
            chain.push(current.clone());
        }
        chain.reverse();
        Ok(chain)
    }

    /// Children of `id` in ordinal order.
    pub fn children(&self, id: NodeId) -> Result<Vec<Node>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM nodes WHERE parent_id = ?1 ORDER BY ordinal")
            .map_err(db_err)?;
        let ids = stmt
            .query_map(params![id.0], |r| r.get::<_, i64>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        ids.into_iter().map(|i| load_node(&conn, NodeId(i))).collect()
    }

    /// Resolved need targets of `id`, in insertion order.
    pub fn needs_of(&self, id: NodeId) -> Result<Vec<Node>> {
        let conn = self.lock()?;
        let node = load_node(&conn, id)?;
        node.needs
            .iter()
            .map(|n| load_node(&conn, *n))
            .collect()
    }

    /// Consistent read across all nodes.
    pub fn snapshot(&self) -> Result<TreeSnapshot> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM nodes ORDER BY id")
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        let nodes = ids
            .into_iter()
            .map(|i| load_node(&conn, NodeId(i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(TreeSnapshot { nodes })
    }

    /// Nodes currently in `active` status, ascending id.
    pub fn active_nodes(&self) -> Result<Vec<NodeId>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM nodes WHERE status = 'active' ORDER BY id")
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(ids.into_iter().map(NodeId).collect())
    }

    /// The run terminates when every node is terminal and no parent still
    /// awaits its synthesis relaunch.
    pub fn is_finished(&self) -> Result<bool> {
        let nonterminal = {
            let conn = self.lock()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM nodes \
                     WHERE status IN ('pending', 'active', 'paused')",
                    [],
                    |r| r.get(0),
                )
                .map_err(db_err)?;
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))
                .map_err(db_err)?;
            if total == 0 {
                return Ok(false);
            }
            count
        };
        Ok(nonterminal == 0 && self.synthesis_candidates()?.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Connection-level helpers (usable inside transactions)
// ---------------------------------------------------------------------------

fn next_tick(conn: &Connection) -> Result<i64> {
    conn.execute("UPDATE ticks SET tick = tick + 1 WHERE id = 1", [])
        .map_err(db_err)?;
    conn.query_row("SELECT tick FROM ticks WHERE id = 1", [], |r| r.get(0))
        .map_err(db_err)
}

fn node_exists(conn: &Connection, id: NodeId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM nodes WHERE id = ?1", params![id.0], |r| {
            r.get(0)
        })
        .optional()
        .map_err(db_err)?;
    Ok(found.is_some())
}

fn current_status(conn: &Connection, id: NodeId) -> Result<Status> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM nodes WHERE id = ?1",
            params![id.0],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)?;
    match status {
        Some(s) => parse_status(&s),
        None => Err(Error::NotFound(id)),
    }
}

fn parse_status(s: &str) -> Result<Status> {
    Status::parse(s).ok_or_else(|| Error::storage(format!("unknown status in store: {}", s)))
}

/// Walk the parent chain of `node` upward; true if it passes through
/// `ancestor` before the root.
fn is_strict_descendant(conn: &Connection, node: NodeId, ancestor: NodeId) -> Result<bool> {
    let mut current = node;
    loop {
        let parent: Option<i64> = conn
            .query_row(
                "SELECT parent_id FROM nodes WHERE id = ?1",
                params![current.0],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?
            .flatten();
        match parent {
            Some(p) if p == ancestor.0 => return Ok(true),
            Some(p) => current = NodeId(p),
            None => return Ok(false),
        }
    }
}

fn collect_subtree(conn: &Connection, id: NodeId) -> Result<Vec<NodeId>> {
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE sub(id) AS ( \
                 SELECT ?1 \
                 UNION ALL \
                 SELECT n.id FROM nodes n JOIN sub s ON n.parent_id = s.id) \
             SELECT id FROM sub ORDER BY id",
        )
        .map_err(db_err)?;
    let ids = stmt
        .query_map(params![id.0], |r| r.get::<_, i64>(0))
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(ids.into_iter().map(NodeId).collect())
}

fn load_node(conn: &Connection, id: NodeId) -> Result<Node> {
    let row = conn
        .query_row(
            "SELECT id, kind, parent_id, ordinal, goal, prompt, returns, status, result, \
             synthesized, ask_target, ask_default, ask_timeout_ms, created_at, updated_at \
             FROM nodes WHERE id = ?1",
            params![id.0],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<i64>>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, Option<String>>(8)?,
                    r.get::<_, bool>(9)?,
                    r.get::<_, Option<String>>(10)?,
                    r.get::<_, Option<String>>(11)?,
                    r.get::<_, Option<i64>>(12)?,
                    r.get::<_, i64>(13)?,
                    r.get::<_, i64>(14)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?
        .ok_or(Error::NotFound(id))?;

    let mut stmt = conn
        .prepare("SELECT to_id FROM dependencies WHERE from_id = ?1 ORDER BY rowid")
        .map_err(db_err)?;
    let needs = stmt
        .query_map(params![row.0], |r| r.get::<_, i64>(0))
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;

    Ok(Node {
        id: NodeId(row.0),
        kind: Kind::parse(&row.1)
            .ok_or_else(|| Error::storage(format!("unknown kind in store: {}", row.1)))?,
        parent_id: row.2.map(NodeId),
        ordinal: row.3,
        goal: row.4,
        prompt: row.5,
        returns: Returns::parse(&row.6)
            .ok_or_else(|| Error::storage(format!("unknown returns in store: {}", row.6)))?,
        status: parse_status(&row.7)?,
        result: row.8,
        synthesized: row.9,
        ask_target: match row.10 {
            Some(t) => Some(
                AskTarget::parse(&t)
                    .ok_or_else(|| Error::storage(format!("unknown ask target: {}", t)))?,
            ),
            None => None,
        },
        ask_default: row.11,
        ask_timeout_ms: row.12.map(|t| t as u64),
        created_at: row.13,
        updated_at: row.14,
        needs: needs.into_iter().map(NodeId).collect(),
    })
}
