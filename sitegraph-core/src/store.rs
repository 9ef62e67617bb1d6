use crate::layout::{Position, Positions};
use crate::projection::Projection;
use rusqlite::{Connection, OptionalExtension, Result, params};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// SQLite-backed home for projected graphs.
///
/// Hands out durable node ids (`assign_ids`) and keeps node rows,
/// positions and edges per project.
pub struct GraphStore {
    conn: Connection,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

impl GraphStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn remove(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = GraphStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = GraphStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    sitemap_url TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    url TEXT NOT NULL,
    path TEXT NOT NULL DEFAULT '',
    title TEXT,
    depth INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT,

    -- Graph positioning
    position_x REAL,
    position_y REAL,

    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE,
    UNIQUE(project_id, url)
);

CREATE INDEX IF NOT EXISTS idx_nodes_project ON nodes(project_id);
CREATE INDEX IF NOT EXISTS idx_nodes_path ON nodes(project_id, path);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,

    FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY(source_id) REFERENCES nodes(id) ON DELETE CASCADE,
    FOREIGN KEY(target_id) REFERENCES nodes(id) ON DELETE CASCADE,
    UNIQUE(project_id, source_id, target_id)
);

CREATE INDEX IF NOT EXISTS idx_edges_project ON edges(project_id);
            ",
        )?;
        Ok(())
    }

    pub fn create_project(&self, name: &str, sitemap_url: Option<&str>) -> Result<String> {
        let project_id = uuid::Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO projects (id, name, sitemap_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![&project_id, name, sitemap_url, current_timestamp()],
        )?;

        Ok(project_id)
    }

    pub fn project_exists(&self, project_id: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM projects WHERE id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert-or-get a node id for every URL. Existing rows keep their id.
    pub fn assign_ids<S: AsRef<str>>(
        &mut self,
        project_id: &str,
        urls: &[S],
    ) -> Result<HashMap<String, String>> {
        let tx = self.conn.transaction()?;
        let timestamp = current_timestamp();
        let mut ids = HashMap::with_capacity(urls.len());
        let mut created = 0usize;

        {
            let mut select = tx.prepare("SELECT id FROM nodes WHERE project_id = ?1 AND url = ?2")?;
            let mut insert = tx.prepare(
                "INSERT INTO nodes (id, project_id, url, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            )?;

            for url in urls {
                let url = url.as_ref();
                let existing: Option<String> = select
                    .query_row(params![project_id, url], |row| row.get(0))
                    .optional()?;

                let id = match existing {
                    Some(id) => id,
                    None => {
                        let id = uuid::Uuid::new_v4().to_string();
                        insert.execute(params![&id, project_id, url, timestamp])?;
                        created += 1;
                        id
                    }
                };
                ids.insert(url.to_string(), id);
            }
        }

        tx.commit()?;
        debug!("Assigned {} ids ({} new)", ids.len(), created);
        Ok(ids)
    }

    /// Upsert every projected node and replace the project's edges.
    pub fn save_projection(&mut self, project_id: &str, projection: &Projection) -> Result<()> {
        let tx = self.conn.transaction()?;
        let timestamp = current_timestamp();

        {
            let mut upsert = tx.prepare(
                "INSERT INTO nodes (
                    id, project_id, url, path, title, depth, parent_id,
                    position_x, position_y, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    path = excluded.path,
                    title = excluded.title,
                    depth = excluded.depth,
                    parent_id = excluded.parent_id,
                    position_x = excluded.position_x,
                    position_y = excluded.position_y,
                    updated_at = excluded.updated_at",
            )?;

            for node in &projection.nodes {
                upsert.execute(params![
                    &node.id,
                    project_id,
                    &node.url,
                    &node.path,
                    &node.title,
                    node.depth as i64,
                    &node.parent_id,
                    node.position.x,
                    node.position.y,
                    timestamp,
                ])?;
            }

            tx.execute("DELETE FROM edges WHERE project_id = ?1", params![project_id])?;
            let mut insert_edge = tx.prepare(
                "INSERT OR IGNORE INTO edges (project_id, source_id, target_id) VALUES (?1, ?2, ?3)",
            )?;
            for edge in &projection.edges {
                insert_edge.execute(params![project_id, &edge.source, &edge.target])?;
            }
        }

        tx.commit()?;
        debug!(
            "Saved {} nodes and {} edges for project {}",
            projection.node_count(),
            projection.edge_count(),
            project_id
        );
        Ok(())
    }

    /// Stored positions keyed by node path. Nodes never positioned are left out.
    pub fn load_positions(&self, project_id: &str) -> Result<Positions> {
        let mut stmt = self.conn.prepare(
            "SELECT path, position_x, position_y FROM nodes
             WHERE project_id = ?1 AND position_x IS NOT NULL AND position_y IS NOT NULL",
        )?;

        let positions = stmt
            .query_map(params![project_id], |row| {
                Ok((row.get::<_, String>(0)?, Position::new(row.get(1)?, row.get(2)?)))
            })?
            .collect::<Result<Positions>>()?;

        Ok(positions)
    }

    /// Returns false when no node has that id.
    pub fn update_position(&self, node_id: &str, position: Position) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE nodes SET position_x = ?1, position_y = ?2, updated_at = ?3 WHERE id = ?4",
            params![position.x, position.y, current_timestamp(), node_id],
        )?;
        Ok(changed > 0)
    }

    pub fn node_count(&self, project_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn edge_count(&self, project_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
