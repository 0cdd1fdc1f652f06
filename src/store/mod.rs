use crate::error::AnchorError;
use crate::resolution::fuzzy::CodeBlockCandidate;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

/// Derived semantic tables cleared on re-atomization, in dependency order.
const DERIVED_TABLES: [&str; 5] = [
    "block_incident_links",
    "block_coupling_edges",
    "block_import_edges",
    "block_change_history",
    "code_blocks",
];

/// File identity as recorded by the ingestion pipeline. `(repo_id,
/// canonical_path)` is the unique key; `historical_paths` always contains the
/// canonical path.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    pub repo_id: i64,
    pub canonical_path: String,
    pub historical_paths: Vec<String>,
    pub language: String,
    pub status: String,
}

/// Relational staging store. This engine only reads identities and code
/// blocks; the one mutation it owns is the force-push re-atomization
/// transaction.
pub struct StagingStore {
    conn: Connection,
}

impl StagingStore {
    pub fn open(path: &Path) -> Result<Self, AnchorError> {
        let conn = Connection::open(path)?;
        let store = StagingStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, AnchorError> {
        let conn = Connection::open_in_memory()?;
        let store = StagingStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), AnchorError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY,
                root_path TEXT NOT NULL,
                parent_digest TEXT,
                ingestion_status TEXT NOT NULL DEFAULT 'pending',
                last_checked_at TEXT
            );
            CREATE TABLE IF NOT EXISTS file_identity_map (
                repo_id INTEGER NOT NULL,
                canonical_path TEXT NOT NULL,
                historical_paths TEXT NOT NULL,
                language TEXT NOT NULL,
                status TEXT NOT NULL,
                PRIMARY KEY (repo_id, canonical_path)
            );
            CREATE TABLE IF NOT EXISTS code_blocks (
                id INTEGER PRIMARY KEY,
                repo_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                content TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS block_incident_links (
                id INTEGER PRIMARY KEY,
                repo_id INTEGER NOT NULL,
                block_id INTEGER NOT NULL,
                incident_ref TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS block_coupling_edges (
                id INTEGER PRIMARY KEY,
                repo_id INTEGER NOT NULL,
                src_block_id INTEGER NOT NULL,
                dst_block_id INTEGER NOT NULL,
                weight REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS block_import_edges (
                id INTEGER PRIMARY KEY,
                repo_id INTEGER NOT NULL,
                src_block_id INTEGER NOT NULL,
                dst_path TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS block_change_history (
                id INTEGER PRIMARY KEY,
                repo_id INTEGER NOT NULL,
                block_id INTEGER NOT NULL,
                commit_sha TEXT NOT NULL,
                changed_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Registers a repository row if absent and returns its id.
    pub fn ensure_repository(&self, root_path: &str) -> Result<i64, AnchorError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM repositories WHERE root_path = ?1",
                params![root_path],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO repositories (root_path) VALUES (?1)",
            params![root_path],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn parent_digest(&self, repo_id: i64) -> Result<Option<String>, AnchorError> {
        let digest: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT parent_digest FROM repositories WHERE id = ?1",
                params![repo_id],
                |row| row.get(0),
            )
            .optional()?;

        match digest {
            Some(d) => Ok(d.filter(|d| !d.is_empty())),
            None => Err(AnchorError::Generic(format!("unknown repository id {}", repo_id))),
        }
    }

    pub fn set_parent_digest(&self, repo_id: i64, digest: &str) -> Result<(), AnchorError> {
        self.conn.execute(
            "UPDATE repositories SET parent_digest = ?1, last_checked_at = ?2 WHERE id = ?3",
            params![digest, chrono::Utc::now().to_rfc3339(), repo_id],
        )?;
        Ok(())
    }

    pub fn ingestion_status(&self, repo_id: i64) -> Result<String, AnchorError> {
        Ok(self.conn.query_row(
            "SELECT ingestion_status FROM repositories WHERE id = ?1",
            params![repo_id],
            |row| row.get(0),
        )?)
    }

    /// Atomically clears all derived semantic data for a repository, records
    /// the new digest, and marks the repository for full re-processing. Any
    /// failure rolls the whole transaction back so a retry re-detects the
    /// same digest mismatch.
    pub fn re_atomize(&mut self, repo_id: i64, new_digest: &str) -> Result<(), AnchorError> {
        let tx = self.conn.transaction()?;

        for table in DERIVED_TABLES {
            let deleted = tx.execute(
                &format!("DELETE FROM {} WHERE repo_id = ?1", table),
                params![repo_id],
            )?;
            if deleted > 0 {
                crate::utils::debug_log(&format!("cleared {} rows from {}", deleted, table));
            }
        }

        tx.execute(
            "UPDATE repositories
             SET parent_digest = ?1, ingestion_status = 'rewrite_detected', last_checked_at = ?2
             WHERE id = ?3",
            params![new_digest, chrono::Utc::now().to_rfc3339(), repo_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn upsert_file_identity(&self, identity: &FileIdentity) -> Result<(), AnchorError> {
        let mut historical = identity.historical_paths.clone();
        if !historical.contains(&identity.canonical_path) {
            historical.insert(0, identity.canonical_path.clone());
        }

        self.conn.execute(
            "INSERT INTO file_identity_map (repo_id, canonical_path, historical_paths, language, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (repo_id, canonical_path) DO UPDATE
             SET historical_paths = ?3, language = ?4, status = ?5",
            params![
                identity.repo_id,
                identity.canonical_path,
                serde_json::to_string(&historical)?,
                identity.language,
                identity.status,
            ],
        )?;
        Ok(())
    }

    pub fn file_identity(
        &self,
        repo_id: i64,
        canonical_path: &str,
    ) -> Result<Option<FileIdentity>, AnchorError> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT historical_paths, language, status
                 FROM file_identity_map WHERE repo_id = ?1 AND canonical_path = ?2",
                params![repo_id, canonical_path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((historical_json, language, status)) = row else {
            return Ok(None);
        };

        let mut historical_paths: Vec<String> = serde_json::from_str(&historical_json)?;
        // Invariant: the canonical path is always a member of its own history.
        if !historical_paths.iter().any(|p| p == canonical_path) {
            historical_paths.insert(0, canonical_path.to_string());
        }

        Ok(Some(FileIdentity {
            repo_id,
            canonical_path: canonical_path.to_string(),
            historical_paths,
            language,
            status,
        }))
    }

    pub fn insert_code_block(
        &self,
        repo_id: i64,
        name: &str,
        file_path: &str,
        start_line: usize,
        end_line: usize,
        content: &str,
    ) -> Result<i64, AnchorError> {
        self.conn.execute(
            "INSERT INTO code_blocks (repo_id, name, file_path, start_line, end_line, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![repo_id, name, file_path, start_line, end_line, content],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Candidates for fuzzy resolution: all code blocks sharing one name
    /// within one resolved file.
    pub fn code_block_candidates(
        &self,
        repo_id: i64,
        file_path: &str,
        name: &str,
    ) -> Result<Vec<CodeBlockCandidate>, AnchorError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, file_path, start_line, end_line, content
             FROM code_blocks
             WHERE repo_id = ?1 AND file_path = ?2 AND name = ?3
             ORDER BY start_line",
        )?;

        let rows = stmt.query_map(params![repo_id, file_path, name], |row| {
            Ok(CodeBlockCandidate {
                id: row.get(0)?,
                name: row.get(1)?,
                file_path: row.get(2)?,
                start_line: row.get::<_, i64>(3)? as usize,
                end_line: row.get::<_, i64>(4)? as usize,
                content: row.get(5)?,
            })
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?);
        }
        Ok(candidates)
    }

    /// Seeds a derived row; used by re-atomization tests and ingest tooling.
    pub fn insert_change_history(
        &self,
        repo_id: i64,
        block_id: i64,
        commit_sha: &str,
    ) -> Result<(), AnchorError> {
        self.conn.execute(
            "INSERT INTO block_change_history (repo_id, block_id, commit_sha, changed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![repo_id, block_id, commit_sha, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn count_rows(&self, table: &str, repo_id: i64) -> Result<i64, AnchorError> {
        if !DERIVED_TABLES.contains(&table) {
            return Err(AnchorError::Generic(format!("not a derived table: {}", table)));
        }
        Ok(self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE repo_id = ?1", table),
            params![repo_id],
            |row| row.get(0),
        )?)
    }
}
