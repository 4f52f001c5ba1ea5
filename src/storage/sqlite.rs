//! SQLite storage backend for the curator

use super::traits::{
    EntityFeatureRecord, FeatureStore, OpenStore, StorageError, StorageResult, TripleStore,
};
use crate::graph::Triple;
use crate::perception::FeatureMap;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed triple and feature store
///
/// Uses one database with tables for triples, the valid relation set and
/// entity features. Thread-safe via internal mutexes on the connections.
///
/// Triples and features go through separate connections so that a feature
/// merge commits on its own, independent of any atomic scope a batch holds
/// open on the triple connection. Atomic scopes map to nested SQLite
/// savepoints on the triple connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    feature_conn: Mutex<Connection>,
    /// Number of currently open atomic scopes (savepoint nesting depth).
    depth: AtomicUsize,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Triples: no uniqueness constraint, deduplication is the
            -- curator's job (existence check before every insert)
            CREATE TABLE IF NOT EXISTS knowledge_triples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                head_entity TEXT NOT NULL,
                relation TEXT NOT NULL,
                tail_entity TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_triples_head
                ON knowledge_triples(head_entity, relation);
            CREATE INDEX IF NOT EXISTS idx_triples_tail
                ON knowledge_triples(tail_entity);

            -- Labels the inference oracle may choose from
            CREATE TABLE IF NOT EXISTS valid_relations (
                relation_name TEXT PRIMARY KEY
            );

            -- Per-entity features, last write wins
            CREATE TABLE IF NOT EXISTS entity_features (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_name TEXT NOT NULL,
                feature_type TEXT NOT NULL,
                feature_value TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                updated_at TEXT NOT NULL,
                UNIQUE (entity_name, feature_type)
            );

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    fn from_connections(conn: Connection, feature_conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Self::init_schema(&feature_conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            feature_conn: Mutex::new(feature_conn),
            depth: AtomicUsize::new(0),
        })
    }

    fn validate_triple(triple: &Triple) -> StorageResult<()> {
        if triple.head.is_empty() || triple.relation.is_empty() || triple.tail.is_empty() {
            return Err(StorageError::InvalidInput(format!(
                "triple has an empty field: {}",
                triple
            )));
        }
        Ok(())
    }

    /// Deserialize a feature record from database columns
    fn row_to_feature(
        entity_name: String,
        feature_type: String,
        feature_value: String,
        confidence: f64,
        updated_at: String,
    ) -> StorageResult<EntityFeatureRecord> {
        Ok(EntityFeatureRecord {
            entity_name,
            feature_type,
            feature_value: serde_json::from_str(&feature_value)?,
            confidence,
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| StorageError::DateParse(e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path.as_ref())?;
        let feature_conn = Connection::open(path.as_ref())?;
        Self::from_connections(conn, feature_conn)
    }

    fn open_in_memory() -> StorageResult<Self> {
        // Two private in-memory databases: triples never live in the
        // feature connection's database, so nothing is lost by the split.
        Self::from_connections(Connection::open_in_memory()?, Connection::open_in_memory()?)
    }
}

impl TripleStore for SqliteStore {
    // === Existence checks ===

    fn contains_triple(&self, triple: &Triple) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM knowledge_triples
                           WHERE head_entity = ?1 AND relation = ?2 AND tail_entity = ?3)",
            params![triple.head, triple.relation, triple.tail],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn contains_entity(&self, name: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM knowledge_triples
                           WHERE head_entity = ?1 OR tail_entity = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn are_connected(&self, a: &str, b: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM knowledge_triples
                           WHERE (head_entity = ?1 AND tail_entity = ?2)
                              OR (head_entity = ?2 AND tail_entity = ?1))",
            params![a, b],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // === Writes ===

    fn insert_triple(&self, triple: &Triple) -> StorageResult<()> {
        Self::validate_triple(triple)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO knowledge_triples (head_entity, relation, tail_entity, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![triple.head, triple.relation, triple.tail, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // === Relation vocabulary ===

    fn valid_relations(&self) -> StorageResult<BTreeSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT relation_name FROM valid_relations")?;
        let labels = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(labels)
    }

    fn add_valid_relation(&self, label: &str) -> StorageResult<bool> {
        let label = label.trim();
        if label.is_empty() {
            return Err(StorageError::InvalidInput(
                "relation label must not be empty".to_string(),
            ));
        }
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO valid_relations (relation_name) VALUES (?1)",
            params![label],
        )?;
        Ok(rows > 0)
    }

    // === Inspection ===

    fn triples(&self) -> StorageResult<Vec<Triple>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT head_entity, relation, tail_entity FROM knowledge_triples ORDER BY id",
        )?;
        let triples = stmt
            .query_map([], |row| {
                Ok(Triple::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(triples)
    }

    // === Atomic scopes ===

    fn begin_atomic(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let depth = self.depth.load(Ordering::SeqCst) + 1;
        conn.execute_batch(&format!("SAVEPOINT atomic_{}", depth))?;
        self.depth.store(depth, Ordering::SeqCst);
        Ok(())
    }

    fn commit_atomic(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let depth = self.depth.load(Ordering::SeqCst);
        if depth == 0 {
            return Err(StorageError::AtomicScope(
                "commit without an open scope".to_string(),
            ));
        }
        conn.execute_batch(&format!("RELEASE SAVEPOINT atomic_{}", depth))?;
        self.depth.store(depth - 1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback_atomic(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let depth = self.depth.load(Ordering::SeqCst);
        if depth == 0 {
            return Err(StorageError::AtomicScope(
                "rollback without an open scope".to_string(),
            ));
        }
        conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT atomic_{depth}; RELEASE SAVEPOINT atomic_{depth};"
        ))?;
        self.depth.store(depth - 1, Ordering::SeqCst);
        Ok(())
    }
}

impl FeatureStore for SqliteStore {
    fn merge_features(&self, entity_name: &str, features: &FeatureMap) -> StorageResult<usize> {
        if entity_name.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "entity name must not be empty".to_string(),
            ));
        }

        let mut conn = self.feature_conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO entity_features (entity_name, feature_type, feature_value, confidence, updated_at)
                VALUES (?1, ?2, ?3, 1.0, ?4)
                ON CONFLICT(entity_name, feature_type) DO UPDATE SET
                    feature_value = excluded.feature_value,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for (feature_type, value) in features {
                if feature_type.trim().is_empty() {
                    // Dropping the transaction rolls back fields already written
                    return Err(StorageError::InvalidInput(format!(
                        "empty feature type for entity {}",
                        entity_name
                    )));
                }
                let value_json = serde_json::to_string(value)?;
                stmt.execute(params![entity_name, feature_type, value_json, now])?;
            }
        }
        tx.commit()?;

        Ok(features.len())
    }

    fn load_features(&self, entity_name: &str) -> StorageResult<Vec<EntityFeatureRecord>> {
        let conn = self.feature_conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT entity_name, feature_type, feature_value, confidence, updated_at
             FROM entity_features WHERE entity_name = ?1 ORDER BY feature_type",
        )?;
        let rows = stmt.query_map(params![entity_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (name, feature_type, value, confidence, updated_at) = row?;
            records.push(Self::row_to_feature(name, feature_type, value, confidence, updated_at)?);
        }
        Ok(records)
    }
}
