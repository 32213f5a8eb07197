use crate::config::Config;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

mod embeddings;
mod proposals;
pub mod schema;
mod votes;

pub use embeddings::{pack_embedding, unpack_embedding, ChunkEmbedding};

const LAST_SYNC_KEY: &str = "last_sync";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The local proposal cache. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self> {
        ensure_parent_dir(&config.database_url)?;
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets readers proceed while a sync or index job holds the write lock.
        // In-memory databases silently stay in "memory" mode.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self::open(":memory:")?;
        db.execute_init()?;
        Ok(db)
    }

    pub fn execute_init(&self) -> Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.conn();
        conn.execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs a store call on the blocking pool so async callers never hold the
    /// connection lock on a runtime worker.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Sync metadata ---

    /// Unix seconds of the last completed sync, `None` if never synced.
    pub fn get_last_sync_time(&self) -> Result<Option<i64>> {
        let conn = self.conn();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM sync_metadata WHERE key = ?1",
                [LAST_SYNC_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.and_then(|v| v.parse().ok()))
    }

    pub fn set_last_sync_time(&self, ts: i64) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (LAST_SYNC_KEY, ts.to_string()),
        )?;
        Ok(())
    }
}

pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{Proposal, ProposalStatus, Vote, VoteSupport};

    pub fn proposal(number: i64, title: &str, status: ProposalStatus) -> Proposal {
        Proposal {
            id: format!("0x{:04x}", number),
            proposal_number: number,
            title: title.to_string(),
            description: format!("Description for {}", title),
            proposer: "0xproposer".to_string(),
            status,
            time_created: 1_700_000_000 + number * 100,
            vote_start: 1_700_000_000 + number * 100 + 10,
            vote_end: 1_700_000_000 + number * 100 + 50,
            snapshot_block: 1000 + number,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            quorum_votes: 3,
            executed: false,
            canceled: false,
            vetoed: false,
            queued: false,
            transaction_hash: format!("0xtx{}", number),
            expires_at: None,
            executable_from: None,
            updated_at: 0,
        }
    }

    pub fn vote(proposal: &Proposal, voter: &str, support: VoteSupport, ts: i64) -> Vote {
        Vote {
            id: format!("{}-{}-{}", proposal.id, voter, ts),
            proposal_id: proposal.id.clone(),
            proposal_number: proposal.proposal_number,
            voter: voter.to_string(),
            support,
            weight: 1,
            reason: None,
            timestamp: ts,
            transaction_hash: format!("0xvote{}", ts),
        }
    }
}

/// Creates the directory holding a file-backed database.
fn ensure_parent_dir(database_url: &str) -> Result<()> {
    if database_url == ":memory:" {
        return Ok(());
    }
    match Path::new(database_url).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(std::fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.execute_init().unwrap();

        let conn = db.conn();
        for table in ["proposals", "votes", "embeddings", "sync_metadata"] {
            let exists = conn
                .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
                .unwrap()
                .exists([table])
                .unwrap();
            assert!(exists, "missing table {}", table);
        }
    }

    #[test]
    fn test_last_sync_time() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_last_sync_time().unwrap(), None);

        db.set_last_sync_time(1_700_000_000).unwrap();
        assert_eq!(db.get_last_sync_time().unwrap(), Some(1_700_000_000));

        db.set_last_sync_time(1_700_000_500).unwrap();
        assert_eq!(db.get_last_sync_time().unwrap(), Some(1_700_000_500));

        // Overwritten, never appended.
        let conn = db.conn();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_metadata", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let db = Database::open_in_memory().unwrap();
        db.run_blocking(|db| db.set_last_sync_time(42)).await.unwrap();
        let ts = db.run_blocking(|db| db.get_last_sync_time()).await.unwrap();
        assert_eq!(ts, Some(42));
    }

    #[test]
    fn test_unwritable_parent_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let url = blocker.join("nested").join("proposals.db");
        let err = ensure_parent_dir(url.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, crate::error::CacheError::Io(_)));

        let url = dir.path().join("fresh").join("proposals.db");
        ensure_parent_dir(url.to_str().unwrap()).unwrap();
        assert!(dir.path().join("fresh").is_dir());
        ensure_parent_dir(":memory:").unwrap();
    }
}
