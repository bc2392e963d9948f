use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the journal database.
///
/// Every task runs on one dedicated writer thread that owns the only
/// `Connection`, so tasks never interleave. The quota check-and-increment
/// relies on this: a task that opens a transaction sees no concurrent writer.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("nailnote-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Runs `task` on the writer thread. Once sent, the task runs to
    /// completion even if the caller stops awaiting the reply.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Runs `task` inside an IMMEDIATE transaction on the writer thread.
    ///
    /// The write lock is taken before the first read, so a check followed by
    /// a write (quota row creation, conditional billing) cannot be split by
    /// another connection to the same file. The transaction commits when
    /// `task` returns `Ok` and rolls back when it returns `Err`.
    pub async fn execute_immediate<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .context("failed to begin immediate transaction")?;
            let value = task(&tx)?;
            tx.commit().context("failed to commit transaction")?;
            Ok(value)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn opens_and_migrates_schema() {
        let dir = TempDir::new().expect("tempdir");
        let db = Database::new(dir.path().join("data").join("journal.sqlite3")).expect("open");

        let tables: Vec<String> = db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .expect("list tables");

        for expected in ["entries", "entry_used_items", "products", "score_records", "usage_quotas"] {
            assert!(tables.iter().any(|name| name == expected), "missing {expected}");
        }
        assert!(db.path().ends_with("journal.sqlite3"));
    }

    async fn product_count(db: &Database) -> i64 {
        db.execute(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?)
        })
        .await
        .expect("count")
    }

    #[tokio::test]
    async fn immediate_task_commits_on_success() {
        let dir = TempDir::new().expect("tempdir");
        let db = Database::new(dir.path().join("journal.sqlite3")).expect("open");

        let inserted = db
            .execute_immediate(|tx| {
                Ok(tx.execute(
                    "INSERT INTO products (id, name, created_at, updated_at)
                     VALUES ('p1', 'Base gel', '2026-10-18T00:00:00Z', '2026-10-18T00:00:00Z')",
                    [],
                )?)
            })
            .await
            .expect("insert");
        assert_eq!(inserted, 1);
        assert_eq!(product_count(&db).await, 1);
    }

    #[tokio::test]
    async fn immediate_task_error_rolls_back() {
        let dir = TempDir::new().expect("tempdir");
        let db = Database::new(dir.path().join("journal.sqlite3")).expect("open");

        let result: Result<()> = db
            .execute_immediate(|tx| {
                tx.execute(
                    "INSERT INTO products (id, name, created_at, updated_at)
                     VALUES ('p1', 'Base gel', '2026-10-18T00:00:00Z', '2026-10-18T00:00:00Z')",
                    [],
                )?;
                Err(anyhow!("abort after insert"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(product_count(&db).await, 0);
    }

    #[tokio::test]
    async fn reopening_keeps_schema_version() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("journal.sqlite3");
        drop(Database::new(path.clone()).expect("first open"));

        let db = Database::new(path).expect("second open");
        let version: i32 = db
            .execute(|conn| Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?))
            .await
            .expect("version");
        assert_eq!(version, super::super::migrations::CURRENT_SCHEMA_VERSION);
    }
}
