//! SQLite store for users, trees and links
//!
//! Every operation that touches a private resource folds the ownership
//! predicate into the same SQL statement as its effect, so there is no
//! window between checking ownership and writing.
//!
//! ## Tables
//!
//! - `users` - accounts (email and username unique)
//! - `trees` - one public page per user
//! - `links` - ordered links on a tree
//! - `schema_version` - applied migration version

pub mod connect;
pub mod links;
pub mod models;
pub mod schema;
pub mod trees;
pub mod users;

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::{ffi, Connection, ErrorCode};
use tracing::{debug, info, warn};

use crate::types::ChainhubError;

pub use connect::connect;
pub use models::{Link, LinkInput, Tree, User};
pub use schema::{migrate, MigrationReport, SCHEMA_VERSION};

/// How long a statement waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite virtual machine steps between deadline checks
const DEADLINE_CHECK_OPS: i32 = 1000;

const PHASE_WAITING: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_ABANDONED: u8 = 2;

/// Deadline shared between a request and the store work it started.
///
/// Whichever side moves first decides the outcome: the store work claims
/// the deadline when it gets the connection, or the request abandons it
/// after timing out. Abandoned work never touches the database.
#[derive(Debug)]
pub struct Deadline {
    at: Instant,
    phase: AtomicU8,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            phase: AtomicU8::new(PHASE_WAITING),
        }
    }

    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Give up on work that has not started yet.
    ///
    /// Returns false when the work already holds the connection; it will
    /// then finish or be interrupted on its own and its result stands.
    pub fn abandon(&self) -> bool {
        self.phase
            .compare_exchange(
                PHASE_WAITING,
                PHASE_ABANDONED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn claim(&self) -> bool {
        match self.phase.compare_exchange(
            PHASE_WAITING,
            PHASE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == PHASE_RUNNING,
        }
    }
}

/// Error reported for store work that missed its deadline
pub fn deadline_exceeded() -> ChainhubError {
    ChainhubError::Internal("store operation exceeded its deadline".into())
}

/// SQLite database handle shared by all requests.
///
/// Cloning is cheap and shares the connection. A clone made with
/// [`Store::with_deadline`] refuses to start work once its deadline is
/// abandoned and interrupts statements still running past it.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    deadline: Option<Arc<Deadline>>,
}

impl Store {
    /// Open or create the database file at `path`
    pub fn open(path: &Path) -> Result<Self, ChainhubError> {
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| ChainhubError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // WAL keeps commits cheap and lets other processes read during a write
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| ChainhubError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        Self::configure(conn)
    }

    /// Open a migrated in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, ChainhubError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            ChainhubError::Internal(format!("Failed to open in-memory SQLite: {}", e))
        })?;

        let store = Self::configure(conn)?;
        migrate(&store)?;
        Ok(store)
    }

    fn configure(conn: Connection) -> Result<Self, ChainhubError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ChainhubError::Internal(format!("Failed to set PRAGMA: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            deadline: None,
        })
    }

    /// Handle on the same connection whose work is bound by `deadline`
    pub fn with_deadline(&self, deadline: Arc<Deadline>) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            deadline: Some(deadline),
        }
    }

    /// Run `f` with shared access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ChainhubError>
    where
        F: FnOnce(&Connection) -> Result<T, ChainhubError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ChainhubError::Internal(format!("Lock poisoned: {}", e)))?;
        self.guarded(&mut conn, |conn| f(conn))
    }

    /// Run `f` with exclusive access, for transactions
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, ChainhubError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ChainhubError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ChainhubError::Internal(format!("Lock poisoned: {}", e)))?;

        self.guarded(&mut conn, f)
    }

    /// Check the database answers a trivial query
    pub fn ping(&self) -> Result<(), ChainhubError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    /// Run `f` under this handle's deadline, if it has one
    fn guarded<T>(
        &self,
        conn: &mut Connection,
        f: impl FnOnce(&mut Connection) -> Result<T, ChainhubError>,
    ) -> Result<T, ChainhubError> {
        let Some(deadline) = self.deadline.as_deref() else {
            return f(conn);
        };
        if !deadline.claim() {
            debug!("Skipping store work abandoned by its request");
            return Err(deadline_exceeded());
        }

        install_deadline(conn, deadline.at);
        let result = f(conn);
        clear_deadline(conn);
        finish(deadline, result)
    }
}

/// Make SQLite abort any statement still running at `at`
fn install_deadline(conn: &Connection, at: Instant) {
    let _ = conn.progress_handler(DEADLINE_CHECK_OPS, Some(move || Instant::now() >= at));
}

fn clear_deadline(conn: &Connection) {
    let _ = conn.progress_handler(0, None::<fn() -> bool>);
}

fn finish<T>(
    deadline: &Deadline,
    result: Result<T, ChainhubError>,
) -> Result<T, ChainhubError> {
    match result {
        Err(e) if deadline.has_passed() => {
            warn!("Store work interrupted at deadline: {}", e);
            Err(deadline_exceeded())
        }
        other => other,
    }
}

/// True when `err` is a UNIQUE or PRIMARY KEY constraint violation.
///
/// Other constraint failures (NOT NULL, CHECK, FOREIGN KEY) are not
/// uniqueness conflicts and must not be reported as duplicates.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// True when `err` is a FOREIGN KEY constraint violation
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}
