//! SQLite database for persistent journey storage.
//!
//! Every accepted share is written here before it is broadcast, so a client
//! re-querying right after a successful share always sees its record.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::store::{Coordinate, CrowdLevel, LocationStore, LocationUpdate};

/// Database wrapper with thread-safe connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens or creates the database at `path`.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path) -> SqlResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        tracing::info!(path = ?path, "Opening database");

        let conn = Connection::open(path)?;

        // Enable WAL mode for better crash safety
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Opens an in-memory database. Contents vanish with the process.
    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Returns the default database path.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("transit-hub")
            .join("transit.db")
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initializes the database schema.
    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.lock();

        conn.execute_batch(
            r#"
            -- Shared journeys, one row per accepted update
            CREATE TABLE IF NOT EXISTS journeys (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                route TEXT NOT NULL,
                coordinates TEXT NOT NULL,
                crowd TEXT,
                start_point TEXT NOT NULL,
                destination TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT 1,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_journeys_active ON journeys(active);
            "#,
        )?;

        tracing::debug!("Database schema initialized");
        Ok(())
    }

    /// Total number of stored records, active or not.
    pub fn count(&self) -> SqlResult<i64> {
        let conn = self.lock();
        conn.query_row("SELECT COUNT(*) FROM journeys", [], |r| r.get(0))
    }
}

/// Raw column values of one `journeys` row.
struct JourneyRow {
    id: String,
    user_id: String,
    route: String,
    coordinates: String,
    crowd: Option<String>,
    start_point: String,
    destination: String,
    active: bool,
    timestamp: String,
}

impl JourneyRow {
    fn decode(self) -> Result<LocationUpdate, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let coordinates: Vec<Coordinate> = serde_json::from_str(&self.coordinates)
            .map_err(|e| corrupt(format!("coordinates: {}", e)))?;
        let crowd = match self.crowd.as_deref() {
            None => None,
            Some(raw) => Some(
                CrowdLevel::parse(raw).ok_or_else(|| corrupt(format!("crowd level {:?}", raw)))?,
            ),
        };
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| corrupt(format!("timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(LocationUpdate {
            id: self.id,
            user_id: self.user_id,
            route: self.route,
            coordinates,
            crowd,
            start_point: self.start_point,
            destination: self.destination,
            active: self.active,
            timestamp,
        })
    }
}

impl LocationStore for Database {
    fn insert(&self, record: &LocationUpdate) -> Result<(), StoreError> {
        let coordinates = serde_json::to_string(&record.coordinates)?;
        let conn = self.lock();

        conn.execute(
            "INSERT INTO journeys (id, user_id, route, coordinates, crowd, start_point, destination, active, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.user_id,
                record.route,
                coordinates,
                record.crowd.map(|c| c.as_str()),
                record.start_point,
                record.destination,
                record.active,
                record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            ],
        )?;

        Ok(())
    }

    fn find_active(&self) -> Result<Vec<LocationUpdate>, StoreError> {
        let rows = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT id, user_id, route, coordinates, crowd, start_point, destination, active, timestamp
                 FROM journeys WHERE active = 1 ORDER BY seq",
            )?;

            let rows = stmt.query_map([], |row| {
                Ok(JourneyRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    route: row.get(2)?,
                    coordinates: row.get(3)?,
                    crowd: row.get(4)?,
                    start_point: row.get(5)?,
                    destination: row.get(6)?,
                    active: row.get(7)?,
                    timestamp: row.get(8)?,
                })
            })?;

            let collected = rows.collect::<SqlResult<Vec<_>>>()?;
            collected
        };

        rows.into_iter().map(JourneyRow::decode).collect()
    }
}
