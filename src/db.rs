use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension, Params, Row};
use thiserror::Error;
use tracing::{debug, info};

use crate::fixtures::EventFactory;
use crate::models::{Event, EventCandidate, NewEvent, UniquenessKey};
use crate::utils;
use crate::validation::{self, Field, ValidationErrors, Violation, ViolationKind};

const EVENT_COLUMNS: &str = "id, category, name, venue, address, latitude, longitude, link, \
                             price, description, datetime, created_at, updated_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    #[error("event {0} not found")]
    NotFound(i64),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            StoreError::Invalid(errors) => errors.violations(),
            _ => &[],
        }
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        utils::ensure_parent(path);
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        debug!(path = ?path, "event store opened");
        Ok(store)
    }

    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&utils::database_path())
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                name TEXT NOT NULL,
                venue TEXT,
                address TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                link TEXT NOT NULL,
                price REAL,
                description TEXT,
                datetime TEXT NOT NULL,
                name_key TEXT NOT NULL,
                key_digest TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS events_datetime_idx ON events(datetime);",
        )?;
        Ok(())
    }

    /// Inserts the fixture events when the table is empty. Returns how many were added.
    pub fn seed_if_empty(&mut self) -> Result<usize, StoreError> {
        if self.count()? > 0 {
            return Ok(0);
        }
        let samples = EventFactory::sample_events(Utc::now());
        for candidate in &samples {
            self.insert(candidate)?;
        }
        Ok(samples.len())
    }

    /// Validates `candidate` against the rows sharing its key and stores it.
    ///
    /// Any `id` on the candidate is ignored; the row gets a fresh one.
    pub fn insert(&mut self, candidate: &EventCandidate) -> Result<Event, StoreError> {
        let candidate = EventCandidate {
            id: None,
            ..candidate.clone()
        };
        let tx = self.conn.transaction()?;
        let existing = match candidate.uniqueness_key() {
            Some(key) => select_by_key(&tx, &key)?,
            None => Vec::new(),
        };
        let fields = validation::validate_new(&candidate, &existing)?;

        let key = fields.key();
        let now = Utc::now();
        tx.execute(
            "INSERT INTO events (category, name, venue, address, latitude, longitude, link,
                                 price, description, datetime, name_key, key_digest,
                                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                fields.category,
                fields.name,
                fields.venue,
                fields.address,
                fields.latitude,
                fields.longitude,
                fields.link,
                fields.price,
                fields.description,
                fields.datetime,
                key.name,
                key.digest(),
                now,
            ],
        )
        .map_err(duplicate_or_sqlite)?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(id, name = %fields.name, "event stored");
        Ok(fields.into_event(id, now, now))
    }

    /// Replaces every field of row `id` with the candidate's values.
    pub fn update(&mut self, id: i64, candidate: &EventCandidate) -> Result<Event, StoreError> {
        let candidate = EventCandidate {
            id: Some(id),
            ..candidate.clone()
        };
        let tx = self.conn.transaction()?;
        let current = select_one(&tx, id)?.ok_or(StoreError::NotFound(id))?;
        let existing = match candidate.uniqueness_key() {
            Some(key) => select_by_key(&tx, &key)?,
            None => Vec::new(),
        };
        let fields: NewEvent = validation::validate_new(&candidate, &existing)?;

        let key = fields.key();
        let now = Utc::now();
        tx.execute(
            "UPDATE events SET category = ?2, name = ?3, venue = ?4, address = ?5,
                    latitude = ?6, longitude = ?7, link = ?8, price = ?9, description = ?10,
                    datetime = ?11, name_key = ?12, key_digest = ?13, updated_at = ?14
             WHERE id = ?1",
            params![
                id,
                fields.category,
                fields.name,
                fields.venue,
                fields.address,
                fields.latitude,
                fields.longitude,
                fields.link,
                fields.price,
                fields.description,
                fields.datetime,
                key.name,
                key.digest(),
                now,
            ],
        )
        .map_err(duplicate_or_sqlite)?;
        tx.commit()?;

        info!(id, name = %fields.name, "event updated");
        Ok(fields.into_event(id, current.created_at, now))
    }

    pub fn get(&self, id: i64) -> Result<Event, StoreError> {
        select_one(&self.conn, id)?.ok_or(StoreError::NotFound(id))
    }

    pub fn list(&self) -> Result<Vec<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY datetime, id");
        Ok(query_events(&self.conn, &sql, params![])?)
    }

    /// Stored events sharing `key`; the snapshot handed to the validator.
    pub fn snapshot_for(&self, key: &UniquenessKey) -> Result<Vec<Event>, StoreError> {
        Ok(select_by_key(&self.conn, key)?)
    }

    pub fn find_by_key(&self, key: &UniquenessKey) -> Result<Option<Event>, StoreError> {
        Ok(select_by_key(&self.conn, key)?.into_iter().next())
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!(id, "event deleted");
        Ok(())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn select_one(conn: &Connection, id: i64) -> rusqlite::Result<Option<Event>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_event).optional()
}

fn select_by_key(conn: &Connection, key: &UniquenessKey) -> rusqlite::Result<Vec<Event>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE key_digest = ?1");
    query_events(conn, &sql, params![key.digest()])
}

fn query_events<P: Params>(conn: &Connection, sql: &str, args: P) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, row_to_event)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        category: row.get(1)?,
        name: row.get(2)?,
        venue: row.get(3)?,
        address: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        link: row.get(7)?,
        price: row.get(8)?,
        description: row.get(9)?,
        datetime: row.get::<_, DateTime<Utc>>(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

// The UNIQUE index catches a concurrent writer that slipped past the snapshot.
fn duplicate_or_sqlite(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Invalid(ValidationErrors(vec![Violation::new(
                Field::Name,
                ViolationKind::DuplicateKey,
            )]))
        }
        _ => StoreError::Sqlite(err),
    }
}
