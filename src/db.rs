//! SQLite storage slot with Diesel ORM
//!
//! Keeps the serialized collection in a single row of a key/value table, so one
//! database file can hold several named slots side by side.

use crate::schema::storage_slots;
use crate::storage::{StorageError, StorageSlot};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::path::Path;

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Insertable slot row
#[derive(Insertable)]
#[diesel(table_name = storage_slots)]
struct NewSlotRow<'a> {
    name: &'a str,
    payload: &'a str,
    updated_at: &'a str,
}

/// Queryable slot row
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = storage_slots)]
pub struct StoredSlot {
    pub name: String,
    pub payload: String,
    pub updated_at: String,
}

/// Slot stored as one row of `storage_slots`
pub struct SqliteSlot {
    pool: DbPool,
    path: String,
    slot: String,
    location: String,
}

impl SqliteSlot {
    /// Open (and create if needed) the database at `path`
    pub fn open_at<P: AsRef<Path>>(path: P, slot: &str) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(2)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let db = Self {
            pool,
            slot: slot.to_string(),
            location: format!("{}#{}", path_str, slot),
            path: path_str,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> Result<DbConn, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS storage_slots (
                name TEXT PRIMARY KEY NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;

        Ok(())
    }

    fn write_row(&self, name: &str, payload: &str) -> Result<(), StorageError> {
        let mut conn = self.get_conn()?;
        let now = chrono::Local::now().to_rfc3339();

        let row = NewSlotRow {
            name,
            payload,
            updated_at: &now,
        };

        diesel::replace_into(storage_slots::table)
            .values(&row)
            .execute(&mut conn)?;

        Ok(())
    }

    /// Every slot held in this database
    pub fn list_slots(&self) -> Result<Vec<StoredSlot>, StorageError> {
        let mut conn = self.get_conn()?;
        let rows = storage_slots::table
            .order(storage_slots::name.asc())
            .select(StoredSlot::as_select())
            .load(&mut conn)?;
        Ok(rows)
    }
}

impl StorageSlot for SqliteSlot {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let mut conn = self.get_conn()?;
        let payload = storage_slots::table
            .filter(storage_slots::name.eq(&self.slot))
            .select(storage_slots::payload)
            .first::<String>(&mut conn)
            .optional()?;
        Ok(payload)
    }

    fn store(&self, payload: &str) -> Result<(), StorageError> {
        self.write_row(&self.slot, payload)
    }

    fn backup(&self, payload: &str) -> Result<String, StorageError> {
        let name = format!("{}.bak", self.slot);
        self.write_row(&name, payload)?;
        Ok(format!("{}#{}", self.path, name))
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}
