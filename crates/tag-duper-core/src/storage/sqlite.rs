use rusqlite::{Connection, OpenFlags, Result};
use std::path::Path;
use tracing::debug;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open an existing catalog. The file must already exist; catalogs are
    /// created by the tagging tool, not by us.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI,
        )?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.ensure_schema()?;
        debug!("Opened catalog {}", path.display());
        Ok(db)
    }

    /// Open a catalog, creating the database file if it does not exist yet.
    /// Indexes are only added to catalogs created here.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let is_new = !path.exists();
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.ensure_schema()?;
        if is_new {
            db.create_indexes()?;
        }
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.ensure_schema()?;
        db.create_indexes()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (foreign keys, 64MB cache)");
        Ok(())
    }

    /// Create any missing catalog tables. Existing tables are left untouched:
    /// the schema belongs to the catalog, which other tools share.
    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        debug!("Catalog schema verified");
        Ok(())
    }

    fn create_indexes(&self) -> Result<()> {
        self.conn.execute_batch(include_str!("indexes.sql"))?;
        debug!("Catalog indexes created");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
