use super::models::*;
use super::sqlite::Database;
use crate::hasher::{Algorithm, ALGORITHM_SETTING};
use rusqlite::{params, OptionalExtension, Result, Row};
use std::collections::BTreeSet;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const ENTRY_COLUMNS: &str = "id, directory, name, fingerprint, mod_time, size, is_dir";

fn entry_from_row(row: &Row<'_>) -> Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        directory: row.get(1)?,
        name: row.get(2)?,
        fingerprint: row.get(3)?,
        mod_time: row.get(4)?,
        size: row.get(5)?,
        is_dir: row.get(6)?,
    })
}

/// Split a path into the (directory, name) pair the `file` table is keyed on.
/// Relative paths are made absolute against the working directory; symlinks
/// are not resolved.
pub fn split_path(path: &Path) -> io::Result<(String, String)> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    let directory = absolute
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| absolute.to_string_lossy().into_owned());
    let name = absolute
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((directory, name))
}

/// `split_path` for use as query parameters.
fn path_key(path: &Path) -> Result<(String, String)> {
    split_path(path).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

impl Database {
    // ── Catalog Entries ──────────────────────────────────────────

    pub fn all_entries(&self) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM file ORDER BY directory, name",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} catalog entries", entries.len());
        Ok(entries)
    }

    pub fn entry_by_path(&self, path: &Path) -> Result<Option<CatalogEntry>> {
        let (directory, name) = path_key(path)?;
        self.connection()
            .query_row(
                &format!(
                    "SELECT {} FROM file WHERE directory = ?1 AND name = ?2",
                    ENTRY_COLUMNS
                ),
                params![directory, name],
                entry_from_row,
            )
            .optional()
    }

    pub fn file_id(&self, path: &Path) -> Result<Option<i64>> {
        let (directory, name) = path_key(path)?;
        self.connection()
            .query_row(
                "SELECT id FROM file WHERE directory = ?1 AND name = ?2",
                params![directory, name],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn insert_entry(&self, entry: &NewEntry) -> Result<i64> {
        let (directory, name) = path_key(&entry.path)?;
        self.connection().execute(
            "INSERT INTO file (directory, name, fingerprint, mod_time, size, is_dir) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                directory,
                name,
                entry.fingerprint,
                entry.mod_time,
                entry.size,
                entry.is_dir
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn update_fingerprint(
        &self,
        file_id: i64,
        fingerprint: &str,
        mod_time: &str,
        size: i64,
    ) -> Result<()> {
        self.connection().execute(
            "UPDATE file SET fingerprint = ?1, mod_time = ?2, size = ?3 WHERE id = ?4",
            params![fingerprint, mod_time, size, file_id],
        )?;
        Ok(())
    }

    /// Point an existing record at a new (directory, name).
    pub fn move_entry(&self, file_id: i64, new_path: &Path) -> Result<()> {
        let (directory, name) = path_key(new_path)?;
        self.connection().execute(
            "UPDATE file SET directory = ?1, name = ?2 WHERE id = ?3",
            params![directory, name, file_id],
        )?;
        Ok(())
    }

    /// Mark every fingerprint as needing recomputation.
    pub fn invalidate_all_fingerprints(&self) -> Result<usize> {
        let count = self
            .connection()
            .execute("UPDATE file SET size = ?1", params![INVALID_SIZE])?;
        debug!("Invalidated {} fingerprints", count);
        Ok(count)
    }

    // ── Settings ─────────────────────────────────────────────────

    pub fn get_setting(&self, name: &str) -> Result<Option<String>> {
        self.connection()
            .query_row(
                "SELECT value FROM setting WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO setting (name, value) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )?;
        Ok(())
    }

    /// The configured fingerprint algorithm; absent means the default.
    /// An unrecognized stored name is an error, never silently replaced.
    pub fn fingerprint_algorithm(&self) -> Result<Algorithm, crate::Error> {
        match self.get_setting(ALGORITHM_SETTING)? {
            Some(name) => name.parse(),
            None => Ok(Algorithm::default()),
        }
    }

    // ── Tags & Values ────────────────────────────────────────────

    pub fn create_tag(&self, name: &str) -> Result<i64> {
        self.connection()
            .execute("INSERT INTO tag (name) VALUES (?1)", params![name])?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn create_value(&self, name: &str) -> Result<i64> {
        self.connection()
            .execute("INSERT INTO value (name) VALUES (?1)", params![name])?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn tag_id(&self, name: &str) -> Result<Option<i64>> {
        self.connection()
            .query_row(
                "SELECT id FROM tag WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
    }

    // ── Taggings ─────────────────────────────────────────────────

    pub fn taggings_for_file(&self, file_id: i64) -> Result<BTreeSet<Tagging>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT tag_id, value_id FROM file_tag WHERE file_id = ?1",
        )?;
        let taggings = stmt
            .query_map(params![file_id], |row| {
                Ok(Tagging {
                    tag_id: row.get(0)?,
                    value_id: row.get(1)?,
                })
            })?
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(taggings)
    }

    /// Human-readable taggings (`tag` or `tag=value`), sorted.
    pub fn tag_names_for_file(&self, file_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT t.name, v.name FROM file_tag ft \
             JOIN tag t ON t.id = ft.tag_id \
             LEFT JOIN value v ON v.id = ft.value_id \
             WHERE ft.file_id = ?1 \
             ORDER BY t.name, v.name",
        )?;
        let names = stmt
            .query_map(params![file_id], |row| {
                let tag: String = row.get(0)?;
                let value: Option<String> = row.get(1)?;
                Ok(match value {
                    Some(value) => format!("{}={}", tag, value),
                    None => tag,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Apply taggings to a file; taggings it already carries are left alone.
    /// Returns the number of newly added rows.
    pub fn tag_file<'a, I>(&self, file_id: i64, taggings: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Tagging>,
    {
        let mut stmt = self.connection().prepare_cached(
            "INSERT OR IGNORE INTO file_tag (file_id, tag_id, value_id) VALUES (?1, ?2, ?3)",
        )?;
        let mut added = 0;
        for tagging in taggings {
            added += stmt.execute(params![file_id, tagging.tag_id, tagging.value_id])?;
        }
        Ok(added)
    }

    pub fn delete_file_taggings(&self, file_id: i64, path: &Path) -> Result<TaggingsRemoved> {
        let removed = self
            .connection()
            .execute("DELETE FROM file_tag WHERE file_id = ?1", params![file_id])?;
        Ok(TaggingsRemoved {
            file_id,
            path: path.to_path_buf(),
            removed,
        })
    }
}
