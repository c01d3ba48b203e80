//! SQLite persistence for cached playlists.
//!
//! Stable ids are process-scoped, so rows left behind by a previous process
//! are meaningless and get discarded at open. Every content replacement runs
//! in a single transaction so readers never observe a partial playlist, and the
//! previous generation is only retired once nothing can hand out its ids.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::engine::{EntryData, NativeHandle, SourceType};
use crate::error::BridgeResult;
use crate::ids::{EntryId, PlaylistId};

use super::field::{EntryField, FieldValue};

const TAG_COLUMNS: [&str; 5] = ["title", "artist", "album", "date", "genre"];

const ENTRY_COLUMNS: &str = "id, playlist_id, position, native_handle, filename, duration, \
     rating, source_type, title, artist, album, date, genre, bitrate, channels, samplerate, \
     filesize";

/// One cached entry row.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub id: EntryId,
    pub playlist_id: PlaylistId,
    pub position: usize,
    pub data: EntryData,
}

/// Persisted playlist header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPlaylist {
    pub id: PlaylistId,
    pub checksum: u32,
    pub title: String,
    pub entry_count: usize,
}

pub struct PlaylistStore {
    conn: Mutex<Connection>,
}

impl PlaylistStore {
    /// Opens the store at `path`, or in memory when `path` is `None`.
    pub fn open(path: Option<&Path>) -> BridgeResult<Self> {
        let conn = match path {
            Some(path) => {
                log::info!("[PlaylistStore] Opening playlist store at {}", path.display());
                let conn = Connection::open(path)?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn
            }
            None => {
                log::info!("[PlaylistStore] Opening in-memory playlist store");
                Connection::open_in_memory()?
            }
        };

        Self::initialize_schema(&conn)?;
        let discarded = conn.execute("DELETE FROM playlist_entries", [])?;
        conn.execute("DELETE FROM playlists", [])?;
        if discarded > 0 {
            log::info!(
                "[PlaylistStore] Discarded {} entry rows from a previous session",
                discarded
            );
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS playlists (
                id INTEGER PRIMARY KEY,
                crc32 INTEGER NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                entry_count INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS playlist_entries (
                id INTEGER PRIMARY KEY,
                playlist_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                native_handle INTEGER NOT NULL,
                filename TEXT NOT NULL,
                duration INTEGER NOT NULL,
                rating REAL NOT NULL DEFAULT 0,
                source_type INTEGER NOT NULL,
                title TEXT,
                artist TEXT,
                album TEXT,
                date TEXT,
                genre TEXT,
                bitrate INTEGER,
                channels INTEGER,
                samplerate INTEGER,
                filesize INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_entries_playlist
                ON playlist_entries (playlist_id, position);",
        )
    }

    /// Writes a new generation of a playlist: its header and all entry rows,
    /// in one transaction.
    ///
    /// Rows of the previous generation stay readable until
    /// [`retire_entries`](Self::retire_entries) drops them, so ids handed out
    /// before the in-memory swap keep resolving.
    pub fn insert_generation(
        &self,
        id: PlaylistId,
        checksum: u32,
        title: &str,
        entries: &[EntryRecord],
    ) -> BridgeResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO playlists (id, crc32, title, entry_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![id.0, checksum, title, entries.len() as i64],
        )?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO playlist_entries ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                ENTRY_COLUMNS
            ))?;
            for entry in entries {
                let data = &entry.data;
                stmt.execute(params![
                    entry.id.0,
                    entry.playlist_id.0,
                    entry.position as i64,
                    data.handle.0 as i64,
                    data.filename,
                    data.duration.as_millis() as i64,
                    data.rating,
                    data.source_type.as_db(),
                    data.tag("title"),
                    data.tag("artist"),
                    data.tag("album"),
                    data.tag("date"),
                    data.tag("genre"),
                    data.bitrate,
                    data.channels,
                    data.samplerate,
                    data.filesize as i64,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Drops the rows of a superseded generation.
    pub fn retire_entries(&self, entries: &[EntryId]) -> BridgeResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM playlist_entries WHERE id = ?1")?;
            for entry in entries {
                removed += stmt.execute(params![entry.0])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Points existing entry rows at new native handles.
    pub fn rebind_handles(&self, entries: &[(EntryId, NativeHandle)]) -> BridgeResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE playlist_entries SET native_handle = ?2 WHERE id = ?1")?;
            for (entry, handle) in entries {
                stmt.execute(params![entry.0, handle.0 as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes all entry rows of a playlist, keeping its header.
    pub fn remove_entries(&self, id: PlaylistId) -> BridgeResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM playlist_entries WHERE playlist_id = ?1",
            params![id.0],
        )?;
        tx.execute(
            "UPDATE playlists SET entry_count = 0 WHERE id = ?1",
            params![id.0],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    /// Deletes a playlist header and its entry rows.
    pub fn remove_playlist(&self, id: PlaylistId) -> BridgeResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM playlist_entries WHERE playlist_id = ?1",
            params![id.0],
        )?;
        tx.execute("DELETE FROM playlists WHERE id = ?1", params![id.0])?;
        tx.commit()?;
        Ok(())
    }

    pub fn playlist(&self, id: PlaylistId) -> BridgeResult<Option<StoredPlaylist>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, crc32, title, entry_count FROM playlists WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(StoredPlaylist {
                        id: PlaylistId(row.get(0)?),
                        checksum: row.get(1)?,
                        title: row.get(2)?,
                        entry_count: row.get::<_, i64>(3)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Reads a single field of one entry. `None` if the entry does not exist.
    pub fn entry_field(&self, id: EntryId, field: EntryField) -> BridgeResult<Option<FieldValue>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                &format!(
                    "SELECT {} FROM playlist_entries WHERE id = ?1",
                    field.column()
                ),
                params![id.0],
                |row| row.get::<_, rusqlite::types::Value>(0),
            )
            .optional()?;
        Ok(value.map(FieldValue::from))
    }

    pub fn entry(&self, id: EntryId) -> BridgeResult<Option<EntryRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM playlist_entries WHERE id = ?1",
                    ENTRY_COLUMNS
                ),
                params![id.0],
                Self::read_entry,
            )
            .optional()?;
        Ok(record)
    }

    /// Entry rows of a playlist in playlist order.
    pub fn entries(&self, playlist: PlaylistId) -> BridgeResult<Vec<EntryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM playlist_entries WHERE playlist_id = ?1 ORDER BY position ASC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![playlist.0], Self::read_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Playlist an entry row belongs to.
    pub fn entry_playlist(&self, id: EntryId) -> BridgeResult<Option<PlaylistId>> {
        let conn = self.conn.lock();
        let playlist = conn
            .query_row(
                "SELECT playlist_id FROM playlist_entries WHERE id = ?1",
                params![id.0],
                |row| Ok(PlaylistId(row.get(0)?)),
            )
            .optional()?;
        Ok(playlist)
    }

    fn read_entry(row: &Row<'_>) -> rusqlite::Result<EntryRecord> {
        let mut tags = BTreeMap::new();
        for (offset, name) in TAG_COLUMNS.iter().enumerate() {
            if let Some(value) = row.get::<_, Option<String>>(8 + offset)? {
                if !value.is_empty() {
                    tags.insert((*name).to_string(), value);
                }
            }
        }

        Ok(EntryRecord {
            id: EntryId(row.get(0)?),
            playlist_id: PlaylistId(row.get(1)?),
            position: row.get::<_, i64>(2)? as usize,
            data: EntryData {
                handle: NativeHandle(row.get::<_, i64>(3)? as u64),
                filename: row.get(4)?,
                duration: Duration::from_millis(row.get::<_, i64>(5)?.max(0) as u64),
                tags,
                rating: row.get(6)?,
                source_type: SourceType::from_db(row.get(7)?).unwrap_or_default(),
                bitrate: row.get::<_, Option<u32>>(13)?.unwrap_or_default(),
                channels: row.get::<_, Option<u32>>(14)?.unwrap_or_default(),
                samplerate: row.get::<_, Option<u32>>(15)?.unwrap_or_default(),
                filesize: row.get::<_, Option<i64>>(16)?.unwrap_or_default() as u64,
            },
        })
    }
}
