//! # File Store
//!
//! Durable [`Storage`] keeping one file per table.
//!
//! ## File Format
//!
//! ```text
//! [magic:4 "SPKT"][version:4][table:1]
//! [len:4][payload:len][crc32:4]   repeated, one record per row
//! ```
//!
//! The CRC covers the length and the payload. Commits write each modified
//! table to a temporary file and rename it over the old one, so a crash
//! leaves either the old or the new table, never a mix.
//!
//! A table that fails its integrity check at open is reported as
//! [`StorageError::Corrupt`] on read until it is rewritten.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use spawnkeep_shared::{EntityId, SpawnReason, SpawnerId, WorldId, STATEMENT_TIMEOUT_SECS};
use tracing::{debug, warn};

use crate::backend::{timed, Storage};
use crate::error::{StorageError, StorageResult};
use crate::schema::{EntityRow, SpawnerRow, Table, Tables};

/// Magic bytes for table files.
const TABLE_MAGIC: &[u8; 4] = b"SPKT";

/// Table file format version. Version 2 widened string lengths to `u32`.
const TABLE_VERSION: u32 = 2;

/// Header length: magic + version + table tag.
const HEADER_LEN: usize = 4 + 4 + 1;

/// File-backed [`Storage`].
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    committed: Tables,
    corrupt: HashMap<Table, String>,
    tx: Option<Tables>,
    dirty: HashSet<Table>,
    timeout: Duration,
}

impl FileStore {
    /// Opens the store in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// [`StorageError::Unavailable`] if the directory or a table file cannot
    /// be read.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_timeout(dir, Duration::from_secs(STATEMENT_TIMEOUT_SECS))
    }

    /// Opens the store with a custom statement timeout.
    ///
    /// # Errors
    ///
    /// See [`FileStore::open`].
    pub fn open_with_timeout(dir: impl AsRef<Path>, timeout: Duration) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut store = Self {
            dir,
            committed: Tables::default(),
            corrupt: HashMap::new(),
            tx: None,
            dirty: HashSet::new(),
            timeout,
        };

        for table in Table::ALL {
            let path = store.table_path(table);
            if !path.exists() {
                continue;
            }
            let mut bytes = Vec::new();
            File::open(&path)?.read_to_end(&mut bytes)?;
            if let Err(reason) = decode_table(table, &bytes, &mut store.committed) {
                warn!("Table file {} is corrupt: {reason}", path.display());
                store.committed.truncate(table);
                store.corrupt.insert(table, reason);
            }
        }

        Ok(store)
    }

    fn table_path(&self, table: Table) -> PathBuf {
        let name = match table {
            Table::Spawners => "spawners.tbl",
            Table::Entities => "entities.tbl",
        };
        self.dir.join(name)
    }

    /// Writes one table through a temporary file and an atomic rename.
    fn write_table(&self, table: Table, tables: &Tables) -> StorageResult<()> {
        let path = self.table_path(table);
        let tmp = path.with_extension("tbl.tmp");

        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(TABLE_MAGIC)?;
        writer.write_all(&TABLE_VERSION.to_le_bytes())?;
        writer.write_all(&[table_tag(table)])?;

        let payloads: Vec<Vec<u8>> = match table {
            Table::Spawners => tables.spawners.values().map(encode_spawner).collect(),
            Table::Entities => tables.entities.values().map(encode_entity).collect(),
        };
        for payload in &payloads {
            let len = (payload.len() as u32).to_le_bytes();
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&len);
            hasher.update(payload);
            writer.write_all(&len)?;
            writer.write_all(payload)?;
            writer.write_all(&hasher.finalize().to_le_bytes())?;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&tmp, &path)?;
        debug!("Wrote {} rows to {}", payloads.len(), path.display());
        Ok(())
    }

    /// Persists dirty tables of `tables` and makes them the committed state.
    fn persist(&mut self, tables: Tables) -> StorageResult<()> {
        let mut dirty: Vec<Table> = self.dirty.drain().collect();
        dirty.sort();
        for table in dirty {
            self.write_table(table, &tables)?;
            self.corrupt.remove(&table);
        }
        self.committed = tables;
        Ok(())
    }

    /// Applies a write to the open transaction, or commits it directly.
    fn write(&mut self, table: Table, apply: impl FnOnce(&mut Tables)) -> StorageResult<()> {
        self.dirty.insert(table);
        if let Some(tables) = self.tx.as_mut() {
            apply(tables);
            return Ok(());
        }
        let mut tables = self.committed.clone();
        apply(&mut tables);
        self.persist(tables)
    }

    fn check_readable(&self, table: Table) -> StorageResult<()> {
        // An open transaction that rewrote the table no longer sees the damage.
        if self.tx.is_some() && self.dirty.contains(&table) {
            return Ok(());
        }
        match self.corrupt.get(&table) {
            Some(reason) => Err(StorageError::Corrupt {
                table: table.as_str(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn visible(&self) -> &Tables {
        self.tx.as_ref().unwrap_or(&self.committed)
    }
}

impl Storage for FileStore {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        let timeout = self.timeout;
        timed(timeout, || {
            for table in Table::ALL {
                if !self.table_path(table).exists() {
                    self.write_table(table, &Tables::default())?;
                }
            }
            Ok(())
        })
    }

    fn begin(&mut self) -> StorageResult<()> {
        if self.tx.is_some() {
            return Err(StorageError::Unavailable("transaction already open".to_string()));
        }
        self.dirty.clear();
        self.tx = Some(self.committed.clone());
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        let timeout = self.timeout;
        let tables = self
            .tx
            .take()
            .ok_or_else(|| StorageError::Unavailable("no open transaction".to_string()))?;
        timed(timeout, || self.persist(tables))
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.tx = None;
        self.dirty.clear();
        Ok(())
    }

    fn truncate(&mut self, table: Table) -> StorageResult<()> {
        let timeout = self.timeout;
        timed(timeout, || self.write(table, |tables| tables.truncate(table)))
    }

    fn insert_spawners(&mut self, rows: &[SpawnerRow]) -> StorageResult<()> {
        let timeout = self.timeout;
        timed(timeout, || {
            self.write(Table::Spawners, |tables| tables.insert_spawners(rows))
        })
    }

    fn insert_entities(&mut self, rows: &[EntityRow]) -> StorageResult<()> {
        let timeout = self.timeout;
        timed(timeout, || {
            self.write(Table::Entities, |tables| tables.insert_entities(rows))
        })
    }

    fn read_spawners(&mut self) -> StorageResult<Vec<SpawnerRow>> {
        self.check_readable(Table::Spawners)?;
        Ok(self.visible().spawners.values().cloned().collect())
    }

    fn read_entities(&mut self) -> StorageResult<Vec<EntityRow>> {
        self.check_readable(Table::Entities)?;
        Ok(self.visible().entities.values().cloned().collect())
    }

    fn upsert_spawner(&mut self, row: &SpawnerRow) -> StorageResult<()> {
        let timeout = self.timeout;
        timed(timeout, || {
            self.write(Table::Spawners, |tables| {
                tables.insert_spawners(std::slice::from_ref(row));
            })
        })
    }

    fn delete_spawner(&mut self, id: SpawnerId) -> StorageResult<()> {
        let timeout = self.timeout;
        timed(timeout, || {
            self.write(Table::Spawners, |tables| {
                tables.delete_spawner(id);
            })
        })
    }

    fn reset(&mut self) -> StorageResult<()> {
        self.rollback()?;
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

// =============================================================================
// Record encoding
// =============================================================================

fn table_tag(table: Table) -> u8 {
    match table {
        Table::Spawners => 1,
        Table::Entities => 2,
    }
}

/// Length-prefixed string, `u32` like the record frame.
fn put_str(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

fn encode_spawner(row: &SpawnerRow) -> Vec<u8> {
    let mut buf = Vec::with_capacity(96);
    put_str(&mut buf, &row.id.to_string());
    put_str(&mut buf, &row.type_name);
    put_str(&mut buf, row.world.as_str());
    buf.extend_from_slice(&row.x.to_le_bytes());
    buf.extend_from_slice(&row.y.to_le_bytes());
    buf.extend_from_slice(&row.z.to_le_bytes());
    buf.push(u8::from(row.has_leash));
    buf
}

fn encode_entity(row: &EntityRow) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    put_str(&mut buf, &row.id.to_string());
    put_str(&mut buf, &row.type_name);
    put_str(&mut buf, row.world.as_str());
    buf.extend_from_slice(&row.chunk_x.to_le_bytes());
    buf.extend_from_slice(&row.chunk_z.to_le_bytes());
    put_str(&mut buf, row.reason.as_str());
    match row.spawner_id {
        Some(id) => {
            buf.push(1);
            put_str(&mut buf, &id.to_string());
        }
        None => buf.push(0),
    }
    buf
}

/// Cursor over one record payload.
struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len());
        let Some(end) = end else {
            return Err(format!("record truncated at byte {}", self.pos));
        };
        let buf: &'a [u8] = self.buf;
        let bytes = &buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, String> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn str(&mut self) -> Result<String, String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

fn decode_spawner(payload: &[u8]) -> Result<SpawnerRow, String> {
    let mut d = Decoder::new(payload);
    let id: SpawnerId = d.str()?.parse().map_err(|e| format!("{e}"))?;
    Ok(SpawnerRow {
        id,
        type_name: d.str()?,
        world: WorldId::new(d.str()?),
        x: d.i32()?,
        y: d.i32()?,
        z: d.i32()?,
        has_leash: d.u8()? != 0,
    })
}

fn decode_entity(payload: &[u8]) -> Result<EntityRow, String> {
    let mut d = Decoder::new(payload);
    let id: EntityId = d.str()?.parse().map_err(|e| format!("{e}"))?;
    let type_name = d.str()?;
    let world = WorldId::new(d.str()?);
    let chunk_x = d.i32()?;
    let chunk_z = d.i32()?;
    let reason: SpawnReason = d.str()?.parse().map_err(|e| format!("{e}"))?;
    let spawner_id = match d.u8()? {
        0 => None,
        _ => Some(d.str()?.parse::<SpawnerId>().map_err(|e| format!("{e}"))?),
    };
    Ok(EntityRow {
        id,
        type_name,
        world,
        chunk_x,
        chunk_z,
        reason,
        spawner_id,
    })
}

/// Parses a whole table file into `tables`.
fn decode_table(table: Table, bytes: &[u8], tables: &mut Tables) -> Result<(), String> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != TABLE_MAGIC {
        return Err("invalid table header".to_string());
    }
    let mut d = Decoder::new(bytes);
    d.take(4)?;
    let version = d.u32()?;
    if version != TABLE_VERSION {
        return Err(format!("unsupported table version {version}"));
    }
    if d.u8()? != table_tag(table) {
        return Err("table tag mismatch".to_string());
    }

    while !d.is_empty() {
        let len_bytes: [u8; 4] = d.array()?;
        let payload = d.take(u32::from_le_bytes(len_bytes) as usize)?;
        let stored_crc = d.u32()?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&len_bytes);
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err("CRC mismatch".to_string());
        }

        match table {
            Table::Spawners => {
                let row = decode_spawner(payload)?;
                tables.spawners.insert(row.id, row);
            }
            Table::Entities => {
                let row = decode_entity(payload)?;
                tables.entities.insert(row.id, row);
            }
        }
    }
    Ok(())
}
