//! Append-only announcement log.

use crate::error::{Result, StoreError};
use crate::types::Announcement;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for each log entry.
const ENTRY_MAGIC: &[u8; 4] = b"ANN\0";

/// Current entry format version.
const ENTRY_VERSION: u8 = 1;

/// Entry header size: magic + version + flags + body length.
const ENTRY_HEADER_SIZE: usize = 4 + 1 + 1 + 4;

/// Mutable file state, guarded together.
struct LogFile {
    file: File,
    size: u64,
    writes_since_sync: u64,
}

/// Append-only announcement log.
///
/// Entry layout: magic, version, flags, body length (u32 LE), MessagePack
/// body, CRC32 of the body (u32 LE).
pub struct AnnouncementLog {
    path: PathBuf,
    inner: Mutex<LogFile>,
    /// Sync every N writes.
    sync_interval: u64,
}

impl AnnouncementLog {
    /// Default sync interval - sync every write.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 1;

    /// Open or create a log with the default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a log, syncing after every `sync_interval` writes
    /// (0 is treated as 1).
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            inner: Mutex::new(LogFile {
                file,
                size,
                writes_since_sync: 0,
            }),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Append an announcement. Returns the offset it was written at.
    pub fn append(&self, announcement: &Announcement) -> Result<u64> {
        let body = rmp_serde::to_vec_named(announcement)?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| StoreError::Serialization("announcement too large".into()))?;

        let mut entry = Vec::with_capacity(ENTRY_HEADER_SIZE + body.len() + 4);
        entry.extend_from_slice(ENTRY_MAGIC);
        entry.push(ENTRY_VERSION);
        entry.push(0u8);
        entry.extend_from_slice(&body_len.to_le_bytes());
        entry.extend_from_slice(&body);
        entry.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());

        let mut inner = self.inner.lock();
        let offset = inner.size;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&entry)?;
        inner.size = offset + entry.len() as u64;

        inner.writes_since_sync += 1;
        if inner.writes_since_sync >= self.sync_interval {
            inner.file.sync_data()?;
            inner.writes_since_sync = 0;
        }

        Ok(offset)
    }

    /// Read every announcement in write order.
    pub fn replay(&self) -> Result<Vec<Announcement>> {
        let inner = self.inner.lock();
        let end = inner.size;

        let mut file = inner.file.try_clone()?;
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(file);

        let mut announcements = Vec::new();
        let mut offset = 0u64;
        while offset < end {
            let (announcement, len) = Self::read_entry(&mut reader, offset)?;
            announcements.push(announcement);
            offset += len;
        }

        Ok(announcements)
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.sync_all()?;
        inner.writes_since_sync = 0;
        Ok(())
    }

    /// Current file size in bytes.
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one entry. Returns the announcement and the entry's length.
    fn read_entry(reader: &mut impl Read, offset: u64) -> Result<(Announcement, u64)> {
        let truncated = |e: std::io::Error| {
            if e.kind() == ErrorKind::UnexpectedEof {
                StoreError::Corruption(format!("truncated entry at offset {offset}"))
            } else {
                StoreError::Io(e)
            }
        };

        let mut header = [0u8; ENTRY_HEADER_SIZE];
        reader.read_exact(&mut header).map_err(truncated)?;

        if &header[0..4] != ENTRY_MAGIC {
            return Err(StoreError::InvalidFormat(format!(
                "Invalid entry magic at offset {offset}"
            )));
        }
        if header[4] != ENTRY_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported entry version: {}",
                header[4]
            )));
        }

        let body_len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let mut body = vec![0u8; body_len];
        reader.read_exact(&mut body).map_err(truncated)?;

        let mut checksum_bytes = [0u8; 4];
        reader.read_exact(&mut checksum_bytes).map_err(truncated)?;
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(&body);
        if stored != computed {
            return Err(StoreError::ChecksumMismatch {
                expected: stored,
                got: computed,
            });
        }

        let announcement = rmp_serde::from_slice(&body)?;
        Ok((announcement, (ENTRY_HEADER_SIZE + body_len + 4) as u64))
    }
}
