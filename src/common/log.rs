//! Durable coordinator log
//!
//! Append-only record of coordinator decisions (enlistments, removals).
//! Server entries keep the id of their log record so in-memory state can
//! be correlated with durable records on replay.
//!
//! Frame format: [MAGIC][ENTRY_ID][LEN][DATA][CRC32]

use crate::common::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_MAGIC: [u8; 4] = [0x43, 0x4C, 0x47, 0x31]; // "CLG1"

/// A single durable record. Entry ids start at 1; 0 means "not logged".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: u64,
    pub data: Vec<u8>,
}

/// The durability hook consumed by the coordinator. Implementations must
/// assign strictly increasing entry ids starting at 1.
pub trait CoordinatorLog: Send + Sync {
    /// Append an opaque record, returning its entry id.
    fn append(&self, data: &[u8]) -> Result<u64>;

    /// Read every record in append order.
    fn read_all(&self) -> Result<Vec<LogEntry>>;
}

/// File-backed log. Replays the file on open to find the next entry id;
/// a corrupt tail ends the replay rather than failing the open.
pub struct FileLog {
    path: PathBuf,
    inner: Mutex<FileLogInner>,
}

struct FileLogInner {
    file: File,
    next_id: u64,
}

impl FileLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        let next_id = Self::scan_entries(&path)?
            .last()
            .map(|e| e.id + 1)
            .unwrap_or(1);

        Ok(Self {
            path,
            inner: Mutex::new(FileLogInner { file, next_id }),
        })
    }

    fn scan_entries(path: &Path) -> Result<Vec<LogEntry>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();

        loop {
            match Self::read_entry(&mut reader) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("log replay stopped at corrupted entry: {}", e);
                    break;
                }
            }
        }

        Ok(entries)
    }

    fn read_entry<R: Read>(reader: &mut R) -> Result<Option<LogEntry>> {
        let mut magic = [0u8; 4];
        match reader.read_exact(&mut magic) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        if magic != LOG_MAGIC {
            return Err(Error::Log("invalid log magic".into()));
        }

        let mut id_bytes = [0u8; 8];
        reader.read_exact(&mut id_bytes)?;
        let id = u64::from_le_bytes(id_bytes);

        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        let mut crc_bytes = [0u8; 4];
        reader.read_exact(&mut crc_bytes)?;
        let stored_crc = u32::from_le_bytes(crc_bytes);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&id_bytes);
        hasher.update(&len_bytes);
        hasher.update(&data);
        if hasher.finalize() != stored_crc {
            return Err(Error::Log("checksum mismatch".into()));
        }

        Ok(Some(LogEntry { id, data }))
    }
}

impl CoordinatorLog for FileLog {
    fn append(&self, data: &[u8]) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;

        let id_bytes = id.to_le_bytes();
        let len_bytes = (data.len() as u32).to_le_bytes();
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&id_bytes);
        hasher.update(&len_bytes);
        hasher.update(data);
        let crc = hasher.finalize();

        inner.file.write_all(&LOG_MAGIC)?;
        inner.file.write_all(&id_bytes)?;
        inner.file.write_all(&len_bytes)?;
        inner.file.write_all(data)?;
        inner.file.write_all(&crc.to_le_bytes())?;
        inner.file.sync_all()?;

        inner.next_id = id + 1;
        Ok(id)
    }

    fn read_all(&self) -> Result<Vec<LogEntry>> {
        Self::scan_entries(&self.path)
    }
}

/// In-memory log for tests and log-less deployments.
#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<Vec<u8>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CoordinatorLog for MemoryLog {
    fn append(&self, data: &[u8]) -> Result<u64> {
        let mut entries = self.entries.lock().unwrap();
        entries.push(data.to_vec());
        Ok(entries.len() as u64)
    }

    fn read_all(&self) -> Result<Vec<LogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, data)| LogEntry {
                id: i as u64 + 1,
                data: data.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let log = FileLog::open(dir.path().join("coord.log")).unwrap();

        assert_eq!(log.append(b"enlist m1").unwrap(), 1);
        assert_eq!(log.append(b"enlist b1").unwrap(), 2);

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].data, b"enlist m1");
        assert_eq!(entries[1].id, 2);
    }

    #[test]
    fn test_reopen_continues_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coord.log");

        {
            let log = FileLog::open(&path).unwrap();
            log.append(b"one").unwrap();
            log.append(b"two").unwrap();
        }

        let log = FileLog::open(&path).unwrap();
        assert_eq!(log.append(b"three").unwrap(), 3);
        assert_eq!(log.read_all().unwrap().len(), 3);
    }

    #[test]
    fn test_corrupt_tail_stops_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coord.log");

        {
            let log = FileLog::open(&path).unwrap();
            log.append(b"good").unwrap();
        }
        // Garbage after the last valid frame.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"\xde\xad\xbe\xef").unwrap();
        }

        let log = FileLog::open(&path).unwrap();
        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(log.append(b"next").unwrap(), 2);
    }

    #[test]
    fn test_memory_log() {
        let log = MemoryLog::new();
        assert_eq!(log.append(b"a").unwrap(), 1);
        assert_eq!(log.append(b"b").unwrap(), 2);
        assert_eq!(log.read_all().unwrap()[1].data, b"b");
    }
}
