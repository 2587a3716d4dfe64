//! # Id Map
//!
//! Translates the service's large status ids into short sequential local
//! ids the operator can type (`rt 12`, `del 3`).
//!
//! The table lives at `~/.rainbow/ids.jsonl` and survives restarts. It is an
//! append-only log, one JSON row per line:
//!
//! ```text
//! {"local_id":1,"remote_id":1050118621198921728}
//! {"local_id":2,"remote_id":1050118621198921731}
//! ```
//!
//! A local id is never reused or reassigned. Both the command loop and the
//! stream worker assign ids, so every access goes through one `Mutex`. A new
//! row is appended to the log before its id is handed out; if the append
//! fails the row is rolled back in memory and the file is truncated to its
//! last complete row.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Short operator-facing id, starting at 1.
pub type LocalId = u64;
/// The service's native id.
pub type RemoteId = u64;

/// One row of the table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedEntity {
    pub local_id: LocalId,
    pub remote_id: RemoteId,
}

#[derive(Debug)]
pub enum IdMapError {
    Io(io::Error),
    Parse(serde_json::Error),
    /// The backing file holds duplicate or non-positive ids.
    Corrupt(String),
    /// No row has this local id.
    NotFound(LocalId),
}

impl fmt::Display for IdMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdMapError::Io(e) => write!(f, "id map I/O error: {e}"),
            IdMapError::Parse(e) => write!(f, "id map parse error: {e}"),
            IdMapError::Corrupt(msg) => write!(f, "id map is corrupt: {msg}"),
            IdMapError::NotFound(id) => write!(f, "no entry with id {id}"),
        }
    }
}

impl std::error::Error for IdMapError {}

// ============================================================================
// In-memory table
// ============================================================================

#[derive(Default)]
struct Table {
    entries: Vec<TrackedEntity>,
    by_remote: HashMap<RemoteId, LocalId>,
    by_local: HashMap<LocalId, RemoteId>,
    next_local: LocalId,
}

impl Table {
    fn from_entries(entries: Vec<TrackedEntity>) -> Result<Self, IdMapError> {
        let mut table = Table {
            next_local: 1,
            ..Default::default()
        };
        for entry in entries {
            if entry.local_id == 0 {
                return Err(IdMapError::Corrupt("local id 0".to_string()));
            }
            if table.by_remote.contains_key(&entry.remote_id) {
                return Err(IdMapError::Corrupt(format!(
                    "remote id {} mapped twice",
                    entry.remote_id
                )));
            }
            if table.by_local.contains_key(&entry.local_id) {
                return Err(IdMapError::Corrupt(format!(
                    "local id {} assigned twice",
                    entry.local_id
                )));
            }
            table.push(entry);
        }
        Ok(table)
    }

    fn push(&mut self, entry: TrackedEntity) {
        self.by_remote.insert(entry.remote_id, entry.local_id);
        self.by_local.insert(entry.local_id, entry.remote_id);
        self.next_local = self.next_local.max(entry.local_id + 1);
        self.entries.push(entry);
    }

    fn pop(&mut self) {
        if let Some(entry) = self.entries.pop() {
            self.by_remote.remove(&entry.remote_id);
            self.by_local.remove(&entry.local_id);
            self.next_local = entry.local_id;
        }
    }
}

// ============================================================================
// Append-only log
// ============================================================================

struct RowLog {
    file: File,
    /// Bytes of complete rows on disk.
    len: u64,
}

impl RowLog {
    fn append(&mut self, entry: &TrackedEntity) -> io::Result<()> {
        let mut row = serde_json::to_vec(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        row.push(b'\n');

        if let Err(e) = self.file.write_all(&row) {
            // Drop whatever part of the row made it out
            if let Err(trunc) = self.file.set_len(self.len) {
                warn!("Failed to truncate id log after write error: {}", trunc);
            }
            return Err(e);
        }
        self.len += row.len() as u64;
        Ok(())
    }
}

/// Parses the log, returning its rows and the byte length of the complete
/// ones. An unterminated last row (interrupted append) is left out.
fn read_rows(contents: &str) -> Result<(Vec<TrackedEntity>, u64), IdMapError> {
    let mut entries = Vec::new();
    let mut valid_len = 0u64;
    for line in contents.split_inclusive('\n') {
        if !line.ends_with('\n') {
            warn!("Ignoring unterminated last id row ({} bytes)", line.len());
            break;
        }
        let row = line.trim();
        if !row.is_empty() {
            entries.push(serde_json::from_str(row).map_err(IdMapError::Parse)?);
        }
        valid_len += line.len() as u64;
    }
    Ok((entries, valid_len))
}

// ============================================================================
// IdMap
// ============================================================================

pub struct IdMap {
    table: Mutex<Table>,
    log: Mutex<Option<RowLog>>,
}

/// Returns `~/.rainbow/ids.jsonl`.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rainbow").join("ids.jsonl"))
}

impl IdMap {
    /// A table that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            table: Mutex::new(Table {
                next_local: 1,
                ..Default::default()
            }),
            log: Mutex::new(None),
        }
    }

    /// Loads the log at `path`, or starts an empty one if the file doesn't exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IdMapError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(IdMapError::Io)?;
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(IdMapError::Io(e)),
        };
        let (entries, valid_len) = read_rows(&contents)?;
        let table = Table::from_entries(entries)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(IdMapError::Io)?;
        if valid_len < contents.len() as u64 {
            file.set_len(valid_len).map_err(IdMapError::Io)?;
        }

        info!(
            "Loaded id map from {} ({} entries)",
            path.display(),
            table.entries.len()
        );
        Ok(Self {
            table: Mutex::new(table),
            log: Mutex::new(Some(RowLog {
                file,
                len: valid_len,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the local id for `remote_id`, assigning the next one if it's new.
    pub fn ensure_local_id(&self, remote_id: RemoteId) -> Result<LocalId, IdMapError> {
        let mut table = self.lock();
        if let Some(&local_id) = table.by_remote.get(&remote_id) {
            return Ok(local_id);
        }

        let entry = TrackedEntity {
            local_id: table.next_local,
            remote_id,
        };
        table.push(entry);

        // Lock order: table, then log
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(log) = log.as_mut()
            && let Err(e) = log.append(&entry)
        {
            warn!("Failed to persist id {} -> {}: {}", entry.local_id, remote_id, e);
            table.pop();
            return Err(IdMapError::Io(e));
        }

        debug!("Assigned id {} -> {}", entry.local_id, remote_id);
        Ok(entry.local_id)
    }

    /// Returns the remote id previously assigned `local_id`.
    pub fn resolve_remote_id(&self, local_id: LocalId) -> Result<RemoteId, IdMapError> {
        self.lock()
            .by_local
            .get(&local_id)
            .copied()
            .ok_or(IdMapError::NotFound(local_id))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let ids = IdMap::in_memory();
        assert_eq!(ids.ensure_local_id(9_000_000_001).unwrap(), 1);
        assert_eq!(ids.ensure_local_id(9_000_000_005).unwrap(), 2);
        assert_eq!(ids.ensure_local_id(42).unwrap(), 3);
    }

    #[test]
    fn test_repeated_remote_id_keeps_its_local_id() {
        let ids = IdMap::in_memory();
        let first = ids.ensure_local_id(777).unwrap();
        ids.ensure_local_id(888).unwrap();
        assert_eq!(ids.ensure_local_id(777).unwrap(), first);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_resolve_inverts_ensure() {
        let ids = IdMap::in_memory();
        for remote in [10, 20, 30, 20, 10] {
            let local = ids.ensure_local_id(remote).unwrap();
            assert_eq!(ids.resolve_remote_id(local).unwrap(), remote);
        }
    }

    #[test]
    fn test_resolve_unknown_is_not_found() {
        let ids = IdMap::in_memory();
        ids.ensure_local_id(1234).unwrap();
        assert!(matches!(ids.resolve_remote_id(42), Err(IdMapError::NotFound(42))));
        assert!(matches!(ids.resolve_remote_id(0), Err(IdMapError::NotFound(0))));
    }

    #[test]
    fn test_table_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.jsonl");

        let ids = IdMap::open(&path).unwrap();
        assert!(ids.is_empty());
        assert_eq!(ids.ensure_local_id(555).unwrap(), 1);
        assert_eq!(ids.ensure_local_id(666).unwrap(), 2);
        drop(ids);

        let reopened = IdMap::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.resolve_remote_id(2).unwrap(), 666);
        assert_eq!(reopened.ensure_local_id(555).unwrap(), 1);
        assert_eq!(reopened.ensure_local_id(999).unwrap(), 3);
    }

    #[test]
    fn test_each_new_id_appends_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.jsonl");
        let ids = IdMap::open(&path).unwrap();
        ids.ensure_local_id(500).unwrap();
        ids.ensure_local_id(600).unwrap();
        ids.ensure_local_id(500).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "{\"local_id\":1,\"remote_id\":500}\n{\"local_id\":2,\"remote_id\":600}\n"
        );
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ids.jsonl");
        let ids = IdMap::open(&path).unwrap();
        ids.ensure_local_id(1).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_rejects_duplicate_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.jsonl");
        fs::write(
            &path,
            "{\"local_id\":1,\"remote_id\":5}\n{\"local_id\":2,\"remote_id\":5}\n",
        )
        .unwrap();
        assert!(matches!(IdMap::open(&path), Err(IdMapError::Corrupt(_))));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.jsonl");
        fs::write(&path, "not json\n").unwrap();
        assert!(matches!(IdMap::open(&path), Err(IdMapError::Parse(_))));
    }

    #[test]
    fn test_unterminated_last_row_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.jsonl");
        fs::write(&path, "{\"local_id\":1,\"remote_id\":5}\n{\"local_id\":2,\"rem").unwrap();

        let ids = IdMap::open(&path).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids.ensure_local_id(9).unwrap(), 2);
        drop(ids);

        let reopened = IdMap::open(&path).unwrap();
        assert_eq!(reopened.resolve_remote_id(2).unwrap(), 9);
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.jsonl");
        let ids = IdMap::open(&path).unwrap();
        assert_eq!(ids.ensure_local_id(1).unwrap(), 1);

        // Swap in a read-only handle so the next append fails
        let read_only = File::open(&path).unwrap();
        let len = fs::metadata(&path).unwrap().len();
        *ids.log.lock().unwrap() = Some(RowLog {
            file: read_only,
            len,
        });
        assert!(matches!(ids.ensure_local_id(2), Err(IdMapError::Io(_))));
        assert_eq!(ids.len(), 1);
        assert!(ids.resolve_remote_id(2).is_err());
        drop(ids);

        let reopened = IdMap::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.ensure_local_id(2).unwrap(), 2);
    }

    #[test]
    fn test_concurrent_ensure_has_no_duplicates_or_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let ids = Arc::new(IdMap::open(dir.path().join("ids.jsonl")).unwrap());
        let distinct: u64 = 25;

        let handles: Vec<_> = (0..8u64)
            .map(|worker| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || {
                    (0..distinct * 2)
                        .map(|i| {
                            let remote = 1_000 + (i + worker * 7) % distinct;
                            (remote, ids.ensure_local_id(remote).unwrap())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: HashMap<RemoteId, LocalId> = HashMap::new();
        for handle in handles {
            for (remote, local) in handle.join().unwrap() {
                let previous = seen.entry(remote).or_insert(local);
                assert_eq!(*previous, local, "remote {remote} got two local ids");
            }
        }

        assert_eq!(ids.len(), distinct as usize);
        let locals: HashSet<LocalId> = seen.values().copied().collect();
        assert_eq!(locals, (1..=distinct).collect::<HashSet<_>>());

        let reopened = IdMap::open(dir.path().join("ids.jsonl")).unwrap();
        assert_eq!(reopened.len(), distinct as usize);
    }
}
