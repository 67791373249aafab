//! What already exists on disk for a destination stem.
//!
//! Files match a stem when the text before their first `.` equals the stem,
//! compared case-insensitively. That makes `Film_trailer.MOV`,
//! `Film_trailer.mp4.part` and `Film_trailer.stub` all belong to the stem
//! `Film_trailer`.
//!
//! Every file this crate finishes is also appended to a per-folder ledger
//! ([`FETCH_LEDGER`]) with its size. A ledgered file whose size still matches
//! counts as present however small it is; the minimum-size threshold only
//! applies to files that arrived some other way.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::download::filename::stem_key;

/// Suffix of placeholder files marking an asset as unobtainable.
pub const STUB_SUFFIX: &str = "stub";

/// Per-folder record of files completed by this crate: `<size>\t<name>` lines.
pub const FETCH_LEDGER: &str = ".fetched";

/// Local files sharing one stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalEntry {
    /// A stub file, if present.
    pub stub: Option<PathBuf>,
    /// A partial transfer, if present.
    pub partial: Option<PathBuf>,
    /// Completed files with their sizes.
    pub complete: Vec<(PathBuf, u64)>,
    /// A completed file recorded in the ledger with its current size.
    pub fetched: Option<PathBuf>,
}

impl LocalEntry {
    /// The largest completed file, if any.
    #[must_use]
    pub fn largest_complete(&self) -> Option<(&Path, u64)> {
        self.complete
            .iter()
            .max_by_key(|(_, len)| *len)
            .map(|(path, len)| (path.as_path(), *len))
    }
}

/// Lazily built per-directory index of local files, keyed by stem.
#[derive(Debug, Default)]
pub struct LocalIndex {
    dirs: HashMap<PathBuf, HashMap<String, LocalEntry>>,
}

impl LocalIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns local state for `stem`, scanning its directory on first use.
    pub fn lookup(&mut self, stem: &Path) -> Option<&LocalEntry> {
        let dir = stem.parent()?.to_path_buf();
        let key = stem_key(&stem.file_name()?.to_string_lossy());
        let entries = self.dirs.entry(dir).or_insert_with_key(|dir| scan_dir(dir));
        entries.get(&key)
    }
}

fn scan_dir(dir: &Path) -> HashMap<String, LocalEntry> {
    let mut entries: HashMap<String, LocalEntry> = HashMap::new();
    let read_dir = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list directory; treating as empty");
            return entries;
        }
    };

    let ledger = read_ledger(dir);
    for dir_entry in read_dir.flatten() {
        let Ok(meta) = dir_entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if name == FETCH_LEDGER {
            continue;
        }
        let lower = name.to_lowercase();
        let entry = entries.entry(stem_key(&name)).or_default();
        let path = dir_entry.path();
        if lower.ends_with(".stub") {
            entry.stub = Some(path);
        } else if lower.ends_with(".part") {
            entry.partial = Some(path);
        } else if lower.ends_with(".ytdl") {
            continue;
        } else {
            if ledger.get(&name) == Some(&meta.len()) {
                entry.fetched = Some(path.clone());
            }
            entry.complete.push((path, meta.len()));
        }
    }
    debug!(dir = %dir.display(), stems = entries.len(), "indexed local files");
    entries
}

/// File name to size, last entry winning.
fn read_ledger(dir: &Path) -> HashMap<String, u64> {
    let Ok(text) = std::fs::read_to_string(dir.join(FETCH_LEDGER)) else {
        return HashMap::new();
    };
    text.lines()
        .filter_map(|line| {
            let (size, name) = line.split_once('\t')?;
            Some((name.to_string(), size.parse().ok()?))
        })
        .collect()
}

/// Appends a finished file to its folder's ledger.
///
/// # Errors
///
/// Returns the IO error if the file cannot be inspected or the ledger written.
pub async fn record_fetched(path: &Path) -> std::io::Result<()> {
    let len = tokio::fs::metadata(path).await?.len();
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Ok(());
    };
    let mut ledger = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(FETCH_LEDGER))
        .await?;
    // One write per line keeps concurrent appends from interleaving.
    ledger
        .write_all(format!("{len}\t{}\n", name.to_string_lossy()).as_bytes())
        .await?;
    ledger.flush().await
}

/// Writes `<stem>.stub` recording why the asset cannot be fetched.
///
/// # Errors
///
/// Returns the IO error if the directory or file cannot be written.
pub async fn write_stub(stem: &Path, reason: &str) -> std::io::Result<PathBuf> {
    if let Some(parent) = stem.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut raw = stem.as_os_str().to_owned();
    raw.push(format!(".{STUB_SUFFIX}"));
    let path = PathBuf::from(raw);
    tokio::fs::write(&path, format!("{reason}\n")).await?;
    Ok(path)
}
