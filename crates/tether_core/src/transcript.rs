//! Append-only transcript store.
//!
//! One JSON-lines file per session under the store root:
//! `<root>/<session_id>.jsonl`. Line order is append order is turn order.
//! Entries are never rewritten or removed here.

use crate::error::{Result, TetherError};
use crate::types::{Role, SessionId, TranscriptEntry};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Bytes read per step when looking for the last line from the end.
const TAIL_CHUNK: u64 = 4096;

/// Selects transcript entries.
///
/// All set criteria must match. `last` keeps only the final N matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptFilter {
    /// Substring that must occur in the content.
    pub text: Option<String>,
    /// Role the entry must have.
    pub role: Option<Role>,
    /// Keep only the last N matching entries.
    pub last: Option<usize>,
}

impl TranscriptFilter {
    /// Filter matching content containing `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn matches(&self, entry: &TranscriptEntry, case_sensitive: bool) -> bool {
        if let Some(role) = self.role {
            if entry.role != role {
                return false;
            }
        }
        match &self.text {
            None => true,
            Some(needle) if case_sensitive => entry.content.contains(needle.as_str()),
            Some(needle) => entry
                .content
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

/// Session-keyed transcript storage.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    root: PathBuf,
    case_sensitive: bool,
}

impl TranscriptStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            case_sensitive: false,
        }
    }

    /// Sets whether text filters match case-sensitively.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Path of a session's transcript file.
    pub fn path(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(format!("{}.jsonl", session_id))
    }

    /// Returns true if a transcript exists for the session.
    pub fn exists(&self, session_id: &SessionId) -> bool {
        self.path(session_id).is_file()
    }

    /// Creates an empty transcript.
    ///
    /// # Errors
    ///
    /// Returns `TranscriptAlreadyExists` if the session already has one.
    pub fn create(&self, session_id: &SessionId) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path(session_id))
        {
            Ok(file) => {
                file.sync_all()?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(TetherError::TranscriptAlreadyExists(session_id.to_string()))
            }
            Err(e) => Err(TetherError::Io(e)),
        }
    }

    /// Appends one entry.
    ///
    /// The entry's `turn_index` must be exactly one past the last stored
    /// index, or `0` for an empty transcript. The check and the write happen
    /// under an exclusive file lock, so one append is one atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no transcript exists and
    /// `OutOfOrderAppend` if the index does not continue the sequence. In
    /// both cases nothing is written.
    pub fn append(&self, session_id: &SessionId, entry: &TranscriptEntry) -> Result<()> {
        self.with_locked(session_id, |path, file| {
            let expected = next_after(scan_last_index(path, file)?);
            if entry.turn_index != expected {
                return Err(TetherError::OutOfOrderAppend {
                    session_id: session_id.to_string(),
                    expected,
                    got: entry.turn_index,
                });
            }
            write_entry(file, entry)
        })
    }

    /// Appends a turn at the next free index, assigned under the lock.
    pub fn append_next(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &str,
        timestamp: i64,
    ) -> Result<TranscriptEntry> {
        self.with_locked(session_id, |path, file| {
            let entry = TranscriptEntry {
                turn_index: next_after(scan_last_index(path, file)?),
                role,
                content: content.to_string(),
                timestamp,
            };
            write_entry(file, &entry)?;
            Ok(entry)
        })
    }

    /// Opens the transcript for read and append and runs `f` under an
    /// exclusive lock.
    fn with_locked<T>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&Path, &mut File) -> Result<T>,
    ) -> Result<T> {
        let path = self.path(session_id);
        let mut file = match OpenOptions::new().read(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TetherError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => return Err(TetherError::Io(e)),
        };

        file.lock_exclusive()?;
        let result = f(path.as_path(), &mut file);
        // Dropping the handle releases the lock as well.
        let _ = file.unlock();
        result
    }

    /// Removes a transcript that has no entries.
    ///
    /// Used to roll back a session whose link was never written. A
    /// transcript with entries is left alone.
    pub fn discard_empty(&self, session_id: &SessionId) -> Result<()> {
        let path = self.path(session_id);
        match fs::metadata(&path) {
            Ok(meta) if meta.len() == 0 => Ok(fs::remove_file(&path)?),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TetherError::Io(e)),
        }
    }

    /// Returns the last stored turn index, or `None` for an empty transcript.
    pub fn last_index(&self, session_id: &SessionId) -> Result<Option<u64>> {
        let path = self.path(session_id);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TetherError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => return Err(TetherError::Io(e)),
        };
        scan_last_index(&path, &mut file)
    }

    /// Index the next append must use.
    pub fn next_index(&self, session_id: &SessionId) -> Result<u64> {
        Ok(next_after(self.last_index(session_id)?))
    }

    /// Number of stored entries.
    pub fn len(&self, session_id: &SessionId) -> Result<usize> {
        let mut count = 0;
        for entry in &self.read(session_id, None)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Returns the entries whose turn index falls in `range` (all if `None`).
    ///
    /// The result is lazy: the file is opened when iteration starts, and
    /// each call to [`Entries::iter`] starts over from the first line.
    pub fn read(&self, session_id: &SessionId, range: Option<Range<u64>>) -> Result<Entries> {
        self.filtered(session_id, range, TranscriptFilter::default())
    }

    /// Returns the entries whose content contains `query`, in turn order.
    pub fn search(&self, session_id: &SessionId, query: &str) -> Result<Entries> {
        self.filtered(session_id, None, TranscriptFilter::text(query))
    }

    /// Returns the entries in `range` that match `filter`.
    pub fn filtered(
        &self,
        session_id: &SessionId,
        range: Option<Range<u64>>,
        filter: TranscriptFilter,
    ) -> Result<Entries> {
        let path = self.path(session_id);
        if !path.is_file() {
            return Err(TetherError::SessionNotFound(session_id.to_string()));
        }
        Ok(Entries {
            path,
            range,
            filter,
            case_sensitive: self.case_sensitive,
        })
    }
}

/// A restartable, finite view over part of a transcript.
#[derive(Debug, Clone)]
pub struct Entries {
    path: PathBuf,
    range: Option<Range<u64>>,
    filter: TranscriptFilter,
    case_sensitive: bool,
}

impl Entries {
    /// Starts a fresh pass over the transcript.
    pub fn iter(&self) -> EntryIter<'_> {
        EntryIter {
            entries: self,
            state: IterState::Pending,
            skip: 0,
        }
    }

    /// Collects every selected entry, stopping at the first error.
    pub fn to_vec(&self) -> Result<Vec<TranscriptEntry>> {
        self.iter().collect()
    }

    fn selects(&self, entry: &TranscriptEntry) -> bool {
        self.filter.matches(entry, self.case_sensitive)
    }

    fn in_range(&self, entry: &TranscriptEntry) -> bool {
        self.range
            .as_ref()
            .map_or(true, |r| r.contains(&entry.turn_index))
    }

    fn past_range(&self, entry: &TranscriptEntry) -> bool {
        self.range
            .as_ref()
            .is_some_and(|r| entry.turn_index >= r.end)
    }
}

impl<'a> IntoIterator for &'a Entries {
    type Item = Result<TranscriptEntry>;
    type IntoIter = EntryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

enum IterState {
    Pending,
    Open { lines: Lines<BufReader<File>>, line_no: usize },
    Done,
}

/// Iterator over selected transcript entries.
pub struct EntryIter<'a> {
    entries: &'a Entries,
    state: IterState,
    skip: usize,
}

impl EntryIter<'_> {
    fn open(&mut self) -> Result<()> {
        if let Some(last) = self.entries.filter.last {
            let total = self.raw_pass().filter(|r| matches!(r, Ok(true))).count();
            self.skip = total.saturating_sub(last);
        }
        let file = File::open(&self.entries.path)?;
        self.state = IterState::Open {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        };
        Ok(())
    }

    /// Counting pass used for `last`: yields whether each entry is selected.
    fn raw_pass(&self) -> impl Iterator<Item = Result<bool>> + '_ {
        let entries = self.entries;
        File::open(&entries.path)
            .map(|f| BufReader::new(f).lines())
            .into_iter()
            .flatten()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(move |(i, line)| -> Result<bool> {
                let entry = decode_line(&entries.path, i + 1, &line?)?;
                Ok(entries.in_range(&entry) && entries.selects(&entry))
            })
    }
}

impl Iterator for EntryIter<'_> {
    type Item = Result<TranscriptEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, IterState::Pending) {
            if let Err(e) = self.open() {
                self.state = IterState::Done;
                return Some(Err(e));
            }
        }

        loop {
            let IterState::Open { lines, line_no } = &mut self.state else {
                return None;
            };

            let line = match lines.next() {
                None => {
                    self.state = IterState::Done;
                    return None;
                }
                Some(Err(e)) => {
                    self.state = IterState::Done;
                    return Some(Err(TetherError::Io(e)));
                }
                Some(Ok(line)) => line,
            };
            *line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let entry = match decode_line(&self.entries.path, *line_no, &line) {
                Ok(entry) => entry,
                Err(e) => {
                    self.state = IterState::Done;
                    return Some(Err(e));
                }
            };

            if self.entries.past_range(&entry) {
                self.state = IterState::Done;
                return None;
            }
            if !self.entries.in_range(&entry) || !self.entries.selects(&entry) {
                continue;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            return Some(Ok(entry));
        }
    }
}

fn decode_line(path: &Path, line_no: usize, line: &str) -> Result<TranscriptEntry> {
    serde_json::from_str(line).map_err(|e| TetherError::CorruptedTranscript {
        path: path.to_path_buf(),
        line: line_no,
        reason: e.to_string(),
    })
}

fn next_after(last: Option<u64>) -> u64 {
    last.map_or(0, |i| i + 1)
}

fn write_entry(file: &mut File, entry: &TranscriptEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry)
        .map_err(|e| TetherError::Serialization(format!("failed to encode entry: {}", e)))?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

/// Reads the turn index of the last non-blank line of a transcript.
///
/// Reads backwards from the end in [`TAIL_CHUNK`] steps, so the cost does
/// not grow with the transcript.
fn scan_last_index(path: &Path, file: &mut File) -> Result<Option<u64>> {
    let mut pos = file.seek(SeekFrom::End(0))?;
    let mut tail: Vec<u8> = Vec::new();

    loop {
        let content_end = tail.iter().rposition(|b| !b.is_ascii_whitespace());
        if let Some(end) = content_end {
            if let Some(newline) = tail[..end].iter().rposition(|&b| b == b'\n') {
                return decode_tail(path, &tail[newline + 1..=end]).map(Some);
            }
        }
        if pos == 0 {
            return match content_end {
                Some(end) => decode_tail(path, &tail[..=end]).map(Some),
                None => Ok(None),
            };
        }

        let step = TAIL_CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        // step <= TAIL_CHUNK, so the cast cannot truncate.
        let mut chunk = vec![0; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
    }
}

fn decode_tail(path: &Path, line: &[u8]) -> Result<u64> {
    let entry: TranscriptEntry =
        serde_json::from_slice(line).map_err(|e| TetherError::CorruptedTranscript {
            path: path.to_path_buf(),
            line: last_content_line(path).unwrap_or_default(),
            reason: e.to_string(),
        })?;
    Ok(entry.turn_index)
}

/// Line number of the last non-blank line, for error reports.
fn last_content_line(path: &Path) -> Result<usize> {
    let mut last = 0;
    for (i, line) in BufReader::new(File::open(path)?).lines().enumerate() {
        if !line?.trim().is_empty() {
            last = i + 1;
        }
    }
    Ok(last)
}
