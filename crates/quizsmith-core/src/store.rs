//! Attempt persistence.
//!
//! An attempt is written exactly once, as a whole. Readers see either the
//! complete record or nothing.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::model::Attempt;

/// Iterator over a student's attempts, oldest first.
pub type AttemptIter<'a> = Box<dyn Iterator<Item = Result<Attempt>> + 'a>;

/// Durable storage for graded attempts.
pub trait AttemptStore: Send + Sync {
    /// Persist a graded attempt. Fails if the attempt was already stored.
    fn save(&self, attempt: &Attempt) -> Result<()>;

    /// A student's attempts in ascending timestamp order.
    ///
    /// Records may be loaded lazily; each item can fail independently.
    fn attempts_for(&self, student_id: &str) -> Result<AttemptIter<'_>>;

    /// Every student with at least one stored attempt, sorted.
    fn students(&self) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// JSON files on disk
// ---------------------------------------------------------------------------

/// Stores each attempt as a pretty-printed JSON file.
///
/// Layout: `<root>/<student>/<timestamp>-<attempt id>.json`. The timestamp
/// prefix makes lexical order chronological.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn student_dir(&self, student_id: &str) -> PathBuf {
        self.root.join(encode_student_id(student_id))
    }
}

impl AttemptStore for JsonFileStore {
    fn save(&self, attempt: &Attempt) -> Result<()> {
        anyhow::ensure!(!attempt.student_id().trim().is_empty(), "student id must not be empty");

        let dir = self.student_dir(attempt.student_id());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let file_name = format!(
            "{}-{}.json",
            attempt.created_at().format("%Y%m%dT%H%M%S%.6fZ"),
            attempt.id()
        );
        let path = dir.join(file_name);

        let json = serde_json::to_string_pretty(attempt).context("failed to serialize attempt")?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .context("failed to write attempt")?;
        tmp.as_file().sync_all().context("failed to flush attempt")?;
        tmp.persist_noclobber(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to store attempt at {}", path.display()))?;

        tracing::info!(
            student = attempt.student_id(),
            attempt = %attempt.id(),
            score = attempt.score(),
            percentage = attempt.percentage(),
            "stored attempt"
        );
        Ok(())
    }

    fn attempts_for(&self, student_id: &str) -> Result<AttemptIter<'_>> {
        let dir = self.student_dir(student_id);
        if !dir.is_dir() {
            return Ok(Box::new(std::iter::empty()));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(Box::new(paths.into_iter().map(|path| load_attempt(&path))))
    }

    fn students(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut students = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(decode_student_id) {
                Some(student) => students.push(student),
                None => tracing::debug!(dir = ?name, "skipping unrecognised directory"),
            }
        }
        students.sort();
        Ok(students)
    }
}

fn load_attempt(path: &Path) -> Result<Attempt> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read attempt from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse attempt JSON in {}", path.display()))
}

/// Map a student id to a single safe path component.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte is
/// written as `%XX`.
fn encode_student_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_student_id(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Process-local store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    attempts: Mutex<BTreeMap<String, Vec<Attempt>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored attempts across all students.
    pub fn len(&self) -> usize {
        self.attempts
            .lock()
            .map(|m| m.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttemptStore for MemoryStore {
    fn save(&self, attempt: &Attempt) -> Result<()> {
        let mut map = self
            .attempts
            .lock()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))?;
        let list = map.entry(attempt.student_id().to_string()).or_default();
        anyhow::ensure!(
            list.iter().all(|a| a.id() != attempt.id()),
            "attempt {} already stored",
            attempt.id()
        );
        let at = list.partition_point(|a| a.created_at() <= attempt.created_at());
        list.insert(at, attempt.clone());
        Ok(())
    }

    fn attempts_for(&self, student_id: &str) -> Result<AttemptIter<'_>> {
        let map = self
            .attempts
            .lock()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))?;
        let attempts = map.get(student_id).cloned().unwrap_or_default();
        Ok(Box::new(attempts.into_iter().map(Ok)))
    }

    fn students(&self) -> Result<Vec<String>> {
        let map = self
            .attempts
            .lock()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))?;
        Ok(map.keys().cloned().collect())
    }
}
