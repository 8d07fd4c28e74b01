use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use fd_lock::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use super::{AuditKey, AuditOutcome, AuditRecord, AuditStore};

type Records = BTreeMap<String, AuditRecord>;

/// One write as seen by a [`MemoryAuditStore`], in arrival order.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum AuditWrite {
    Create(AuditKey),
    Complete(AuditKey, AuditOutcome),
}

/// In-process audit store for embedding and tests. Records live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<AuditKey, AuditRecord>,
    #[cfg(test)]
    writes: Vec<AuditWrite>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &AuditKey) -> Option<AuditRecord> {
        self.inner.lock().await.records.get(key).cloned()
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Vec<AuditRecord> {
        let mut records: Vec<_> = self.inner.lock().await.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.start_time.cmp(&b.start_time).then_with(|| a.request_id.cmp(&b.request_id))
        });
        records
    }

    #[cfg(test)]
    pub async fn writes(&self) -> Vec<AuditWrite> {
        self.inner.lock().await.writes.clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn create_record(&self, record: &AuditRecord) -> Result<()> {
        let mut state = self.inner.lock().await;
        let key = record.key();
        #[cfg(test)]
        state.writes.push(AuditWrite::Create(key.clone()));
        state.records.insert(key, record.clone());
        Ok(())
    }

    async fn complete_record(
        &self,
        key: &AuditKey,
        outcome: &AuditOutcome,
        duration: i64,
    ) -> Result<()> {
        let mut state = self.inner.lock().await;
        #[cfg(test)]
        state.writes.push(AuditWrite::Complete(key.clone(), outcome.clone()));
        let record = state
            .records
            .get_mut(key)
            .ok_or_else(|| anyhow!("No audit record found for {key}"))?;
        record.complete(outcome, duration);
        Ok(())
    }
}

/// Audit store backed by a single JSON document, keyed by `requestId#date`.
///
/// Writers may live in different processes. Each update holds an exclusive
/// lock on `<path>.lock` for the whole read-modify-write, and the document is
/// replaced by renaming a fully written temp file over it, so readers never
/// see a partial document.
#[derive(Debug)]
pub struct FileAuditStore {
    path: PathBuf,
}

impl FileAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every stored record. A missing file holds no records.
    pub async fn load(&self) -> Result<Records> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Records::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read audit file: {}", self.path.display())
                });
            }
        };

        parse_records(&self.path, &contents)
    }

    /// Run `apply` against the stored records under the cross-process lock.
    async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Records) -> Result<()> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || locked_update(&path, apply))
            .await
            .context("Audit store task failed")?
    }
}

fn locked_update(path: &Path, apply: impl FnOnce(&mut Records) -> Result<()>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create audit directory: {}", dir.display()))?;

    let lock_path = lock_path(path);
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open audit lock file: {}", lock_path.display()))?;
    let mut lock = RwLock::new(lock_file);
    let _guard = lock
        .write()
        .with_context(|| format!("Failed to lock audit file: {}", lock_path.display()))?;

    let mut records = match fs::read_to_string(path) {
        Ok(contents) => parse_records(path, &contents)?,
        Err(e) if e.kind() == ErrorKind::NotFound => Records::new(),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read audit file: {}", path.display()));
        }
    };

    apply(&mut records)?;

    let json = serde_json::to_vec_pretty(&records).context("Failed to serialize audit records")?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in: {}", dir.display()))?;
    tmp.write_all(&json).context("Failed to write audit records")?;
    tmp.as_file().sync_all().context("Failed to flush audit records")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write audit file: {}", path.display()))?;

    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn parse_records(path: &Path, contents: &str) -> Result<Records> {
    serde_json::from_str(contents)
        .with_context(|| format!("Failed to parse audit file: {}", path.display()))
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn create_record(&self, record: &AuditRecord) -> Result<()> {
        let record = record.clone();
        self.update(move |records| {
            records.insert(record.key().to_string(), record);
            Ok(())
        })
        .await
    }

    async fn complete_record(
        &self,
        key: &AuditKey,
        outcome: &AuditOutcome,
        duration: i64,
    ) -> Result<()> {
        let key = key.clone();
        let outcome = outcome.clone();
        self.update(move |records| {
            let record = records
                .get_mut(&key.to_string())
                .ok_or_else(|| anyhow!("No audit record found for {key}"))?;
            record.complete(&outcome, duration);
            Ok(())
        })
        .await
    }
}
