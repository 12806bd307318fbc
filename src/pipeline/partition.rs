//! Run-date partitions: directory layout, manifest and per-date lock

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ExtractScope;
use crate::constants::files;
use crate::error::AppError;
use crate::warehouse::TargetTable;

/// Directory name of a run date, e.g. `20250115`.
pub fn partition_key(run_date: NaiveDate) -> String {
    run_date.format(files::PARTITION_DATE_FORMAT).to_string()
}

/// `<data_dir>/<YYYYMMDD>/`, the unit of idempotent reprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPartition {
    run_date: NaiveDate,
    dir: PathBuf,
}

impl RunPartition {
    pub fn new(data_dir: impl AsRef<Path>, run_date: NaiveDate) -> Self {
        RunPartition {
            run_date,
            dir: data_dir.as_ref().join(partition_key(run_date)),
        }
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    pub fn key(&self) -> String {
        partition_key(self.run_date)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, table: TargetTable) -> PathBuf {
        self.dir.join(table.file_name())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(files::MANIFEST)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(files::RUN_LOCK)
    }

    pub async fn ensure_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}

/// One extracted file as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub table: TargetTable,
    pub file_name: String,
    pub rows: usize,
}

/// What the extractor produced for a run date. Written last, so its presence
/// means every listed file is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_date: NaiveDate,
    pub team_id: String,
    pub season: String,
    pub scope: ExtractScope,
    pub off_season: bool,
    pub extracted_at: DateTime<Utc>,
    pub files: Vec<ManifestFile>,
}

impl RunManifest {
    pub fn file(&self, table: TargetTable) -> Option<&ManifestFile> {
        self.files.iter().find(|f| f.table == table)
    }

    pub fn rows(&self, table: TargetTable) -> usize {
        self.file(table).map_or(0, |f| f.rows)
    }

    /// Writes the manifest atomically, replacing an earlier one.
    pub async fn write(&self, partition: &RunPartition) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomically(&partition.manifest_path(), &json).await
    }

    /// Reads the manifest of a partition. A missing manifest means extraction
    /// never completed for that date.
    pub async fn read(partition: &RunPartition) -> Result<Self, AppError> {
        let path = partition.manifest_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(AppError::extraction_incomplete(
                    path.display().to_string(),
                    "no manifest; extraction has not completed for this date",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| {
            AppError::extraction_incomplete(path.display().to_string(), format!("unreadable manifest: {e}"))
        })
    }
}

/// Writes `bytes` to a sibling temp file and renames it over `path`.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&temp, bytes).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Exclusive marker for an active run. Removed when dropped.
///
/// The file holds `pid=<pid> started=<rfc3339>`. A lock whose process is no
/// longer running, or which is older than the stale bound, was left by a
/// crashed run and is replaced.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

/// Owner recorded in a lock file; either field may be unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LockHolder {
    pid: Option<u32>,
    started: Option<DateTime<Utc>>,
}

impl LockHolder {
    fn parse(content: &str) -> Self {
        let mut holder = LockHolder::default();
        for field in content.split_whitespace() {
            if let Some(pid) = field.strip_prefix("pid=") {
                holder.pid = pid.parse().ok();
            } else if let Some(started) = field.strip_prefix("started=") {
                holder.started = DateTime::parse_from_rfc3339(started)
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
            }
        }
        holder
    }
}

/// Whether `pid` names a running process; `None` when the platform gives no
/// cheap answer.
#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> Option<bool> {
    Some(Path::new("/proc").join(pid.to_string()).exists())
}

#[cfg(not(target_os = "linux"))]
fn process_alive(pid: u32) -> Option<bool> {
    (pid == std::process::id()).then_some(true)
}

/// Decides whether the lock at `path` was left by a run that is gone.
fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let holder = std::fs::read_to_string(path)
        .map(|content| LockHolder::parse(&content))
        .unwrap_or_default();

    if let Some(pid) = holder.pid
        && process_alive(pid) == Some(false)
    {
        warn!("Run lock {} belongs to exited process {pid}", path.display());
        return true;
    }

    let age = match holder.started {
        Some(started) => (Utc::now() - started).to_std().unwrap_or_default(),
        None => std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or_default(),
    };
    if age > stale_after {
        warn!(
            "Run lock {} is {}s old, past the {}s bound",
            path.display(),
            age.as_secs(),
            stale_after.as_secs()
        );
        return true;
    }
    false
}

impl RunLock {
    /// Creates the lock file of `partition`; fails if another live run holds
    /// it. A stale lock is replaced. The partition directory must exist.
    pub fn acquire(partition: &RunPartition, stale_after: Duration) -> Result<Self, AppError> {
        let path = partition.lock_path();
        let mut file = match Self::create(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                if !is_stale(&path, stale_after) {
                    return Err(Self::active(partition, &path));
                }
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == IoErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                info!("Replaced stale run lock {}", path.display());
                match Self::create(&path) {
                    Ok(file) => file,
                    // Another run took it over first
                    Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                        return Err(Self::active(partition, &path));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "pid={} started={}", std::process::id(), Utc::now().to_rfc3339())?;
        debug!("Acquired run lock {}", path.display());
        Ok(RunLock { path })
    }

    fn create(path: &Path) -> std::io::Result<File> {
        OpenOptions::new().write(true).create_new(true).open(path)
    }

    fn active(partition: &RunPartition, path: &Path) -> AppError {
        AppError::RunAlreadyActive {
            run_date: partition.run_date().to_string(),
            lock_path: path.display().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove run lock {}: {}", self.path.display(), e);
        }
    }
}
