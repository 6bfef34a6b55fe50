//! Persistence for the capsule collection.
//!
//! One port, two backends: `LocalBackend` keeps the whole collection in a
//! single JSON file with atomic rewrites and optional snapshots, while
//! `RemoteBackend` talks to a capsule service over HTTP. The store picks one
//! at startup and never cares which.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, trace, warn};
use reqwest::StatusCode;
use serde::Serialize;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::{Capsule, CapsuleColor, CapsuleError, CapsuleId, Config, Mood, Result};

/// Request timeout for the remote capsule service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Persistence port for the capsule collection.
///
/// Mutating calls receive the collection as it looks after the mutation, so
/// file-based backends can rewrite the whole document while per-record
/// backends use only the affected capsule.
#[async_trait]
pub trait CapsuleBackend: Send + Sync {
    /// Human-readable description used in logs and the config command.
    fn describe(&self) -> String;

    /// Loads the full capsule collection.
    async fn load(&self) -> Result<Vec<Capsule>>;

    /// Rewrites the full capsule collection.
    async fn save_all(&self, capsules: &[Capsule]) -> Result<()>;

    /// Persists a newly created capsule. Returns the stored record when the
    /// backend assigns fields of its own (the remote service assigns ids).
    async fn create(&self, capsule: &Capsule, all: &[Capsule]) -> Result<Option<Capsule>>;

    /// Persists the lock and opened-at fields of one capsule.
    async fn patch(&self, capsule: &Capsule, all: &[Capsule]) -> Result<()>;

    /// Persists the removal of one capsule.
    async fn delete(&self, id: CapsuleId, all: &[Capsule]) -> Result<()>;
}

/// Stores the capsule collection in `<data_dir>/capsules.json`.
pub struct LocalBackend {
    config: Config,
}

impl LocalBackend {
    /// Creates a local backend over the configured data directory.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn ensure_data_dir(&self) -> Result<()> {
        let dir = &self.config.data_dir;
        if !dir.exists() {
            debug!("Data directory does not exist, creating: {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                error!("Failed to create data directory: {}", e);
                CapsuleError::DirectoryError { path: dir.clone() }
            })?;
        }
        Ok(())
    }

    /// Rewrites the collection file using atomic operations to prevent data
    /// corruption. A snapshot of the previous file is taken first when
    /// auto-backup is enabled.
    fn write_collection(&self, capsules: &[Capsule]) -> Result<()> {
        self.ensure_data_dir()?;
        let file_path = self.config.capsule_file();

        if self.config.auto_backup {
            match self.snapshot_previous(&file_path) {
                Ok(_) => trace!("Snapshot step complete"),
                Err(e) => warn!("Failed to snapshot previous capsule file: {}", e),
            }
        }

        // Create a temporary file in the same directory (for atomic operation)
        let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
        debug!("Creating temporary file in directory: {}", dir.display());
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            CapsuleError::Io(e)
        })?;

        trace!("Serializing capsule collection to JSON");
        let json = serde_json::to_string_pretty(capsules).map_err(|e| {
            error!("Failed to serialize capsules: {}", e);
            CapsuleError::Serialization(e)
        })?;

        trace!("Writing to temporary file");
        temp_file.write_all(json.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            CapsuleError::Io(e)
        })?;

        temp_file.flush().map_err(|e| {
            error!("Failed to flush temporary file: {}", e);
            CapsuleError::Io(e)
        })?;

        // Atomically move the temporary file to the target location
        debug!("Performing atomic move of temporary file to final location");
        temp_file.persist(&file_path).map_err(|e| {
            error!(
                "Failed to persist file {}: {}",
                file_path.display(),
                e.error
            );
            CapsuleError::Io(e.error)
        })?;

        info!(
            "Saved {} capsules to {}",
            capsules.len(),
            file_path.display()
        );
        Ok(())
    }

    /// Copies the current collection file into the backup directory with a
    /// timestamped name, then prunes the oldest snapshots.
    fn snapshot_previous(&self, file_path: &Path) -> Result<()> {
        if !file_path.exists() {
            trace!("No previous capsule file to snapshot");
            return Ok(());
        }

        let backup_dir = self.config.backup_dir();
        if !backup_dir.exists() {
            debug!("Creating backup directory: {}", backup_dir.display());
            fs::create_dir_all(&backup_dir).map_err(|e| {
                error!("Failed to create backup directory: {}", e);
                CapsuleError::DirectoryError { path: backup_dir.clone() }
            })?;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut backup_path = backup_dir.join(format!("capsules_{}.json", timestamp));

        // A second rewrite within the same second would reuse the name;
        // suffix a counter so the earlier snapshot survives
        let mut attempt = 1;
        while backup_path.exists() {
            backup_path = backup_dir.join(format!("capsules_{}_{}.json", timestamp, attempt));
            attempt += 1;
        }

        fs::copy(file_path, &backup_path)?;
        debug!("Snapshot created at: {}", backup_path.display());

        self.cleanup_old_snapshots(&backup_dir)
    }

    /// Removes old snapshots if their number exceeds the configured limit.
    /// Uses a BinaryHeap for efficient identification of the oldest files.
    fn cleanup_old_snapshots(&self, backup_dir: &Path) -> Result<()> {
        // If max_backups is 0, keep all snapshots
        if self.config.max_backups == 0 {
            return Ok(());
        }

        // Custom wrapper to compare snapshots by modification time
        #[derive(Debug, Eq)]
        struct Snapshot {
            path: PathBuf,
            modified_time: SystemTime,
        }

        impl PartialEq for Snapshot {
            fn eq(&self, other: &Self) -> bool {
                self.modified_time.eq(&other.modified_time)
            }
        }

        impl PartialOrd for Snapshot {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for Snapshot {
            // Compare by modified time (newer snapshots are "greater")
            fn cmp(&self, other: &Self) -> Ordering {
                self.modified_time.cmp(&other.modified_time)
            }
        }

        // By using Reverse, we make this a min-heap where the oldest
        // snapshots surface at the top
        let mut newest_snapshots: BinaryHeap<Reverse<Snapshot>> =
            BinaryHeap::with_capacity((self.config.max_backups + 1) as usize);

        for entry in WalkDir::new(backup_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            let path = entry.path();

            // Only consider files matching our snapshot naming pattern
            if path.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("capsules_"))
            {
                if let Ok(metadata) = entry.metadata() {
                    if let Ok(modified_time) = metadata.modified() {
                        newest_snapshots.push(Reverse(Snapshot {
                            path: path.to_path_buf(),
                            modified_time,
                        }));

                        // Past the limit, drop the oldest (top of the min-heap)
                        if newest_snapshots.len() > self.config.max_backups as usize {
                            if let Some(Reverse(oldest)) = newest_snapshots.pop() {
                                match fs::remove_file(&oldest.path) {
                                    Ok(_) => {
                                        debug!("Removed old snapshot: {}", oldest.path.display());
                                    }
                                    Err(e) => {
                                        warn!(
                                            "Failed to remove old snapshot {}: {}",
                                            oldest.path.display(),
                                            e
                                        );
                                        // Continue processing even if we couldn't delete this file
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CapsuleBackend for LocalBackend {
    fn describe(&self) -> String {
        format!("local file at {}", self.config.capsule_file().display())
    }

    async fn load(&self) -> Result<Vec<Capsule>> {
        let file_path = self.config.capsule_file();

        if !file_path.exists() {
            info!(
                "No capsule file at {}, starting with an empty collection",
                file_path.display()
            );
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&file_path)?;
        let capsules: Vec<Capsule> = serde_json::from_str(&raw)?;
        info!(
            "Loaded {} capsules from {}",
            capsules.len(),
            file_path.display()
        );
        Ok(capsules)
    }

    async fn save_all(&self, capsules: &[Capsule]) -> Result<()> {
        self.write_collection(capsules)
    }

    async fn create(&self, capsule: &Capsule, all: &[Capsule]) -> Result<Option<Capsule>> {
        debug!("Persisting new capsule {} locally", capsule.id);
        self.write_collection(all)?;
        // The local backend never reassigns fields
        Ok(None)
    }

    async fn patch(&self, capsule: &Capsule, all: &[Capsule]) -> Result<()> {
        debug!("Persisting open of capsule {} locally", capsule.id);
        self.write_collection(all)
    }

    async fn delete(&self, id: CapsuleId, all: &[Capsule]) -> Result<()> {
        debug!("Persisting removal of capsule {} locally", id);
        self.write_collection(all)
    }
}

/// Talks to the remote capsule service under `{base_url}/capsules`.
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
}

/// POST body for a new capsule. The service assigns id, createdAt and the
/// lock flag itself.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    title: &'a str,
    message: &'a str,
    open_date: NaiveDate,
    mood: Mood,
    color: CapsuleColor,
}

/// PATCH body recording the open transition.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PatchBody {
    is_locked: bool,
    opened_at: Option<DateTime<Utc>>,
}

impl RemoteBackend {
    /// Creates a remote backend for the given service base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/capsules", self.base_url)
    }

    fn capsule_url(&self, id: CapsuleId) -> String {
        format!("{}/capsules/{}", self.base_url, id)
    }
}

#[async_trait]
impl CapsuleBackend for RemoteBackend {
    fn describe(&self) -> String {
        format!("remote capsule service at {}", self.base_url)
    }

    async fn load(&self) -> Result<Vec<Capsule>> {
        let url = self.collection_url();
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let capsules: Vec<Capsule> = response.json().await?;
        info!("Fetched {} capsules from {}", capsules.len(), url);
        Ok(capsules)
    }

    async fn save_all(&self, _capsules: &[Capsule]) -> Result<()> {
        // The service has no bulk endpoint; the per-operation calls below
        // carry the sync instead
        trace!("save_all is a no-op for the remote backend");
        Ok(())
    }

    async fn create(&self, capsule: &Capsule, _all: &[Capsule]) -> Result<Option<Capsule>> {
        let url = self.collection_url();
        let body = CreateBody {
            title: &capsule.title,
            message: &capsule.message,
            open_date: capsule.open_date,
            mood: capsule.mood,
            color: capsule.color,
        };

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let stored: Capsule = response.json().await?;
        info!("Capsule stored remotely with id {}", stored.id);
        Ok(Some(stored))
    }

    async fn patch(&self, capsule: &Capsule, _all: &[Capsule]) -> Result<()> {
        let url = self.capsule_url(capsule.id);
        let body = PatchBody {
            is_locked: capsule.is_locked,
            opened_at: capsule.opened_at,
        };

        debug!("PATCH {}", url);
        let response = self.client.patch(&url).json(&body).send().await?;
        let status = response.status();

        // Older deployments of the service have no PATCH route
        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            warn!(
                "Capsule service has no PATCH endpoint ({}), open recorded locally only",
                status
            );
            return Ok(());
        }

        if !status.is_success() {
            error!("PATCH {} failed with {}", url, status);
            return Err(CapsuleError::ServiceStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(())
    }

    async fn delete(&self, id: CapsuleId, _all: &[Capsule]) -> Result<()> {
        let url = self.capsule_url(id);
        debug!("DELETE {}", url);
        let response = self.client.delete(&url).send().await?;
        let status = response.status();

        // The record being gone already is the outcome we wanted
        if status == StatusCode::NOT_FOUND {
            debug!("Capsule {} was already absent remotely", id);
            return Ok(());
        }

        if !status.is_success() {
            error!("DELETE {} failed with {}", url, status);
            return Err(CapsuleError::ServiceStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(())
    }
}
