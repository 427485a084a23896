//! Persistent deployment records, one set per network.

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::abi::ResolvedArg;

/// Name of the lock file guarding a network's record directory.
pub const LOCK_FILENAME: &str = ".lock";

/// A deployed unit on one network.
///
/// Created once, on the first successful deployment of `name`, and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    /// Constructor arguments used by the original deployment.
    pub args: Vec<ResolvedArg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// SHA-256 of the creation bytecode, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<String>,
    /// Unix timestamp of the deployment.
    pub deployed_at: i64,
}

/// Storage for the records of a single network.
pub trait DeploymentStore: Send {
    /// The network these records belong to.
    fn network(&self) -> &str;

    /// Look a record up by unit name.
    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>>;

    /// Store a new record. Fails if `name` is already recorded.
    fn insert(&mut self, record: DeploymentRecord) -> Result<()>;

    /// All records, sorted by name.
    fn records(&self) -> Result<Vec<DeploymentRecord>>;
}

/// Records kept as `<root>/<network>/<Unit>.json`.
///
/// The store holds an exclusive lock on the network directory for as long as
/// it lives, so two runs can never interleave check-then-deploy on the same
/// network.
#[derive(Debug)]
pub struct FileStore {
    network: String,
    dir: PathBuf,
    _lock: File,
}

impl FileStore {
    /// Open (and lock) the record directory of `network` under `root`.
    pub fn open(root: &Path, network: &str) -> Result<Self> {
        validate_network_name(network)?;

        let dir = root.join(network);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create deployments directory {}", dir.display()))?;

        let lock_path = dir.join(LOCK_FILENAME);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        lock.try_lock_exclusive().with_context(|| {
            format!(
                "Another deployment run holds the lock on network {} ({})",
                network,
                lock_path.display()
            )
        })?;

        tracing::debug!(network, dir = %dir.display(), "Opened deployment records");

        Ok(Self {
            network: network.to_string(),
            dir,
            _lock: lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Paths of every `*.json` file in the record directory, unparsed.
    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Delete every record of this network. Returns the number removed.
    ///
    /// Files are removed without being parsed, so a corrupted record does not
    /// block the reset.
    pub fn reset(&mut self) -> Result<usize> {
        let mut removed = 0;
        for path in self.record_files()? {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }

        tracing::info!(network = %self.network, removed, "Deployment records reset");
        Ok(removed)
    }
}

impl DeploymentStore for FileStore {
    fn network(&self) -> &str {
        &self.network
    }

    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read deployment record {}", path.display()))?;
        let record: DeploymentRecord = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse deployment record {}", path.display()))?;

        if record.name != name {
            anyhow::bail!(
                "Deployment record {} is for unit {}, expected {}",
                path.display(),
                record.name,
                name
            );
        }

        Ok(Some(record))
    }

    fn insert(&mut self, record: DeploymentRecord) -> Result<()> {
        let path = self.record_path(&record.name);
        if path.exists() {
            anyhow::bail!(
                "Unit {} is already recorded on network {}",
                record.name,
                self.network
            );
        }

        let json =
            serde_json::to_string_pretty(&record).context("Failed to serialize deployment record")?;

        // Write aside then rename, so an interrupted write never leaves a
        // truncated record behind.
        let tmp = self.dir.join(format!(".{}.json.tmp", record.name));
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write deployment record {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move deployment record to {}", path.display()))?;

        Ok(())
    }

    fn records(&self) -> Result<Vec<DeploymentRecord>> {
        let mut records = Vec::new();
        for path in self.record_files()? {
            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str())
                && let Some(record) = self.get(name)?
            {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

/// In-memory records. Clones share the same underlying set.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    network: String,
    records: Arc<Mutex<BTreeMap<String, DeploymentRecord>>>,
}

impl MemoryStore {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            records: Arc::default(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, DeploymentRecord>>> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("Deployment record set is poisoned"))
    }
}

impl DeploymentStore for MemoryStore {
    fn network(&self) -> &str {
        &self.network
    }

    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn insert(&mut self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.lock()?;
        if records.contains_key(&record.name) {
            anyhow::bail!(
                "Unit {} is already recorded on network {}",
                record.name,
                self.network
            );
        }
        records.insert(record.name.clone(), record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<DeploymentRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

fn validate_network_name(network: &str) -> Result<()> {
    if network.is_empty() || network == "." || network == ".." || network.contains(['/', '\\']) {
        anyhow::bail!("Invalid network name for a records directory: {network:?}");
    }
    Ok(())
}
