//! Durable store of granted permissions and domain metadata.

use crate::types::{DomainMetadata, Origin, Permission};
use auto_impl::auto_impl;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt, fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// Errors of the durable state backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access permissions state: {0}")]
    Io(#[from] io::Error),
    #[error("failed to (de)serialize permissions state: {0}")]
    Json(#[from] serde_json::Error),
    #[error("permissions state is read-only")]
    ReadOnly,
}

/// Grants of a single origin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub permissions: Vec<Permission>,
}

/// The complete persisted state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsState {
    #[serde(default)]
    pub domains: BTreeMap<Origin, DomainEntry>,
    #[serde(default)]
    pub domain_metadata: BTreeMap<Origin, DomainMetadata>,
}

/// Key-value persistence for [`PermissionsState`].
///
/// Loaded once when the [`PermissionStore`] is opened and flushed after every mutation.
#[auto_impl(&, Box, Arc)]
pub trait StateStore: Send + Sync {
    /// Loads the last persisted state, `None` if nothing was persisted yet.
    fn load(&self) -> Result<Option<PermissionsState>, StoreError>;

    /// Replaces the persisted state.
    fn persist(&self, state: &PermissionsState) -> Result<(), StoreError>;
}

/// A [`StateStore`] that lives in process memory.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<PermissionsState>>,
    writes: AtomicUsize,
    read_only: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `state`.
    pub fn with_state(state: PermissionsState) -> Self {
        Self { state: Mutex::new(Some(state)), ..Default::default() }
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns a copy of the persisted state.
    pub fn state(&self) -> Option<PermissionsState> {
        self.state.lock().clone()
    }

    /// Rejects all further writes with [`StoreError::ReadOnly`] while set.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PermissionsState>, StoreError> {
        Ok(self.state.lock().clone())
    }

    fn persist(&self, state: &PermissionsState) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::Relaxed) {
            return Err(StoreError::ReadOnly);
        }
        *self.state.lock() = Some(state.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A [`StateStore`] backed by a JSON file.
///
/// Writes go to a sibling temporary file which is then renamed over the target, so a crash never
/// leaves a truncated state file behind.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PermissionsState>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn persist(&self, state: &PermissionsState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, state)?;
        writer.flush()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory view of the permissions state, mirrored to a [`StateStore`].
///
/// Every mutation builds the next state, persists it and only then makes it visible, all under
/// the write lock. A failed write leaves the visible state unchanged.
#[derive(Clone)]
pub struct PermissionStore {
    state: Arc<RwLock<PermissionsState>>,
    backend: Arc<dyn StateStore>,
}

impl fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionStore").field("state", &*self.state.read()).finish_non_exhaustive()
    }
}

impl PermissionStore {
    /// Opens the store, loading the persisted state from `backend`.
    pub fn open(backend: Arc<dyn StateStore>) -> Result<Self, StoreError> {
        let state = backend.load()?.unwrap_or_default();
        debug!(
            target: "permissions::store",
            domains = state.domains.len(),
            metadata = state.domain_metadata.len(),
            "loaded permissions state"
        );
        Ok(Self { state: Arc::new(RwLock::new(state)), backend })
    }

    /// Creates an empty store backed by a [`MemoryStateStore`].
    pub fn in_memory() -> Self {
        Self {
            state: Default::default(),
            backend: Arc::new(MemoryStateStore::new()),
        }
    }

    /// Returns all permissions of the origin, in grant order.
    pub fn get_permissions(&self, origin: &Origin) -> Vec<Permission> {
        self.state
            .read()
            .domains
            .get(origin)
            .map(|entry| entry.permissions.clone())
            .unwrap_or_default()
    }

    /// Returns the origin's permission for `method`.
    pub fn get_permission(&self, origin: &Origin, method: &str) -> Option<Permission> {
        self.state.read().domains.get(origin).and_then(|entry| {
            entry.permissions.iter().find(|perm| perm.parent_capability == method).cloned()
        })
    }

    /// Replaces the full permission set of the origin. An empty set removes the origin.
    pub fn set_permissions(
        &self,
        origin: &Origin,
        permissions: Vec<Permission>,
    ) -> Result<(), StoreError> {
        self.update(|state| {
            if permissions.is_empty() {
                state.domains.remove(origin);
            } else {
                state.domains.insert(origin.clone(), DomainEntry { permissions });
            }
        })
    }

    /// Adds `permissions`, replacing any existing grant for the same method.
    pub fn grant(&self, origin: &Origin, permissions: Vec<Permission>) -> Result<(), StoreError> {
        self.update(|state| {
            let entry = state.domains.entry(origin.clone()).or_default();
            entry.permissions.retain(|existing| {
                !permissions.iter().any(|p| p.parent_capability == existing.parent_capability)
            });
            entry.permissions.extend(permissions);
        })
    }

    /// Removes the origin's grants for `methods`, returning the removed permissions.
    pub fn revoke(&self, origin: &Origin, methods: &[String]) -> Result<Vec<Permission>, StoreError> {
        self.update(|state| {
            let Some(entry) = state.domains.get_mut(origin) else { return Vec::new() };
            let (removed, kept) = std::mem::take(&mut entry.permissions)
                .into_iter()
                .partition(|perm| methods.contains(&perm.parent_capability));
            entry.permissions = kept;
            if entry.permissions.is_empty() {
                state.domains.remove(origin);
            }
            removed
        })
    }

    /// Removes every grant of every origin. Metadata is kept.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.update(|state| state.domains.clear())
    }

    pub fn get_metadata(&self, origin: &Origin) -> Option<DomainMetadata> {
        self.state.read().domain_metadata.get(origin).cloned()
    }

    pub fn set_metadata(&self, origin: &Origin, metadata: DomainMetadata) -> Result<(), StoreError> {
        self.update(|state| {
            state.domain_metadata.insert(origin.clone(), metadata);
        })
    }

    /// All origins that hold at least one permission.
    pub fn domains(&self) -> Vec<Origin> {
        self.state.read().domains.keys().cloned().collect()
    }

    /// All recorded domain metadata.
    pub fn metadata(&self) -> BTreeMap<Origin, DomainMetadata> {
        self.state.read().domain_metadata.clone()
    }

    pub fn snapshot(&self) -> PermissionsState {
        self.state.read().clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut PermissionsState) -> R) -> Result<R, StoreError> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let out = f(&mut next);
        if next == *state {
            return Ok(out);
        }
        if let Err(err) = self.backend.persist(&next) {
            warn!(target: "permissions::store", %err, "failed to persist permissions state");
            return Err(err);
        }
        trace!(target: "permissions::store", "persisted permissions state");
        *state = next;
        Ok(out)
    }
}
