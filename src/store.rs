//! The realtime announcement store.
//!
//! [`AnnouncementStore`] is the contract the feed depends on: durable
//! append with server-assigned identity and creation time, and push-based
//! subscription to query results. [`Store`] is the in-process implementation,
//! optionally backed by an append-only log on disk.

use crate::error::{Result, StoreError};
use crate::query::AnnouncementQuery;
use crate::records::AnnouncementLog;
use crate::subscriptions::{SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionRegistry};
use crate::types::{Announcement, AnnouncementId, NewAnnouncement, Timestamp};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A realtime document store for announcements.
pub trait AnnouncementStore: Send + Sync {
    /// Durably append a record. The store assigns `id` and `created_at`.
    fn append(&self, input: NewAnnouncement) -> Result<Announcement>;

    /// Start a live query. The handle receives the current result set
    /// immediately, then a new snapshot whenever it changes.
    fn subscribe(&self, query: &AnnouncementQuery) -> Result<SubscriptionHandle>;

    /// Stop a live query. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory for the durable log. `None` keeps everything in memory.
    pub path: Option<PathBuf>,

    /// Sync the log every N appends.
    pub sync_interval: u64,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    pub subscription: SubscriptionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            sync_interval: AnnouncementLog::DEFAULT_SYNC_INTERVAL,
            create_if_missing: true,
            subscription: SubscriptionConfig::default(),
        }
    }
}

impl StoreConfig {
    /// File-backed configuration rooted at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"BLT\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

const LOG_FILE: &str = "announcements.log";

/// On-disk half of a file-backed store.
struct Durability {
    path: PathBuf,
    /// Lock file for exclusive access.
    _lock_file: File,
    log: AnnouncementLog,
}

/// Records plus the counters used to stamp new ones.
struct Records {
    /// Insertion order, which is also ascending `created_at`.
    items: Vec<Announcement>,
    next_id: u64,
    last_created_at: Timestamp,
}

impl Records {
    fn from_replay(items: Vec<Announcement>) -> Self {
        let next_id = items.iter().map(|a| a.id.0).max().unwrap_or(0) + 1;
        let last_created_at = items
            .iter()
            .map(|a| a.created_at)
            .max()
            .unwrap_or(Timestamp(0));
        Self {
            items,
            next_id,
            last_created_at,
        }
    }
}

/// In-process realtime announcement store.
pub struct Store {
    records: RwLock<Records>,
    subscriptions: SubscriptionRegistry,
    durability: Option<Durability>,
}

impl Store {
    /// A memory-only store with default settings.
    pub fn in_memory() -> Self {
        Self::memory(SubscriptionConfig::default())
    }

    fn memory(subscription: SubscriptionConfig) -> Self {
        Self {
            records: RwLock::new(Records::from_replay(Vec::new())),
            subscriptions: SubscriptionRegistry::new(subscription),
            durability: None,
        }
    }

    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        let Some(path) = config.path.as_deref() else {
            return Ok(Self::memory(config.subscription));
        };

        if path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store. A config without a path yields a memory-only store.
    ///
    /// Fails with `StoreExists` if the directory already holds a store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        let Some(path) = config.path.clone() else {
            return Ok(Self::memory(config.subscription));
        };

        fs::create_dir_all(&path)?;
        if path.join("MANIFEST").exists() {
            return Err(StoreError::StoreExists(path.display().to_string()));
        }
        let lock_file = Self::acquire_lock(&path)?;
        Self::write_manifest(&path)?;
        let log = AnnouncementLog::open_with_sync_interval(path.join(LOG_FILE), config.sync_interval)?;

        info!(path = %path.display(), "created announcement store");

        Ok(Self {
            records: RwLock::new(Records::from_replay(Vec::new())),
            subscriptions: SubscriptionRegistry::new(config.subscription),
            durability: Some(Durability {
                path,
                _lock_file: lock_file,
                log,
            }),
        })
    }

    /// Open an existing store, replaying its log.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let Some(path) = config.path.clone() else {
            return Err(StoreError::NotInitialized);
        };

        Self::verify_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;
        let log = AnnouncementLog::open_with_sync_interval(path.join(LOG_FILE), config.sync_interval)?;
        let items = log.replay()?;

        info!(path = %path.display(), records = items.len(), "opened announcement store");

        Ok(Self {
            records: RwLock::new(Records::from_replay(items)),
            subscriptions: SubscriptionRegistry::new(config.subscription),
            durability: Some(Durability {
                path,
                _lock_file: lock_file,
                log,
            }),
        })
    }

    /// One-shot read of a query's current result set.
    pub fn query(&self, query: &AnnouncementQuery) -> Vec<Announcement> {
        query.select(&self.records.read().items)
    }

    /// Number of stored announcements.
    pub fn len(&self) -> usize {
        self.records.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.count()
    }

    /// Sync the log to disk. No-op for memory-only stores.
    pub fn sync(&self) -> Result<()> {
        match &self.durability {
            Some(d) => d.log.sync(),
            None => Ok(()),
        }
    }

    /// Get the store directory, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.durability.as_ref().map(|d| d.path.as_path())
    }

    // --- Private Helpers ---

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let manifest_path = path.join("MANIFEST");
        if !manifest_path.exists() {
            return Err(StoreError::NotInitialized);
        }
        let mut file = File::open(manifest_path)?;

        let mut header = [0u8; 5];
        file.read_exact(&mut header)
            .map_err(|_| StoreError::InvalidFormat("Truncated manifest".into()))?;
        if &header[0..4] != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }
        if header[4] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                header[4]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl AnnouncementStore for Store {
    fn append(&self, input: NewAnnouncement) -> Result<Announcement> {
        let mut records = self.records.write();

        let id = AnnouncementId(records.next_id);
        let created_at = records.last_created_at.next_after();
        let announcement = input.into_announcement(id, created_at);

        // Persist before the record becomes visible.
        if let Some(d) = &self.durability {
            d.log.append(&announcement)?;
        }

        records.next_id += 1;
        records.last_created_at = created_at;
        records.items.push(announcement.clone());

        debug!(id = %id, building = %announcement.building, "announcement appended");

        // Still under the write lock, so snapshots go out in append order.
        self.subscriptions
            .broadcast_append(&announcement, &records.items);

        Ok(announcement)
    }

    fn subscribe(&self, query: &AnnouncementQuery) -> Result<SubscriptionHandle> {
        let records = self.records.read();
        Ok(self.subscriptions.register(query.clone(), &records.items))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.remove(id);
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.subscriptions.close_all();
        // Best-effort sync on drop
        let _ = self.sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::build_query;
    use crate::subscriptions::StoreEvent;
    use crate::types::Building;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> StoreConfig {
        StoreConfig::at(dir.path().join("store"))
    }

    fn post(store: &Store, title: &str, building: &str) -> Announcement {
        store
            .append(NewAnnouncement::new(title, "body", Building::target_or_all(building)))
            .unwrap()
    }

    #[test]
    fn test_create_store() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();

        let path = store.path().unwrap();
        assert!(path.join("MANIFEST").exists());
        assert!(path.join(LOG_FILE).exists());
    }

    #[test]
    fn test_append_assigns_identity() {
        let store = Store::in_memory();

        let first = post(&store, "one", "D102");
        let second = post(&store, "two", "D102");

        assert_ne!(first.id, second.id);
        assert!(second.created_at > first.created_at);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_query_newest_first() {
        let store = Store::in_memory();
        post(&store, "old", "D102");
        post(&store, "elsewhere", "B7");
        post(&store, "everyone", "ALL");

        let titles: Vec<String> = store
            .query(&build_query("d102").unwrap())
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["everyone", "old"]);
    }

    #[test]
    fn test_subscribe_receives_initial_then_updates() {
        let store = Store::in_memory();
        post(&store, "before", "D102");

        let handle = store.subscribe(&build_query("D102").unwrap()).unwrap();
        match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
            StoreEvent::Snapshot { announcements, .. } => assert_eq!(announcements.len(), 1),
            other => panic!("Expected Snapshot event, got {:?}", other),
        }

        // Non-matching append pushes nothing
        post(&store, "other", "B7");
        assert!(handle.try_recv().is_err());

        post(&store, "after", "ALL");
        match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
            StoreEvent::Snapshot { announcements, .. } => {
                assert_eq!(announcements[0].title, "after");
                assert_eq!(announcements[1].title, "before");
            }
            other => panic!("Expected Snapshot event, got {:?}", other),
        }
    }

    #[test]
    fn test_unsubscribe_releases() {
        let store = Store::in_memory();
        let handle = store.subscribe(&build_query("D102").unwrap()).unwrap();
        assert_eq!(store.subscription_count(), 1);

        store.unsubscribe(handle.id);
        assert_eq!(store.subscription_count(), 0);

        // Unknown ids are ignored
        store.unsubscribe(handle.id);
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let last = {
            let store = Store::create(config.clone()).unwrap();
            post(&store, "one", "D102");
            post(&store, "two", "ALL")
        };

        let store = Store::open(config).unwrap();
        assert_eq!(store.len(), 2);

        let next = post(&store, "three", "D102");
        assert!(next.id > last.id);
        assert!(next.created_at > last.created_at);
    }

    #[test]
    fn test_create_over_existing_store() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let first = {
            let store = Store::create(config.clone()).unwrap();
            post(&store, "a", "D102")
        };

        let result = Store::create(config.clone());
        assert!(matches!(result, Err(StoreError::StoreExists(_))));

        // Existing data is untouched and ids keep advancing
        let store = Store::open(config).unwrap();
        assert_eq!(store.len(), 1);
        let next = post(&store, "b", "D102");
        assert!(next.id > first.id);
    }

    #[test]
    fn test_create_while_locked_keeps_manifest() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let store = Store::create(config.clone()).unwrap();
        post(&store, "a", "ALL");

        assert!(matches!(
            Store::create(config.clone()),
            Err(StoreError::StoreExists(_))
        ));
        drop(store);

        assert_eq!(Store::open(config).unwrap().len(), 1);
    }

    #[test]
    fn test_store_lock() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let _store1 = Store::create(config.clone()).unwrap();

        // Second store should fail to acquire lock
        let result = Store::open(config);
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn test_open_missing_store() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            create_if_missing: false,
            ..test_config(&dir)
        };

        assert!(matches!(
            Store::open_or_create(config),
            Err(StoreError::NotInitialized)
        ));
    }

    #[test]
    fn test_drop_closes_subscriptions() {
        let store = Store::in_memory();
        let handle = store.subscribe(&build_query("ALL").unwrap()).unwrap();
        let _ = handle.try_recv();

        drop(store);
        assert!(matches!(
            handle.try_recv(),
            Ok(StoreEvent::Dropped { .. })
        ));
    }
}
