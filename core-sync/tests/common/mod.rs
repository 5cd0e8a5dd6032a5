//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    HashTracker, Item, ItemKind, LocalStore, ManifestSection, ManifestStore, ModificationState,
    PageRequest, RemoteCollection, TrackedFile,
};
use chrono::{DateTime, Utc};
use core_async::sync::Mutex as AsyncMutex;
use core_async::time::{sleep, Duration};
use core_runtime::config::SyncConfig;
use core_runtime::events::{EventBus, EventStream};
use core_sync::{SyncContext, SyncEngine};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Remote collection
// ============================================================================

/// Remote collection backed by a vector, with scripted failures.
///
/// Failures are keyed by item name for create/update and by id for
/// get/delete. Each scripted failure is consumed by one call.
#[derive(Default)]
pub struct FakeRemote {
    items: AsyncMutex<Vec<Item>>,
    failures: AsyncMutex<HashMap<String, VecDeque<BridgeError>>>,
    listing_failure_at: AsyncMutex<Option<usize>>,
    pages: AsyncMutex<Vec<PageRequest>>,
    since: AsyncMutex<Vec<Option<DateTime<Utc>>>>,
    calls: AsyncMutex<Vec<String>>,
    panic_on: AsyncMutex<Option<String>>,
    latency: AsyncMutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRemote {
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items: AsyncMutex::new(items),
            ..Self::default()
        }
    }

    pub async fn fail(&self, key: &str, error: BridgeError) {
        self.failures
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    pub async fn fail_times(&self, key: &str, times: usize, error: impl Fn() -> BridgeError) {
        for _ in 0..times {
            self.fail(key, error()).await;
        }
    }

    pub async fn fail_listing_at(&self, offset: usize) {
        *self.listing_failure_at.lock().await = Some(offset);
    }

    pub async fn panic_on(&self, key: &str) {
        *self.panic_on.lock().await = Some(key.to_string());
    }

    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.lock().await = Some(latency);
    }

    pub async fn set_item(&self, item: Item) {
        let mut items = self.items.lock().await;
        items.retain(|existing| existing.id != item.id);
        items.push(item);
    }

    pub async fn items(&self) -> Vec<Item> {
        self.items.lock().await.clone()
    }

    pub async fn pages(&self) -> Vec<PageRequest> {
        self.pages.lock().await.clone()
    }

    pub async fn since_log(&self) -> Vec<Option<DateTime<Utc>>> {
        self.since.lock().await.clone()
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: String, key: &str) -> Result<()> {
        self.calls.lock().await.push(call);

        if self.panic_on.lock().await.as_deref() == Some(key) {
            panic!("remote connection lost while handling {}", key);
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .failures
            .lock()
            .await
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn page(&self, page: PageRequest) -> Result<Vec<Item>> {
        self.pages.lock().await.push(page);
        if *self.listing_failure_at.lock().await == Some(page.offset) {
            return Err(BridgeError::remote(500, "listing unavailable"));
        }

        Ok(self
            .items
            .lock()
            .await
            .iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RemoteCollection for FakeRemote {
    async fn get_item(&self, id: &str) -> Result<Item> {
        self.enter(format!("get:{}", id), id).await?;
        self.items
            .lock()
            .await
            .iter()
            .find(|item| item.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))
    }

    async fn get_items(&self, page: PageRequest) -> Result<Vec<Item>> {
        self.page(page).await
    }

    async fn get_item_by_path(&self, path: &str) -> Result<Item> {
        self.enter(format!("get-path:{}", path), path).await?;
        self.items
            .lock()
            .await
            .iter()
            .find(|item| item.path.as_deref() == Some(path))
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))
    }

    async fn get_modified_items(
        &self,
        page: PageRequest,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Item>> {
        self.since.lock().await.push(since);
        self.page(page).await
    }

    async fn create_item(&self, item: &Item) -> Result<Item> {
        self.enter(format!("create:{}", item.name), &item.name).await?;
        let created = item
            .clone()
            .with_id(format!("id-{}", item.name))
            .with_rev("1");
        self.items.lock().await.push(created.clone());
        Ok(created)
    }

    async fn update_item(&self, item: &Item) -> Result<Item> {
        self.enter(format!("update:{}", item.name), &item.name).await?;
        let next_rev = item
            .rev
            .as_deref()
            .and_then(|rev| rev.parse::<u64>().ok())
            .map_or(1, |rev| rev + 1);
        let updated = item.clone().with_rev(next_rev.to_string());
        self.set_item(updated.clone()).await;
        Ok(updated)
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        self.enter(format!("delete:{}", id), id).await?;
        let mut items = self.items.lock().await;
        let before = items.len();
        items.retain(|item| item.id.as_deref() != Some(id));
        if items.len() == before {
            return Err(BridgeError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Local store
// ============================================================================

/// Local store keyed by local name. Deleting also removes the file from
/// disk when it exists, so the store can sit on a real directory.
pub struct FakeStore {
    kind: ItemKind,
    base: PathBuf,
    items: AsyncMutex<HashMap<String, Item>>,
    failing_saves: AsyncMutex<HashSet<String>>,
    saves: AsyncMutex<Vec<String>>,
}

impl FakeStore {
    pub fn new(kind: ItemKind) -> Self {
        Self::at(kind, PathBuf::from("/content").join(kind.as_str()))
    }

    pub fn at(kind: ItemKind, base: PathBuf) -> Self {
        Self {
            kind,
            base,
            items: AsyncMutex::new(HashMap::new()),
            failing_saves: AsyncMutex::new(HashSet::new()),
            saves: AsyncMutex::new(Vec::new()),
        }
    }

    pub async fn insert(&self, item: Item) {
        let name = self.kind.local_name(&item);
        self.items.lock().await.insert(name, item);
    }

    pub async fn fail_save(&self, name: &str) {
        self.failing_saves.lock().await.insert(name.to_string());
    }

    pub async fn saves(&self) -> Vec<String> {
        self.saves.lock().await.clone()
    }

    pub async fn item(&self, name: &str) -> Option<Item> {
        self.items.lock().await.get(name).cloned()
    }
}

#[async_trait]
impl LocalStore for FakeStore {
    async fn get_item(&self, name: &str) -> Result<Item> {
        self.items
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))
    }

    async fn get_items(&self) -> Result<Vec<Item>> {
        Ok(self.items.lock().await.values().cloned().collect())
    }

    async fn save_item(&self, item: &Item) -> Result<Item> {
        let name = self.kind.local_name(item);
        if self.failing_saves.lock().await.contains(&name) {
            return Err(BridgeError::OperationFailed(format!("cannot write {}", name)));
        }
        self.saves.lock().await.push(name.clone());
        self.items.lock().await.insert(name, item.clone());
        Ok(item.clone())
    }

    async fn delete_item(&self, item: &Item) -> Result<Option<PathBuf>> {
        let name = self.kind.local_name(item);
        let removed = self.items.lock().await.remove(&name);
        let Some(removed) = removed else {
            return Ok(None);
        };

        let path = self.item_path(&removed);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(Some(path))
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.items.lock().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn extension(&self) -> &str {
        "json"
    }

    fn base_path(&self) -> PathBuf {
        self.base.clone()
    }

    fn item_path(&self, item: &Item) -> PathBuf {
        self.name_path(&self.kind.local_name(item))
    }

    fn name_path(&self, name: &str) -> PathBuf {
        self.base
            .join(format!("{}.{}", name.trim_start_matches('/'), self.extension()))
    }
}

// ============================================================================
// Hash tracker
// ============================================================================

#[derive(Default)]
pub struct FakeTracker {
    modified_paths: AsyncMutex<HashSet<PathBuf>>,
    changed_remote_ids: AsyncMutex<HashSet<String>>,
    unclassifiable_ids: AsyncMutex<HashSet<String>>,
    tracked: AsyncMutex<Vec<TrackedFile>>,
    updates: AsyncMutex<Vec<PathBuf>>,
    removed: AsyncMutex<Vec<PathBuf>>,
    last_pull: AsyncMutex<Option<DateTime<Utc>>>,
}

impl FakeTracker {
    pub async fn mark_local_modified(&self, path: PathBuf) {
        self.modified_paths.lock().await.insert(path);
    }

    pub async fn mark_remote_changed(&self, id: &str) {
        self.changed_remote_ids.lock().await.insert(id.to_string());
    }

    pub async fn fail_classification(&self, id: &str) {
        self.unclassifiable_ids.lock().await.insert(id.to_string());
    }

    pub async fn track(&self, id: Option<&str>, name: &str, path: PathBuf) {
        self.tracked.lock().await.push(TrackedFile {
            id: id.map(str::to_string),
            name: name.to_string(),
            path,
        });
    }

    pub async fn set_last_pull(&self, at: Option<DateTime<Utc>>) {
        *self.last_pull.lock().await = at;
    }

    pub async fn last_pull(&self) -> Option<DateTime<Utc>> {
        *self.last_pull.lock().await
    }

    pub async fn updates(&self) -> Vec<PathBuf> {
        self.updates.lock().await.clone()
    }

    pub async fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().await.clone()
    }
}

#[async_trait]
impl HashTracker for FakeTracker {
    async fn is_local_modified(&self, _states: &[ModificationState], path: &Path) -> Result<bool> {
        Ok(self.modified_paths.lock().await.contains(path))
    }

    async fn is_remote_modified(&self, _states: &[ModificationState], item: &Item) -> Result<bool> {
        let id = item.id.clone().unwrap_or_default();
        if self.unclassifiable_ids.lock().await.contains(&id) {
            return Err(BridgeError::OperationFailed("hash record corrupt".to_string()));
        }
        Ok(self.changed_remote_ids.lock().await.contains(&id))
    }

    async fn list_files(&self, base: &Path) -> Result<Vec<TrackedFile>> {
        Ok(self
            .tracked
            .lock()
            .await
            .iter()
            .filter(|file| file.path.starts_with(base))
            .cloned()
            .collect())
    }

    async fn update_hashes(&self, path: &Path, _item: &Item) -> Result<()> {
        self.updates.lock().await.push(path.to_path_buf());
        Ok(())
    }

    async fn remove_hashes(&self, paths: &[PathBuf]) -> Result<()> {
        self.removed.lock().await.extend_from_slice(paths);
        Ok(())
    }

    async fn last_pull_timestamp(&self, _kind: ItemKind) -> Result<Option<DateTime<Utc>>> {
        Ok(*self.last_pull.lock().await)
    }

    async fn set_last_pull_timestamp(&self, _kind: ItemKind, at: DateTime<Utc>) -> Result<()> {
        *self.last_pull.lock().await = Some(at);
        Ok(())
    }
}

// ============================================================================
// Manifest store
// ============================================================================

#[derive(Default)]
pub struct FakeManifests {
    sections: AsyncMutex<HashMap<(String, ItemKind), ManifestSection>>,
}

impl FakeManifests {
    pub async fn set_section(&self, manifest: &str, kind: ItemKind, section: ManifestSection) {
        self.sections
            .lock()
            .await
            .insert((manifest.to_string(), kind), section);
    }

    pub async fn section(&self, manifest: &str, kind: ItemKind) -> ManifestSection {
        self.sections
            .lock()
            .await
            .get(&(manifest.to_string(), kind))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ManifestStore for FakeManifests {
    async fn get_manifest_section(
        &self,
        manifest: &str,
        kind: ItemKind,
    ) -> Result<Option<ManifestSection>> {
        Ok(self
            .sections
            .lock()
            .await
            .get(&(manifest.to_string(), kind))
            .cloned())
    }

    async fn remove_manifest_entries(
        &self,
        manifest: &str,
        kind: ItemKind,
        ids: &[String],
    ) -> Result<()> {
        if let Some(section) = self
            .sections
            .lock()
            .await
            .get_mut(&(manifest.to_string(), kind))
        {
            section.retain(|_, entry| {
                entry
                    .id
                    .as_ref()
                    .map_or(true, |id| !ids.contains(id))
            });
        }
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: SyncEngine,
    pub remote: Arc<FakeRemote>,
    pub store: Arc<FakeStore>,
    pub tracker: Arc<FakeTracker>,
    pub manifests: Arc<FakeManifests>,
    pub bus: EventBus,
    pub ctx: SyncContext,
}

impl Harness {
    pub fn new(kind: ItemKind, remote_items: Vec<Item>) -> Self {
        Self::with_config(kind, remote_items, SyncConfig::default())
    }

    pub fn with_config(kind: ItemKind, remote_items: Vec<Item>, config: SyncConfig) -> Self {
        let remote = Arc::new(FakeRemote::with_items(remote_items));
        let store = Arc::new(FakeStore::new(kind));
        let tracker = Arc::new(FakeTracker::default());
        let manifests = Arc::new(FakeManifests::default());

        let engine = SyncEngine::builder(kind)
            .config(config)
            .remote(remote.clone())
            .local(store.clone())
            .hashes(tracker.clone())
            .manifests(manifests.clone())
            .build()
            .expect("engine builds");

        let bus = EventBus::new(256);
        let ctx = SyncContext::with_events(bus.clone());

        Self {
            engine,
            remote,
            store,
            tracker,
            manifests,
            bus,
            ctx,
        }
    }

    pub fn events(&self) -> EventStream {
        self.bus.subscribe()
    }

    pub fn store_path(&self, name: &str) -> PathBuf {
        self.store.name_path(name)
    }
}

/// Remote item named `name` with id `id-{name}` and revision 1.
pub fn remote_item(name: &str) -> Item {
    Item::new(name)
        .with_id(format!("id-{}", name))
        .with_rev("1")
        .with_field("title", name.to_uppercase())
}

/// `count` remote items named `item-000`, `item-001`, ...
pub fn numbered_items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| remote_item(&format!("item-{:03}", i)))
        .collect()
}

pub fn names(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| item.name.clone()).collect()
}

/// Event names received so far, in order.
pub fn event_names(stream: &mut EventStream) -> Vec<&'static str> {
    stream.drain().iter().map(|event| event.name()).collect()
}
