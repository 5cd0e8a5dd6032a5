//! # Reconciliation Engine
//!
//! Single-item transfers between one remote collection and its local cache.
//!
//! ## Overview
//!
//! A [`SyncEngine`] is bound to one [`ItemKind`] and holds the collaborators
//! for it. Single-item operations live here; bulk traversal is implemented
//! in `bulk` and `manifest` on the same type.
//!
//! ## Pull
//!
//! 1. Fetch the item (by path for path-based kinds when the identifier
//!    starts with `/`, by id otherwise). A fetch failure emits `pulled-error`
//!    for the identifier and propagates the original error.
//! 2. Skip silently when the item is rejected by the filters or the policy.
//! 3. Save locally, then record the transfer with the hash tracker.
//! 4. Emit `pulled`, or `pulled-error` when the save failed.
//!
//! ## Push
//!
//! 1. Read the local copy; skip silently when rejected.
//! 2. Create when the copy has no revision, update otherwise.
//! 3. On a 409 from update, refetch and compare ignoring volatile fields.
//!    A volatile-only difference counts as success with the fresh remote
//!    copy; anything else is a conflict.
//! 4. Mirror the result locally (unless rewrite-on-push is off), record the
//!    transfer and emit `pushed`.
//!
//! Retryable failures are not reported on the event channel unless the
//! [`Attempt`] says no retry will follow. Every failure is returned.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{
    FileSystemAccess, HashTracker, Item, ItemKind, LocalStore, ManifestStore, RemoteCollection,
};
use core_runtime::config::{ItemPredicate, ResolvedOptions, SyncConfig, SyncOptions};
use core_runtime::events::SyncEvent;
use tracing::{debug, info, instrument, warn};

use crate::conflict;
use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::retry::Attempt;

// ============================================================================
// Item Policy
// ============================================================================

/// Kind-level predicates deciding which items may be transferred.
///
/// Unset predicates allow everything. These apply on top of the per-call
/// filters in [`SyncOptions`].
#[derive(Clone, Default)]
pub struct ItemPolicy {
    can_pull: Option<ItemPredicate>,
    can_push: Option<ItemPredicate>,
    can_delete: Option<ItemPredicate>,
}

impl ItemPolicy {
    pub fn with_can_pull<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.can_pull = Some(Arc::new(predicate));
        self
    }

    pub fn with_can_push<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.can_push = Some(Arc::new(predicate));
        self
    }

    pub fn with_can_delete<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.can_delete = Some(Arc::new(predicate));
        self
    }

    fn allows(predicate: &Option<ItemPredicate>, item: &Item) -> bool {
        predicate.as_ref().map_or(true, |p| p(item))
    }
}

impl fmt::Debug for ItemPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemPolicy")
            .field("can_pull", &self.can_pull.is_some())
            .field("can_push", &self.can_push.is_some())
            .field("can_delete", &self.can_delete.is_some())
            .finish()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Push/pull engine for one item kind.
///
/// Cloning is cheap; clones share collaborators.
#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) kind: ItemKind,
    pub(crate) config: Arc<SyncConfig>,
    pub(crate) remote: Arc<dyn RemoteCollection>,
    pub(crate) local: Arc<dyn LocalStore>,
    pub(crate) hashes: Arc<dyn HashTracker>,
    pub(crate) manifests: Option<Arc<dyn ManifestStore>>,
    pub(crate) file_system: Option<Arc<dyn FileSystemAccess>>,
    pub(crate) policy: ItemPolicy,
}

impl SyncEngine {
    pub fn builder(kind: ItemKind) -> SyncEngineBuilder {
        SyncEngineBuilder::new(kind)
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Effective options of a call on this engine's kind.
    pub fn resolve(&self, options: &SyncOptions) -> Result<ResolvedOptions> {
        Ok(self.config.resolve(self.kind, options)?)
    }

    pub(crate) fn can_pull(&self, item: &Item, resolved: &ResolvedOptions) -> bool {
        resolved.admits(item) && ItemPolicy::allows(&self.policy.can_pull, item)
    }

    pub(crate) fn can_push(&self, item: &Item, resolved: &ResolvedOptions) -> bool {
        resolved.admits(item) && ItemPolicy::allows(&self.policy.can_push, item)
    }

    pub(crate) fn can_delete(&self, item: &Item, resolved: &ResolvedOptions) -> bool {
        resolved.admits(item) && ItemPolicy::allows(&self.policy.can_delete, item)
    }

    // ------------------------------------------------------------------------
    // Pull
    // ------------------------------------------------------------------------

    /// Pulls one item into the local store.
    ///
    /// Returns `Ok(None)` when the item was filtered out.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn pull_item(
        &self,
        ctx: &SyncContext,
        identifier: &str,
        options: &SyncOptions,
    ) -> Result<Option<Item>> {
        let resolved = self.resolve(options)?;
        let remote = match self.fetch_remote(identifier).await {
            Ok(remote) => remote,
            Err(err) => {
                warn!(kind = %self.kind, identifier, error = %err, "Pull fetch failed");
                ctx.emit(SyncEvent::PulledError {
                    kind: self.kind,
                    item: self.identifier_ref(identifier),
                    error: err.to_event_error(),
                });
                return Err(err);
            }
        };

        if !self.can_pull(&remote, &resolved) {
            debug!(name = %remote.name, "Pull skipped by filter");
            return Ok(None);
        }

        self.save_pulled(ctx, remote).await.map(Some)
    }

    fn is_path_identifier(&self, identifier: &str) -> bool {
        self.kind.is_path_based() && identifier.starts_with('/')
    }

    async fn fetch_remote(&self, identifier: &str) -> Result<Item> {
        let item = if self.is_path_identifier(identifier) {
            self.remote.get_item_by_path(identifier).await?
        } else {
            self.remote.get_item(identifier).await?
        };
        Ok(item)
    }

    /// Reference for an item known only by the identifier it was asked for.
    fn identifier_ref(&self, identifier: &str) -> bridge_traits::ItemRef {
        let mut item = bridge_traits::ItemRef::named(identifier);
        if self.is_path_identifier(identifier) {
            item.path = Some(identifier.to_string());
        } else {
            item.id = Some(identifier.to_string());
        }
        item
    }

    /// Saves a fetched remote item and records the transfer.
    pub(crate) async fn save_pulled(&self, ctx: &SyncContext, remote: Item) -> Result<Item> {
        let saved = match self.store_and_track(&remote, None).await {
            Ok(saved) => saved,
            Err(source) => {
                let err = SyncError::Save {
                    kind: self.kind,
                    item: remote.reference(),
                    source,
                };
                warn!(kind = %self.kind, name = %remote.name, error = %err, "Pull failed");
                ctx.emit(SyncEvent::PulledError {
                    kind: self.kind,
                    item: remote.reference(),
                    error: err.to_event_error(),
                });
                return Err(err);
            }
        };

        debug!(kind = %self.kind, name = %saved.name, "Pulled item");
        ctx.emit(SyncEvent::Pulled {
            kind: self.kind,
            item: saved.clone(),
        });
        Ok(saved)
    }

    /// Writes `item` locally (or only records it when `existing_path` is
    /// given) and updates the hash record once the write succeeded.
    async fn store_and_track(
        &self,
        item: &Item,
        existing_path: Option<PathBuf>,
    ) -> bridge_traits::error::Result<Item> {
        let (stored, path) = match existing_path {
            Some(path) => (item.clone(), path),
            None => {
                let saved = self.local.save_item(item).await?;
                let path = self.local.item_path(&saved);
                (saved, path)
            }
        };

        self.hashes.update_hashes(&path, &stored).await?;
        Ok(stored)
    }

    // ------------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------------

    /// Pushes one local item to the remote collection.
    ///
    /// Returns `Ok(None)` when the item was filtered out.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn push_item(
        &self,
        ctx: &SyncContext,
        name: &str,
        options: &SyncOptions,
    ) -> Result<Option<Item>> {
        let resolved = self.resolve(options)?;
        self.push_named(ctx, name, &resolved, Attempt::standalone())
            .await
    }

    pub(crate) async fn push_named(
        &self,
        ctx: &SyncContext,
        name: &str,
        resolved: &ResolvedOptions,
        attempt: Attempt,
    ) -> Result<Option<Item>> {
        let local = match self.local.get_item(name).await {
            Ok(item) => item,
            Err(source) => {
                let err = SyncError::LocalRead {
                    kind: self.kind,
                    name: name.to_string(),
                    source,
                };
                warn!(kind = %self.kind, name, error = %err, "Push failed");
                ctx.emit(SyncEvent::PushedError {
                    kind: self.kind,
                    item: bridge_traits::ItemRef::named(name),
                    error: err.to_event_error(),
                });
                return Err(err);
            }
        };

        if !self.can_push(&local, resolved) {
            debug!(kind = %self.kind, name, "Push skipped by filter");
            return Ok(None);
        }

        self.push_local(ctx, local, resolved, attempt).await.map(Some)
    }

    async fn push_local(
        &self,
        ctx: &SyncContext,
        local: Item,
        resolved: &ResolvedOptions,
        attempt: Attempt,
    ) -> Result<Item> {
        let result = if local.is_new() {
            self.remote.create_item(&local).await
        } else {
            self.remote.update_item(&local).await
        };

        let remote = match result {
            Ok(remote) => remote,
            Err(source) if source.is_conflict() && !local.is_new() => {
                self.settle_conflict(ctx, &local, source, attempt).await?
            }
            Err(source) => {
                let err = SyncError::Push {
                    kind: self.kind,
                    item: local.reference(),
                    source,
                };
                self.report_push_failure(ctx, &err, attempt);
                return Err(err);
            }
        };

        self.finish_push(ctx, &local, remote, resolved).await
    }

    /// Resolves a 409 on update into the fresh remote copy, or a conflict.
    async fn settle_conflict(
        &self,
        ctx: &SyncContext,
        local: &Item,
        rejection: bridge_traits::BridgeError,
        attempt: Attempt,
    ) -> Result<Item> {
        let fresh = match (&local.id, &local.path) {
            (Some(id), _) => self.remote.get_item(id).await?,
            (None, Some(path)) if self.kind.is_path_based() => {
                self.remote.get_item_by_path(path).await?
            }
            _ => {
                let err = SyncError::Push {
                    kind: self.kind,
                    item: local.reference(),
                    source: rejection,
                };
                self.report_push_failure(ctx, &err, attempt);
                return Err(err);
            }
        };

        let fields = conflict::differing_fields(local, &fresh)?;
        if fields.is_empty() {
            info!(
                kind = %self.kind,
                name = %local.name,
                "Conflict limited to volatile fields, keeping remote copy"
            );
            return Ok(fresh);
        }

        let err = SyncError::Conflict {
            kind: self.kind,
            item: local.reference(),
            fields,
        };
        warn!(kind = %self.kind, name = %local.name, error = %err, "Push conflict");
        ctx.emit(SyncEvent::PushedError {
            kind: self.kind,
            item: local.reference(),
            error: err.to_event_error(),
        });
        Err(err)
    }

    async fn finish_push(
        &self,
        ctx: &SyncContext,
        local: &Item,
        mut remote: Item,
        resolved: &ResolvedOptions,
    ) -> Result<Item> {
        // Servers may answer with a partial representation.
        if remote.id.is_none() {
            remote.id = local.id.clone();
        }
        if remote.name.is_empty() {
            remote.name = local.name.clone();
        }
        if remote.path.is_none() {
            remote.path = local.path.clone();
        }

        let existing_path = if resolved.rewrite_on_push {
            None
        } else {
            Some(self.local.item_path(local))
        };

        if let Err(source) = self.store_and_track(&remote, existing_path).await {
            let err = SyncError::Save {
                kind: self.kind,
                item: remote.reference(),
                source,
            };
            warn!(kind = %self.kind, name = %remote.name, error = %err, "Push mirror failed");
            ctx.emit(SyncEvent::PushedError {
                kind: self.kind,
                item: remote.reference(),
                error: err.to_event_error(),
            });
            return Err(err);
        }

        debug!(kind = %self.kind, name = %remote.name, "Pushed item");
        ctx.emit(SyncEvent::Pushed {
            kind: self.kind,
            item: remote.clone(),
        });
        Ok(remote)
    }

    fn report_push_failure(&self, ctx: &SyncContext, err: &SyncError, attempt: Attempt) {
        if err.is_retryable() && !attempt.report_retryable {
            debug!(
                kind = %self.kind,
                pass = attempt.pass,
                error = %err,
                "Retryable push failure, not reported"
            );
            return;
        }

        warn!(kind = %self.kind, error = %err, "Push failed");
        if let Some(item) = err.item() {
            ctx.emit(SyncEvent::PushedError {
                kind: self.kind,
                item: item.clone(),
                error: err.to_event_error(),
            });
        }
    }

    // ------------------------------------------------------------------------
    // Pass-through operations
    // ------------------------------------------------------------------------

    /// Creates `item` remotely.
    #[instrument(skip(self, ctx, item), fields(kind = %self.kind, context = %ctx.id(), name = %item.name))]
    pub async fn create_remote_item(&self, ctx: &SyncContext, item: &Item) -> Result<Item> {
        Ok(self.remote.create_item(item).await?)
    }

    /// Deletes `item` remotely. A missing item counts as deleted.
    #[instrument(skip(self, ctx, item), fields(kind = %self.kind, context = %ctx.id(), name = %item.name))]
    pub async fn delete_remote_item(&self, ctx: &SyncContext, item: &Item) -> Result<()> {
        self.delete_remote(item, Attempt::standalone()).await
    }

    pub(crate) async fn delete_remote(&self, item: &Item, attempt: Attempt) -> Result<()> {
        let id = item.id.as_deref().ok_or_else(|| SyncError::InvalidInput {
            field: "id".to_string(),
            message: format!("{} item {} has no remote id", self.kind, item.name),
        })?;

        match self.remote.delete_item(id).await {
            Ok(()) => Ok(()),
            Err(source) if source.is_not_found() => {
                debug!(kind = %self.kind, id, "Remote item already gone");
                Ok(())
            }
            Err(source) => {
                let err = SyncError::Delete {
                    kind: self.kind,
                    item: item.reference(),
                    source,
                };
                if !err.is_retryable() || attempt.report_retryable {
                    warn!(kind = %self.kind, id, error = %err, "Remote delete failed");
                }
                Err(err)
            }
        }
    }

    /// Deletes the local copy of `item`.
    ///
    /// When a file was removed, its hash record is dropped and parent
    /// directories left empty are pruned up to the store's base path.
    #[instrument(skip(self, ctx, item), fields(kind = %self.kind, context = %ctx.id(), name = %item.name))]
    pub async fn delete_local_item(
        &self,
        ctx: &SyncContext,
        item: &Item,
    ) -> Result<Option<PathBuf>> {
        let removed = self.local.delete_item(item).await?;

        if let Some(path) = &removed {
            self.hashes.remove_hashes(std::slice::from_ref(path)).await?;
            self.prune_empty_parents(path).await?;
        }

        Ok(removed)
    }

    async fn prune_empty_parents(&self, file: &Path) -> Result<()> {
        let Some(fs) = &self.file_system else {
            return Ok(());
        };
        let base = self.local.base_path();

        let mut current = file.parent();
        while let Some(dir) = current {
            if dir == base.as_path() || !dir.starts_with(&base) {
                break;
            }
            if !fs.exists(dir).await? || !fs.list_directory(dir).await?.is_empty() {
                break;
            }

            fs.remove_empty_dir(dir).await?;
            debug!(path = ?dir, "Pruned empty directory");
            current = dir.parent();
        }

        Ok(())
    }
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("manifests", &self.manifests.as_ref().map(|_| "ManifestStore { ... }"))
            .field(
                "file_system",
                &self.file_system.as_ref().map(|_| "FileSystemAccess { ... }"),
            )
            .field("policy", &self.policy)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SyncEngine`].
///
/// The remote collection, local store and hash tracker are required.
pub struct SyncEngineBuilder {
    kind: ItemKind,
    config: Option<SyncConfig>,
    remote: Option<Arc<dyn RemoteCollection>>,
    local: Option<Arc<dyn LocalStore>>,
    hashes: Option<Arc<dyn HashTracker>>,
    manifests: Option<Arc<dyn ManifestStore>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    policy: ItemPolicy,
}

impl SyncEngineBuilder {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            config: None,
            remote: None,
            local: None,
            hashes: None,
            manifests: None,
            file_system: None,
            policy: ItemPolicy::default(),
        }
    }

    /// Sets the configuration. Defaults to [`SyncConfig::default`].
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteCollection>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn local(mut self, local: Arc<dyn LocalStore>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn hashes(mut self, hashes: Arc<dyn HashTracker>) -> Self {
        self.hashes = Some(hashes);
        self
    }

    /// Required only by the manifest entry points.
    pub fn manifests(mut self, manifests: Arc<dyn ManifestStore>) -> Self {
        self.manifests = Some(manifests);
        self
    }

    /// Enables pruning of empty directories after local deletes.
    pub fn file_system(mut self, file_system: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    pub fn policy(mut self, policy: ItemPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> core_runtime::Result<SyncEngine> {
        let remote = self.remote.ok_or_else(|| missing(
            "RemoteCollection",
            "A remote collection is required to transfer items. Use .remote() to set it.",
        ))?;
        let local = self.local.ok_or_else(|| missing(
            "LocalStore",
            "A local store is required to read and write items. Use .local() to set it.",
        ))?;
        let hashes = self.hashes.ok_or_else(|| missing(
            "HashTracker",
            "A hash tracker is required to record transfers. Use .hashes() to set it.",
        ))?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(SyncEngine {
            kind: self.kind,
            config: Arc::new(config),
            remote,
            local,
            hashes,
            manifests: self.manifests,
            file_system: self.file_system,
            policy: self.policy,
        })
    }
}

fn missing(capability: &str, message: &str) -> core_runtime::Error {
    core_runtime::Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
