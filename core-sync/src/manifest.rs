//! Manifest-scoped entry points.
//!
//! A manifest names a subset of items per kind. These operations restrict
//! the bulk operations to the entries of the manifest given in
//! [`SyncOptions::manifest`]. Entries without a remote id are ignored.

use bridge_traits::{Item, ItemRef, ManifestEntry, ManifestSection};
use core_async::throttle::settle_all;
use core_runtime::config::SyncOptions;
use core_runtime::events::SyncEvent;
use tracing::{debug, info, instrument, warn};

use crate::context::SyncContext;
use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};

impl SyncEngine {
    async fn manifest_entries(&self, options: &SyncOptions) -> Result<(String, Vec<ManifestEntry>)> {
        let manifest = options.manifest.clone().ok_or_else(|| SyncError::InvalidInput {
            field: "manifest".to_string(),
            message: "a manifest name is required".to_string(),
        })?;

        let store = self.manifests.as_ref().ok_or_else(|| {
            SyncError::Config(core_runtime::Error::CapabilityMissing {
                capability: "ManifestStore".to_string(),
                message: "Manifest operations need a manifest store. Use .manifests() to set it."
                    .to_string(),
            })
        })?;

        let section: ManifestSection = store
            .get_manifest_section(&manifest, self.kind)
            .await?
            .unwrap_or_default();

        let entries: Vec<ManifestEntry> = section
            .into_values()
            .filter(|entry| entry.id.is_some())
            .collect();

        debug!(kind = %self.kind, manifest = %manifest, entries = entries.len(), "Loaded manifest section");
        Ok((manifest, entries))
    }

    /// Local names of the manifest's entries.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn list_manifest_item_names(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<String>> {
        let (_, entries) = self.manifest_entries(options).await?;
        Ok(entries
            .into_iter()
            .map(|entry| match (self.kind.is_path_based(), entry.path) {
                (true, Some(path)) => path,
                _ => entry.name,
            })
            .collect())
    }

    /// Pulls the manifest's entries by id.
    ///
    /// An entry that cannot be fetched is reported with `pulled-error` and
    /// left out; the others continue.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn pull_manifest_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let resolved = self.resolve(options)?;
        let (_, entries) = self.manifest_entries(options).await?;

        let tasks: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let engine = self.clone();
                let ctx = ctx.clone();
                let resolved = resolved.clone();
                move || async move {
                    let id = entry.id.clone().unwrap_or_default();
                    let remote = match engine.remote.get_item(&id).await {
                        Ok(item) => item,
                        Err(source) => {
                            let err = SyncError::from(source);
                            warn!(kind = %engine.kind, id = %id, error = %err, "Manifest pull failed");
                            ctx.emit(SyncEvent::PulledError {
                                kind: engine.kind,
                                item: ItemRef {
                                    id: entry.id,
                                    name: entry.name,
                                    path: entry.path,
                                },
                                error: err.to_event_error(),
                            });
                            return Err(err);
                        }
                    };

                    if !engine.can_pull(&remote, &resolved) {
                        return Ok(None);
                    }
                    engine.save_pulled(&ctx, remote).await.map(Some)
                }
            })
            .collect();

        let mut pulled = Vec::new();
        let mut failed = 0usize;
        for outcome in settle_all(resolved.concurrency, tasks).await? {
            match outcome {
                Ok(Some(item)) => pulled.push(item),
                Ok(None) => {}
                Err(_) => failed += 1,
            }
        }

        info!(kind = %self.kind, pulled = pulled.len(), failed, "Manifest pull finished");
        Ok(pulled)
    }

    /// Pushes the local copies of the manifest's entries.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn push_manifest_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let names = self.list_manifest_item_names(ctx, options).await?;
        self.push_items(ctx, names, options).await
    }

    /// Deletes the manifest's entries remotely.
    ///
    /// With [`SyncOptions::clear_manifest`], successfully deleted entries are
    /// also removed from the manifest.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn delete_manifest_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let resolved = self.resolve(options)?;
        let (manifest, entries) = self.manifest_entries(options).await?;

        let items: Vec<Item> = entries
            .into_iter()
            .filter_map(|entry| {
                let mut item = Item::new(entry.name).with_id(entry.id?);
                item.path = entry.path;
                Some(item)
            })
            .filter(|item| self.can_delete(item, &resolved))
            .collect();

        let deleted = self.delete_through_coordinator(items, &resolved).await?;

        if options.clear_manifest && !deleted.is_empty() {
            let ids: Vec<String> = deleted.iter().filter_map(|item| item.id.clone()).collect();
            if let Some(store) = &self.manifests {
                store
                    .remove_manifest_entries(&manifest, self.kind, &ids)
                    .await?;
                debug!(kind = %self.kind, manifest = %manifest, removed = ids.len(), "Cleared manifest entries");
            }
        }

        Ok(deleted)
    }
}
