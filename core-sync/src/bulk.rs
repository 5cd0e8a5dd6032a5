//! # Bulk Operation Driver
//!
//! Collection-wide pulls, pushes, deletes and change listings.
//!
//! ## Pull
//!
//! Remote listings are walked page by page with `PageRequest {offset, limit}`
//! until a page comes back shorter than `limit`. Each page is saved with a
//! bounded fan-out ([`settle_all`]) before the next page is requested.
//! Per-item save failures are reported and skipped; a listing failure aborts
//! the call.
//!
//! ## Push and delete
//!
//! Keys run through the [`RetryCoordinator`]. Hierarchical kinds push one
//! ancestor depth at a time so parents exist before their children.

use std::collections::{BTreeMap, HashSet};

use bridge_traits::{Item, ModificationState, PageRequest};
use chrono::{DateTime, Utc};
use core_async::throttle::settle_all;
use core_runtime::config::{ResolvedOptions, SyncOptions};
use tracing::{debug, info, instrument, warn};

use crate::context::SyncContext;
use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};
use crate::names::validate_item_name;
use crate::retry::RetryCoordinator;

/// Which remote listing a pull walks.
#[derive(Debug, Clone, Copy)]
enum ListingSource {
    All,
    Modified(Option<DateTime<Utc>>),
}

impl SyncEngine {
    // ------------------------------------------------------------------------
    // Remote listing
    // ------------------------------------------------------------------------

    /// Full remote listing, all pages.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn get_remote_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let resolved = self.resolve(options)?;
        self.list_all_remote(&resolved).await
    }

    pub(crate) async fn list_all_remote(&self, resolved: &ResolvedOptions) -> Result<Vec<Item>> {
        let mut page = PageRequest::first(resolved.limit);
        let mut items = Vec::new();

        loop {
            let batch = self.fetch_page(page, ListingSource::All).await?;
            let received = batch.len();
            items.extend(batch);

            if received < page.limit {
                break;
            }
            page = page.next(received);
        }

        debug!(kind = %self.kind, count = items.len(), "Listed remote items");
        Ok(items)
    }

    async fn fetch_page(&self, page: PageRequest, source: ListingSource) -> Result<Vec<Item>> {
        let result = match source {
            ListingSource::All => self.remote.get_items(page).await,
            ListingSource::Modified(since) => self.remote.get_modified_items(page, since).await,
        };

        result.map_err(|source| {
            warn!(kind = %self.kind, offset = page.offset, error = %source, "Listing failed");
            SyncError::Listing {
                kind: self.kind,
                source,
            }
        })
    }

    // ------------------------------------------------------------------------
    // Pull
    // ------------------------------------------------------------------------

    /// Pulls every eligible remote item.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn pull_all_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let resolved = self.resolve(options)?;
        self.pull_listing(ctx, ListingSource::All, &resolved).await
    }

    /// Pulls remote items changed since the last complete pull.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn pull_modified_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let resolved = self.resolve(options)?;
        let since = self.hashes.last_pull_timestamp(self.kind).await?;
        debug!(kind = %self.kind, since = ?since, "Pulling modified items");

        self.pull_listing(ctx, ListingSource::Modified(since), &resolved)
            .await
    }

    async fn pull_listing(
        &self,
        ctx: &SyncContext,
        source: ListingSource,
        resolved: &ResolvedOptions,
    ) -> Result<Vec<Item>> {
        let started = Utc::now();
        let known = if resolved.validate_name {
            self.local_names().await?
        } else {
            Vec::new()
        };

        let mut page = PageRequest::first(resolved.limit);
        let mut pulled = Vec::new();
        let mut failures = 0usize;

        loop {
            let batch = self.fetch_page(page, source).await?;
            let received = batch.len();

            let mut eligible = Vec::with_capacity(received);
            for item in batch {
                if !self.can_pull(&item, resolved) {
                    continue;
                }
                if matches!(source, ListingSource::Modified(_)) && !self.remote_changed(&item).await
                {
                    continue;
                }
                eligible.push(item);
            }

            let tasks: Vec<_> = eligible
                .into_iter()
                .map(|item| {
                    let engine = self.clone();
                    let ctx = ctx.clone();
                    move || async move { engine.save_pulled(&ctx, item).await }
                })
                .collect();

            for outcome in settle_all(resolved.concurrency, tasks).await? {
                match outcome {
                    Ok(item) => {
                        let name = self.kind.local_name(&item);
                        if resolved.validate_name && !validate_item_name(&name, &known) {
                            debug!(kind = %self.kind, name = %name, "Dropping item with invalid local name");
                            continue;
                        }
                        pulled.push(item);
                    }
                    Err(_) => failures += 1,
                }
            }

            if received < page.limit {
                break;
            }
            page = page.next(received);
        }

        if failures == 0 {
            self.hashes
                .set_last_pull_timestamp(self.kind, started)
                .await?;
        }

        info!(
            kind = %self.kind,
            pulled = pulled.len(),
            failed = failures,
            "Pull finished"
        );
        Ok(pulled)
    }

    /// Whether the tracker sees `item` as new or modified. Classification
    /// failures count as changed.
    async fn remote_changed(&self, item: &Item) -> bool {
        match self
            .hashes
            .is_remote_modified(&ModificationState::CHANGED, item)
            .await
        {
            Ok(changed) => changed,
            Err(err) => {
                warn!(kind = %self.kind, name = %item.name, error = %err, "Classification failed, pulling anyway");
                true
            }
        }
    }

    // ------------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------------

    /// Pushes every eligible local item.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn push_all_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let names = self.list_local_item_names(ctx, options).await?;
        self.push_items(ctx, names, options).await
    }

    /// Pushes local items the tracker classifies as new or modified.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn push_modified_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let names = self
            .list_modified_local_item_names(ctx, &ModificationState::CHANGED, options)
            .await?;
        self.push_items(ctx, names, options).await
    }

    /// Pushes the named local items, returning the successes.
    #[instrument(skip(self, ctx, names, options), fields(kind = %self.kind, context = %ctx.id(), count = names.len()))]
    pub async fn push_items(
        &self,
        ctx: &SyncContext,
        names: Vec<String>,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let resolved = self.resolve(options)?;
        let levels = if self.kind.is_hierarchical() {
            self.group_by_depth(names, resolved.concurrency).await?
        } else {
            vec![names]
        };

        let coordinator = RetryCoordinator::new(resolved.concurrency)
            .with_max_passes(resolved.max_retry_passes);
        let mut pushed = Vec::new();

        for (level, names) in levels.into_iter().enumerate() {
            if names.is_empty() {
                continue;
            }
            debug!(kind = %self.kind, level, count = names.len(), "Pushing level");

            let engine = self.clone();
            let call_ctx = ctx.clone();
            let call_options = resolved.clone();
            let report = coordinator
                .run(names, move |name: String, attempt| {
                    let engine = engine.clone();
                    let ctx = call_ctx.clone();
                    let resolved = call_options.clone();
                    async move { engine.push_named(&ctx, &name, &resolved, attempt).await }
                })
                .await?;

            if !report.failed.is_empty() {
                warn!(
                    kind = %self.kind,
                    level,
                    failed = report.failed.len(),
                    "Some items failed to push"
                );
            }
            pushed.extend(report.succeeded);
        }

        info!(kind = %self.kind, pushed = pushed.len(), "Push finished");
        Ok(pushed)
    }

    /// Groups names by ancestor depth, shallowest first.
    ///
    /// Local reads run with the same bound as the push itself.
    async fn group_by_depth(
        &self,
        names: Vec<String>,
        concurrency: usize,
    ) -> Result<Vec<Vec<String>>> {
        let tasks: Vec<_> = names
            .into_iter()
            .map(|name| {
                let local = self.local.clone();
                move || async move {
                    // Unreadable items go first; the push itself reports the failure.
                    let depth = local.get_item(&name).await.map_or(0, |item| item.depth());
                    (depth, name)
                }
            })
            .collect();

        let mut levels: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (depth, name) in settle_all(concurrency, tasks).await? {
            levels.entry(depth).or_default().push(name);
        }

        Ok(levels.into_values().collect())
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    /// Deletes every eligible remote item. Items already gone count as
    /// deleted; permanent failures are omitted from the result.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn delete_remote_items(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<Item>> {
        let resolved = self.resolve(options)?;
        let items: Vec<Item> = self
            .list_all_remote(&resolved)
            .await?
            .into_iter()
            .filter(|item| self.can_delete(item, &resolved))
            .collect();

        self.delete_through_coordinator(items, &resolved).await
    }

    pub(crate) async fn delete_through_coordinator(
        &self,
        items: Vec<Item>,
        resolved: &ResolvedOptions,
    ) -> Result<Vec<Item>> {
        let engine = self.clone();
        let report = RetryCoordinator::new(resolved.concurrency)
            .with_max_passes(resolved.max_retry_passes)
            .run(items, move |item: Item, attempt| {
                let engine = engine.clone();
                async move {
                    engine
                        .delete_remote(&item, attempt)
                        .await
                        .map(|()| Some(item))
                }
            })
            .await?;

        info!(
            kind = %self.kind,
            deleted = report.succeeded.len(),
            failed = report.failed.len(),
            "Delete finished"
        );
        Ok(report.succeeded)
    }

    // ------------------------------------------------------------------------
    // Name listings
    // ------------------------------------------------------------------------

    async fn local_names(&self) -> Result<Vec<String>> {
        self.local.list_names().await.map_err(|source| SyncError::Listing {
            kind: self.kind,
            source,
        })
    }

    fn matches_prefix(&self, name: &str, resolved: &ResolvedOptions) -> bool {
        match &resolved.path_prefix {
            Some(prefix) => name.starts_with(prefix.as_str()),
            None => true,
        }
    }

    /// Names of all local items.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn list_local_item_names(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<String>> {
        let resolved = self.resolve(options)?;
        Ok(self
            .local_names()
            .await?
            .into_iter()
            .filter(|name| self.matches_prefix(name, &resolved))
            .collect())
    }

    /// Local names of all remote items.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn list_remote_item_names(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<String>> {
        let resolved = self.resolve(options)?;
        Ok(self
            .remote_in_scope(&resolved)
            .await?
            .iter()
            .map(|item| self.kind.local_name(item))
            .collect())
    }

    async fn remote_in_scope(&self, resolved: &ResolvedOptions) -> Result<Vec<Item>> {
        let items = self.list_all_remote(resolved).await?;
        Ok(match &resolved.path_prefix {
            Some(prefix) => items
                .into_iter()
                .filter(|item| {
                    item.path
                        .as_deref()
                        .map_or(false, |path| path.starts_with(prefix.as_str()))
                })
                .collect(),
            None => items,
        })
    }

    /// Local names in any of `states`.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn list_modified_local_item_names(
        &self,
        ctx: &SyncContext,
        states: &[ModificationState],
        options: &SyncOptions,
    ) -> Result<Vec<String>> {
        let present: Vec<ModificationState> = states
            .iter()
            .copied()
            .filter(|state| *state != ModificationState::Deleted)
            .collect();

        let mut names = Vec::new();
        if !present.is_empty() {
            for name in self.list_local_item_names(ctx, options).await? {
                let path = self.local.name_path(&name);
                if self.hashes.is_local_modified(&present, &path).await? {
                    names.push(name);
                }
            }
        }

        if states.contains(&ModificationState::Deleted) {
            names.extend(self.list_local_deleted_names(ctx, options).await?);
        }

        Ok(names)
    }

    /// Remote local-names in any of `states`. Items whose classification
    /// fails are left out.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn list_modified_remote_item_names(
        &self,
        ctx: &SyncContext,
        states: &[ModificationState],
        options: &SyncOptions,
    ) -> Result<Vec<String>> {
        let resolved = self.resolve(options)?;
        let present: Vec<ModificationState> = states
            .iter()
            .copied()
            .filter(|state| *state != ModificationState::Deleted)
            .collect();

        let mut names = Vec::new();
        if !present.is_empty() {
            for item in self.remote_in_scope(&resolved).await? {
                match self.hashes.is_remote_modified(&present, &item).await {
                    Ok(true) => names.push(self.kind.local_name(&item)),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(kind = %self.kind, name = %item.name, error = %err, "Classification failed, skipping item");
                    }
                }
            }
        }

        if states.contains(&ModificationState::Deleted) {
            names.extend(self.list_remote_deleted_names(ctx, options).await?);
        }

        Ok(names)
    }

    /// Tracked local files whose item no longer exists locally.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn list_local_deleted_names(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<String>> {
        let resolved = self.resolve(options)?;
        let present: HashSet<String> = self.local_names().await?.into_iter().collect();
        let tracked = self.hashes.list_files(&self.local.base_path()).await?;

        Ok(tracked
            .into_iter()
            .filter(|file| !present.contains(&file.name))
            .map(|file| file.name)
            .filter(|name| self.matches_prefix(name, &resolved))
            .collect())
    }

    /// Tracked items whose remote id no longer exists remotely.
    #[instrument(skip(self, ctx, options), fields(kind = %self.kind, context = %ctx.id()))]
    pub async fn list_remote_deleted_names(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
    ) -> Result<Vec<String>> {
        let resolved = self.resolve(options)?;
        let remote_ids: HashSet<String> = self
            .list_all_remote(&resolved)
            .await?
            .into_iter()
            .filter_map(|item| item.id)
            .collect();
        let tracked = self.hashes.list_files(&self.local.base_path()).await?;

        Ok(tracked
            .into_iter()
            .filter(|file| {
                file.id
                    .as_ref()
                    .map_or(false, |id| !remote_ids.contains(id))
            })
            .map(|file| file.name)
            .filter(|name| self.matches_prefix(name, &resolved))
            .collect())
    }
}
