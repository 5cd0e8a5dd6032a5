//! # Sync Configuration Module
//!
//! Global settings, per-kind overrides and per-call options for the sync
//! engine.
//!
//! ## Overview
//!
//! Settings are layered. A value supplied on the call ([`SyncOptions`]) wins
//! over a per-kind override ([`KindSettings`]), which wins over the global
//! value in [`SyncConfig`]. [`SyncConfig::resolve`] flattens the three layers
//! into [`ResolvedOptions`] once per call, so the engine never consults more
//! than one struct while working.
//!
//! ## Usage
//!
//! ```
//! use bridge_traits::ItemKind;
//! use core_runtime::config::{KindSettings, SyncConfig, SyncOptions};
//!
//! let config = SyncConfig::builder()
//!     .page_limit(50)
//!     .concurrency(4)
//!     .kind(ItemKind::Assets, KindSettings::default().with_page_limit(10))
//!     .build()
//!     .expect("valid config");
//!
//! let resolved = config
//!     .resolve(ItemKind::Assets, &SyncOptions::default().with_concurrency(2))
//!     .expect("valid options");
//!
//! assert_eq!(resolved.limit, 10);
//! assert_eq!(resolved.concurrency, 2);
//! ```
//!
//! ## Error Handling
//!
//! `build()` and `validate()` fail fast with [`Error::Config`] on values the
//! engine cannot work with; `resolve()` fails with [`Error::InvalidOption`]
//! when per-call options contradict each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bridge_traits::{Item, ItemKind, ItemStatus};

use crate::error::{Error, Result};

/// Items requested per page when nothing else is configured.
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Concurrent transfers per bulk call when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Largest page the remote service accepts.
pub const MAX_PAGE_LIMIT: usize = 10_000;

/// Caller-supplied predicate over items.
pub type ItemPredicate = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// Overrides that apply to one item kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSettings {
    pub page_limit: Option<usize>,
    pub concurrency: Option<usize>,
    pub rewrite_on_push: Option<bool>,
    pub validate_name: Option<bool>,
}

impl KindSettings {
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_rewrite_on_push(mut self, rewrite: bool) -> Self {
        self.rewrite_on_push = Some(rewrite);
        self
    }

    pub fn with_validate_name(mut self, validate: bool) -> Self {
        self.validate_name = Some(validate);
        self
    }
}

/// Global sync settings.
///
/// Use [`SyncConfigBuilder`] to construct validated instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Items requested per remote page
    pub page_limit: usize,

    /// Maximum concurrent transfers per bulk call
    pub concurrency: usize,

    /// Mirror the server copy locally after a successful push
    pub rewrite_on_push: bool,

    /// Drop items with invalid local names from pull results
    pub validate_name: bool,

    /// Cap on retry passes. `None` retries until no retryable failure is
    /// left, matching the behavior hosts have always relied on.
    pub max_retry_passes: Option<u32>,

    /// Per-kind overrides
    pub kinds: HashMap<ItemKind, KindSettings>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            rewrite_on_push: true,
            validate_name: false,
            max_retry_passes: None,
            kinds: HashMap::new(),
        }
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Page limit is within 1..=MAX_PAGE_LIMIT (globally and per kind)
    /// - Concurrency is at least 1 (globally and per kind)
    /// - A retry cap, when set, allows at least one pass
    pub fn validate(&self) -> Result<()> {
        check_page_limit(self.page_limit, "Page limit")?;
        check_concurrency(self.concurrency, "Concurrency")?;

        if self.max_retry_passes == Some(0) {
            return Err(Error::Config(
                "Retry pass cap must allow at least one pass. \
                 Leave it unset to retry until no retryable failures remain."
                    .to_string(),
            ));
        }

        for (kind, settings) in &self.kinds {
            if let Some(limit) = settings.page_limit {
                check_page_limit(limit, &format!("Page limit for {}", kind))?;
            }
            if let Some(concurrency) = settings.concurrency {
                check_concurrency(concurrency, &format!("Concurrency for {}", kind))?;
            }
        }

        Ok(())
    }

    /// Overrides for `kind`, empty when none were configured.
    pub fn kind_settings(&self, kind: ItemKind) -> KindSettings {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    /// Flattens call options, kind overrides and global settings.
    pub fn resolve(&self, kind: ItemKind, options: &SyncOptions) -> Result<ResolvedOptions> {
        let settings = self.kind_settings(kind);

        if options.filter_ready && options.filter_draft {
            return Err(Error::InvalidOption {
                option: "filter_ready".to_string(),
                message: "filter_ready and filter_draft cannot both be set".to_string(),
            });
        }

        let limit = options
            .limit
            .or(settings.page_limit)
            .unwrap_or(self.page_limit);
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(Error::InvalidOption {
                option: "limit".to_string(),
                message: format!("must be between 1 and {}, got {}", MAX_PAGE_LIMIT, limit),
            });
        }

        let concurrency = options
            .concurrency
            .or(settings.concurrency)
            .unwrap_or(self.concurrency);
        if concurrency == 0 {
            return Err(Error::InvalidOption {
                option: "concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let status = if options.filter_ready {
            Some(ItemStatus::Ready)
        } else if options.filter_draft {
            Some(ItemStatus::Draft)
        } else {
            None
        };

        // Only path-addressed kinds understand path prefixes.
        let path_prefix = if kind.is_path_based() {
            options.filter_path.clone()
        } else {
            None
        };

        Ok(ResolvedOptions {
            limit,
            concurrency,
            rewrite_on_push: options
                .rewrite_on_push
                .or(settings.rewrite_on_push)
                .unwrap_or(self.rewrite_on_push),
            validate_name: options
                .validate_name
                .or(settings.validate_name)
                .unwrap_or(self.validate_name),
            max_retry_passes: self.max_retry_passes,
            status,
            path_prefix,
            filter: options.filter.clone(),
        })
    }
}

fn check_page_limit(limit: usize, label: &str) -> Result<()> {
    if limit == 0 {
        return Err(Error::Config(format!("{} must be greater than 0", label)));
    }
    if limit > MAX_PAGE_LIMIT {
        return Err(Error::Config(format!(
            "{} exceeds maximum of {}",
            label, MAX_PAGE_LIMIT
        )));
    }
    Ok(())
}

fn check_concurrency(concurrency: usize, label: &str) -> Result<()> {
    if concurrency == 0 {
        return Err(Error::Config(format!("{} must be at least 1", label)));
    }
    Ok(())
}

/// Builder for [`SyncConfig`].
///
/// Unset values fall back to the defaults documented on [`SyncConfig`].
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    page_limit: Option<usize>,
    concurrency: Option<usize>,
    rewrite_on_push: Option<bool>,
    validate_name: Option<bool>,
    max_retry_passes: Option<u32>,
    kinds: HashMap<ItemKind, KindSettings>,
}

impl SyncConfigBuilder {
    /// Sets the number of items requested per page.
    ///
    /// Default: 100
    pub fn page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Sets the maximum number of concurrent transfers.
    ///
    /// Default: 5
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn rewrite_on_push(mut self, rewrite: bool) -> Self {
        self.rewrite_on_push = Some(rewrite);
        self
    }

    pub fn validate_name(mut self, validate: bool) -> Self {
        self.validate_name = Some(validate);
        self
    }

    /// Caps the number of retry passes of bulk push and delete calls.
    ///
    /// On the last permitted pass retryable failures are reported like
    /// permanent ones.
    pub fn max_retry_passes(mut self, passes: u32) -> Self {
        self.max_retry_passes = Some(passes);
        self
    }

    /// Registers overrides for one kind. Later calls for the same kind
    /// replace earlier ones.
    pub fn kind(mut self, kind: ItemKind, settings: KindSettings) -> Self {
        self.kinds.insert(kind, settings);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<SyncConfig> {
        let defaults = SyncConfig::default();

        let config = SyncConfig {
            page_limit: self.page_limit.unwrap_or(defaults.page_limit),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            rewrite_on_push: self.rewrite_on_push.unwrap_or(defaults.rewrite_on_push),
            validate_name: self.validate_name.unwrap_or(defaults.validate_name),
            max_retry_passes: self.max_retry_passes,
            kinds: self.kinds,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Options supplied with one engine call.
///
/// Every field is optional; unset values defer to the configuration.
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Page size override
    pub limit: Option<usize>,
    /// Concurrency override
    pub concurrency: Option<usize>,
    pub rewrite_on_push: Option<bool>,
    pub validate_name: Option<bool>,
    /// Only transfer `ready` items
    pub filter_ready: bool,
    /// Only transfer `draft` items
    pub filter_draft: bool,
    /// Path prefix filter (path-based kinds only)
    pub filter_path: Option<String>,
    /// Manifest name for the manifest entry points
    pub manifest: Option<String>,
    /// Remove deleted items from the manifest
    pub clear_manifest: bool,
    /// Additional predicate every transferred item must satisfy
    pub filter: Option<ItemPredicate>,
}

impl SyncOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_rewrite_on_push(mut self, rewrite: bool) -> Self {
        self.rewrite_on_push = Some(rewrite);
        self
    }

    pub fn with_validate_name(mut self, validate: bool) -> Self {
        self.validate_name = Some(validate);
        self
    }

    pub fn with_filter_ready(mut self) -> Self {
        self.filter_ready = true;
        self
    }

    pub fn with_filter_draft(mut self) -> Self {
        self.filter_draft = true;
        self
    }

    pub fn with_filter_path(mut self, prefix: impl Into<String>) -> Self {
        self.filter_path = Some(prefix.into());
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = Some(manifest.into());
        self
    }

    pub fn with_clear_manifest(mut self, clear: bool) -> Self {
        self.clear_manifest = clear;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("limit", &self.limit)
            .field("concurrency", &self.concurrency)
            .field("rewrite_on_push", &self.rewrite_on_push)
            .field("validate_name", &self.validate_name)
            .field("filter_ready", &self.filter_ready)
            .field("filter_draft", &self.filter_draft)
            .field("filter_path", &self.filter_path)
            .field("manifest", &self.manifest)
            .field("clear_manifest", &self.clear_manifest)
            .field("filter", &self.filter.as_ref().map(|_| "Fn(&Item) -> bool"))
            .finish()
    }
}

/// Effective options for one call on one kind.
#[derive(Clone)]
pub struct ResolvedOptions {
    pub limit: usize,
    pub concurrency: usize,
    pub rewrite_on_push: bool,
    pub validate_name: bool,
    pub max_retry_passes: Option<u32>,
    /// Required status, if a status filter was requested
    pub status: Option<ItemStatus>,
    /// Required path prefix; always `None` for kinds that are not path-based
    pub path_prefix: Option<String>,
    pub filter: Option<ItemPredicate>,
}

impl ResolvedOptions {
    /// Whether `item` passes the status, path and custom filters.
    pub fn admits(&self, item: &Item) -> bool {
        if let Some(status) = self.status {
            if item.effective_status() != status {
                return false;
            }
        }

        if let Some(prefix) = &self.path_prefix {
            match &item.path {
                Some(path) if path.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        match &self.filter {
            Some(filter) => filter(item),
            None => true,
        }
    }
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("limit", &self.limit)
            .field("concurrency", &self.concurrency)
            .field("rewrite_on_push", &self.rewrite_on_push)
            .field("validate_name", &self.validate_name)
            .field("max_retry_passes", &self.max_retry_passes)
            .field("status", &self.status)
            .field("path_prefix", &self.path_prefix)
            .field("filter", &self.filter.as_ref().map(|_| "Fn(&Item) -> bool"))
            .finish()
    }
}
