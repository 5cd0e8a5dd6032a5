//! Manifest Abstraction
//!
//! A manifest is a named, persisted work list of item references grouped
//! by kind. Populating manifests is outside the engine; it only reads
//! sections and removes entries after deleting their items.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::ItemKind;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Entries of one kind, keyed by item id.
pub type ManifestSection = BTreeMap<String, ManifestEntry>;

#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Load the section for `kind` of the manifest `manifest`.
    ///
    /// `None` and an empty section both mean there is nothing to do.
    async fn get_manifest_section(
        &self,
        manifest: &str,
        kind: ItemKind,
    ) -> Result<Option<ManifestSection>>;

    /// Drop the entries with the given ids from the section for `kind`.
    async fn remove_manifest_entries(
        &self,
        manifest: &str,
        kind: ItemKind,
        ids: &[String],
    ) -> Result<()>;
}
