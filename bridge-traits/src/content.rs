//! Content Item Model
//!
//! The shapes shared by every collaborator: the synchronizable [`Item`], the
//! [`ItemKind`] that selects a remote collection and local directory, and the
//! lightweight [`ItemRef`] used to correlate errors and events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// Kind of content artifact handled by one remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Assets,
    Categories,
    Content,
    Types,
    Presentations,
    Layouts,
    LayoutMappings,
    ImageProfiles,
    Renditions,
    PublishingJobs,
    PublishingSources,
    PublishingProfiles,
    PublishingSiteRevisions,
    Sites,
    Pages,
}

impl ItemKind {
    pub const ALL: [ItemKind; 15] = [
        ItemKind::Assets,
        ItemKind::Categories,
        ItemKind::Content,
        ItemKind::Types,
        ItemKind::Presentations,
        ItemKind::Layouts,
        ItemKind::LayoutMappings,
        ItemKind::ImageProfiles,
        ItemKind::Renditions,
        ItemKind::PublishingJobs,
        ItemKind::PublishingSources,
        ItemKind::PublishingProfiles,
        ItemKind::PublishingSiteRevisions,
        ItemKind::Sites,
        ItemKind::Pages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Assets => "assets",
            ItemKind::Categories => "categories",
            ItemKind::Content => "content",
            ItemKind::Types => "types",
            ItemKind::Presentations => "presentations",
            ItemKind::Layouts => "layouts",
            ItemKind::LayoutMappings => "layout-mappings",
            ItemKind::ImageProfiles => "image-profiles",
            ItemKind::Renditions => "renditions",
            ItemKind::PublishingJobs => "publishing-jobs",
            ItemKind::PublishingSources => "publishing-sources",
            ItemKind::PublishingProfiles => "publishing-profiles",
            ItemKind::PublishingSiteRevisions => "publishing-site-revisions",
            ItemKind::Sites => "sites",
            ItemKind::Pages => "pages",
        }
    }

    /// Kinds addressed by path rather than by name.
    ///
    /// Only these kinds honor path-prefix filters; their local name is the
    /// item path.
    pub fn is_path_based(&self) -> bool {
        matches!(self, ItemKind::Layouts | ItemKind::LayoutMappings)
    }

    /// Kinds whose items reference parents through `ancestorIds` and must be
    /// pushed ancestor-first.
    pub fn is_hierarchical(&self) -> bool {
        matches!(self, ItemKind::Categories)
    }

    /// Name under which an item of this kind is stored locally.
    pub fn local_name(&self, item: &Item) -> String {
        if self.is_path_based() {
            if let Some(path) = &item.path {
                return path.clone();
            }
        }
        item.name.clone()
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BridgeError::NotAvailable(format!("Unknown item kind: {s}")))
    }
}

/// Publication status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ready,
    Draft,
}

/// A synchronizable content artifact.
///
/// Identity and bookkeeping fields are typed; every other business field is
/// kept verbatim in `extra` so that nothing is lost on a round trip through
/// the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modifier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestor_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Creates a locally new item (no id, no revision).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            rev: None,
            path: None,
            status: None,
            created: None,
            creator: None,
            creator_id: None,
            last_modified: None,
            last_modifier: None,
            last_modifier_id: None,
            system_modified: None,
            ancestor_ids: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_ancestors(mut self, ancestor_ids: Vec<String>) -> Self {
        self.ancestor_ids = ancestor_ids;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// An item without a revision marker has never been persisted remotely.
    pub fn is_new(&self) -> bool {
        self.rev.is_none()
    }

    /// Status, defaulting to `Ready` when the service omitted it.
    pub fn effective_status(&self) -> ItemStatus {
        self.status.unwrap_or(ItemStatus::Ready)
    }

    /// Number of ancestors above this item in its hierarchy.
    pub fn depth(&self) -> usize {
        self.ancestor_ids.len()
    }

    pub fn reference(&self) -> ItemRef {
        ItemRef {
            id: self.id.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }
}

/// Identifier triple carried by errors and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ItemRef {
    /// Reference for an item known only by its local name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            path: None,
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} ({})", self.name, id),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_wire_shape_is_camel_case_and_keeps_unknown_fields() {
        let raw = json!({
            "id": "cat-1",
            "name": "Sports",
            "rev": "3",
            "creatorId": "u1",
            "lastModified": "2024-01-01T00:00:00Z",
            "ancestorIds": ["root"],
            "description": "All sports",
            "tags": ["a", "b"]
        });

        let item: Item = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.creator_id.as_deref(), Some("u1"));
        assert_eq!(item.ancestor_ids, vec!["root".to_string()]);
        assert_eq!(item.extra["description"], json!("All sports"));

        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_new_item_has_no_revision() {
        let item = Item::new("fresh");
        assert!(item.is_new());
        assert!(!item.clone().with_rev("1").is_new());
        assert_eq!(item.effective_status(), ItemStatus::Ready);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ItemKind::ALL {
            assert_eq!(kind.as_str().parse::<ItemKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                Value::String(kind.to_string())
            );
        }
        assert!("widgets".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_path_based_local_name() {
        let layout = Item::new("Main").with_path("/layouts/main");
        assert_eq!(ItemKind::Layouts.local_name(&layout), "/layouts/main");
        assert_eq!(ItemKind::Presentations.local_name(&layout), "Main");
        assert!(ItemKind::Categories.is_hierarchical());
        assert!(!ItemKind::Assets.is_path_based());
    }
}
