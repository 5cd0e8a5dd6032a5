//! # Conflict Analysis
//!
//! A rejected update (status 409) only means the revision the client sent
//! is stale. Whether the rejection matters depends on what changed on the
//! server: if the fresh remote copy differs from the local payload only in
//! bookkeeping fields the service rewrites on every save, the push is
//! considered to have landed.
//!
//! Comparison runs over the wire representation of both items so that
//! business fields the engine does not model explicitly are compared too.

use std::collections::BTreeSet;

use bridge_traits::{BridgeError, Item};
use serde_json::{Map, Value};

use crate::error::Result;

/// Fields ignored when judging whether a conflict is material.
pub const VOLATILE_FIELDS: [&str; 8] = [
    "rev",
    "created",
    "creator",
    "creatorId",
    "lastModified",
    "lastModifier",
    "lastModifierId",
    "systemModified",
];

pub fn is_volatile(field: &str) -> bool {
    VOLATILE_FIELDS.contains(&field)
}

/// Names of non-volatile fields whose values differ, sorted.
///
/// A field present on one side only counts as different.
pub fn differing_fields(local: &Item, remote: &Item) -> Result<Vec<String>> {
    let local = to_object(local)?;
    let remote = to_object(remote)?;

    let keys: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();

    Ok(keys
        .into_iter()
        .filter(|key| !is_volatile(key))
        .filter(|key| local.get(key.as_str()) != remote.get(key.as_str()))
        .cloned()
        .collect())
}

/// True when `local` and `remote` differ in volatile fields at most.
pub fn is_trivial_conflict(local: &Item, remote: &Item) -> Result<bool> {
    Ok(differing_fields(local, remote)?.is_empty())
}

fn to_object(item: &Item) -> Result<Map<String, Value>> {
    match serde_json::to_value(item).map_err(BridgeError::from)? {
        Value::Object(map) => Ok(map),
        other => Err(BridgeError::Serialization(format!(
            "Item serialized to a non-object value: {}",
            other
        ))
        .into()),
    }
}
