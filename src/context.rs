//! Session handle and caller side-channel passed through refinement.

use serde::{Deserialize, Serialize};

/// The account a refinement runs on behalf of.
///
/// Downloaders use it to pick credentials or a connection; the engine only
/// passes it along.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account_id: i64,
}

impl Session {
    pub fn new(account_id: i64) -> Self {
        Self { account_id }
    }
}

/// Caller-supplied hints about where a chain came from.
///
/// Not interpreted by the engine. Variants and downloaders may read it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefineContext {
    /// Group the chain was received in, if any.
    pub group_id: Option<i64>,
    /// Sender of the chain, if known.
    pub from_id: Option<i64>,
    /// Free-form extra hints.
    pub metadata: serde_json::Value,
}

impl RefineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Attach a metadata entry. Turns `metadata` into an object if it isn't one.
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(serde_json::Map::new());
        }
        self.metadata[key] = value;
        self
    }

    /// Look up a metadata entry.
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}
