//! Response envelopes assembled by the local handlers.

use serde::Serialize;
use serde_json::Value;

/// Download counter reported for every mod.
pub const REPORTED_DOWNLOADS: u64 = 10_000_000;

/// One entry of a mod listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModSummary {
    #[serde(rename = "self")]
    pub self_link: String,
    pub mod_id: Value,
    pub mod_name: Value,
    pub author: Value,
    pub downloads: u64,
    pub thumbnail: String,
    pub created_at: Value,
}

impl ModSummary {
    /// Build from the id as listed in the index and the mod's own document.
    pub fn new(mod_id: Value, id_text: &str, document: &Value) -> Self {
        let field = |name: &str| document.get(name).cloned().unwrap_or(Value::Null);
        Self {
            self_link: format!("/api/v1/mods/{id_text}"),
            mod_id,
            mod_name: field("title"),
            author: field("author"),
            downloads: REPORTED_DOWNLOADS,
            thumbnail: format!("/api/v1/mods/{id_text}/thumbnail"),
            created_at: field("created"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModListing {
    pub mods: Vec<ModSummary>,
    pub pagination: Pagination,
}
