//! Cross-reference model

use serde::{Deserialize, Serialize};

/// One reference from a source document to a named target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Row identifier
    pub id: i64,
    /// Document containing the reference
    pub source_path: String,
    /// Raw reference text, case preserved
    pub target_name: String,
    /// Resolved vault path
    pub target_path: Option<String>,
    /// Resolved remote page id
    pub notion_page_id: Option<String>,
    pub resolved: bool,
}

/// Counts over the link table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
}
