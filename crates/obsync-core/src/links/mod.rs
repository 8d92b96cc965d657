//! Cross-document references: extraction from text and the persisted registry

mod parse;
mod registry;

pub use parse::{extract_wiki_links, strip_anchors};
pub use registry::{
    LinkRegistry, LinkRepair, LinkSuggestions, RepairReport, Resolution, ResolveStats,
};
