//! Wiki-link extraction

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[\[([^\[\]|]+)(?:\|[^\[\]]*)?\]\]").expect("Invalid regex")
});

/// Extract raw reference targets from `[[target]]`, `[[target|alias]]` and
/// `![[embed]]` links.
///
/// Targets keep their case and any `#heading` / `^block` suffix; they are
/// trimmed and deduplicated in order of first appearance.
///
/// # Examples
///
/// ```
/// use obsync_core::links::extract_wiki_links;
///
/// let links = extract_wiki_links("See [[Service Class|the service]] and ![[diagram.png]]");
/// assert_eq!(links, vec!["Service Class", "diagram.png"]);
/// ```
#[must_use]
pub fn extract_wiki_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    WIKI_LINK
        .captures_iter(text)
        .map(|cap| cap[1].trim().to_string())
        .filter(|target| !target.is_empty() && seen.insert(target.clone()))
        .collect()
}

/// Strip a trailing `#heading` or `^block` anchor from a reference.
pub fn strip_anchors(reference: &str) -> &str {
    let end = reference.find(['#', '^']).unwrap_or(reference.len());
    reference[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_basic_and_aliased() {
        let links = extract_wiki_links("[[Alpha]] then [[Beta|b]] and [[ Gamma ]]");
        assert_eq!(links, vec!["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn test_extract_keeps_anchors_and_dedupes() {
        let links = extract_wiki_links("[[Alpha#Intro]] [[Alpha#Intro]] [[Alpha]] [[Beta#^abc123]]");
        assert_eq!(links, vec!["Alpha#Intro", "Alpha", "Beta#^abc123"]);
    }

    #[test]
    fn test_extract_ignores_malformed() {
        assert!(extract_wiki_links("[[]] [[|alias]] [single] [[unclosed").is_empty());
    }

    #[test]
    fn test_strip_anchors() {
        assert_eq!(strip_anchors("Note#Heading"), "Note");
        assert_eq!(strip_anchors("Note#^block"), "Note");
        assert_eq!(strip_anchors("Note^block"), "Note");
        assert_eq!(strip_anchors("folder/Note"), "folder/Note");
        assert_eq!(strip_anchors("#Heading"), "");
    }
}
