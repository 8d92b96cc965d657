//! Content hashing for change detection
//!
//! A document is split into an optional front-matter block and a body. Each
//! part is normalized on its own before hashing, so that line-ending style,
//! trailing whitespace and runs of blank lines never register as a change.
//! Equal hashes are treated as "semantically unchanged" everywhere else in the
//! crate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Marker line that opens and closes a front-matter block.
pub const FRONTMATTER_MARKER: &str = "---";

/// Hashes computed for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHashes {
    /// Hash of the normalized body (empty for an empty body)
    pub content_hash: String,
    /// Hash of the normalized front matter (empty when absent or blank)
    pub frontmatter_hash: String,
    /// Hash over front matter, one blank line, then body
    pub full_hash: String,
}

/// Split raw text into `(front matter, body)`.
///
/// The opening marker must be the very first line and be followed directly by
/// a newline; the closing marker must sit on its own line. Anything else is
/// treated as a document without front matter.
pub fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == FRONTMATTER_MARKER {
            let frontmatter = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(frontmatter), body);
        }
        offset += line.len();
    }

    (None, text)
}

/// Normalize one document part.
///
/// Line endings become `\n`, trailing whitespace is stripped from every line,
/// three or more consecutive newlines collapse to two, and the result is
/// trimmed.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut pending_newlines = 0usize;
    for (index, line) in unified.split('\n').enumerate() {
        if index > 0 {
            pending_newlines += 1;
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        for _ in 0..pending_newlines.min(2) {
            out.push('\n');
        }
        pending_newlines = 0;
        out.push_str(line);
    }

    out.trim().to_string()
}

/// SHA-256 of already-normalized text, hex encoded. Empty text hashes to `""`.
pub fn hash_normalized(normalized: &str) -> String {
    if normalized.is_empty() {
        return String::new();
    }
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Normalize then hash a text fragment.
pub fn hash_text(text: &str) -> String {
    hash_normalized(&normalize(text))
}

/// Hash a raw document.
pub fn hash_document(raw: &[u8]) -> ContentHashes {
    let text = String::from_utf8_lossy(raw);
    let (frontmatter, body) = split_frontmatter(&text);

    let body = normalize(body);
    let frontmatter = frontmatter.map(normalize).unwrap_or_default();

    let full = if frontmatter.is_empty() {
        body.clone()
    } else {
        format!("{frontmatter}\n\n{body}")
    };

    ContentHashes {
        content_hash: hash_normalized(&body),
        frontmatter_hash: hash_normalized(&frontmatter),
        full_hash: hash_normalized(&full),
    }
}
