//! Shared utility functions used across multiple modules.

use chrono::{DateTime, SecondsFormat, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Render a timestamp the way it is stored in the database.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp, returning `None` for empty or malformed text.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Final path segment with its extension stripped.
///
/// `"notes/Service Class.md"` becomes `"Service Class"`.
pub fn base_name(path: &str) -> &str {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    }
}

/// Convert a platform path into the forward-slash form used as a state key.
pub fn canonical_path(path: &std::path::Path) -> String {
    path.components()
        .filter_map(|component| match component {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::Path;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn timestamps_round_trip_through_storage_format() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(instant)), Some(instant));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn base_name_strips_directories_and_extension() {
        assert_eq!(base_name("notes/Service Class.md"), "Service Class");
        assert_eq!(base_name("Readme"), "Readme");
        assert_eq!(base_name("a\\b\\c.txt"), "c");
        assert_eq!(base_name(".hidden"), ".hidden");
    }

    #[test]
    fn canonical_path_uses_forward_slashes() {
        assert_eq!(canonical_path(Path::new("notes/daily/today.md")), "notes/daily/today.md");
        assert_eq!(canonical_path(Path::new("./a.md")), "a.md");
    }
}
