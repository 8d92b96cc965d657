//! Fuzzy name matching for reference resolution
//!
//! Names are compared on a normalized form (lowercase, non-alphanumeric runs
//! collapsed to one space). Anything that is not an exact, case-insensitive or
//! prefix match falls back to Levenshtein distance with a length-scaled
//! threshold.

use serde::{Deserialize, Serialize};

use crate::util::base_name;

/// Match quality, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScore {
    None,
    Fuzzy,
    Prefix,
    CaseInsensitive,
    Exact,
}

impl MatchScore {
    /// Whether a match of this quality is accepted for automatic resolution.
    pub fn is_acceptable(self) -> bool {
        self >= Self::Fuzzy
    }
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Candidate as given (usually a vault path)
    pub candidate: String,
    /// Remote page id of the candidate, when known
    pub notion_page_id: Option<String>,
    pub score: MatchScore,
    pub distance: usize,
}

/// Fuzzy matcher with an optional fixed distance threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyMatcher {
    /// Overrides the length-scaled threshold when set
    pub max_distance: Option<usize>,
}

impl FuzzyMatcher {
    pub const fn new() -> Self {
        Self { max_distance: None }
    }

    /// Use a fixed distance threshold for every length
    #[must_use]
    pub const fn with_max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    /// Largest distance accepted as a fuzzy match for names of `len` characters.
    pub fn threshold(&self, len: usize) -> usize {
        self.max_distance.unwrap_or(match len {
            0..=4 => 1,
            5..=8 => 2,
            _ => 3,
        })
    }

    /// Score `candidate` against `target`.
    pub fn score(&self, target: &str, candidate: &str) -> (MatchScore, usize) {
        let target_norm = normalize_name(target);
        let candidate_norm = normalize_name(candidate);

        // Nothing left to compare once punctuation is stripped
        if target_norm.is_empty() {
            return (MatchScore::None, candidate_norm.chars().count());
        }

        if target_norm == candidate_norm {
            let score = if target == candidate {
                MatchScore::Exact
            } else {
                MatchScore::CaseInsensitive
            };
            return (score, 0);
        }

        if candidate_norm.starts_with(&target_norm) {
            let distance = candidate_norm.chars().count() - target_norm.chars().count();
            return (MatchScore::Prefix, distance);
        }

        let distance = levenshtein(&target_norm, &candidate_norm);
        let longest = target_norm
            .chars()
            .count()
            .max(candidate_norm.chars().count());
        if distance <= self.threshold(longest) {
            (MatchScore::Fuzzy, distance)
        } else {
            (MatchScore::None, distance)
        }
    }

    /// Rank candidates by their base name against `target`.
    ///
    /// Only scored matches are kept; results are sorted best score first, then
    /// smallest distance, and truncated to `limit`.
    pub fn find_best_matches<'a, I>(
        &self,
        target: &str,
        candidates: I,
        limit: usize,
    ) -> Vec<MatchResult>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut matches = candidates
            .into_iter()
            .filter_map(|(candidate, page_id)| {
                let (score, distance) = self.score(target, base_name(candidate));
                (score != MatchScore::None).then(|| MatchResult {
                    candidate: candidate.to_string(),
                    notion_page_id: page_id.map(str::to_string),
                    score,
                    distance,
                })
            })
            .collect::<Vec<_>>();

        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.distance.cmp(&b.distance))
                .then_with(|| a.candidate.cmp(&b.candidate))
        });
        matches.truncate(limit);
        matches
    }
}

/// Lowercase, collapse non-alphanumeric runs to a single space, trim.
pub fn normalize_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, a_char) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != b_char);
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            current[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_name("  Service_Class--v2 "), "service class v2");
        assert_eq!(normalize_name("Ünïcode Name"), "ünïcode name");
        assert_eq!(normalize_name("***"), "");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn levenshtein_counts_code_points() {
        assert_eq!(levenshtein("café", "cafe"), 1);
        assert_eq!(levenshtein("日本語", "日本"), 1);
    }

    #[test]
    fn score_priorities() {
        let matcher = FuzzyMatcher::new();
        assert_eq!(
            matcher.score("ServiceClass", "ServiceClass"),
            (MatchScore::Exact, 0)
        );
        assert_eq!(
            matcher.score("serviceclass", "ServiceClass"),
            (MatchScore::CaseInsensitive, 0)
        );
        assert_eq!(
            matcher.score("ServiceClas", "ServiceClass"),
            (MatchScore::Prefix, 1)
        );
        assert_eq!(
            matcher.score("SrviceClass", "ServiceClass"),
            (MatchScore::Fuzzy, 1)
        );
        assert_eq!(matcher.score("Completely", "Different").0, MatchScore::None);
    }

    #[test]
    fn punctuation_only_target_matches_nothing() {
        let matcher = FuzzyMatcher::new();
        assert_eq!(matcher.score("***", "ab"), (MatchScore::None, 2));
        assert_eq!(matcher.score("--", "__").0, MatchScore::None);
        assert_eq!(matcher.score("", "").0, MatchScore::None);

        let candidates = [("ab.md", Some("p1")), ("x.md", None), ("---.md", None)];
        assert!(matcher.find_best_matches("***", candidates, 5).is_empty());
    }

    #[test]
    fn threshold_scales_with_length() {
        let matcher = FuzzyMatcher::new();
        assert_eq!(matcher.threshold(4), 1);
        assert_eq!(matcher.threshold(8), 2);
        assert_eq!(matcher.threshold(20), 3);
        assert_eq!(FuzzyMatcher::new().with_max_distance(0).threshold(20), 0);

        // "cat" vs "dog" is three edits on a three-letter word
        assert_eq!(matcher.score("cat", "dog").0, MatchScore::None);
        assert_eq!(matcher.score("cat", "cot").0, MatchScore::Fuzzy);
    }

    #[test]
    fn fixed_threshold_overrides_scaling() {
        let strict = FuzzyMatcher::new().with_max_distance(0);
        assert_eq!(strict.score("SrviceClass", "ServiceClass").0, MatchScore::None);
    }

    #[test]
    fn find_best_matches_ranks_and_truncates() {
        let matcher = FuzzyMatcher::new();
        let candidates = [
            ("notes/Service Clas.md", Some("p1")),
            ("notes/Service Class.md", Some("p2")),
            ("other/Unrelated.md", Some("p3")),
            ("archive/service class extended.md", None),
            ("Servce Class.md", Some("p4")),
        ];

        let matches = matcher.find_best_matches("Service Class", candidates, 10);
        let ranked: Vec<_> = matches
            .iter()
            .map(|m| (m.candidate.as_str(), m.score))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("notes/Service Class.md", MatchScore::Exact),
                ("archive/service class extended.md", MatchScore::Prefix),
                ("Servce Class.md", MatchScore::Fuzzy),
                ("notes/Service Clas.md", MatchScore::Fuzzy),
            ]
        );
        assert_eq!(matches[0].notion_page_id.as_deref(), Some("p2"));

        let top = matcher.find_best_matches("Service Class", candidates, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].candidate, "notes/Service Class.md");
    }
}
