//! Link registry: registration, resolution and repair of cross-references.
//!
//! Resolution runs in two passes for a batch of new documents. References to
//! targets that do not exist remotely yet stay unresolved at parse time; once
//! the batch has been created, [`LinkRegistry::resolve_all`] picks up the
//! newly available page ids and callers re-apply them.

use serde::{Deserialize, Serialize};

use crate::config::LinkConfig;
use crate::db::{LinkRepository, SqliteLinkRepository};
use crate::error::Result;
use crate::fuzzy::{MatchResult, MatchScore};
use crate::models::{LinkEntry, LinkStats, SyncState};
use crate::services::StateStore;

use super::parse::strip_anchors;

/// Where a reference points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub target_path: String,
    pub notion_page_id: String,
    /// `Exact` for path matches, the matcher's score otherwise
    pub score: MatchScore,
}

/// Outcome of a bulk resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveStats {
    /// Unresolved entries examined
    pub scanned: usize,
    /// Entries resolved by path
    pub resolved: usize,
    /// Entries resolved by fuzzy matching
    pub fuzzy_resolved: usize,
    /// Entries still unresolved
    pub unresolved: usize,
}

/// One repair found by [`LinkRegistry::repair_links`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRepair {
    pub link_id: i64,
    pub source_path: String,
    pub target_name: String,
    pub matched_path: String,
    pub notion_page_id: String,
    pub score: MatchScore,
    pub distance: usize,
}

/// Result of a repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Nothing was written
    pub dry_run: bool,
    pub repairs: Vec<LinkRepair>,
    /// Unresolved entries without any acceptable match
    pub unmatched: usize,
}

/// Ranked candidates for one unresolved reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSuggestions {
    pub link: LinkEntry,
    pub candidates: Vec<MatchResult>,
}

/// Registry of cross-document references, backed by the state store.
#[derive(Clone)]
pub struct LinkRegistry {
    store: StateStore,
    config: LinkConfig,
}

impl LinkRegistry {
    pub const fn new(store: StateStore, config: LinkConfig) -> Self {
        Self { store, config }
    }

    pub const fn config(&self) -> &LinkConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register one reference. Returns `false` when it was already registered.
    pub fn register_link(&self, source_path: &str, target_name: &str) -> Result<bool> {
        let target_name = target_name.trim();
        if target_name.is_empty() {
            return Ok(false);
        }
        self.store
            .with_connection(|conn| SqliteLinkRepository::new(conn).insert(source_path, target_name))
    }

    /// Register several references from one source, returning how many were new.
    pub fn register_links(&self, source_path: &str, target_names: &[String]) -> Result<usize> {
        self.store.transaction(|conn| {
            let repo = SqliteLinkRepository::new(conn);
            let mut inserted = 0;
            for target in target_names.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
                if repo.insert(source_path, target)? {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    /// Replace every reference from a re-parsed source in one transaction.
    pub fn replace_links(&self, source_path: &str, target_names: &[String]) -> Result<usize> {
        let targets = target_names
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();
        let inserted = self
            .store
            .with_connection(|conn| SqliteLinkRepository::new(conn).replace(source_path, &targets))?;
        tracing::debug!("Registered {inserted} references from {source_path}");
        Ok(inserted)
    }

    /// Remove every reference from a source.
    pub fn clear_links(&self, source_path: &str) -> Result<usize> {
        self.store
            .with_connection(|conn| SqliteLinkRepository::new(conn).clear(source_path))
    }

    /// Rebind references after a source document was renamed.
    pub fn update_source_path(&self, old_path: &str, new_path: &str) -> Result<usize> {
        self.store.with_connection(|conn| {
            SqliteLinkRepository::new(conn).rebind_source(old_path, new_path)
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// References made by a document.
    pub fn links_from(&self, source_path: &str) -> Result<Vec<LinkEntry>> {
        self.store
            .with_connection(|conn| SqliteLinkRepository::new(conn).list_from(source_path))
    }

    /// References resolved to a document.
    pub fn backlinks(&self, target_path: &str) -> Result<Vec<LinkEntry>> {
        self.store
            .with_connection(|conn| SqliteLinkRepository::new(conn).list_to(target_path))
    }

    /// All unresolved references.
    pub fn unresolved(&self) -> Result<Vec<LinkEntry>> {
        self.store
            .with_connection(|conn| SqliteLinkRepository::new(conn).list_unresolved())
    }

    pub fn stats(&self) -> Result<LinkStats> {
        self.store
            .with_connection(|conn| SqliteLinkRepository::new(conn).stats())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve a reference by path only.
    pub fn resolve(&self, name: &str) -> Result<Option<Resolution>> {
        let documents = self.store.states_with_remote()?;
        Ok(resolve_exact(name, &documents))
    }

    /// Resolve a reference after stripping anchors, falling back to fuzzy
    /// matching when the registry is configured for it.
    pub fn resolve_extended(&self, name: &str) -> Result<Option<Resolution>> {
        let documents = self.store.states_with_remote()?;
        let name = strip_anchors(name);
        if let Some(found) = resolve_exact(name, &documents) {
            return Ok(Some(found));
        }
        if !self.config.fuzzy_enabled {
            return Ok(None);
        }
        Ok(self.resolve_fuzzy(name, &documents))
    }

    /// Resolve every unresolved reference by path.
    pub fn resolve_all(&self) -> Result<ResolveStats> {
        self.resolve_pending(false)
    }

    /// Resolve every unresolved reference by path, then by fuzzy matching.
    pub fn resolve_all_with_fuzzy(&self) -> Result<ResolveStats> {
        self.resolve_pending(true)
    }

    fn resolve_pending(&self, fuzzy: bool) -> Result<ResolveStats> {
        let documents = self.store.states_with_remote()?;
        let pending = self.unresolved()?;

        let mut stats = ResolveStats {
            scanned: pending.len(),
            ..ResolveStats::default()
        };
        let mut found = Vec::new();
        for link in &pending {
            let name = strip_anchors(&link.target_name);
            if let Some(resolution) = resolve_exact(name, &documents) {
                stats.resolved += 1;
                found.push((link.id, resolution));
            } else if let Some(resolution) = fuzzy
                .then(|| self.resolve_fuzzy(name, &documents))
                .flatten()
            {
                stats.fuzzy_resolved += 1;
                found.push((link.id, resolution));
            } else {
                stats.unresolved += 1;
            }
        }

        self.persist(&found)?;
        tracing::info!(
            "Resolved {} of {} pending references ({} fuzzy)",
            stats.resolved + stats.fuzzy_resolved,
            stats.scanned,
            stats.fuzzy_resolved
        );
        Ok(stats)
    }

    /// Fuzzy-match every unresolved reference to its single best candidate.
    ///
    /// With `dry_run` nothing is written and the report lists what would change.
    pub fn repair_links(&self, dry_run: bool) -> Result<RepairReport> {
        let documents = self.store.states_with_remote()?;
        let pending = self.unresolved()?;
        let matcher = self.config.matcher();

        let mut report = RepairReport {
            dry_run,
            ..RepairReport::default()
        };
        for link in pending {
            let name = strip_anchors(&link.target_name);
            let best = matcher
                .find_best_matches(name, remote_candidates(&documents), 1)
                .into_iter()
                .next()
                .filter(|m| m.score.is_acceptable());
            let Some(best) = best else {
                report.unmatched += 1;
                continue;
            };
            report.repairs.push(LinkRepair {
                link_id: link.id,
                source_path: link.source_path,
                target_name: link.target_name,
                matched_path: best.candidate,
                notion_page_id: best.notion_page_id.unwrap_or_default(),
                score: best.score,
                distance: best.distance,
            });
        }

        if !dry_run {
            self.store.transaction(|conn| {
                let repo = SqliteLinkRepository::new(conn);
                for repair in &report.repairs {
                    repo.mark_resolved(
                        repair.link_id,
                        Some(repair.matched_path.as_str()),
                        &repair.notion_page_id,
                    )?;
                }
                Ok(())
            })?;
        }

        tracing::info!(
            "Link repair{}: {} repaired, {} unmatched",
            if dry_run { " (dry run)" } else { "" },
            report.repairs.len(),
            report.unmatched
        );
        Ok(report)
    }

    /// Up to `limit` ranked candidates per unresolved reference. Read-only.
    pub fn suggestions_for_unresolved(&self, limit: usize) -> Result<Vec<LinkSuggestions>> {
        let documents = self.store.list_states(&[])?;
        let matcher = self.config.matcher();

        let suggestions = self
            .unresolved()?
            .into_iter()
            .map(|link| {
                let candidates = matcher.find_best_matches(
                    strip_anchors(&link.target_name),
                    documents.iter().map(|doc| {
                        (
                            doc.path.as_str(),
                            doc.has_remote().then_some(doc.notion_page_id.as_str()),
                        )
                    }),
                    limit,
                );
                LinkSuggestions { link, candidates }
            })
            .collect();
        Ok(suggestions)
    }

    /// Suggestions with the configured per-reference limit.
    pub fn suggestions(&self) -> Result<Vec<LinkSuggestions>> {
        self.suggestions_for_unresolved(self.config.suggestion_limit)
    }

    fn resolve_fuzzy(&self, name: &str, documents: &[SyncState]) -> Option<Resolution> {
        let best = self
            .config
            .matcher()
            .find_best_matches(name, remote_candidates(documents), 1)
            .into_iter()
            .next()?;
        if !best.score.is_acceptable() {
            return None;
        }
        tracing::debug!(
            "Fuzzy-resolved '{name}' to {} ({:?}, distance {})",
            best.candidate,
            best.score,
            best.distance
        );
        Some(Resolution {
            target_path: best.candidate,
            notion_page_id: best.notion_page_id.unwrap_or_default(),
            score: best.score,
        })
    }

    fn persist(&self, found: &[(i64, Resolution)]) -> Result<()> {
        if found.is_empty() {
            return Ok(());
        }
        self.store.transaction(|conn| {
            let repo = SqliteLinkRepository::new(conn);
            for (id, resolution) in found {
                repo.mark_resolved(
                    *id,
                    Some(resolution.target_path.as_str()),
                    &resolution.notion_page_id,
                )?;
            }
            Ok(())
        })
    }
}

fn remote_candidates<'a>(
    documents: &'a [SyncState],
) -> impl Iterator<Item = (&'a str, Option<&'a str>)> + 'a {
    documents
        .iter()
        .filter(|doc| doc.has_remote())
        .map(|doc| (doc.path.as_str(), Some(doc.notion_page_id.as_str())))
}

/// Path-based resolution over documents that exist remotely.
///
/// A reference containing `/` is first tried as a full path (with or without
/// the `.md` extension). Then, in order: exact path, path ending in
/// `/name.md`, path equal to `name.md`.
fn resolve_exact(name: &str, documents: &[SyncState]) -> Option<Resolution> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let remote = || documents.iter().filter(|doc| doc.has_remote());
    let with_extension = format!("{name}.md");

    if name.contains('/') {
        if let Some(doc) = remote().find(|doc| doc.path == name || doc.path == with_extension) {
            return Some(exact(doc));
        }
    }

    let suffix = format!("/{with_extension}");
    remote()
        .find(|doc| doc.path == name)
        .or_else(|| remote().find(|doc| doc.path.ends_with(&suffix)))
        .or_else(|| remote().find(|doc| doc.path == with_extension))
        .map(exact)
}

fn exact(doc: &SyncState) -> Resolution {
    Resolution {
        target_path: doc.path.clone(),
        notion_page_id: doc.notion_page_id.clone(),
        score: MatchScore::Exact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStatus;
    use pretty_assertions::assert_eq;

    fn setup(config: LinkConfig) -> (StateStore, LinkRegistry) {
        let store = StateStore::open_in_memory().unwrap();
        let registry = LinkRegistry::new(store.clone(), config);
        (store, registry)
    }

    fn add_document(store: &StateStore, path: &str, page_id: &str) {
        store
            .set_state(&SyncState {
                notion_page_id: page_id.to_string(),
                status: SyncStatus::Synced,
                ..SyncState::new(path)
            })
            .unwrap();
    }

    fn names(targets: &[&str]) -> Vec<String> {
        targets.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn registration_is_idempotent() {
        let (_, registry) = setup(LinkConfig::default());

        assert_eq!(registry.register_links("a.md", &names(&["B", "C", "B", " "])).unwrap(), 2);
        assert!(!registry.register_link("a.md", "C").unwrap());
        assert_eq!(registry.links_from("a.md").unwrap().len(), 2);
    }

    #[test]
    fn replace_links_drops_stale_references() {
        let (_, registry) = setup(LinkConfig::default());
        registry.register_links("a.md", &names(&["Old", "Kept"])).unwrap();

        registry.replace_links("a.md", &names(&["Kept", "New"])).unwrap();

        let targets: Vec<_> = registry
            .links_from("a.md")
            .unwrap()
            .into_iter()
            .map(|l| l.target_name)
            .collect();
        assert_eq!(targets, vec!["Kept", "New"]);

        assert_eq!(registry.clear_links("a.md").unwrap(), 2);
        assert!(registry.links_from("a.md").unwrap().is_empty());
    }

    #[test]
    fn update_source_path_rebinds() {
        let (_, registry) = setup(LinkConfig::default());
        registry.register_links("old.md", &names(&["X"])).unwrap();

        assert_eq!(registry.update_source_path("old.md", "new.md").unwrap(), 1);
        assert!(registry.links_from("old.md").unwrap().is_empty());
        assert_eq!(registry.links_from("new.md").unwrap().len(), 1);
    }

    #[test]
    fn resolve_by_path_rules() {
        let (store, registry) = setup(LinkConfig::default());
        add_document(&store, "projects/Alpha.md", "p-alpha");
        add_document(&store, "Beta.md", "p-beta");
        add_document(&store, "Gamma.md", "");

        let alpha = registry.resolve("Alpha").unwrap().unwrap();
        assert_eq!(alpha.target_path, "projects/Alpha.md");
        assert_eq!(alpha.notion_page_id, "p-alpha");

        assert_eq!(
            registry.resolve("projects/Alpha").unwrap().unwrap().notion_page_id,
            "p-alpha"
        );
        assert_eq!(
            registry.resolve("Beta.md").unwrap().unwrap().notion_page_id,
            "p-beta"
        );
        assert_eq!(
            registry.resolve("Beta").unwrap().unwrap().notion_page_id,
            "p-beta"
        );

        // No remote id yet, so not eligible
        assert!(registry.resolve("Gamma").unwrap().is_none());
        assert!(registry.resolve("Delta").unwrap().is_none());
        assert!(registry.resolve("").unwrap().is_none());
    }

    #[test]
    fn resolve_is_case_sensitive_on_paths() {
        let (store, registry) = setup(LinkConfig::default());
        add_document(&store, "Alpha.md", "p-alpha");
        assert!(registry.resolve("alpha").unwrap().is_none());
    }

    #[test]
    fn resolve_extended_strips_anchors() {
        let (store, registry) = setup(LinkConfig::default());
        add_document(&store, "Alpha.md", "p-alpha");

        assert!(registry.resolve("Alpha#Intro").unwrap().is_none());
        assert_eq!(
            registry.resolve_extended("Alpha#Intro").unwrap().unwrap().notion_page_id,
            "p-alpha"
        );
        assert_eq!(
            registry.resolve_extended("Alpha#^block1").unwrap().unwrap().notion_page_id,
            "p-alpha"
        );
    }

    #[test]
    fn resolve_extended_uses_fuzzy_only_when_enabled() {
        let (store, strict) = setup(LinkConfig::default());
        add_document(&store, "notes/ServiceClass.md", "p-svc");
        assert!(strict.resolve_extended("SrviceClass").unwrap().is_none());

        let fuzzy = LinkRegistry::new(store, LinkConfig::default().with_fuzzy(true));
        let found = fuzzy.resolve_extended("SrviceClass").unwrap().unwrap();
        assert_eq!(found.notion_page_id, "p-svc");
        assert_eq!(found.score, MatchScore::Fuzzy);

        assert!(fuzzy.resolve_extended("Completely").unwrap().is_none());
    }

    #[test]
    fn two_pass_resolution_picks_up_new_targets() {
        let (store, registry) = setup(LinkConfig::default());
        registry.register_links("A.md", &names(&["B"])).unwrap();

        // B has not been created remotely yet
        let first = registry.resolve_all().unwrap();
        assert_eq!(first.resolved, 0);
        assert_eq!(first.unresolved, 1);
        assert!(!registry.links_from("A.md").unwrap()[0].resolved);

        add_document(&store, "B.md", "p-b");
        let second = registry.resolve_all().unwrap();
        assert_eq!(
            second,
            ResolveStats {
                scanned: 1,
                resolved: 1,
                fuzzy_resolved: 0,
                unresolved: 0
            }
        );

        let link = &registry.links_from("A.md").unwrap()[0];
        assert!(link.resolved);
        assert_eq!(link.notion_page_id.as_deref(), Some("p-b"));
        assert_eq!(link.target_path.as_deref(), Some("B.md"));
        assert_eq!(registry.backlinks("B.md").unwrap().len(), 1);
    }

    #[test]
    fn resolve_all_with_fuzzy_counts_separately() {
        let (store, registry) = setup(LinkConfig::default());
        add_document(&store, "Exact.md", "p-exact");
        add_document(&store, "ServiceClass.md", "p-svc");
        registry
            .register_links("a.md", &names(&["Exact", "SrviceClass", "Nothing Like It"]))
            .unwrap();

        let exact_only = registry.resolve_all().unwrap();
        assert_eq!(exact_only.resolved, 1);
        assert_eq!(exact_only.unresolved, 2);

        let stats = registry.resolve_all_with_fuzzy().unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.fuzzy_resolved, 1);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(
            registry.stats().unwrap(),
            LinkStats {
                total: 3,
                resolved: 2,
                unresolved: 1
            }
        );
    }

    #[test]
    fn repair_links_dry_run_does_not_write() {
        let (store, registry) = setup(LinkConfig::default());
        add_document(&store, "docs/ServiceClass.md", "p-svc");
        registry
            .register_links("a.md", &names(&["SrviceClass", "Unknown Topic"]))
            .unwrap();

        let preview = registry.repair_links(true).unwrap();
        assert!(preview.dry_run);
        assert_eq!(preview.repairs.len(), 1);
        assert_eq!(preview.repairs[0].matched_path, "docs/ServiceClass.md");
        assert_eq!(preview.repairs[0].distance, 1);
        assert_eq!(preview.unmatched, 1);
        assert_eq!(registry.unresolved().unwrap().len(), 2);

        let applied = registry.repair_links(false).unwrap();
        assert_eq!(applied.repairs, preview.repairs);
        let remaining = registry.unresolved().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].target_name, "Unknown Topic");
    }

    #[test]
    fn suggestions_are_read_only_and_ranked() {
        let (store, registry) = setup(LinkConfig::default());
        add_document(&store, "Service Class.md", "p1");
        add_document(&store, "Service Clas.md", "p2");
        store.set_state(&SyncState::new("Service Class Draft.md")).unwrap();
        registry.register_links("a.md", &names(&["service class"])).unwrap();

        let suggestions = registry.suggestions_for_unresolved(2).unwrap();
        assert_eq!(suggestions.len(), 1);
        let candidates = &suggestions[0].candidates;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].candidate, "Service Class.md");
        assert_eq!(candidates[0].score, MatchScore::CaseInsensitive);

        assert_eq!(registry.unresolved().unwrap().len(), 1);

        // Default limit is larger than the candidate pool
        assert_eq!(registry.suggestions().unwrap()[0].candidates.len(), 3);
    }
}
