//! Conversion path resolution.
//!
//! When no direct capability exists, the resolver searches the directed graph
//! whose nodes are formats and whose edges are registered capabilities.
//!
//! The search is a breadth-first search bounded to `max_hops` edges
//! (three by default: `source → a → b → target`). It returns the first path
//! that reaches the target, which is a minimum-hop path; it does not try to
//! find the cheapest or highest-quality route. A format is enqueued at most
//! once, so only the first-discovered route through any intermediate format
//! survives. Neighbours are visited in lexicographic order, which makes the
//! choice among equal-length paths deterministic.

use crate::format::FormatId;
use crate::registry::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tracing::debug;

/// Default bound on the number of edges in a resolved path.
pub const DEFAULT_MAX_HOPS: usize = 3;

/// Ordered, non-empty sequence of formats: first is the source, last the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionPath(Vec<FormatId>);

impl ConversionPath {
    /// Single-format path (source equals target).
    pub fn identity(format: FormatId) -> Self {
        Self(vec![format])
    }

    /// Build a path from explicit formats. Returns `None` for an empty list.
    pub fn from_formats(formats: Vec<FormatId>) -> Option<Self> {
        if formats.is_empty() {
            None
        } else {
            Some(Self(formats))
        }
    }

    pub fn formats(&self) -> &[FormatId] {
        &self.0
    }

    pub fn source(&self) -> &FormatId {
        &self.0[0]
    }

    pub fn target(&self) -> &FormatId {
        &self.0[self.0.len() - 1]
    }

    /// Number of edges (capability invocations).
    pub fn hops(&self) -> usize {
        self.0.len() - 1
    }

    /// Adjacent `(from, to)` pairs in execution order.
    pub fn steps(&self) -> impl Iterator<Item = (&FormatId, &FormatId)> {
        self.0.windows(2).map(|w| (&w[0], &w[1]))
    }

    pub fn into_formats(self) -> Vec<FormatId> {
        self.0
    }
}

impl fmt::Display for ConversionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(FormatId::as_str).collect();
        f.write_str(&parts.join(" → "))
    }
}

/// Find a minimum-hop conversion path from `source` to `target`.
///
/// Returns `None` when `target` is unreachable within `max_hops` edges.
/// `source == target` yields the single-format path immediately.
pub fn find_conversion_path(
    registry: &CapabilityRegistry,
    source: &FormatId,
    target: &FormatId,
    max_hops: usize,
) -> Option<ConversionPath> {
    if source == target {
        return Some(ConversionPath::identity(source.clone()));
    }

    let mut visited: HashSet<&FormatId> = HashSet::new();
    let mut queue: VecDeque<Vec<&FormatId>> = VecDeque::new();
    visited.insert(source);
    queue.push_back(vec![source]);

    while let Some(route) = queue.pop_front() {
        let hops = route.len() - 1;
        if hops >= max_hops {
            continue;
        }
        let Some(&current) = route.last() else {
            continue;
        };

        for next in registry.targets_iter(current) {
            if next == target {
                let mut found: Vec<FormatId> = route.iter().map(|f| (*f).clone()).collect();
                found.push(next.clone());
                let path = ConversionPath(found);
                debug!("Resolved {source} -> {target} via {path}");
                return Some(path);
            }
            if hops + 1 < max_hops && visited.insert(next) {
                let mut extended = route.clone();
                extended.push(next);
                queue.push_back(extended);
            }
        }
    }

    debug!("No path {source} -> {target} within {max_hops} hops");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CapabilityOutcome, FnCapability};
    use std::sync::Arc;

    fn fmt(s: &str) -> FormatId {
        FormatId::parse(s).unwrap()
    }

    fn registry(edges: &[(&str, &str)]) -> CapabilityRegistry {
        let mut reg = CapabilityRegistry::new();
        for (s, t) in edges {
            reg.register(
                fmt(s),
                fmt(t),
                "test",
                Arc::new(FnCapability::new(format!("{s}2{t}"), |_, _| {
                    CapabilityOutcome::ok("noop")
                })),
            )
            .unwrap();
        }
        reg
    }

    fn names(path: &ConversionPath) -> Vec<&str> {
        path.formats().iter().map(FormatId::as_str).collect()
    }

    #[test]
    fn identity_path() {
        let reg = CapabilityRegistry::new();
        let path = find_conversion_path(&reg, &fmt("csv"), &fmt("csv"), 3).unwrap();
        assert_eq!(names(&path), vec!["csv"]);
        assert_eq!(path.hops(), 0);
    }

    #[test]
    fn direct_edge() {
        let reg = registry(&[("csv", "html")]);
        let path = find_conversion_path(&reg, &fmt("csv"), &fmt("html"), 3).unwrap();
        assert_eq!(names(&path), vec!["csv", "html"]);
    }

    #[test]
    fn prefers_fewest_hops() {
        // Long route csv→a→b→pdf and short route csv→html→pdf.
        let reg = registry(&[
            ("csv", "aaa"),
            ("aaa", "bbb"),
            ("bbb", "pdf"),
            ("csv", "html"),
            ("html", "pdf"),
        ]);
        let path = find_conversion_path(&reg, &fmt("csv"), &fmt("pdf"), 3).unwrap();
        assert_eq!(names(&path), vec!["csv", "html", "pdf"]);
    }

    #[test]
    fn equal_length_ties_break_lexicographically() {
        let reg = registry(&[
            ("md", "odt"),
            ("odt", "pdf"),
            ("md", "html"),
            ("html", "pdf"),
        ]);
        for _ in 0..5 {
            let path = find_conversion_path(&reg, &fmt("md"), &fmt("pdf"), 3).unwrap();
            assert_eq!(names(&path), vec!["md", "html", "pdf"]);
        }
    }

    #[test]
    fn three_hops_reachable_four_not() {
        let reg = registry(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")]);
        let path = find_conversion_path(&reg, &fmt("a"), &fmt("d"), 3).unwrap();
        assert_eq!(path.hops(), 3);
        assert!(find_conversion_path(&reg, &fmt("a"), &fmt("e"), 3).is_none());
    }

    #[test]
    fn unreachable_returns_none() {
        let reg = registry(&[("csv", "json"), ("png", "jpg")]);
        assert!(find_conversion_path(&reg, &fmt("csv"), &fmt("jpg"), 3).is_none());
        assert!(find_conversion_path(&reg, &fmt("xlsx"), &fmt("csv"), 3).is_none());
    }

    #[test]
    fn cycles_terminate() {
        let reg = registry(&[("a", "b"), ("b", "a"), ("b", "c"), ("c", "a")]);
        assert!(find_conversion_path(&reg, &fmt("a"), &fmt("zzz"), 3).is_none());
    }

    #[test]
    fn respects_smaller_bound() {
        let reg = registry(&[("a", "b"), ("b", "c")]);
        assert!(find_conversion_path(&reg, &fmt("a"), &fmt("c"), 1).is_none());
        assert!(find_conversion_path(&reg, &fmt("a"), &fmt("c"), 2).is_some());
    }

    #[test]
    fn display_and_steps() {
        let reg = registry(&[("csv", "html"), ("html", "pdf")]);
        let path = find_conversion_path(&reg, &fmt("csv"), &fmt("pdf"), 3).unwrap();
        assert_eq!(path.to_string(), "csv → html → pdf");
        let steps: Vec<(String, String)> = path
            .steps()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        assert_eq!(
            steps,
            vec![
                ("csv".to_string(), "html".to_string()),
                ("html".to_string(), "pdf".to_string())
            ]
        );
    }
}
