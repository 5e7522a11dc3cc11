//! Capability registry: `(source, target)` → conversion capability.
//!
//! The registry is filled once at startup through explicit
//! [`CapabilityRegistry::register`] calls and is read-only afterwards. It is
//! handed to the engine by value and shared behind an `Arc`, so concurrent
//! lookups need no locking.
//!
//! Adjacency is kept in `BTreeMap`s: every enumeration (targets of a format,
//! all formats, all pairs) is lexicographically ordered, which is what makes
//! path resolution reproducible.

use crate::error::EngineError;
use crate::format::FormatId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Result of a single capability invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOutcome {
    pub success: bool,
    pub message: String,
}

impl CapabilityOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Something that can turn one file format into another.
///
/// The engine never looks inside a capability: it hands over an input path
/// and an output path and trusts the returned [`CapabilityOutcome`].
/// Implementations are called synchronously and may block.
pub trait Capability: Send + Sync {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Convert `input` into `output`. `output` may already exist as an empty
    /// placeholder and must be overwritten.
    fn convert(&self, input: &Path, output: &Path) -> CapabilityOutcome;
}

/// Adapter turning a closure into a [`Capability`].
///
/// # Example
/// ```rust
/// use edgequake_convert::{CapabilityOutcome, FnCapability};
///
/// let copy = FnCapability::new("copy", |input, output| {
///     match std::fs::copy(input, output) {
///         Ok(_) => CapabilityOutcome::ok("copied"),
///         Err(e) => CapabilityOutcome::failed(e.to_string()),
///     }
/// });
/// ```
pub struct FnCapability<F> {
    name: String,
    func: F,
}

impl<F> FnCapability<F>
where
    F: Fn(&Path, &Path) -> CapabilityOutcome + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Capability for FnCapability<F>
where
    F: Fn(&Path, &Path) -> CapabilityOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(&self, input: &Path, output: &Path) -> CapabilityOutcome {
        (self.func)(input, output)
    }
}

struct Entry {
    origin: String,
    capability: Arc<dyn Capability>,
}

/// Map of registered capabilities keyed by `(source, target)`.
#[derive(Default)]
pub struct CapabilityRegistry {
    edges: BTreeMap<FormatId, BTreeMap<FormatId, Entry>>,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.len())
            .field("formats", &self.formats().len())
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capability` for `source → target`.
    ///
    /// `origin` names where the registration comes from (a module, a plugin).
    /// Registering the same pair again from the same origin is a no-op;
    /// from a different origin it is rejected.
    pub fn register(
        &mut self,
        source: FormatId,
        target: FormatId,
        origin: &str,
        capability: Arc<dyn Capability>,
    ) -> Result<(), EngineError> {
        let targets = self.edges.entry(source.clone()).or_default();

        if let Some(existing) = targets.get(&target) {
            if existing.origin == origin {
                debug!("Ignoring repeat registration {source} -> {target} from '{origin}'");
                return Ok(());
            }
            return Err(EngineError::DuplicateCapability {
                source_format: source.to_string(),
                target: target.to_string(),
                existing: existing.origin.clone(),
                incoming: origin.to_string(),
            });
        }

        debug!(
            "Registered {source} -> {target} ({}) from '{origin}'",
            capability.name()
        );
        targets.insert(
            target,
            Entry {
                origin: origin.to_string(),
                capability,
            },
        );
        Ok(())
    }

    /// Direct capability for `source → target`, if any.
    pub fn lookup(&self, source: &FormatId, target: &FormatId) -> Option<Arc<dyn Capability>> {
        self.edges
            .get(source)
            .and_then(|targets| targets.get(target))
            .map(|entry| Arc::clone(&entry.capability))
    }

    pub fn contains(&self, source: &FormatId, target: &FormatId) -> bool {
        self.edges
            .get(source)
            .is_some_and(|targets| targets.contains_key(target))
    }

    /// Formats directly reachable from `source`, in lexicographic order.
    pub fn list_targets(&self, source: &FormatId) -> BTreeSet<FormatId> {
        self.edges
            .get(source)
            .map(|targets| targets.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Ordered iterator over direct targets; used by the path resolver.
    pub(crate) fn targets_iter<'a>(
        &'a self,
        source: &FormatId,
    ) -> impl Iterator<Item = &'a FormatId> + 'a {
        self.edges
            .get(source)
            .into_iter()
            .flat_map(|targets| targets.keys())
    }

    /// Every format appearing as a source or a target.
    pub fn formats(&self) -> BTreeSet<FormatId> {
        let mut all = BTreeSet::new();
        for (source, targets) in &self.edges {
            if !targets.is_empty() {
                all.insert(source.clone());
            }
            all.extend(targets.keys().cloned());
        }
        all
    }

    /// Every registered `(source, target, capability name)` triple.
    pub fn pairs(&self) -> Vec<(FormatId, FormatId, String)> {
        self.edges
            .iter()
            .flat_map(|(source, targets)| {
                targets.iter().map(move |(target, entry)| {
                    (
                        source.clone(),
                        target.clone(),
                        entry.capability.name().to_string(),
                    )
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
