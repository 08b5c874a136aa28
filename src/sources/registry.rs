//! Registry mapping provider names to source implementations.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Source, SourceError};

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const PAPER_LOOKUP = 1 << 1;
        const CITATIONS = 1 << 2;
        const REFERENCES = 1 << 3;
    }
}

/// Registry for all available research sources
///
/// Lookups are explicit: an unknown name is reported to the caller, who
/// decides whether to skip it.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a set of sources
    pub fn with_sources<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Source>>,
    {
        let mut registry = Self::new();
        for source in sources {
            registry.register(source);
        }
        registry
    }

    /// Register a new source, replacing any previous one with the same ID
    pub fn register(&mut self, source: Arc<dyn Source>) {
        if self.sources.contains_key(source.id()) {
            tracing::debug!("Replacing registered source '{}'", source.id());
        }
        self.sources.insert(source.id().to_string(), source);
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(id)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::UnknownSource(id.to_string()))
    }

    /// Get all registered sources
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.values()
    }

    /// Get all source IDs, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sources.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Split requested names into registered sources and unknown names.
    ///
    /// Repeated names are collapsed; both lists keep request order.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> (Vec<&Arc<dyn Source>>, Vec<String>) {
        let mut known: Vec<&Arc<dyn Source>> = Vec::new();
        let mut unknown: Vec<String> = Vec::new();

        for name in names {
            let name = name.as_ref();
            match self.get(name) {
                Some(source) => {
                    if !known.iter().any(|s| s.id() == name) {
                        known.push(source);
                    }
                }
                None => {
                    if !unknown.iter().any(|u| u == name) {
                        unknown.push(name.to_string());
                    }
                }
            }
        }

        (known, unknown)
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
