//! Entity resolution: grouping papers that describe the same work.
//!
//! Two papers are the same work when both carry the same normalized DOI, or
//! when neither carries a DOI and their normalized titles match. A DOI never
//! matches a title: a paper with a DOI and a DOI-less paper with the same
//! title stay separate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::models::Paper;
use crate::utils::{merge_papers, normalize_doi, normalize_title, SourcePriority};

/// Strategy for handling duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    /// Fuse each duplicate group into one record using the source priority table
    #[default]
    Merge,
    /// Keep the first occurrence of each duplicate group
    KeepFirst,
}

/// Errors raised by entity resolution configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown merge strategy: {0} (expected 'merge' or 'first')")]
    UnknownStrategy(String),
}

impl FromStr for DuplicateStrategy {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(DuplicateStrategy::Merge),
            "first" | "keep_first" | "keep-first" => Ok(DuplicateStrategy::KeepFirst),
            other => Err(ResolveError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum IdentityKey {
    Doi(String),
    Title(String),
}

fn identity_key(paper: &Paper) -> Option<IdentityKey> {
    if let Some(doi) = normalize_doi(paper.doi.as_deref()) {
        return Some(IdentityKey::Doi(doi));
    }
    let title = normalize_title(&paper.title);
    (!title.is_empty()).then_some(IdentityKey::Title(title))
}

/// Partition paper indices into identity groups.
///
/// Every index appears in exactly one group. Groups are ordered by their
/// first member and members keep input order. Papers with neither a DOI nor a
/// title are never grouped with anything.
pub fn group_papers(papers: &[Paper]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut index: HashMap<IdentityKey, usize> = HashMap::new();

    for (i, paper) in papers.iter().enumerate() {
        match identity_key(paper) {
            Some(key) => match index.get(&key) {
                Some(&group) => groups[group].push(i),
                None => {
                    index.insert(key, groups.len());
                    groups.push(vec![i]);
                }
            },
            None => groups.push(vec![i]),
        }
    }

    groups
}

/// Find duplicate papers
///
/// Returns only the groups with more than one member.
pub fn find_duplicates(papers: &[Paper]) -> Vec<Vec<usize>> {
    group_papers(papers)
        .into_iter()
        .filter(|g| g.len() > 1)
        .collect()
}

/// Resolves a paper list into one record per work
#[derive(Debug, Clone, Default)]
pub struct EntityResolver {
    priority: SourcePriority,
}

impl EntityResolver {
    /// Create a resolver using `priority` for field selection
    pub fn new(priority: SourcePriority) -> Self {
        Self { priority }
    }

    /// The priority table in use
    pub fn priority(&self) -> &SourcePriority {
        &self.priority
    }

    /// Deduplicate `papers`.
    ///
    /// Singleton groups pass through unchanged. Larger groups become one
    /// merged record or their first member, depending on `strategy`. Each
    /// output record sits at the position of its group's first member.
    /// Feeding the output back in returns it unchanged.
    pub fn resolve(&self, papers: Vec<Paper>, strategy: DuplicateStrategy) -> Vec<Paper> {
        let groups = group_papers(&papers);
        if groups.len() == papers.len() {
            return papers;
        }

        let before = papers.len();
        let mut slots: Vec<Option<Paper>> = papers.into_iter().map(Some).collect();
        let mut resolved = Vec::with_capacity(groups.len());

        for group in groups {
            let members: Vec<Paper> = group.iter().filter_map(|&i| slots[i].take()).collect();
            let record = match (members.len(), strategy) {
                (1, _) | (_, DuplicateStrategy::KeepFirst) => members.into_iter().next(),
                (_, DuplicateStrategy::Merge) => merge_papers(&members, &self.priority),
            };
            resolved.extend(record);
        }

        tracing::debug!(
            "Resolved {} papers into {} ({:?})",
            before,
            resolved.len(),
            strategy
        );
        resolved
    }

    /// Merge papers known to describe the same work
    pub fn merge(&self, papers: &[Paper]) -> Option<Paper> {
        merge_papers(papers, &self.priority)
    }
}

/// Remove duplicate papers from a list using the default priority table
pub fn deduplicate_papers(papers: Vec<Paper>, strategy: DuplicateStrategy) -> Vec<Paper> {
    EntityResolver::default().resolve(papers, strategy)
}
