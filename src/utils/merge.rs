//! Field-level merge policy for papers that describe the same work.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::Paper;
use crate::utils::normalize_doi;

/// Upper bound on keywords carried by a merged paper
pub const MAX_MERGED_KEYWORDS: usize = 20;

/// Which providers to trust first, per field.
///
/// Hand-authored configuration: fields missing from the table fall back to
/// the first non-empty value in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePriority {
    fields: HashMap<String, Vec<String>>,
}

impl Default for SourcePriority {
    fn default() -> Self {
        let table: &[(&str, &[&str])] = &[
            (
                "abstract",
                &[
                    "semantic_scholar",
                    "openalex",
                    "pubmed",
                    "elsevier",
                    "crossref",
                    "core",
                    "arxiv",
                ],
            ),
            ("authors", &["crossref", "openalex", "pubmed", "semantic_scholar", "dblp"]),
            ("year", &["crossref", "openalex", "pubmed", "semantic_scholar"]),
            ("journal", &["crossref", "openalex", "pubmed", "elsevier", "wos"]),
            ("url", &["crossref", "openalex", "semantic_scholar"]),
            (
                "pdf_url",
                &["arxiv", "core", "openalex", "semantic_scholar", "medrxiv", "doaj"],
            ),
        ];

        Self {
            fields: table
                .iter()
                .map(|(field, providers)| {
                    (
                        field.to_string(),
                        providers.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl SourcePriority {
    /// A table with no entries; every field uses first-non-empty
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Set the provider order for a field
    pub fn with_field<I, S>(mut self, field: impl Into<String>, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(field.into(), providers.into_iter().map(Into::into).collect());
        self
    }

    /// Provider order for a field, most trusted first
    pub fn providers_for(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Pick the value for `field` from a duplicate group.
    ///
    /// `value` must return `None` for empty values.
    fn pick<'a, T: ?Sized>(
        &self,
        field: &str,
        papers: &'a [Paper],
        value: impl Fn(&'a Paper) -> Option<&'a T>,
    ) -> Option<&'a T> {
        if let Some(providers) = self.providers_for(field) {
            for provider in providers {
                if let Some(found) = papers
                    .iter()
                    .filter(|p| p.is_from(provider))
                    .find_map(&value)
                {
                    return Some(found);
                }
            }
        }
        papers.iter().find_map(value)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Merge papers describing the same work into one new record.
///
/// Returns `None` for an empty group and a clone of the only member for a
/// group of one. The inputs are left untouched.
pub fn merge_papers(papers: &[Paper], priority: &SourcePriority) -> Option<Paper> {
    match papers {
        [] => return None,
        [only] => return Some(only.clone()),
        _ => {}
    }

    let title = papers
        .iter()
        .map(|p| p.title.as_str())
        .find(|t| !t.trim().is_empty())
        .unwrap_or(&papers[0].title)
        .to_string();

    let authors = priority
        .pick("authors", papers, |p| {
            (!p.authors.is_empty()).then_some(p.authors.as_slice())
        })
        .map(<[String]>::to_vec)
        .unwrap_or_default();

    let open_access = if papers.iter().any(|p| p.open_access == Some(true)) {
        Some(true)
    } else if papers.iter().any(|p| p.open_access == Some(false)) {
        Some(false)
    } else {
        None
    };

    Some(Paper {
        title,
        authors,
        r#abstract: priority
            .pick("abstract", papers, |p| non_blank(&p.r#abstract))
            .map(str::to_string),
        doi: papers.iter().find_map(|p| normalize_doi(p.doi.as_deref())),
        year: priority.pick("year", papers, |p| p.year.as_ref()).copied(),
        journal: priority
            .pick("journal", papers, |p| non_blank(&p.journal))
            .map(str::to_string),
        url: priority
            .pick("url", papers, |p| non_blank(&p.url))
            .map(str::to_string),
        pdf_url: priority
            .pick("pdf_url", papers, |p| non_blank(&p.pdf_url))
            .map(str::to_string),
        source: merged_source(papers),
        citations_count: papers.iter().filter_map(|p| p.citations_count).max(),
        references_count: papers.iter().filter_map(|p| p.references_count).max(),
        open_access,
        keywords: merge_keywords(papers),
        raw_data: merged_raw_data(papers),
    })
}

/// Sorted, de-duplicated, comma-joined provider names of every member
fn merged_source(papers: &[Paper]) -> String {
    papers
        .iter()
        .flat_map(Paper::source_names)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(",")
}

/// Case-insensitive union, first-seen casing kept
fn merge_keywords(papers: &[Paper]) -> Vec<String> {
    let mut seen = HashSet::new();
    papers
        .iter()
        .flat_map(|p| p.keywords.iter())
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
        .take(MAX_MERGED_KEYWORDS)
        .map(str::to_string)
        .collect()
}

const MERGED_FROM: &str = "merged_from";

/// Every constituent's provider and payload; already-merged members are flattened
fn merged_raw_data(papers: &[Paper]) -> HashMap<String, serde_json::Value> {
    let mut entries = Vec::new();

    for paper in papers {
        match paper.raw_data.get(MERGED_FROM) {
            Some(serde_json::Value::Array(inner)) if paper.is_merged() => {
                entries.extend(inner.iter().cloned());
            }
            _ => entries.push(serde_json::json!({
                "source": paper.source,
                "raw_data": paper.raw_data,
            })),
        }
    }

    HashMap::from([(MERGED_FROM.to_string(), serde_json::Value::Array(entries))])
}
