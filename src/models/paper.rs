//! Paper model representing a research paper as reported by one provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A research paper from any academic source
///
/// A `Paper` is produced by a provider parser and then flows read-only through
/// fan-out and pagination. Entity resolution never mutates one: it either drops
/// it or consumes it to build a new merged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Paper title
    pub title: String,

    /// Authors, in the order the provider listed them
    #[serde(default)]
    pub authors: Vec<String>,

    /// Abstract text
    #[serde(default)]
    pub r#abstract: Option<String>,

    /// Digital Object Identifier
    #[serde(default)]
    pub doi: Option<String>,

    /// Publication year
    #[serde(default)]
    pub year: Option<i32>,

    /// Journal or venue name
    #[serde(default)]
    pub journal: Option<String>,

    /// Paper page URL
    #[serde(default)]
    pub url: Option<String>,

    /// Direct PDF URL
    #[serde(default)]
    pub pdf_url: Option<String>,

    /// Provider name, or the sorted comma-joined provider set after a merge
    pub source: String,

    /// Number of papers citing this one
    #[serde(default)]
    pub citations_count: Option<u32>,

    /// Number of papers this one references
    #[serde(default)]
    pub references_count: Option<u32>,

    /// Open access status, when the provider knows it
    #[serde(default)]
    pub open_access: Option<bool>,

    /// Keywords/subjects
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Provider payload, carried through untouched
    #[serde(default)]
    pub raw_data: HashMap<String, serde_json::Value>,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            r#abstract: None,
            doi: None,
            year: None,
            journal: None,
            url: None,
            pdf_url: None,
            source: source.into(),
            citations_count: None,
            references_count: None,
            open_access: None,
            keywords: Vec::new(),
            raw_data: HashMap::new(),
        }
    }

    /// Provider names this record came from.
    ///
    /// A merged record lists several, comma-separated.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.source
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether `provider` contributed to this record
    pub fn is_from(&self, provider: &str) -> bool {
        self.source_names().any(|s| s == provider)
    }

    /// Whether this record is the product of a merge
    pub fn is_merged(&self) -> bool {
        self.source_names().nth(1).is_some()
    }

    /// Check if paper has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            paper: Paper::new(title, source),
        }
    }

    /// Set authors
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = Some(abstract_text.into());
        self
    }

    /// Set DOI
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.paper.doi = Some(doi.into());
        self
    }

    /// Set publication year
    pub fn year(mut self, year: i32) -> Self {
        self.paper.year = Some(year);
        self
    }

    /// Set journal
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.paper.journal = Some(journal.into());
        self
    }

    /// Set page URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.paper.url = Some(url.into());
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = Some(url.into());
        self
    }

    /// Set citation count
    pub fn citations(mut self, count: u32) -> Self {
        self.paper.citations_count = Some(count);
        self
    }

    /// Set reference count
    pub fn references(mut self, count: u32) -> Self {
        self.paper.references_count = Some(count);
        self
    }

    /// Set open access flag
    pub fn open_access(mut self, open: bool) -> Self {
        self.paper.open_access = Some(open);
        self
    }

    /// Set keywords
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Add raw provider data
    pub fn raw(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.paper.raw_data.insert(key.into(), value);
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_builder() {
        let paper = PaperBuilder::new("Test Paper", "openalex")
            .authors(["John Doe", "Jane Smith"])
            .abstract_text("This is a test abstract.")
            .doi("10.1234/test.1234")
            .pdf_url("https://example.com/paper.pdf")
            .citations(42)
            .build();

        assert_eq!(paper.title, "Test Paper");
        assert_eq!(paper.authors, vec!["John Doe", "Jane Smith"]);
        assert_eq!(paper.doi, Some("10.1234/test.1234".to_string()));
        assert_eq!(paper.citations_count, Some(42));
        assert!(paper.has_pdf());
    }

    #[test]
    fn test_source_names() {
        let single = Paper::new("Test", "crossref");
        assert_eq!(single.source_names().collect::<Vec<_>>(), vec!["crossref"]);
        assert!(!single.is_merged());

        let merged = Paper::new("Test", "crossref,semantic_scholar");
        assert!(merged.is_from("semantic_scholar"));
        assert!(!merged.is_from("semantic"));
        assert!(merged.is_merged());
    }

    #[test]
    fn test_deserialize_minimal() {
        let paper: Paper =
            serde_json::from_str(r#"{"title": "Minimal", "source": "arxiv"}"#).unwrap();
        assert_eq!(paper.title, "Minimal");
        assert!(paper.authors.is_empty());
        assert!(paper.raw_data.is_empty());
        assert_eq!(paper.open_access, None);
    }
}
