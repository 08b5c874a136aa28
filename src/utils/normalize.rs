//! Identifier and title normalization used for identity checks.

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Normalize a DOI: trimmed, lowercase, without URL or `doi:` prefix.
///
/// Returns `None` for missing or blank input.
pub fn normalize_doi(doi: Option<&str>) -> Option<String> {
    let doi = doi?.trim().to_lowercase();

    let stripped = DOI_PREFIXES
        .iter()
        .find_map(|prefix| doi.strip_prefix(prefix))
        .unwrap_or(&doi)
        .trim();

    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Normalize a title: lowercase with whitespace runs collapsed to one space
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
