//! Bundled world specification documents, embedded at compile time.

/// Every bundled document as `(label, yaml)`. Labels are
/// `WORLD_TYPE@version`; versions for one world type are listed in
/// ascending order.
pub const DOCUMENTS: &[(&str, &str)] = &[
    (
        "RESEARCH_WORLD@1.1.0",
        include_str!("builtin/research_world-1.1.0.yaml"),
    ),
    (
        "RESEARCH_WORLD@1.2.0",
        include_str!("builtin/research_world-1.2.0.yaml"),
    ),
    (
        "JOURNAL_WORLD@1.0.20",
        include_str!("builtin/journal_world-1.0.20.yaml"),
    ),
    (
        "JOURNAL_WORLD@1.0.21",
        include_str!("builtin/journal_world-1.0.21.yaml"),
    ),
];

/// Resolve a bundled document by exact label (`JOURNAL_WORLD@1.0.20`) or by
/// bare world type, in which case the highest bundled version wins.
pub fn document(id: &str) -> Option<&'static str> {
    if let Some((_, doc)) = DOCUMENTS.iter().find(|(label, _)| *label == id) {
        return Some(doc);
    }
    // Bare world type: DOCUMENTS is ascending per world type, so the last
    // match is the latest version.
    DOCUMENTS
        .iter()
        .rfind(|(label, _)| label.split_once('@').map(|(wt, _)| wt) == Some(id))
        .map(|(_, doc)| *doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_label_lookup() {
        assert!(document("JOURNAL_WORLD@1.0.20").is_some());
        assert!(document("JOURNAL_WORLD@9.9.9").is_none());
    }

    #[test]
    fn test_bare_name_resolves_latest() {
        let latest = document("JOURNAL_WORLD").unwrap();
        assert!(latest.contains("specVersion: 1.0.21"));
    }
}
