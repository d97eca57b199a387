//! File name filter for the ingestion convention

use dropwatch_core::error::{Error, Result};
use regex::Regex;
use std::path::Path;

/// Matches file names (never full paths) against the configured pattern
#[derive(Debug, Clone)]
pub struct FileMatcher {
    pattern: Regex,
}

impl FileMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("Invalid file pattern '{pattern}': {e}")))?;
        Ok(Self { pattern })
    }

    /// Whether a bare file name matches
    pub fn matches_name(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// Whether the last component of `path` matches
    ///
    /// Paths without a UTF-8 file name never match.
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.matches_name(name))
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_matcher() -> FileMatcher {
        FileMatcher::new(r"^test_\d+\.txt$").unwrap()
    }

    #[test]
    fn test_accepts_convention() {
        let matcher = default_matcher();
        assert!(matcher.matches_name("test_1.txt"));
        assert!(matcher.matches_name("test_000123.txt"));
        assert!(matcher.matches(Path::new("/data/in/test_42.txt")));
    }

    #[test]
    fn test_rejects_other_names() {
        let matcher = default_matcher();
        for name in [
            "test_.txt",
            "test_12a.txt",
            "test_1.txt.swp",
            ".test_1.txt",
            "Test_1.txt",
            "test_1.TXT",
            "test_1.txt~",
            "notes.txt",
        ] {
            assert!(!matcher.matches_name(name), "{name} should not match");
        }
    }

    #[test]
    fn test_matches_file_name_only() {
        let matcher = default_matcher();
        assert!(!matcher.matches(Path::new("/data/test_1.txt/inner.txt")));
        assert!(!matcher.matches(Path::new("/")));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = FileMatcher::new("test_(").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
