//! Corruption catalog loading.
//!
//! A catalog is a text file with one corruption name per line. The name
//! [`NATURAL`] is reserved for the unperturbed reference set; every other name
//! must match a shard file under the benchmark root.

use std::path::Path;

use crate::error::{Error, Result};

/// Sentinel corruption name for the clean reference test set.
pub const NATURAL: &str = "natural";

/// Built-in catalog: the clean set followed by the 19 CIFAR-10-C corruptions.
pub const DEFAULT_CATALOG: &str = include_str!("../data/corruptions.txt");

/// Load a catalog file.
///
/// Returns one entry per non-empty line, in file order, without
/// deduplication. An empty file yields an empty list.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `path` does not exist.
pub fn load_catalog(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
    Ok(parse_catalog(&text))
}

/// Parse catalog text. Surrounding whitespace of each line is ignored.
///
/// ```
/// use corruption_bench::catalog::parse_catalog;
///
/// let names = parse_catalog("natural\n\nfog\r\nfog\n");
/// assert_eq!(names, ["natural", "fog", "fog"]);
/// ```
#[must_use]
pub fn parse_catalog(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The built-in catalog as a list.
#[must_use]
pub fn default_catalog() -> Vec<String> {
    parse_catalog(DEFAULT_CATALOG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_preserves_order_and_duplicates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "natural").unwrap();
        writeln!(file, "fog").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "snow").unwrap();
        writeln!(file, "fog").unwrap();

        let names = load_catalog(file.path()).unwrap();
        assert_eq!(names, vec!["natural", "fog", "snow", "fog"]);
    }

    #[test]
    fn test_load_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let names = load_catalog(file.path()).unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_default_catalog() {
        let names = default_catalog();
        assert_eq!(names.len(), 20);
        assert_eq!(names[0], NATURAL);
        assert!(names.contains(&"fog".to_string()));
        assert!(names.contains(&"zoom_blur".to_string()));
    }
}
