//! Catalog command.

use std::path::Path;

use anyhow::{Context, Result};
use corruption_bench::catalog::{default_catalog, load_catalog};

pub fn run(catalog: Option<&Path>, json: bool, verbose: bool) -> Result<()> {
    let names = resolve(catalog)?;
    if verbose {
        match catalog {
            Some(path) => eprintln!("Catalog: {} ({} entries)", path.display(), names.len()),
            None => eprintln!("Catalog: built-in ({} entries)", names.len()),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in &names {
            println!("{name}");
        }
    }
    Ok(())
}

/// The catalog file's names, or the built-in list.
pub fn resolve(catalog: Option<&Path>) -> Result<Vec<String>> {
    match catalog {
        Some(path) => load_catalog(path)
            .with_context(|| format!("Failed to load catalog {}", path.display())),
        None => Ok(default_catalog()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_builtin() {
        let names = resolve(None).unwrap();
        assert_eq!(names.first().map(String::as_str), Some("natural"));
    }

    #[test]
    fn test_resolve_missing_file() {
        let err = resolve(Some(Path::new("/nonexistent/catalog.txt"))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load catalog"));
    }
}
