//! Ingestion file: a pretty-printed JSON list of 4-string arrays.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{info, warn};

use crate::analysis::models::OffenseTuple;
use crate::Result;

/// Write tuples to `path`, creating parent directories.
pub fn save(path: &Path, tuples: &BTreeSet<OffenseTuple>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(tuples)?;
    std::fs::write(path, json)?;
    info!("Saved {} tuples to {}", tuples.len(), path.display());
    Ok(())
}

/// Read tuples from `path`.
///
/// A missing or malformed file yields an empty set; the reason is logged.
pub fn load(path: &Path) -> BTreeSet<OffenseTuple> {
    match try_load(path) {
        Ok(tuples) => {
            info!("Loaded {} tuples from {}", tuples.len(), path.display());
            tuples
        }
        Err(err) => {
            warn!("Could not load tuples from {}: {}", path.display(), err);
            BTreeSet::new()
        }
    }
}

/// Strict variant of [`load`].
pub fn try_load(path: &Path) -> Result<BTreeSet<OffenseTuple>> {
    let content = std::fs::read_to_string(path)?;
    let tuples: Vec<OffenseTuple> = serde_json::from_str(&content)?;
    Ok(tuples.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> BTreeSet<OffenseTuple> {
        [
            OffenseTuple::new("Theft", "17", "303", "Up to 3 years, or fine, or both"),
            OffenseTuple::new("Cheating", "8", "420", "He said \"pay\" ['later']\n"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn save_then_load_returns_equal_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tuples.json");

        save(&path, &sample()).unwrap();
        assert_eq!(load(&path), sample());
    }

    #[test]
    fn file_is_a_json_list_of_string_arrays() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tuples.json");
        save(&path, &sample()).unwrap();

        let raw: Vec<Vec<String>> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
        assert!(raw.iter().all(|r| r.len() == 4));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[[\"Theft\", \"17\"]]").unwrap();

        assert!(load(&path).is_empty());
        assert!(try_load(&path).is_err());
    }
}
