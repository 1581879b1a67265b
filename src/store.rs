//! JSON file persistence for `{companies, people}` documents.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::graph::Graph;

/// Reads and validates a graph file.
pub fn load(path: &Path) -> Result<Graph> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let graph = Graph::from_json_str(&contents)
        .with_context(|| format!("'{}' is not a valid graph", path.display()))?;
    debug!(path = %path.display(), companies = graph.companies.len(), "graph loaded");
    Ok(graph)
}

/// Loads `path`, or returns an empty graph when the file does not exist yet.
pub fn load_or_default(path: &Path) -> Result<Graph> {
    if path.exists() {
        load(path)
    } else {
        Ok(Graph::default())
    }
}

/// Writes the graph next to `path` first and renames it into place, so a
/// reader never observes a half-written file.
pub fn save(path: &Path, graph: &Graph) -> Result<()> {
    let mut contents = graph
        .to_json_pretty()
        .with_context(|| format!("failed to encode graph for '{}'", path.display()))?;
    contents.push('\n');

    let staging = staging_path(path);
    fs::write(&staging, contents.as_bytes())
        .with_context(|| format!("failed to write '{}'", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to replace '{}'", path.display()))?;
    debug!(path = %path.display(), "graph saved");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "graph.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Company;
    use tempfile::tempdir;

    #[test]
    fn save_then_load() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("graph.json");
        let graph = Graph::new(
            vec![
                Company::new("h", "Holding"),
                Company::new("a", "Alpha").with_parents(["h"]),
            ],
            Vec::new(),
        );

        save(&path, &graph)?;
        assert_eq!(load(&path)?, graph);
        assert!(!dir.path().join("graph.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn missing_file_is_empty_graph() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(load_or_default(&dir.path().join("none.json"))?, Graph::default());
        Ok(())
    }

    #[test]
    fn malformed_file_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"companies": "nope", "people": []}"#)?;
        assert!(load(&path).is_err());
        Ok(())
    }
}
