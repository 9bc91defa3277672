pub mod apply;
pub mod plan;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result};
use secgroups::{DesiredState, Document};
use std::path::Path;

/// Read a desired-state document and parse every rule in it.
pub fn load_desired(path: &Path) -> Result<DesiredState> {
    let document = Document::from_path(path)
        .with_context(|| format!("Could not load {}", path.display()))?;
    DesiredState::load(&document).with_context(|| format!("Invalid rules in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_desired_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("groups.yaml");
        std::fs::write(&path, "web:\n  options:\n    rules:\n      - \"tcp port 80 @@\"\n").unwrap();

        let err = load_desired(&path).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("Invalid rules in"));
        assert!(chain.contains("group 'web'"));
    }
}
