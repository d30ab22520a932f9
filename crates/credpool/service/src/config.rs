//! Service configuration.

use crate::ServiceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pool service configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Directory holding the per-category CSV ledger pairs.
    pub data_dir: PathBuf,

    /// Categories available at startup; pools discovered on disk are
    /// unioned in.
    pub categories: Vec<String>,

    /// Shared-passphrase allow-set. Empty means nobody can log in.
    pub passphrases: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            categories: [
                "disney",
                "netflix",
                "spotify",
                "hbo",
                "paramount",
                "starplus",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            passphrases: Vec::new(),
        }
    }
}

impl PoolConfig {
    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = PoolConfig::load(Path::new("/nonexistent/credpool.toml")).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.categories.contains(&"netflix".to_string()));
        assert!(config.passphrases.is_empty());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credpool.toml");
        std::fs::write(&path, "passphrases = [\"hunter2\"]\n").unwrap();

        let config = PoolConfig::load(&path).unwrap();
        assert_eq!(config.passphrases, vec!["hunter2".to_string()]);
        assert!(config.categories.contains(&"spotify".to_string()));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credpool.toml");
        std::fs::write(&path, "passphrases = not-a-list\n").unwrap();

        assert!(matches!(
            PoolConfig::load(&path),
            Err(ServiceError::Config(_))
        ));
    }
}
