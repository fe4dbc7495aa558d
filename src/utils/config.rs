//! TOML configuration loading

use std::path::Path;

use serde::de::DeserializeOwned;

use super::error::{DeepscanError, Result};

/// Load and deserialize a TOML configuration file.
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(DeepscanError::PathNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        epochs: usize,
    }

    #[test]
    fn test_load_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.toml");
        std::fs::write(&path, "name = \"run\"\nepochs = 3\n").unwrap();

        let sample: Sample = load_toml_config(&path).unwrap();
        assert_eq!(sample.name, "run");
        assert_eq!(sample.epochs, 3);
    }

    #[test]
    fn test_missing_file() {
        let result: Result<Sample> = load_toml_config(Path::new("/nonexistent/cfg.toml"));
        assert!(matches!(result, Err(DeepscanError::PathNotFound(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = [unterminated").unwrap();

        let result: Result<Sample> = load_toml_config(&path);
        assert!(matches!(result, Err(DeepscanError::Config(_))));
    }
}
