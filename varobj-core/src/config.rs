//! Configuration
//!
//! Behaviour switches of a variable-object store, readable from a TOML file:
//!
//! ```toml
//! use_dynamic_type = true
//! runs_all_threads = false
//! name_prefix = "var"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VarobjConfig {
    /// Build children from the most-derived class of pointer and reference
    /// values, and show values as that class.
    pub use_dynamic_type: bool,
    /// Let every thread of the program run while expressions are evaluated
    /// instead of only the evaluating one.
    pub runs_all_threads: bool,
    /// Prefix of generated object names.
    pub name_prefix: String,
}

impl Default for VarobjConfig {
    fn default() -> Self {
        Self {
            use_dynamic_type: true,
            runs_all_threads: false,
            name_prefix: "var".to_string(),
        }
    }
}

impl VarobjConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid variable object configuration")
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to load config file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = VarobjConfig::from_toml_str("").unwrap();
        assert_eq!(config, VarobjConfig::default());
        assert!(config.use_dynamic_type);
        assert!(!config.runs_all_threads);
        assert_eq!(config.name_prefix, "var");
    }

    #[test]
    fn test_partial_override() {
        let config = VarobjConfig::from_toml_str("runs_all_threads = true\nname_prefix = \"w\"").unwrap();
        assert!(config.runs_all_threads);
        assert!(config.use_dynamic_type);
        assert_eq!(config.name_prefix, "w");
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(VarobjConfig::from_toml_str("print_object = true").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "use_dynamic_type = false").unwrap();
        let config = VarobjConfig::load(file.path()).unwrap();
        assert!(!config.use_dynamic_type);

        let err = VarobjConfig::load(file.path().with_extension("missing")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
