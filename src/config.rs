//! Engine configuration.
//!
//! ```toml
//! preload_types = true
//! max_composite_depth = 8
//! cascade_composition_delete = true
//! migrations_dir = "migrations"
//! migration_run_mode = "UPDATE"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::migration::RunMode;
use crate::Result;

fn default_max_depth() -> usize {
    16
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Load every type into the cache when the graph opens.
    pub preload_types: bool,
    /// Deepest allowed nesting of composite values.
    #[serde(default = "default_max_depth")]
    pub max_composite_depth: usize,
    /// Delete composition children together with their parent.
    #[serde(default = "default_true")]
    pub cascade_composition_delete: bool,
    /// Directory of `migrationN.json` files applied at open.
    pub migrations_dir: Option<PathBuf>,
    /// Run mode for migrations that don't declare one.
    pub migration_run_mode: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            preload_types: false,
            max_composite_depth: default_max_depth(),
            cascade_composition_delete: true,
            migrations_dir: None,
            migration_run_mode: None,
        }
    }
}

impl CoreConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The default run mode, if one is configured.
    pub fn default_run_mode(&self) -> Result<Option<RunMode>> {
        self.migration_run_mode.as_deref().map(RunMode::from_str).transpose()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.default_run_mode()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert!(config.cascade_composition_delete);
        assert_eq!(config.max_composite_depth, 16);
    }

    #[test]
    fn test_full_config() {
        let config = CoreConfig::from_toml_str(
            r#"
            preload_types = true
            max_composite_depth = 4
            cascade_composition_delete = false
            migrations_dir = "db/migrations"
            migration_run_mode = "ALWAYS"
            "#,
        )
        .unwrap();
        assert!(config.preload_types);
        assert_eq!(config.max_composite_depth, 4);
        assert!(!config.cascade_composition_delete);
        assert_eq!(config.migrations_dir, Some(PathBuf::from("db/migrations")));
        assert_eq!(config.default_run_mode().unwrap(), Some(RunMode::Always));
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            CoreConfig::from_toml_str(r#"migration_run_mode = "SOMETIMES""#),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(CoreConfig::from_toml_str("bogus = 1"), Err(Error::Toml(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_composite_depth = 3").unwrap();
        let config = CoreConfig::load(file.path()).unwrap();
        assert_eq!(config.max_composite_depth, 3);

        assert!(matches!(CoreConfig::load("/no/such/topicgraph.toml"), Err(Error::Io(_))));
    }
}
