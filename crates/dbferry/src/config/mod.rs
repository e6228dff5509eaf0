//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub(crate) use validation::validate_request;

use std::path::Path;

use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
connections:
  warehouse:
    db_type: postgres
    datasource: "host=localhost user=etl dbname=dw"
    ssl_mode: require
    max_connections: 8
  scratch:
    db_type: sqlite
    datasource: "sqlite::memory:"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.connections.len(), 2);
        let wh = &config.connections["warehouse"];
        assert_eq!(wh.pool_size(), 8);
        assert_eq!(wh.ssl_mode(), "require");
        assert_eq!(config.connections["scratch"].pool_size(), 4);
        assert_eq!(config.connections["scratch"].ssl_mode(), "disable");
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = r#"
connections:
  broken:
    db_type: postgres
    datasource: ""
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/dbferry.yaml").unwrap_err();
        assert!(matches!(err, crate::error::FerryError::Io(_)));
    }
}
