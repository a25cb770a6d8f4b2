use crate::error::Result;
use crate::schema::DbType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub databases: IndexMap<String, DatabaseConfig>,
}

/// One database alias
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: DbType,
    /// Logical database (or schema) name used to qualify table names.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tables: IndexMap<String, TableConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub schema: String,
}

/// Parse a gateway config file
pub fn parse_config(path: &Path) -> Result<GatewayConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a gateway config YAML string
pub fn parse_config_str(content: &str) -> Result<GatewayConfig> {
    let config: GatewayConfig = serde_yaml::from_str(content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = parse_config_str(
            r#"
databases:
  main:
    type: postgres
    name: public
    tables:
      users:
        schema: |
          type users { id: ID! @primary }
      drafts:
        schema: ""
  events:
    type: mongo
"#,
        )
        .unwrap();

        let main = &config.databases["main"];
        assert_eq!(main.db_type, DbType::Postgres);
        assert_eq!(main.name, "public");
        assert!(main.tables["users"].schema.contains("type users"));
        assert!(main.tables["drafts"].schema.is_empty());
        assert_eq!(config.databases["events"].db_type, DbType::Mongo);
        assert!(config.databases["events"].tables.is_empty());
    }

    #[test]
    fn test_unknown_db_type() {
        assert!(parse_config_str("databases:\n  x:\n    type: oracle\n").is_err());
    }
}
