use super::parser::parse_table_sdl;
use super::types::{CollectionSchemas, DBSchemas, DbType, FieldSchemas};
use crate::config::GatewayConfig;
use crate::error::{Result, SchemaGateError};
use indexmap::IndexMap;
use std::sync::Arc;

/// Dialect and logical name of one database alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub db_type: DbType,
    pub name: String,
}

/// Immutable published view of every parsed schema.
///
/// Cloning is cheap. A config reload builds a fresh snapshot and swaps it in;
/// readers holding the old one keep a consistent view.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    schemas: Arc<DBSchemas>,
    databases: Arc<IndexMap<String, DatabaseInfo>>,
}

impl SchemaSnapshot {
    pub fn new(schemas: DBSchemas, databases: IndexMap<String, DatabaseInfo>) -> Self {
        SchemaSnapshot {
            schemas: Arc::new(schemas),
            databases: Arc::new(databases),
        }
    }

    /// Parse every table of every database in `config`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let mut schemas = DBSchemas::new();
        let mut databases = IndexMap::new();

        for (alias, db) in &config.databases {
            if matches!(db.db_type, DbType::Postgres | DbType::SQLServer) && db.name.is_empty() {
                return Err(SchemaGateError::Config(format!(
                    "database '{alias}' of type {} requires a name",
                    db.db_type
                )));
            }

            let mut collection = CollectionSchemas::new();
            for (table, table_config) in &db.tables {
                if table_config.schema.trim().is_empty() {
                    continue;
                }
                let parsed = parse_table_sdl(table, &table_config.schema)?;
                for (name, fields) in parsed {
                    if &name == table {
                        collection.insert(name, fields);
                    } else {
                        collection.entry(name).or_insert(fields);
                    }
                }
            }

            schemas.insert(alias.clone(), collection);
            databases.insert(
                alias.clone(),
                DatabaseInfo {
                    db_type: db.db_type,
                    name: db.name.clone(),
                },
            );
        }

        log::info!(
            "Built schema snapshot: {} database(s), {} table(s)",
            schemas.len(),
            schemas.values().map(|c| c.len()).sum::<usize>()
        );
        Ok(SchemaSnapshot::new(schemas, databases))
    }

    pub fn schemas(&self) -> &DBSchemas {
        &self.schemas
    }

    pub fn collection(&self, alias: &str) -> Option<&CollectionSchemas> {
        self.schemas.get(alias)
    }

    pub fn table(&self, alias: &str, table: &str) -> Option<&FieldSchemas> {
        self.collection(alias)?.get(table)
    }

    pub fn database(&self, alias: &str) -> Option<&DatabaseInfo> {
        self.databases.get(alias)
    }

    pub fn db_type(&self, alias: &str) -> Option<DbType> {
        self.database(alias).map(|d| d.db_type)
    }

    pub fn db_name(&self, alias: &str) -> Option<&str> {
        self.database(alias).map(|d| d.name.as_str())
    }
}
