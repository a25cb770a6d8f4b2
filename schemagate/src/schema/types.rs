use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CHAR_SIZE: u32 = 100;
pub const DEFAULT_PRECISION: u32 = 38;
pub const DEFAULT_SCALE: u32 = 10;
pub const DEFAULT_TIME_PRECISION: u32 = 6;
pub const DEFAULT_INDEX_ORDER: u32 = 1;

/// Ordered field name to field mapping, one table.
pub type FieldSchemas = IndexMap<String, FieldType>;

/// Table name to fields, one database. Embedded object types live here too,
/// keyed by their type name.
pub type CollectionSchemas = IndexMap<String, FieldSchemas>;

/// Database alias to its collections.
pub type DBSchemas = IndexMap<String, CollectionSchemas>;

/// Canonical column kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    ID,
    String,
    VarChar,
    Char,
    Integer,
    SmallInteger,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    DateTime,
    DateTimeWithZone,
    Date,
    Time,
    JSON,
    UUID,
    Object,
}

impl Kind {
    /// Resolve a primitive SDL type name. `Enum` and `Varchar` are accepted
    /// as aliases.
    pub fn from_type_name(name: &str) -> Option<Kind> {
        let kind = match name {
            "ID" => Kind::ID,
            "String" | "Enum" => Kind::String,
            "VarChar" | "Varchar" => Kind::VarChar,
            "Char" => Kind::Char,
            "Integer" => Kind::Integer,
            "SmallInteger" => Kind::SmallInteger,
            "BigInteger" => Kind::BigInteger,
            "Float" => Kind::Float,
            "Decimal" => Kind::Decimal,
            "Boolean" => Kind::Boolean,
            "DateTime" => Kind::DateTime,
            "DateTimeWithZone" => Kind::DateTimeWithZone,
            "Date" => Kind::Date,
            "Time" => Kind::Time,
            "JSON" => Kind::JSON,
            "UUID" => Kind::UUID,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::ID => "ID",
            Kind::String => "String",
            Kind::VarChar => "VarChar",
            Kind::Char => "Char",
            Kind::Integer => "Integer",
            Kind::SmallInteger => "SmallInteger",
            Kind::BigInteger => "BigInteger",
            Kind::Float => "Float",
            Kind::Decimal => "Decimal",
            Kind::Boolean => "Boolean",
            Kind::DateTime => "DateTime",
            Kind::DateTimeWithZone => "DateTimeWithZone",
            Kind::Date => "Date",
            Kind::Time => "Time",
            Kind::JSON => "JSON",
            Kind::UUID => "UUID",
            Kind::Object => "Object",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Kind::Integer | Kind::SmallInteger | Kind::BigInteger)
    }

    /// Kinds backed by a fractional numeric column.
    pub fn is_fractional(&self) -> bool {
        matches!(self, Kind::Float | Kind::Decimal)
    }

    /// Kinds holding a full timestamp.
    pub fn is_timestamp(&self) -> bool {
        matches!(self, Kind::DateTime | Kind::DateTimeWithZone)
    }

    /// Kinds carrying a fractional-seconds precision.
    pub fn has_time_precision(&self) -> bool {
        matches!(self, Kind::DateTime | Kind::DateTimeWithZone | Kind::Time)
    }

    /// Kinds whose column is sized by `@size`.
    pub fn is_sized(&self) -> bool {
        matches!(self, Kind::ID | Kind::VarChar | Kind::Char)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database dialect of an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Mongo,
    Postgres,
    #[serde(rename = "mysql")]
    MySQL,
    #[serde(rename = "sqlserver")]
    SQLServer,
    Embedded,
}

impl DbType {
    /// Schemaless backends. Migrations are a no-op for them and values keep
    /// their native shapes.
    pub fn is_document_store(&self) -> bool {
        matches!(self, DbType::Mongo | DbType::Embedded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Mongo => "mongo",
            DbType::Postgres => "postgres",
            DbType::MySQL => "mysql",
            DbType::SQLServer => "sqlserver",
            DbType::Embedded => "embedded",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precision and scale of numeric and time columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldArgs {
    pub precision: u32,
    #[serde(default)]
    pub scale: u32,
}

/// Declared size of a character column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharSize {
    Limited(u32),
    Max,
}

impl Default for CharSize {
    fn default() -> Self {
        CharSize::Limited(DEFAULT_CHAR_SIZE)
    }
}

impl fmt::Display for CharSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharSize::Limited(n) => write!(f, "{n}"),
            CharSize::Max => f.write_str("max"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyInfo {
    pub order: u32,
    #[serde(default)]
    pub auto_increment: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnDelete {
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "CASCADE")]
    Cascade,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub table: String,
    pub to: String,
    #[serde(default)]
    pub on_delete: OnDelete,
    pub constraint_name: String,
}

impl ForeignKeyInfo {
    pub fn constraint_name_for(table: &str, field: &str) -> String {
        format!("c_{table}_{field}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Membership of a field in one index group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub group: String,
    pub order: u32,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
}

impl IndexInfo {
    pub fn index_name_for(table: &str, group: &str) -> String {
        format!("index__{table}__{group}")
    }
}

/// Virtual field resolved by the gateway from another table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub table: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    pub type_name: String,
}

/// One field of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub kind: Kind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<FieldArgs>,
    #[serde(default)]
    pub size: CharSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<PrimaryKeyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign: Option<ForeignKeyInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_info: Vec<IndexInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub is_created_at: bool,
    #[serde(default)]
    pub is_updated_at: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkInfo>,
    /// Name of the declared type describing an embedded object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<String>,
}

impl FieldType {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        FieldType {
            name: name.into(),
            kind,
            required: false,
            is_list: false,
            args: default_args(kind),
            size: CharSize::default(),
            primary: None,
            foreign: None,
            index_info: Vec::new(),
            default: None,
            is_created_at: false,
            is_updated_at: false,
            link: None,
            nested: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn is_auto_increment(&self) -> bool {
        self.primary.map(|p| p.auto_increment).unwrap_or(false)
    }
}

/// Precision defaults a freshly declared field of `kind` carries.
pub fn default_args(kind: Kind) -> Option<FieldArgs> {
    if kind.has_time_precision() {
        Some(FieldArgs {
            precision: DEFAULT_TIME_PRECISION,
            scale: 0,
        })
    } else if kind.is_fractional() {
        Some(FieldArgs {
            precision: DEFAULT_PRECISION,
            scale: DEFAULT_SCALE,
        })
    } else {
        None
    }
}

/// Persisted (non-linked) fields in declaration order.
pub fn physical_fields(fields: &FieldSchemas) -> impl Iterator<Item = &FieldType> {
    fields.values().filter(|f| !f.is_linked())
}
