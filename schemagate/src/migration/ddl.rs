use crate::error::{Result, SchemaGateError};
use crate::schema::{
    CharSize, DbType, FieldArgs, FieldType, Kind, OnDelete, SortOrder, DEFAULT_PRECISION, DEFAULT_SCALE,
    DEFAULT_TIME_PRECISION,
};
use crate::value::{format_rfc3339, Value};

/// Largest length Postgres accepts for `character(n)`. A bare `character`
/// means `character(1)`.
pub const POSTGRES_MAX_CHAR: u32 = 10_485_760;

/// Render the column type of `field` in `db_type`.
pub fn column_type(db_type: DbType, table: &str, field: &FieldType) -> Result<String> {
    let unsupported = |what: String| SchemaGateError::migration(table, what);
    if db_type.is_document_store() {
        return Err(unsupported(format!("{db_type} has no column types")));
    }

    let precision = field.args.map(|a| a.precision).unwrap_or(DEFAULT_TIME_PRECISION);
    let sql = match field.kind {
        Kind::UUID => match db_type {
            DbType::Postgres => "uuid".to_string(),
            _ => {
                return Err(unsupported(format!(
                    "field '{}': UUID is only supported on postgres",
                    field.name
                )))
            }
        },
        Kind::Time => format!("time({precision})"),
        Kind::Date => "date".to_string(),
        Kind::Char => match (db_type, field.size) {
            (DbType::Postgres, CharSize::Max) => format!("character({POSTGRES_MAX_CHAR})"),
            (DbType::Postgres, CharSize::Limited(n)) => format!("character({n})"),
            (DbType::MySQL, CharSize::Max) => "char(255)".to_string(),
            (DbType::MySQL, CharSize::Limited(n)) => format!("char({n})"),
            (_, CharSize::Max) => "nchar(4000)".to_string(),
            (_, CharSize::Limited(n)) => format!("nchar({n})"),
        },
        Kind::ID | Kind::VarChar => match (db_type, field.size) {
            (DbType::Postgres, CharSize::Max) => "character varying".to_string(),
            (DbType::Postgres, CharSize::Limited(n)) => format!("character varying({n})"),
            (DbType::MySQL, CharSize::Max) => "longtext".to_string(),
            (DbType::MySQL, CharSize::Limited(n)) => format!("varchar({n})"),
            (_, CharSize::Max) => "nvarchar(max)".to_string(),
            (_, CharSize::Limited(n)) => format!("nvarchar({n})"),
        },
        Kind::String => match db_type {
            DbType::Postgres => "text",
            DbType::MySQL => "longtext",
            _ => "nvarchar(max)",
        }
        .to_string(),
        Kind::DateTime => match db_type {
            DbType::Postgres => format!("timestamp({precision}) without time zone"),
            DbType::MySQL => format!("datetime({precision})"),
            _ => format!("datetime2({precision})"),
        },
        Kind::DateTimeWithZone => match db_type {
            DbType::Postgres => format!("timestamp({precision}) with time zone"),
            DbType::MySQL => format!("timestamp({precision})"),
            _ => format!("datetimeoffset({precision})"),
        },
        Kind::Boolean => match db_type {
            DbType::Postgres => "boolean",
            DbType::MySQL => "tinyint(1)",
            _ => "bit",
        }
        .to_string(),
        Kind::Float => match db_type {
            DbType::Postgres => "double precision",
            DbType::MySQL => "double",
            _ => "float",
        }
        .to_string(),
        Kind::Decimal => {
            let args = field.args.unwrap_or(FieldArgs {
                precision: DEFAULT_PRECISION,
                scale: DEFAULT_SCALE,
            });
            match db_type {
                DbType::Postgres => format!("numeric({},{})", args.precision, args.scale),
                _ => format!("decimal({},{})", args.precision, args.scale),
            }
        }
        Kind::Integer => "integer".to_string(),
        Kind::SmallInteger => "smallint".to_string(),
        Kind::BigInteger => "bigint".to_string(),
        Kind::JSON => match db_type {
            DbType::Postgres => "jsonb",
            DbType::MySQL => "json",
            _ => "nvarchar(max)",
        }
        .to_string(),
        Kind::Object => {
            return Err(unsupported(format!(
                "field '{}': object type is not supported in sql creation",
                field.name
            )))
        }
    };
    Ok(sql)
}

/// `<db>.<table>` where the dialect has schemas, bare otherwise.
pub fn qualified_table(db_type: DbType, db_name: &str, table: &str) -> String {
    match db_type {
        DbType::Postgres | DbType::SQLServer => format!("{db_name}.{table}"),
        _ => table.to_string(),
    }
}

/// Column declaration inside `CREATE TABLE` or `ADD COLUMN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub auto_increment: bool,
    /// SQL Server stores JSON as text and guards it with `ISJSON`.
    pub json_check: bool,
}

impl ColumnDef {
    pub fn for_field(db_type: DbType, table: &str, field: &FieldType, not_null: bool) -> Result<Self> {
        let mut sql_type = column_type(db_type, table, field)?;
        let auto_increment = field.is_auto_increment();
        if auto_increment {
            if !field.kind.is_integer() {
                return Err(SchemaGateError::migration(
                    table,
                    format!("cannot add autoIncrement constraint on non integer column '{}'", field.name),
                ));
            }
            if db_type == DbType::Postgres {
                sql_type = match field.kind {
                    Kind::SmallInteger => "smallserial",
                    Kind::BigInteger => "bigserial",
                    _ => "serial",
                }
                .to_string();
            }
        }
        Ok(ColumnDef {
            name: field.name.clone(),
            sql_type,
            not_null,
            auto_increment,
            json_check: db_type == DbType::SQLServer && field.kind == Kind::JSON,
        })
    }

    fn render(&self, db_type: DbType, table: &str) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.json_check {
            sql.push_str(&format!(
                " constraint json_check_{table}_{name} CHECK (ISJSON({name})=1)",
                name = self.name
            ));
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.auto_increment {
            match db_type {
                DbType::MySQL => sql.push_str(" AUTO_INCREMENT"),
                DbType::SQLServer => sql.push_str(" IDENTITY(1,1)"),
                _ => {}
            }
        }
        sql
    }
}

/// One schema change, rendered per dialect by [`DdlStatement::to_sql`].
#[derive(Debug, Clone, PartialEq)]
pub enum DdlStatement {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
        primary_key: Vec<String>,
    },
    AddColumn {
        table: String,
        column: ColumnDef,
    },
    DropColumn {
        table: String,
        column: String,
    },
    /// `default` is restated where the dialect rewrites the whole column.
    SetNotNull {
        table: String,
        column: String,
        sql_type: String,
        default: Option<Value>,
    },
    DropNotNull {
        table: String,
        column: String,
        sql_type: String,
        default: Option<Value>,
    },
    AddForeignKey {
        table: String,
        column: String,
        constraint: String,
        ref_table: String,
        ref_column: String,
        on_delete: OnDelete,
    },
    DropForeignKey {
        table: String,
        constraint: String,
    },
    SetDefault {
        table: String,
        column: String,
        value: Value,
    },
    DropDefault {
        table: String,
        column: String,
    },
    CreateIndex {
        table: String,
        name: String,
        unique: bool,
        columns: Vec<(String, SortOrder)>,
    },
    DropIndex {
        table: String,
        name: String,
    },
}

impl DdlStatement {
    pub fn table(&self) -> &str {
        match self {
            DdlStatement::CreateTable { table, .. }
            | DdlStatement::AddColumn { table, .. }
            | DdlStatement::DropColumn { table, .. }
            | DdlStatement::SetNotNull { table, .. }
            | DdlStatement::DropNotNull { table, .. }
            | DdlStatement::AddForeignKey { table, .. }
            | DdlStatement::DropForeignKey { table, .. }
            | DdlStatement::SetDefault { table, .. }
            | DdlStatement::DropDefault { table, .. }
            | DdlStatement::CreateIndex { table, .. }
            | DdlStatement::DropIndex { table, .. } => table,
        }
    }

    /// Whether applying this statement can lose stored data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, DdlStatement::DropColumn { .. })
    }

    /// Human-readable description of this statement.
    pub fn describe(&self) -> String {
        match self {
            DdlStatement::CreateTable { table, columns, .. } => {
                format!("Create table '{}' with {} column(s)", table, columns.len())
            }
            DdlStatement::AddColumn { table, column } => {
                format!("Add column '{}.{}'", table, column.name)
            }
            DdlStatement::DropColumn { table, column } => {
                format!("Drop column '{}.{}' (data lost)", table, column)
            }
            DdlStatement::SetNotNull { table, column, .. } => {
                format!("Make '{}.{}' required", table, column)
            }
            DdlStatement::DropNotNull { table, column, .. } => {
                format!("Make '{}.{}' optional", table, column)
            }
            DdlStatement::AddForeignKey { table, column, ref_table, ref_column, .. } => {
                format!("Add foreign key '{}.{}' -> '{}.{}'", table, column, ref_table, ref_column)
            }
            DdlStatement::DropForeignKey { table, constraint } => {
                format!("Drop foreign key '{}' on '{}'", constraint, table)
            }
            DdlStatement::SetDefault { table, column, .. } => {
                format!("Set default of '{}.{}'", table, column)
            }
            DdlStatement::DropDefault { table, column } => {
                format!("Drop default of '{}.{}'", table, column)
            }
            DdlStatement::CreateIndex { table, name, unique, .. } => {
                let kind = if *unique { "unique index" } else { "index" };
                format!("Create {} '{}' on '{}'", kind, name, table)
            }
            DdlStatement::DropIndex { table, name } => {
                format!("Drop index '{}' on '{}'", name, table)
            }
        }
    }

    /// Render the statement. Most changes are one statement; dropping a
    /// MySQL foreign key also drops its backing index.
    pub fn to_sql(&self, db_type: DbType, db_name: &str) -> Vec<String> {
        let qualified = |table: &str| qualified_table(db_type, db_name, table);
        let sql = match self {
            DdlStatement::CreateTable { table, columns, primary_key } => {
                let mut parts: Vec<String> = columns.iter().map(|c| c.render(db_type, table)).collect();
                if !primary_key.is_empty() {
                    parts.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
                }
                format!("CREATE TABLE {} ({})", qualified(table), parts.join(", "))
            }
            DdlStatement::AddColumn { table, column } => {
                let keyword = match db_type {
                    DbType::Postgres => "ADD COLUMN",
                    _ => "ADD",
                };
                format!("ALTER TABLE {} {} {}", qualified(table), keyword, column.render(db_type, table))
            }
            DdlStatement::DropColumn { table, column } => {
                format!("ALTER TABLE {} DROP COLUMN {}", qualified(table), column)
            }
            DdlStatement::SetNotNull { table, column, sql_type, default } => match db_type {
                DbType::MySQL => format!(
                    "ALTER TABLE {} MODIFY {} {} NOT NULL{}",
                    qualified(table),
                    column,
                    sql_type,
                    mysql_default_clause(default)
                ),
                DbType::Postgres => format!("ALTER TABLE {} ALTER COLUMN {} SET NOT NULL", qualified(table), column),
                _ => format!("ALTER TABLE {} ALTER COLUMN {} {} NOT NULL", qualified(table), column, sql_type),
            },
            DdlStatement::DropNotNull { table, column, sql_type, default } => match db_type {
                DbType::MySQL => format!(
                    "ALTER TABLE {} MODIFY {} {} NULL{}",
                    qualified(table),
                    column,
                    sql_type,
                    mysql_default_clause(default)
                ),
                DbType::Postgres => format!("ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL", qualified(table), column),
                _ => format!("ALTER TABLE {} ALTER COLUMN {} {} NULL", qualified(table), column, sql_type),
            },
            DdlStatement::AddForeignKey { table, column, constraint, ref_table, ref_column, on_delete } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    qualified(table),
                    constraint,
                    column,
                    qualified(ref_table),
                    ref_column
                );
                if *on_delete == OnDelete::Cascade {
                    sql.push_str(" ON DELETE CASCADE");
                }
                sql
            }
            DdlStatement::DropForeignKey { table, constraint } => match db_type {
                DbType::MySQL => {
                    return vec![
                        format!("ALTER TABLE {} DROP FOREIGN KEY {}", qualified(table), constraint),
                        format!("ALTER TABLE {} DROP INDEX {}", qualified(table), constraint),
                    ]
                }
                _ => format!("ALTER TABLE {} DROP CONSTRAINT {}", qualified(table), constraint),
            },
            DdlStatement::SetDefault { table, column, value } => {
                let literal = default_literal(db_type, value);
                match db_type {
                    DbType::MySQL => format!("ALTER TABLE {} ALTER {} SET DEFAULT ({})", qualified(table), column, literal),
                    DbType::Postgres => format!("ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}", qualified(table), column, literal),
                    _ => format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT {} FOR {}",
                        qualified(table),
                        default_constraint_name(table, column),
                        literal,
                        column
                    ),
                }
            }
            DdlStatement::DropDefault { table, column } => match db_type {
                DbType::MySQL => format!("ALTER TABLE {} ALTER {} DROP DEFAULT", qualified(table), column),
                DbType::Postgres => format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", qualified(table), column),
                _ => format!(
                    "ALTER TABLE {} DROP CONSTRAINT {}",
                    qualified(table),
                    default_constraint_name(table, column)
                ),
            },
            DdlStatement::CreateIndex { table, name, unique, columns } => {
                let members: Vec<String> = columns
                    .iter()
                    .map(|(column, sort)| format!("{} {}", column, sort.as_str()))
                    .collect();
                format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if *unique { "UNIQUE " } else { "" },
                    name,
                    qualified(table),
                    members.join(", ")
                )
            }
            DdlStatement::DropIndex { table, name } => match db_type {
                DbType::Postgres => format!("DROP INDEX {}", qualified(name)),
                _ => format!("DROP INDEX {} ON {}", name, qualified(table)),
            },
        };
        vec![sql]
    }
}

/// SQL Server names default constraints; other dialects attach defaults
/// to the column.
pub fn default_constraint_name(table: &str, column: &str) -> String {
    format!("df__{table}__{column}")
}

fn mysql_default_clause(default: &Option<Value>) -> String {
    match default {
        Some(value) => format!(" DEFAULT ({})", default_literal(DbType::MySQL, value)),
        None => String::new(),
    }
}

/// Render a default value as a SQL literal.
pub fn default_literal(db_type: DbType, value: &Value) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', "''"));
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) if db_type == DbType::SQLServer => if *b { "1" } else { "0" }.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => quote(s),
        Value::DateTime(t) => quote(&format_rfc3339(t)),
        other => quote(&serde_json::Value::from(other.clone()).to_string()),
    }
}
