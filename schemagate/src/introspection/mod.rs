//! Reconstruct the live schema of a table from a driver's describe and
//! index listing rows.

pub mod native;
pub mod sdl;

pub use sdl::generate_sdl;

use crate::error::{Result, SchemaGateError};
use crate::migration::ddl::column_type;
use crate::schema::*;
use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One column as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub column_name: String,
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub varchar_size: Option<i64>,
    #[serde(default)]
    pub numeric_precision: Option<i64>,
    #[serde(default)]
    pub numeric_scale: Option<i64>,
    #[serde(default)]
    pub datetime_precision: Option<i64>,
    /// Name of the foreign key constraint on this column, if any.
    #[serde(default)]
    pub constraint_name: Option<String>,
    #[serde(default)]
    pub delete_rule: Option<String>,
    #[serde(default)]
    pub ref_table: Option<String>,
    #[serde(default)]
    pub ref_column: Option<String>,
}

/// One (index, column) membership as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub column_name: String,
    pub index_name: String,
    #[serde(default = "default_order")]
    pub order: u32,
    /// `asc`/`desc`, or MySQL's `A`/`D` collation flags.
    #[serde(default)]
    pub sort: String,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_primary: bool,
}

fn default_order() -> u32 {
    DEFAULT_INDEX_ORDER
}

/// Everything fetched for one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableRows {
    #[serde(default)]
    pub columns: Vec<ColumnRow>,
    #[serde(default)]
    pub indexes: Vec<IndexRow>,
}

static CAST_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<value>.*?)::[A-Za-z_ ]+(?:\([0-9, ]*\))?(?:\[\])?$").expect("cast pattern is valid")
});

/// Strip the decorations backends put around default literals:
/// wrapping parentheses, `::type` casts, `N` prefixes and quotes.
pub fn normalize_default(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    loop {
        if let Some(inner) = strip_wrapping_parens(&s) {
            s = inner.trim().to_string();
            continue;
        }
        if let Some(caps) = CAST_SUFFIX.captures(&s) {
            s = caps["value"].trim().to_string();
            continue;
        }
        if s.starts_with("N'") {
            s.remove(0);
        }
        if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
            return s[1..s.len() - 1].replace("''", "'");
        }
        return s;
    }
}

fn strip_wrapping_parens(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0i32;
    let mut quoted = false;
    for c in inner.chars() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

/// Type a normalized default literal by the column's kind.
fn typed_default(kind: Kind, literal: String) -> Option<Value> {
    if literal.eq_ignore_ascii_case("null") {
        return None;
    }
    let value = match kind {
        Kind::Boolean => match literal.to_lowercase().as_str() {
            "true" | "t" | "1" | "b'1'" => Value::Bool(true),
            "false" | "f" | "0" | "b'0'" => Value::Bool(false),
            _ => Value::String(literal),
        },
        kind if kind.is_integer() => match literal.parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => literal
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::String(literal)),
        },
        Kind::Float | Kind::Decimal => literal
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::String(literal)),
        _ => Value::String(literal),
    };
    Some(value)
}

fn parse_sort(sort: &str) -> SortOrder {
    match sort.to_lowercase().as_str() {
        "d" | "desc" => SortOrder::Desc,
        _ => SortOrder::Asc,
    }
}

fn group_name(table: &str, index_name: &str) -> String {
    let prefix = format!("index__{table}__");
    index_name
        .strip_prefix(&prefix)
        .unwrap_or(index_name)
        .to_string()
}

fn to_u32(n: Option<i64>, default: u32) -> u32 {
    n.and_then(|n| u32::try_from(n).ok()).unwrap_or(default)
}

fn inspect_column(db_type: DbType, table: &str, row: &ColumnRow) -> Result<FieldType> {
    let kind = native::kind_for(db_type, &row.data_type, row.varchar_size).ok_or_else(|| {
        SchemaGateError::migration(
            table,
            format!(
                "unsupported column type '{}' for column '{}' on {db_type}",
                row.data_type, row.column_name
            ),
        )
    })?;

    let mut field = FieldType::new(&row.column_name, kind);
    field.required = !row.nullable;

    if kind.is_sized() {
        field.size = match row.varchar_size {
            Some(n) if n > 0 => CharSize::Limited(to_u32(Some(n), DEFAULT_CHAR_SIZE)),
            Some(_) | None => CharSize::Max,
        };
    }
    if kind.has_time_precision() {
        field.args = Some(FieldArgs {
            precision: to_u32(row.datetime_precision, DEFAULT_TIME_PRECISION),
            scale: 0,
        });
    }
    if kind == Kind::Decimal {
        field.args = Some(FieldArgs {
            precision: to_u32(row.numeric_precision, DEFAULT_PRECISION),
            scale: to_u32(row.numeric_scale, DEFAULT_SCALE),
        });
    }

    if let Some(raw) = &row.default {
        let sequence = row.auto_increment && raw.trim_start().starts_with("nextval(");
        if !sequence {
            field.default = typed_default(kind, normalize_default(raw));
        }
    }

    if let Some(ref_table) = &row.ref_table {
        let on_delete = match row.delete_rule.as_deref() {
            Some(rule) if rule.eq_ignore_ascii_case("cascade") => OnDelete::Cascade,
            _ => OnDelete::NoAction,
        };
        field.foreign = Some(ForeignKeyInfo {
            table: ref_table.clone(),
            to: row.ref_column.clone().unwrap_or_else(|| "id".to_string()),
            on_delete,
            constraint_name: row
                .constraint_name
                .clone()
                .unwrap_or_else(|| ForeignKeyInfo::constraint_name_for(table, &row.column_name)),
        });
    }

    Ok(field)
}

/// Build the current schema of `table` from introspection rows.
///
/// `previous` is the last known schema of the table. Linked fields, which
/// have no column, are carried forward from it, and so is anything the
/// column type cannot express: the `ID` kind over a varchar, JSON stored as
/// text and the created/updated-at markers.
pub fn inspect_table(
    db_type: DbType,
    table: &str,
    columns: &[ColumnRow],
    indexes: &[IndexRow],
    previous: Option<&FieldSchemas>,
) -> Result<FieldSchemas> {
    if db_type.is_document_store() {
        return Ok(previous.cloned().unwrap_or_default());
    }

    let mut fields = FieldSchemas::new();
    for row in columns {
        let field = inspect_column(db_type, table, row)?;
        fields.insert(field.name.clone(), field);
    }

    let fk_backing: Vec<String> = fields
        .values()
        .filter_map(|f| f.foreign.as_ref().map(|fk| fk.constraint_name.clone()))
        .collect();

    for row in indexes {
        let auto_increment = columns
            .iter()
            .any(|c| c.column_name == row.column_name && c.auto_increment);
        let field = match fields.get_mut(&row.column_name) {
            Some(field) => field,
            None => {
                log::debug!(
                    "Index '{}' on '{table}' references unknown column '{}'",
                    row.index_name,
                    row.column_name
                );
                continue;
            }
        };

        if row.is_primary {
            field.primary = Some(PrimaryKeyInfo {
                order: row.order,
                auto_increment,
            });
            continue;
        }
        if fk_backing.contains(&row.index_name) {
            continue;
        }
        field.index_info.push(IndexInfo {
            group: group_name(table, &row.index_name),
            order: row.order,
            sort: parse_sort(&row.sort),
            is_unique: row.is_unique,
            constraint_name: Some(row.index_name.clone()),
        });
    }

    if let Some(previous) = previous {
        carry_forward(db_type, &mut fields, previous);
    }

    log::debug!("Inspected '{table}': {} column(s)", fields.len());
    Ok(fields)
}

fn carry_forward(db_type: DbType, fields: &mut FieldSchemas, previous: &FieldSchemas) {
    for (name, prev) in previous {
        if !fields.contains_key(name) {
            if prev.is_linked() {
                fields.insert(name.clone(), prev.clone());
            }
            continue;
        }
        // A live column wins over a linked field of the same name.
        if prev.is_linked() {
            continue;
        }
        let field = match fields.get_mut(name) {
            Some(field) => field,
            None => continue,
        };
        field.is_created_at = prev.is_created_at;
        field.is_updated_at = prev.is_updated_at;

        let same_column = matches!(
            (column_type(db_type, "", field), column_type(db_type, "", prev)),
            (Ok(a), Ok(b)) if a == b
        );
        if same_column {
            field.kind = prev.kind;
            field.args = prev.args;
            field.size = prev.size;
        }
    }
}

/// Inspect every table of a database.
pub fn inspect_collection(
    db_type: DbType,
    tables: &IndexMap<String, TableRows>,
    previous: Option<&CollectionSchemas>,
) -> Result<CollectionSchemas> {
    let mut out = CollectionSchemas::new();
    for (table, rows) in tables {
        let prev = previous.and_then(|p| p.get(table));
        out.insert(
            table.clone(),
            inspect_table(db_type, table, &rows.columns, &rows.indexes, prev)?,
        );
    }
    Ok(out)
}
