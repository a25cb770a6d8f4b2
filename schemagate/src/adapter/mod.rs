//! Per-backend value adjustments around CRUD dispatch.
//!
//! Filters are rewritten before they reach a driver, and rows read back from
//! document stores are normalized into the canonical shapes the rest of the
//! gateway expects.

use crate::error::{Result, SchemaGateError, ValidationReason};
use crate::schema::{DbType, FieldSchemas, FieldType, Kind};
use crate::value::{format_rfc3339, parse_rfc3339, Document, Value};

const LOGICAL_OPERATORS: [&str; 3] = ["$or", "$and", "$nor"];

/// Rewrite a filter so its literals match what `db_type` stores.
///
/// SQL Server has no boolean literal, so booleans become 1/0. Document
/// stores compare times as native dates, so time literals on timestamp
/// fields are parsed and converted.
pub fn adjust_where_clause(
    db_type: DbType,
    table: &str,
    fields: &FieldSchemas,
    filter: &Document,
) -> Result<Document> {
    let mut out = Document::new();
    for (key, value) in filter {
        let adjusted = match (fields.get(key), value) {
            (None, Value::Array(clauses)) if LOGICAL_OPERATORS.contains(&key.as_str()) => {
                let clauses = clauses
                    .iter()
                    .map(|clause| match clause {
                        Value::Object(inner) => {
                            adjust_where_clause(db_type, table, fields, inner).map(Value::Object)
                        }
                        other => Ok(other.clone()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Value::Array(clauses)
            }
            (None, _) => value.clone(),
            (Some(field), _) => adjust_value(db_type, table, field, value)?,
        };
        out.insert(key.clone(), adjusted);
    }
    Ok(out)
}

fn adjust_value(db_type: DbType, table: &str, field: &FieldType, value: &Value) -> Result<Value> {
    match (db_type, field.kind) {
        (DbType::SQLServer, Kind::Boolean) => bool_to_bit(table, field, value),
        (db, kind) if db.is_document_store() && kind.is_timestamp() => {
            to_native_date(table, field, value)
        }
        _ => Ok(value.clone()),
    }
}

fn bool_to_bit(table: &str, field: &FieldType, value: &Value) -> Result<Value> {
    let wrong_type = |other: &Value| {
        SchemaGateError::validation(
            table,
            &field.name,
            ValidationReason::TypeMismatch {
                expected: Kind::Boolean,
                got: other.shape(),
            },
        )
    };
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Object(ops) => ops
            .iter()
            .map(|(op, operand)| {
                let operand = match operand {
                    Value::Bool(b) => Value::Int(i64::from(*b)),
                    Value::Array(_) => operand.clone(),
                    other => return Err(wrong_type(other)),
                };
                Ok((op.clone(), operand))
            })
            .collect::<Result<Document>>()
            .map(Value::Object),
        other => Err(wrong_type(other)),
    }
}

fn to_native_date(table: &str, field: &FieldType, value: &Value) -> Result<Value> {
    match value {
        Value::String(s) => parse_rfc3339(s)
            .map(|t| Value::NativeDate(t.timestamp_millis()))
            .ok_or_else(|| {
                SchemaGateError::validation(
                    table,
                    &field.name,
                    ValidationReason::MalformedDateTime(s.clone()),
                )
            }),
        Value::DateTime(t) => Ok(Value::NativeDate(t.timestamp_millis())),
        Value::NativeDate(_) => Ok(value.clone()),
        Value::Array(items) => items
            .iter()
            .map(|item| to_native_date(table, field, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(ops) => ops
            .iter()
            .map(|(op, operand)| Ok((op.clone(), to_native_date(table, field, operand)?)))
            .collect::<Result<Document>>()
            .map(Value::Object),
        other => Err(SchemaGateError::validation(
            table,
            &field.name,
            ValidationReason::TypeMismatch {
                expected: field.kind,
                got: other.shape(),
            },
        )),
    }
}

/// Normalize rows read from a document store.
///
/// Relational backends already return canonical shapes and are left as is.
pub fn crud_post_process(
    db_type: DbType,
    table: &str,
    fields: &FieldSchemas,
    rows: &mut [Document],
) -> Result<()> {
    if !db_type.is_document_store() {
        return Ok(());
    }

    for row in rows.iter_mut() {
        for (name, field) in fields {
            let value = match row.get_mut(name) {
                Some(value) => value,
                None => continue,
            };
            let replacement = match (field.kind, &*value) {
                (Kind::JSON, Value::Bytes(bytes)) => Some(parse_stored_json(table, name, bytes)?),
                (Kind::JSON, Value::String(s)) => Some(parse_stored_json(table, name, s.as_bytes())?),
                (Kind::Boolean, Value::Int(i)) => Some(Value::Bool(*i != 0)),
                (kind, stored) if kind.is_timestamp() => stored
                    .as_datetime()
                    .map(|t| Value::String(format_rfc3339(&t))),
                _ => None,
            };
            if let Some(replacement) = replacement {
                *value = replacement;
            }
        }
    }
    Ok(())
}

fn parse_stored_json(table: &str, field: &str, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .map(Value::from)
        .map_err(|_| SchemaGateError::validation(table, field, ValidationReason::CorruptedJson))
}
