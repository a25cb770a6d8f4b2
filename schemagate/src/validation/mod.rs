pub mod coerce;
pub mod update;

pub use coerce::Coercer;
pub use update::{validate_update, OperationKind};

use crate::error::{Result, SchemaGateError, ValidationReason};
use crate::schema::{CollectionSchemas, DbType, Kind, SchemaSnapshot};
use crate::value::{Document, Value};

/// Validate a document to be written into `table`.
///
/// Returns a freshly built document: defaults applied, timestamps stamped,
/// missing required ids generated and every value coerced to its field's
/// kind. The input is left untouched.
pub fn validate_document(
    db_type: DbType,
    table: &str,
    collection: &CollectionSchemas,
    doc: &Document,
) -> Result<Document> {
    let fields = collection.get(table).ok_or_else(|| {
        SchemaGateError::definition(table, format!("table '{table}' not found in schema"))
    })?;
    Coercer::new(table, collection, db_type).validate_fields(fields, doc)
}

/// Validate the payload of a create request: one document or an array of
/// documents.
///
/// Tables without a schema accept documents as-is.
pub fn validate_create(
    snapshot: &SchemaSnapshot,
    db_alias: &str,
    table: &str,
    docs: &Value,
) -> Result<Value> {
    let (collection, db_type) = match (snapshot.collection(db_alias), snapshot.db_type(db_alias)) {
        (Some(collection), Some(db_type)) => (collection, db_type),
        _ => {
            return Err(SchemaGateError::Config(format!(
                "unknown database alias '{db_alias}'"
            )))
        }
    };

    if !collection.contains_key(table) {
        log::warn!("No schema for '{db_alias}.{table}', skipping validation");
        return Ok(docs.clone());
    }

    let validate_one = |value: &Value| -> Result<Value> {
        match value {
            Value::Object(doc) => {
                validate_document(db_type, table, collection, doc).map(Value::Object)
            }
            other => Err(SchemaGateError::validation(
                table,
                "",
                ValidationReason::TypeMismatch {
                    expected: Kind::Object,
                    got: other.shape(),
                },
            )),
        }
    };

    match docs {
        Value::Array(items) => items
            .iter()
            .map(validate_one)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        single => validate_one(single),
    }
}
