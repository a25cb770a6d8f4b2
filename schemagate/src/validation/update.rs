use super::coerce::Coercer;
use crate::error::{Result, SchemaGateError};
use crate::schema::{CollectionSchemas, DbType, FieldSchemas, FieldType, Kind};
use crate::value::{Document, Value};
use serde::{Deserialize, Serialize};

/// Kind of update request being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    One,
    All,
    Upsert,
}

/// Where a (possibly dotted) key lands in the schema.
enum Target<'a> {
    Field(&'a FieldType),
    /// Path continues inside a JSON column; the value is opaque.
    Opaque,
}

struct UpdateValidator<'a> {
    table: &'a str,
    fields: &'a FieldSchemas,
    coercer: Coercer<'a>,
    db_type: DbType,
}

impl<'a> UpdateValidator<'a> {
    fn fail(&self, message: impl Into<String>) -> SchemaGateError {
        SchemaGateError::update(self.table, message)
    }

    fn top_level(&self, key: &str, op: &str) -> Result<&'a FieldType> {
        let top = key.split('.').next().unwrap_or(key);
        self.fields
            .get(top)
            .ok_or_else(|| self.fail(format!("{op}: field '{key}' is not present in schema")))
    }

    /// Walk a dotted path through embedded object types.
    fn resolve(&self, key: &str, op: &str) -> Result<Target<'a>> {
        let mut segments = key.split('.');
        let mut field = self.top_level(key, op)?;
        segments.next();

        for segment in segments {
            match (field.kind, field.nested.as_deref()) {
                (Kind::JSON, _) => return Ok(Target::Opaque),
                (Kind::Object, Some(nested)) => {
                    field = self
                        .coercer
                        .collection
                        .get(nested)
                        .and_then(|fields| fields.get(segment))
                        .ok_or_else(|| {
                            self.fail(format!("{op}: field '{key}' is not present in schema"))
                        })?;
                }
                _ => {
                    return Err(self.fail(format!(
                        "{op}: field '{key}' descends into {} which has no sub-fields",
                        field.kind
                    )))
                }
            }
        }
        Ok(Target::Field(field))
    }

    fn set(&self, payload: &Document) -> Result<Document> {
        let mut out = Document::new();
        for (key, value) in payload {
            let value = match self.resolve(key, "$set")? {
                Target::Opaque => value.clone(),
                Target::Field(field) if field.is_linked() => {
                    return Err(self.fail(format!("$set: linked field '{key}' cannot be written")))
                }
                Target::Field(field) => self.coercer.coerce(field, value)?,
            };
            out.insert(key.clone(), value);
        }
        for (name, field) in self.fields {
            if field.is_updated_at {
                out.insert(name.clone(), Value::now());
            }
        }
        Ok(out)
    }

    fn unset(&self, payload: &Document) -> Result<Document> {
        for key in payload.keys() {
            let top = key.split('.').next().unwrap_or(key);
            match (self.db_type.is_document_store(), self.fields.get(top)) {
                (true, Some(field)) if field.required => {
                    return Err(self.fail(format!(
                        "$unset: cannot remove required field '{key}'"
                    )))
                }
                (true, _) => {}
                (false, None) => {
                    return Err(self.fail(format!(
                        "$unset: field '{key}' is not present in schema"
                    )))
                }
                (false, Some(field)) if field.kind == Kind::JSON => {
                    return Err(self.fail(format!(
                        "$unset: cannot remove JSON field '{key}' on {}",
                        self.db_type
                    )))
                }
                (false, Some(_)) => {}
            }
        }
        Ok(payload.clone())
    }

    fn math(&self, op: &str, payload: &Document) -> Result<Document> {
        let mut out = Document::new();
        for (key, value) in payload {
            let field = match self.resolve(key, op)? {
                Target::Field(field) => field,
                Target::Opaque => {
                    out.insert(key.clone(), value.clone());
                    continue;
                }
            };
            let value = match (field.kind, value) {
                (kind, Value::Float(f)) if kind.is_integer() => Value::Int(f.trunc() as i64),
                (kind, Value::Int(_) | Value::Float(_)) if kind.is_integer() || kind.is_fractional() => {
                    value.clone()
                }
                (kind, Value::Int(_) | Value::Float(_)) => {
                    return Err(self.fail(format!(
                        "{op}: field '{key}' has kind {kind}, expected a numeric kind"
                    )))
                }
                (_, other) => {
                    return Err(self.fail(format!(
                        "{op}: value for '{key}' must be numeric, got {}",
                        other.shape()
                    )))
                }
            };
            out.insert(key.clone(), value);
        }
        Ok(out)
    }

    fn push(&self, payload: &Document) -> Result<Document> {
        let mut out = Document::new();
        for (key, value) in payload {
            let field = self.top_level(key, "$push")?;
            if !field.is_list {
                return Err(self.fail(format!("$push: field '{key}' is not a list")));
            }
            out.insert(key.clone(), self.coercer.coerce(field, value)?);
        }
        Ok(out)
    }

    fn current_date(&self, payload: &Document) -> Result<Document> {
        for key in payload.keys() {
            let field = self.top_level(key, "$currentDate")?;
            if !field.kind.is_timestamp() {
                return Err(self.fail(format!(
                    "$currentDate: field '{key}' has kind {}, expected DateTime",
                    field.kind
                )));
            }
        }
        Ok(payload.clone())
    }

    fn check_upsert(&self, update: &Document, find: &Document) -> Result<()> {
        let has_set = update.contains_key("$set");
        let supplied = |name: &str| {
            let in_doc = |doc: &Document| {
                doc.keys()
                    .any(|k| k.split('.').next().unwrap_or(k) == name)
            };
            in_doc(find)
                || update
                    .values()
                    .filter_map(Value::as_object)
                    .any(|payload| in_doc(payload))
        };

        for (name, field) in self.fields {
            let satisfiable = !field.required
                || field.is_linked()
                || field.default.is_some()
                || field.is_auto_increment()
                || (field.is_updated_at && has_set);
            if !satisfiable && !supplied(name) {
                return Err(self.fail(format!(
                    "upsert: required field '{name}' is missing from both find and update"
                )));
            }
        }
        Ok(())
    }
}

/// Validate an update request and return the rewritten update document.
///
/// `find` is only consulted for upserts, where every required field must be
/// obtainable from either the filter or the update.
pub fn validate_update(
    db_type: DbType,
    table: &str,
    collection: &CollectionSchemas,
    op: OperationKind,
    update: &Document,
    find: &Document,
) -> Result<Document> {
    let fields = match collection.get(table) {
        Some(fields) => fields,
        None => {
            log::warn!("No schema for '{table}', skipping update validation");
            return Ok(update.clone());
        }
    };
    if update.is_empty() {
        return Ok(update.clone());
    }

    let validator = UpdateValidator {
        table,
        fields,
        coercer: Coercer::new(table, collection, db_type),
        db_type,
    };

    let mut out = Document::new();
    for (operator, payload) in update {
        let payload = payload.as_object().ok_or_else(|| {
            validator.fail(format!(
                "payload of '{operator}' must be an object, got {}",
                payload.shape()
            ))
        })?;
        let rewritten = match operator.as_str() {
            "$set" => validator.set(payload)?,
            "$unset" => validator.unset(payload)?,
            "$inc" | "$min" | "$max" | "$mul" => validator.math(operator, payload)?,
            "$push" => validator.push(payload)?,
            "$currentDate" => validator.current_date(payload)?,
            other => {
                return Err(validator.fail(format!("unsupported update operator '{other}'")))
            }
        };
        out.insert(operator.clone(), Value::Object(rewritten));
    }

    if op == OperationKind::Upsert {
        validator.check_upsert(&out, find)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_table_sdl;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Value::document_from_json(json).unwrap()
    }

    fn schema() -> CollectionSchemas {
        parse_table_sdl(
            "people",
            r#"
            type people {
                id: ID! @primary
                name: String!
                age: Integer!
                score: Float
                tags: [String]
                prefs: JSON
                home: address
                seen: DateTime
                updated: DateTime @updatedAt
            }
            type address { city: String }
            "#,
        )
        .unwrap()
    }

    fn run(db: DbType, op: OperationKind, update: serde_json::Value) -> Result<Document> {
        validate_update(db, "people", &schema(), op, &doc(update), &Document::new())
    }

    #[test]
    fn test_set_coerces_and_refreshes_updated_at() {
        let out = run(
            DbType::Postgres,
            OperationKind::One,
            json!({"$set": {"age": 4.7, "home.city": "Oslo", "prefs.theme": "dark"}}),
        )
        .unwrap();
        let set = out["$set"].as_object().unwrap();
        assert_eq!(set["age"], Value::Int(4));
        assert_eq!(set["home.city"], Value::from("Oslo"));
        assert_eq!(set["prefs.theme"], Value::from("dark"));
        assert!(set["updated"].as_datetime().is_some());
    }

    #[test]
    fn test_set_unknown_field() {
        let err = run(DbType::Mongo, OperationKind::One, json!({"$set": {"nope": 1}})).unwrap_err();
        assert!(err.to_string().contains("'nope' is not present"));
    }

    #[test]
    fn test_math_on_string_fails() {
        for op in ["$inc", "$min", "$max", "$mul"] {
            let err = run(DbType::Postgres, OperationKind::All, json!({op: {"name": 1}})).unwrap_err();
            assert!(matches!(err, SchemaGateError::UpdateOperation { .. }), "{op}");
        }
    }

    #[test]
    fn test_math_truncates_for_integers() {
        let out = run(
            DbType::Postgres,
            OperationKind::One,
            json!({"$inc": {"age": 1.9, "score": 0.5}}),
        )
        .unwrap();
        let inc = out["$inc"].as_object().unwrap();
        assert_eq!(inc["age"], Value::Int(1));
        assert_eq!(inc["score"], Value::Float(0.5));
        assert!(run(DbType::Postgres, OperationKind::One, json!({"$inc": {"age": "1"}})).is_err());
    }

    #[test]
    fn test_unset_asymmetry() {
        let required = json!({"$unset": {"name": ""}});
        assert!(run(DbType::Mongo, OperationKind::One, required.clone()).is_err());
        assert!(run(DbType::Postgres, OperationKind::One, required).is_ok());

        let json_field = json!({"$unset": {"prefs": ""}});
        assert!(run(DbType::Mongo, OperationKind::One, json_field.clone()).is_ok());
        assert!(run(DbType::MySQL, OperationKind::One, json_field).is_err());

        let unknown = json!({"$unset": {"ghost": ""}});
        assert!(run(DbType::Mongo, OperationKind::One, unknown.clone()).is_ok());
        assert!(run(DbType::SQLServer, OperationKind::One, unknown).is_err());
    }

    #[test]
    fn test_unset_does_not_skip_later_operators() {
        let err = run(
            DbType::Postgres,
            OperationKind::One,
            json!({"$unset": {"score": ""}, "$inc": {"name": 1}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("$inc"));
    }

    #[test]
    fn test_push_requires_list() {
        assert!(run(DbType::Mongo, OperationKind::One, json!({"$push": {"tags": "a"}})).is_ok());
        assert!(run(DbType::Mongo, OperationKind::One, json!({"$push": {"tags": 3}})).is_err());
        assert!(run(DbType::Mongo, OperationKind::One, json!({"$push": {"name": "a"}})).is_err());
    }

    #[test]
    fn test_current_date() {
        assert!(run(DbType::Mongo, OperationKind::One, json!({"$currentDate": {"seen": true}})).is_ok());
        assert!(run(DbType::Mongo, OperationKind::One, json!({"$currentDate": {"age": true}})).is_err());
    }

    #[test]
    fn test_unsupported_operator_and_bad_payload() {
        let err = run(DbType::Mongo, OperationKind::One, json!({"$rename": {"a": "b"}})).unwrap_err();
        assert!(err.to_string().contains("unsupported update operator '$rename'"));
        let err = run(DbType::Mongo, OperationKind::One, json!({"$set": 5})).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn test_empty_update_accepted() {
        assert_eq!(run(DbType::Mongo, OperationKind::Upsert, json!({})).unwrap(), Document::new());
    }

    #[test]
    fn test_upsert_missing_required_field() {
        let err = validate_update(
            DbType::Postgres,
            "people",
            &schema(),
            OperationKind::Upsert,
            &doc(json!({"$set": {"name": "x"}})),
            &doc(json!({"id": "2"})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'age'"));
    }

    #[test]
    fn test_upsert_satisfied_from_find_and_update() {
        let out = validate_update(
            DbType::Postgres,
            "people",
            &schema(),
            OperationKind::Upsert,
            &doc(json!({"$set": {"name": "x"}, "$inc": {"age": 1}})),
            &doc(json!({"id": "2"})),
        );
        assert!(out.is_ok());
    }

    #[test]
    fn test_schemaless_table_passes_through() {
        let update = doc(json!({"$weird": 1}));
        let out = validate_update(
            DbType::Mongo,
            "elsewhere",
            &schema(),
            OperationKind::One,
            &update,
            &Document::new(),
        )
        .unwrap();
        assert_eq!(out, update);
    }
}
