use crate::error::{Result, SchemaGateError, ValidationReason};
use crate::schema::{CollectionSchemas, DbType, FieldSchemas, FieldType, Kind};
use crate::value::{parse_rfc3339, Document, Value};
use chrono::{TimeZone, Utc};

/// Converts values supplied by callers into the canonical shape for a field.
///
/// Holds the collection so embedded objects can be resolved by type name.
pub struct Coercer<'a> {
    pub table: &'a str,
    pub collection: &'a CollectionSchemas,
    pub db_type: DbType,
}

impl<'a> Coercer<'a> {
    pub fn new(table: &'a str, collection: &'a CollectionSchemas, db_type: DbType) -> Self {
        Coercer {
            table,
            collection,
            db_type,
        }
    }

    fn fail(&self, field: &FieldType, reason: ValidationReason) -> SchemaGateError {
        SchemaGateError::validation(self.table, &field.name, reason)
    }

    fn mismatch(&self, field: &FieldType, value: &Value) -> SchemaGateError {
        self.fail(
            field,
            ValidationReason::TypeMismatch {
                expected: field.kind,
                got: value.shape(),
            },
        )
    }

    fn from_millis(&self, field: &FieldType, millis: i64) -> Result<Value> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Value::DateTime)
            .ok_or_else(|| self.fail(field, ValidationReason::MalformedDateTime(millis.to_string())))
    }

    /// Coerce one supplied value for `field`.
    pub fn coerce(&self, field: &FieldType, value: &Value) -> Result<Value> {
        let kind = field.kind;
        match value {
            Value::Int(i) => match kind {
                Kind::DateTime | Kind::DateTimeWithZone => self.from_millis(field, *i),
                Kind::Integer | Kind::SmallInteger | Kind::BigInteger => Ok(Value::Int(*i)),
                Kind::Float | Kind::Decimal => Ok(Value::Float(*i as f64)),
                _ => Err(self.mismatch(field, value)),
            },
            Value::String(s) => match kind {
                Kind::DateTime | Kind::DateTimeWithZone => parse_rfc3339(s)
                    .map(Value::DateTime)
                    .ok_or_else(|| self.fail(field, ValidationReason::MalformedDateTime(s.clone()))),
                Kind::ID
                | Kind::String
                | Kind::VarChar
                | Kind::Char
                | Kind::Time
                | Kind::Date
                | Kind::UUID => Ok(Value::String(s.clone())),
                _ => Err(self.mismatch(field, value)),
            },
            Value::Float(f) => match kind {
                Kind::DateTime | Kind::DateTimeWithZone => self.from_millis(field, *f as i64),
                Kind::Float | Kind::Decimal => Ok(Value::Float(*f)),
                Kind::Integer | Kind::SmallInteger | Kind::BigInteger => Ok(Value::Int(f.trunc() as i64)),
                _ => Err(self.mismatch(field, value)),
            },
            Value::Bool(b) => match kind {
                Kind::Boolean => Ok(Value::Bool(*b)),
                _ => Err(self.mismatch(field, value)),
            },
            Value::DateTime(_) | Value::NativeDate(_) => Ok(value.clone()),
            Value::Object(doc) => match kind {
                Kind::JSON if self.db_type.is_document_store() => Ok(value.clone()),
                Kind::JSON => {
                    let json = serde_json::Value::from(Value::Object(doc.clone()));
                    Ok(Value::String(serde_json::to_string(&json)?))
                }
                Kind::Object => {
                    let nested = field
                        .nested
                        .as_deref()
                        .and_then(|name| self.collection.get(name))
                        .ok_or_else(|| self.fail(field, ValidationReason::UnknownNestedType))?;
                    Ok(Value::Object(self.validate_fields(nested, doc)?))
                }
                _ => Err(self.mismatch(field, value)),
            },
            Value::Array(items) => {
                if !field.is_list {
                    return Err(self.fail(field, ValidationReason::UnexpectedList));
                }
                items
                    .iter()
                    .map(|item| self.coerce(field, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            Value::Null | Value::Bytes(_) => {
                if field.required {
                    Err(self.mismatch(field, value))
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    /// Build a validated copy of `doc` following `fields`.
    pub fn validate_fields(&self, fields: &FieldSchemas, doc: &Document) -> Result<Document> {
        if let Some(unknown) = doc.keys().find(|k| !fields.contains_key(k.as_str())) {
            return Err(SchemaGateError::validation(
                self.table,
                unknown,
                ValidationReason::UnknownField,
            ));
        }

        let mut out = Document::new();
        for (name, field) in fields {
            let supplied = doc.get(name);

            if field.is_linked() {
                if supplied.is_some() {
                    return Err(self.fail(field, ValidationReason::LinkedField));
                }
                continue;
            }

            if field.is_auto_increment() {
                continue;
            }

            let defaulted;
            let supplied = match (supplied, &field.default) {
                (None, Some(default)) => {
                    defaulted = self.default_value(field, default)?;
                    Some(&defaulted)
                }
                (supplied, _) => supplied,
            };

            if field.is_created_at || field.is_updated_at {
                out.insert(name.clone(), Value::now());
                continue;
            }

            let value = match supplied {
                Some(value) => self.coerce(field, value)?,
                None if field.required && field.kind == Kind::ID => {
                    Value::String(ulid::Ulid::new().to_string().to_lowercase())
                }
                None if field.required => {
                    return Err(self.fail(field, ValidationReason::MissingField))
                }
                None => Value::Null,
            };
            out.insert(name.clone(), value);
        }
        Ok(out)
    }

    /// JSON defaults are declared as string literals; unmarshal them first.
    fn default_value(&self, field: &FieldType, default: &Value) -> Result<Value> {
        match (field.kind, default) {
            (Kind::JSON, Value::String(s)) => serde_json::from_str::<serde_json::Value>(s)
                .map(Value::from)
                .map_err(|_| self.fail(field, ValidationReason::BadJsonDefault)),
            _ => Ok(default.clone()),
        }
    }
}
