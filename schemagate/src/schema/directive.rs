use super::types::*;
use crate::error::{Result, SchemaGateError};
use crate::value::Value;

/// A field directive after argument checking.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Primary { auto_increment: bool, order: u32 },
    Foreign {
        table: Option<String>,
        to: Option<String>,
        on_delete: OnDelete,
    },
    Unique(IndexSpec),
    Index(IndexSpec),
    Default(Value),
    CreatedAt,
    UpdatedAt,
    Args {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Size(CharSize),
    Link {
        table: Option<String>,
        from: String,
        to: String,
        field: Option<String>,
        db: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub group: Option<String>,
    pub order: u32,
    pub sort: SortOrder,
}

/// Arguments of one directive occurrence, consumed key by key.
struct Arguments<'a> {
    table: &'a str,
    field: &'a str,
    directive: &'a str,
    args: Vec<(String, Value)>,
}

impl<'a> Arguments<'a> {
    fn error(&self, message: impl std::fmt::Display) -> SchemaGateError {
        SchemaGateError::definition(
            self.table,
            format!("@{} on field '{}': {message}", self.directive, self.field),
        )
    }

    fn take(&mut self, keys: &[&str]) -> Option<(String, Value)> {
        let pos = self.args.iter().position(|(k, _)| keys.contains(&k.as_str()))?;
        Some(self.args.remove(pos))
    }

    fn string(&mut self, keys: &[&str]) -> Result<Option<String>> {
        match self.take(keys) {
            None => Ok(None),
            Some((_, Value::String(s))) => Ok(Some(s)),
            Some((key, other)) => Err(self.error(format!(
                "argument '{key}' must be a string, got {}",
                other.shape()
            ))),
        }
    }

    fn bool(&mut self, key: &str) -> Result<Option<bool>> {
        match self.take(&[key]) {
            None => Ok(None),
            Some((_, Value::Bool(b))) => Ok(Some(b)),
            Some((key, other)) => Err(self.error(format!(
                "argument '{key}' must be a boolean, got {}",
                other.shape()
            ))),
        }
    }

    fn uint(&mut self, key: &str) -> Result<Option<u32>> {
        match self.take(&[key]) {
            None => Ok(None),
            Some((key, Value::Int(i))) => u32::try_from(i)
                .map(Some)
                .map_err(|_| self.error(format!("argument '{key}' must not be negative"))),
            Some((key, other)) => Err(self.error(format!(
                "argument '{key}' must be an integer, got {}",
                other.shape()
            ))),
        }
    }

    fn order(&mut self) -> Result<u32> {
        match self.uint("order")? {
            None => Ok(DEFAULT_INDEX_ORDER),
            Some(0) => Err(self.error("order must start from 1")),
            Some(n) => Ok(n),
        }
    }

    fn sort(&mut self) -> Result<SortOrder> {
        match self.string(&["sort"])?.as_deref() {
            None | Some("asc") => Ok(SortOrder::Asc),
            Some("desc") => Ok(SortOrder::Desc),
            Some(other) => Err(self.error(format!(
                "sort must be either 'asc' or 'desc', got '{other}'"
            ))),
        }
    }

    fn finish(self) -> Result<()> {
        match self.args.first() {
            Some((key, _)) => Err(self.error(format!("unknown argument '{key}'"))),
            None => Ok(()),
        }
    }
}

impl Directive {
    /// Check the arguments of `@name(...)` found on `table.field`.
    pub fn parse(table: &str, field: &str, name: &str, args: Vec<(String, Value)>) -> Result<Directive> {
        let mut a = Arguments {
            table,
            field,
            directive: name,
            args,
        };

        let directive = match name {
            "primary" => {
                let auto_increment = a.bool("autoIncrement")?.unwrap_or(false);
                let order = match a.uint("order")? {
                    None => DEFAULT_INDEX_ORDER,
                    Some(0) => return Err(a.error("primary key order must start from 1")),
                    Some(n) => n,
                };
                Directive::Primary {
                    auto_increment,
                    order,
                }
            }
            "foreign" => {
                let table = a.string(&["table"])?;
                let to = a.string(&["field", "to"])?;
                let on_delete = match a.string(&["onDelete"])? {
                    Some(rule) if rule.eq_ignore_ascii_case("cascade") => OnDelete::Cascade,
                    _ => OnDelete::NoAction,
                };
                Directive::Foreign {
                    table,
                    to,
                    on_delete,
                }
            }
            "unique" | "index" => {
                let spec = IndexSpec {
                    group: a.string(&["group", "name"])?,
                    order: a.order()?,
                    sort: a.sort()?,
                };
                if name == "unique" {
                    Directive::Unique(spec)
                } else {
                    Directive::Index(spec)
                }
            }
            "default" => match a.take(&["value"]) {
                Some((_, value)) => Directive::Default(value),
                None => return Err(a.error("missing argument 'value'")),
            },
            "createdAt" => Directive::CreatedAt,
            "updatedAt" => Directive::UpdatedAt,
            "args" => Directive::Args {
                precision: a.uint("precision")?,
                scale: a.uint("scale")?,
            },
            "size" => match a.take(&["value"]) {
                Some((_, Value::Int(n))) if n > 0 => {
                    Directive::Size(CharSize::Limited(u32::try_from(n).unwrap_or(u32::MAX)))
                }
                Some((_, Value::String(s))) if s.eq_ignore_ascii_case("max") => {
                    Directive::Size(CharSize::Max)
                }
                Some((_, other)) => {
                    return Err(a.error(format!(
                        "size must be a positive integer or \"max\", got {}",
                        other.shape()
                    )))
                }
                None => return Err(a.error("missing argument 'value'")),
            },
            "link" => {
                let table = a.string(&["table"])?;
                let from = a.string(&["from"])?;
                let to = a.string(&["to"])?;
                let field = a.string(&["field"])?;
                let db = a.string(&["db"])?;
                match (from, to) {
                    (Some(from), Some(to)) => Directive::Link {
                        table,
                        from,
                        to,
                        field,
                        db,
                    },
                    _ => return Err(a.error("both 'from' and 'to' are required")),
                }
            }
            other => {
                return Err(SchemaGateError::definition(
                    table,
                    format!("unknown directive '@{other}' on field '{field}'"),
                ))
            }
        };

        a.finish()?;
        Ok(directive)
    }
}

/// Accumulates directives for one field, then checks the combination.
pub struct FieldBuilder {
    table: String,
    type_name: String,
    field: FieldType,
    sized: bool,
}

impl FieldBuilder {
    pub fn new(table: &str, name: &str, type_name: &str, kind: Kind) -> Self {
        FieldBuilder {
            table: table.to_string(),
            type_name: type_name.to_string(),
            field: FieldType::new(name, kind),
            sized: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.field.required = required;
        self
    }

    pub fn list(mut self, is_list: bool) -> Self {
        self.field.is_list = is_list;
        self
    }

    pub fn nested(mut self, type_name: Option<String>) -> Self {
        self.field.nested = type_name;
        self
    }

    pub fn apply(&mut self, directive: Directive) {
        let field = &mut self.field;
        match directive {
            Directive::Primary {
                auto_increment,
                order,
            } => {
                field.primary = Some(PrimaryKeyInfo {
                    order,
                    auto_increment,
                });
            }
            Directive::Foreign {
                table,
                to,
                on_delete,
            } => {
                let target = table.unwrap_or_else(|| {
                    field
                        .name
                        .split('_')
                        .next()
                        .unwrap_or(&field.name)
                        .to_string()
                });
                field.foreign = Some(ForeignKeyInfo {
                    table: target,
                    to: to.unwrap_or_else(|| "id".to_string()),
                    on_delete,
                    constraint_name: ForeignKeyInfo::constraint_name_for(&self.table, &field.name),
                });
            }
            Directive::Unique(spec) => push_index(field, spec, true),
            Directive::Index(spec) => push_index(field, spec, false),
            Directive::Default(value) => field.default = Some(value),
            Directive::CreatedAt => field.is_created_at = true,
            Directive::UpdatedAt => field.is_updated_at = true,
            Directive::Args { precision, scale } => {
                let mut args = field.args.unwrap_or(FieldArgs {
                    precision: DEFAULT_PRECISION,
                    scale: 0,
                });
                if let Some(p) = precision {
                    args.precision = p;
                }
                if let Some(s) = scale {
                    args.scale = s;
                }
                field.args = Some(args);
            }
            Directive::Size(size) => {
                field.size = size;
                self.sized = true;
            }
            Directive::Link {
                table,
                from,
                to,
                field: linked_field,
                db,
            } => {
                field.link = Some(LinkInfo {
                    table: table.unwrap_or_else(|| self.type_name.clone()),
                    from,
                    to,
                    field: linked_field,
                    db,
                    type_name: self.type_name.clone(),
                });
            }
        }
    }

    pub fn finish(self) -> Result<FieldType> {
        let field = self.field;
        let fail = |message: String| Err(SchemaGateError::definition(&self.table, message));

        if field.is_list && field.is_primary() {
            return fail(format!("field '{}': a list cannot be a primary key", field.name));
        }
        if field.is_list && field.foreign.is_some() {
            return fail(format!("field '{}': a list cannot be a foreign key", field.name));
        }
        if field.is_auto_increment() && !field.kind.is_integer() {
            return fail(format!(
                "field '{}': auto increment is only supported on integer kinds, got {}",
                field.name, field.kind
            ));
        }
        if self.sized && !field.kind.is_sized() {
            return fail(format!(
                "field '{}': @size only applies to ID, VarChar and Char, got {}",
                field.name, field.kind
            ));
        }
        Ok(field)
    }
}

fn push_index(field: &mut FieldType, spec: IndexSpec, is_unique: bool) {
    field.index_info.push(IndexInfo {
        group: spec.group.unwrap_or_else(|| field.name.clone()),
        order: spec.order,
        sort: spec.sort,
        is_unique,
        constraint_name: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_unknown_argument_is_rejected() {
        let err = Directive::parse("users", "id", "primary", args(&[("autoincrement", Value::Bool(true))]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown argument 'autoincrement'"));
    }

    #[test]
    fn test_wrong_argument_type() {
        let err = Directive::parse("users", "id", "primary", args(&[("order", Value::from("1"))]))
            .unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[test]
    fn test_primary_order_zero() {
        assert!(Directive::parse("users", "id", "primary", args(&[("order", Value::Int(0))])).is_err());
    }

    #[test]
    fn test_foreign_defaults_from_field_name() {
        let d = Directive::parse("posts", "author_id", "foreign", Vec::new()).unwrap();
        let mut b = FieldBuilder::new("posts", "author_id", "ID", Kind::ID);
        b.apply(d);
        let field = b.finish().unwrap();
        assert_eq!(
            field.foreign,
            Some(ForeignKeyInfo {
                table: "author".into(),
                to: "id".into(),
                on_delete: OnDelete::NoAction,
                constraint_name: "c_posts_author_id".into(),
            })
        );
    }

    #[test]
    fn test_on_delete_cascade() {
        let d = Directive::parse(
            "posts",
            "owner",
            "foreign",
            args(&[("table", Value::from("users")), ("onDelete", Value::from("cascade"))]),
        )
        .unwrap();
        assert_eq!(
            d,
            Directive::Foreign {
                table: Some("users".into()),
                to: None,
                on_delete: OnDelete::Cascade
            }
        );
    }

    #[test]
    fn test_index_defaults() {
        let d = Directive::parse("users", "email", "unique", Vec::new()).unwrap();
        let mut b = FieldBuilder::new("users", "email", "String", Kind::String);
        b.apply(d);
        let field = b.finish().unwrap();
        assert_eq!(
            field.index_info,
            vec![IndexInfo {
                group: "email".into(),
                order: 1,
                sort: SortOrder::Asc,
                is_unique: true,
                constraint_name: None,
            }]
        );
    }

    #[test]
    fn test_bad_sort() {
        let err = Directive::parse("users", "email", "index", args(&[("sort", Value::from("up"))]))
            .unwrap_err();
        assert!(err.to_string().contains("'asc' or 'desc'"));
    }

    #[test]
    fn test_default_requires_value() {
        assert!(Directive::parse("users", "role", "default", Vec::new()).is_err());
    }

    #[test]
    fn test_link_requires_from_and_to() {
        let err = Directive::parse("users", "posts", "link", args(&[("from", Value::from("id"))]))
            .unwrap_err();
        assert!(err.to_string().contains("'from' and 'to'"));
    }

    #[test]
    fn test_list_primary_rejected() {
        let mut b = FieldBuilder::new("users", "ids", "ID", Kind::ID).list(true);
        b.apply(Directive::Primary {
            auto_increment: false,
            order: 1,
        });
        assert!(b.finish().is_err());
    }

    #[test]
    fn test_args_override_defaults() {
        let mut b = FieldBuilder::new("items", "price", "Decimal", Kind::Decimal);
        b.apply(Directive::Args {
            precision: Some(12),
            scale: None,
        });
        let field = b.finish().unwrap();
        assert_eq!(
            field.args,
            Some(FieldArgs {
                precision: 12,
                scale: DEFAULT_SCALE
            })
        );
    }

    #[test]
    fn test_size_on_integer_rejected() {
        let mut b = FieldBuilder::new("items", "qty", "Integer", Kind::Integer);
        b.apply(Directive::Size(CharSize::Max));
        assert!(b.finish().is_err());
    }

    #[test]
    fn test_default_size_on_integer_rejected() {
        let mut b = FieldBuilder::new("items", "qty", "Integer", Kind::Integer);
        b.apply(Directive::Size(CharSize::Limited(DEFAULT_CHAR_SIZE)));
        let err = b.finish().unwrap_err();
        assert!(err.to_string().contains("@size only applies"), "{err}");

        let mut b = FieldBuilder::new("items", "code", "VarChar", Kind::VarChar);
        b.apply(Directive::Size(CharSize::Limited(DEFAULT_CHAR_SIZE)));
        assert_eq!(b.finish().unwrap().size, CharSize::Limited(DEFAULT_CHAR_SIZE));
    }
}
