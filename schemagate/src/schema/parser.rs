use super::directive::{Directive, FieldBuilder};
use super::types::*;
use crate::error::{Result, SchemaGateError};
use crate::value::{Document, Value};
use indexmap::IndexMap;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::collections::VecDeque;
use std::path::Path;

#[derive(Parser)]
#[grammar = "schema/sdl.pest"]
struct SdlParser;

/// A declared `type` before resolution.
#[derive(Debug)]
struct TypeDef {
    fields: Vec<FieldDef>,
}

#[derive(Debug)]
struct FieldDef {
    name: String,
    type_name: String,
    required: bool,
    is_list: bool,
    directives: Vec<(String, Vec<(String, Value)>)>,
}

/// Parse an SDL file and resolve `table` from it.
pub fn parse_table_sdl_file(table: &str, path: &Path) -> Result<CollectionSchemas> {
    let content = std::fs::read_to_string(path)?;
    parse_table_sdl(table, &content)
}

/// Parse the SDL of one table.
///
/// The result holds `table` itself followed by every declared type reachable
/// from it through embedded object fields.
pub fn parse_table_sdl(table: &str, sdl: &str) -> Result<CollectionSchemas> {
    let defs = parse_type_defs(table, sdl)?;

    if !defs.contains_key(table) {
        return Err(SchemaGateError::definition(
            table,
            format!("type '{table}' not found in schema definition"),
        ));
    }

    let mut out = CollectionSchemas::new();
    let mut queue = VecDeque::from([table.to_string()]);

    while let Some(type_name) = queue.pop_front() {
        if out.contains_key(&type_name) {
            continue;
        }
        let def = match defs.get(&type_name) {
            Some(def) => def,
            None => continue,
        };

        let mut fields = FieldSchemas::new();
        for field_def in &def.fields {
            let field = resolve_field(table, &type_name, field_def, &defs)?;
            if let Some(nested) = &field.nested {
                queue.push_back(nested.clone());
            }
            fields.insert(field.name.clone(), field);
        }
        out.insert(type_name, fields);
    }

    Ok(out)
}

fn resolve_field(
    table: &str,
    owner: &str,
    def: &FieldDef,
    defs: &IndexMap<String, TypeDef>,
) -> Result<FieldType> {
    let directives = def
        .directives
        .iter()
        .map(|(name, args)| Directive::parse(owner, &def.name, name, args.clone()))
        .collect::<Result<Vec<_>>>()?;

    let linked = directives.iter().any(|d| matches!(d, Directive::Link { .. }));
    let primitive = Kind::from_type_name(&def.type_name);

    let (kind, nested) = match primitive {
        Some(kind) => (kind, None),
        None if linked => (Kind::Object, None),
        None if defs.contains_key(&def.type_name) => (Kind::Object, Some(def.type_name.clone())),
        None => {
            return Err(SchemaGateError::definition(
                table,
                format!(
                    "field '{}' of type '{owner}' references undeclared type '{}'",
                    def.name, def.type_name
                ),
            ))
        }
    };

    let mut builder = FieldBuilder::new(owner, &def.name, &def.type_name, kind)
        .required(def.required)
        .list(def.is_list)
        .nested(nested);
    for directive in directives {
        builder.apply(directive);
    }
    builder.finish()
}

fn parse_type_defs(table: &str, sdl: &str) -> Result<IndexMap<String, TypeDef>> {
    let mut pairs = SdlParser::parse(Rule::document, sdl)
        .map_err(|e| SchemaGateError::definition(table, format!("syntax error: {e}")))?;

    let document = pairs
        .next()
        .ok_or_else(|| SchemaGateError::definition(table, "empty schema definition"))?;

    let mut defs = IndexMap::new();
    for type_def in document.into_inner().filter(|p| p.as_rule() == Rule::type_def) {
        let mut name = None;
        let mut fields = Vec::new();
        for part in type_def.into_inner() {
            match part.as_rule() {
                Rule::name => name = Some(part.as_str().to_string()),
                Rule::field_def => fields.push(build_field(table, part)?),
                _ => {}
            }
        }
        if let Some(name) = name {
            if defs.contains_key(&name) {
                return Err(SchemaGateError::definition(
                    table,
                    format!("type '{name}' is declared more than once"),
                ));
            }
            defs.insert(name, TypeDef { fields });
        }
    }
    Ok(defs)
}

fn build_field(table: &str, pair: Pair<Rule>) -> Result<FieldDef> {
    let mut field = FieldDef {
        name: String::new(),
        type_name: String::new(),
        required: false,
        is_list: false,
        directives: Vec::new(),
    };

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::name => field.name = part.as_str().to_string(),
            Rule::type_ref => resolve_type_ref(part, &mut field),
            Rule::directive => field.directives.push(build_directive(table, part)?),
            _ => {}
        }
    }
    Ok(field)
}

/// Any `!` marks the field required and any `[..]` marks it a list.
fn resolve_type_ref(pair: Pair<Rule>, field: &mut FieldDef) {
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::non_null => field.required = true,
            Rule::list_type => {
                field.is_list = true;
                for inner in part.into_inner() {
                    resolve_type_ref(inner, field);
                }
            }
            Rule::named_type => field.type_name = part.as_str().trim().to_string(),
            _ => {}
        }
    }
}

fn build_directive(table: &str, pair: Pair<Rule>) -> Result<(String, Vec<(String, Value)>)> {
    let mut name = String::new();
    let mut args = Vec::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::name => name = part.as_str().to_string(),
            Rule::arguments => {
                for argument in part.into_inner() {
                    let mut inner = argument.into_inner();
                    let (key, value) = match (inner.next(), inner.next()) {
                        (Some(key), Some(value)) => (key, value),
                        _ => {
                            return Err(SchemaGateError::definition(
                                table,
                                format!("malformed argument on @{name}"),
                            ))
                        }
                    };
                    args.push((key.as_str().to_string(), build_value(table, value)?));
                }
            }
            _ => {}
        }
    }
    Ok((name, args))
}

fn build_value(table: &str, pair: Pair<Rule>) -> Result<Value> {
    let malformed = |kind: &str, text: &str| {
        SchemaGateError::definition(table, format!("malformed {kind} literal '{text}'"))
    };

    let value = match pair.as_rule() {
        Rule::string => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            let unescaped: String = serde_json::from_str(&format!("\"{raw}\""))
                .map_err(|_| malformed("string", raw))?;
            Value::String(unescaped)
        }
        Rule::int => {
            let text = pair.as_str();
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| malformed("int", text))?
        }
        Rule::float => {
            let text = pair.as_str();
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| malformed("float", text))?
        }
        Rule::boolean => Value::Bool(pair.as_str() == "true"),
        Rule::null => Value::Null,
        Rule::enum_value => Value::String(pair.as_str().to_string()),
        Rule::list => Value::Array(
            pair.into_inner()
                .map(|item| build_value(table, item))
                .collect::<Result<Vec<_>>>()?,
        ),
        Rule::object => {
            let mut doc = Document::new();
            for field in pair.into_inner() {
                let mut inner = field.into_inner();
                if let (Some(key), Some(value)) = (inner.next(), inner.next()) {
                    doc.insert(key.as_str().to_string(), build_value(table, value)?);
                }
            }
            Value::Object(doc)
        }
        other => {
            return Err(SchemaGateError::definition(
                table,
                format!("unexpected token {other:?} in argument value"),
            ))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_table() {
        let schemas = parse_table_sdl(
            "user",
            "type user { id: ID! @primary age: Float text: String }",
        )
        .unwrap();
        let user = &schemas["user"];
        let names: Vec<&str> = user.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["id", "age", "text"]);

        let id = &user["id"];
        assert_eq!(id.kind, Kind::ID);
        assert!(id.required);
        assert_eq!(
            id.primary,
            Some(PrimaryKeyInfo {
                order: 1,
                auto_increment: false
            })
        );
        assert_eq!(id.size, CharSize::Limited(DEFAULT_CHAR_SIZE));

        let age = &user["age"];
        assert_eq!(age.kind, Kind::Float);
        assert!(!age.required);
        assert_eq!(
            age.args,
            Some(FieldArgs {
                precision: DEFAULT_PRECISION,
                scale: DEFAULT_SCALE
            })
        );
    }

    #[test]
    fn test_comments_commas_and_lists() {
        let sdl = r#"
            # users of the system
            type users {
                id: ID! @primary,
                tags: [String]!, # free-form labels
                created: DateTime @createdAt
            }
        "#;
        let schemas = parse_table_sdl("users", sdl).unwrap();
        let users = &schemas["users"];
        assert!(users["tags"].is_list);
        assert!(users["tags"].required);
        assert!(users["created"].is_created_at);
        assert_eq!(
            users["created"].args,
            Some(FieldArgs {
                precision: DEFAULT_TIME_PRECISION,
                scale: 0
            })
        );
    }

    #[test]
    fn test_aliases_resolve() {
        let schemas = parse_table_sdl(
            "t",
            "type t { id: ID! @primary status: Enum code: Varchar @size(value: 10) }",
        )
        .unwrap();
        assert_eq!(schemas["t"]["status"].kind, Kind::String);
        assert_eq!(schemas["t"]["code"].kind, Kind::VarChar);
        assert_eq!(schemas["t"]["code"].size, CharSize::Limited(10));
    }

    #[test]
    fn test_default_values() {
        let sdl = r#"type t {
            id: Integer! @primary(autoIncrement: true)
            role: String @default(value: "member")
            score: Float @default(value: 1.5)
            active: Boolean @default(value: true)
            meta: JSON @default(value: "{\"a\":1}")
        }"#;
        let schemas = parse_table_sdl("t", sdl).unwrap();
        let t = &schemas["t"];
        assert!(t["id"].is_auto_increment());
        assert_eq!(t["role"].default, Some(Value::from("member")));
        assert_eq!(t["score"].default, Some(Value::Float(1.5)));
        assert_eq!(t["active"].default, Some(Value::Bool(true)));
        assert_eq!(t["meta"].default, Some(Value::from("{\"a\":1}")));
    }

    #[test]
    fn test_nested_types_are_collected_cycle_safe() {
        let sdl = r#"
            type person { id: ID! @primary address: address }
            type address { street: String! owner: person }
            type unused { x: String }
        "#;
        let schemas = parse_table_sdl("person", sdl).unwrap();
        let names: Vec<&str> = schemas.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["person", "address"]);
        assert_eq!(schemas["person"]["address"].kind, Kind::Object);
        assert_eq!(schemas["person"]["address"].nested.as_deref(), Some("address"));
        assert_eq!(schemas["address"]["owner"].nested.as_deref(), Some("person"));
    }

    #[test]
    fn test_link_keeps_type_name() {
        let sdl = r#"type author {
            id: ID! @primary
            posts: [post] @link(table: "post", from: "id", to: "author_id")
            best: Integer @link(from: "id", to: "author_id", field: "score")
        }"#;
        let schemas = parse_table_sdl("author", sdl).unwrap();
        let posts = &schemas["author"]["posts"];
        assert_eq!(posts.kind, Kind::Object);
        assert!(posts.is_list);
        assert!(posts.nested.is_none());
        let link = posts.link.as_ref().unwrap();
        assert_eq!(link.table, "post");
        assert_eq!(link.type_name, "post");
        assert_eq!(schemas["author"]["best"].kind, Kind::Integer);
        assert_eq!(schemas.len(), 1);
    }

    #[test]
    fn test_composite_index_and_foreign() {
        let sdl = r#"type users {
            id: ID! @primary
            first_name: ID! @index(group: "n", order: 1, sort: "asc")
            last_name: ID! @index(group: "n", order: 2, sort: desc)
            org_id: ID @foreign(table: "orgs", field: "id", onDelete: "cascade")
        }"#;
        let schemas = parse_table_sdl("users", sdl).unwrap();
        let users = &schemas["users"];
        assert_eq!(users["last_name"].index_info[0].sort, SortOrder::Desc);
        assert_eq!(users["last_name"].index_info[0].order, 2);
        let fk = users["org_id"].foreign.as_ref().unwrap();
        assert_eq!(fk.table, "orgs");
        assert_eq!(fk.on_delete, OnDelete::Cascade);
        assert_eq!(fk.constraint_name, "c_users_org_id");
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_table_sdl("t", "type t { id: ID! @primary(").unwrap_err();
        assert!(matches!(err, SchemaGateError::Definition { .. }));
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_type_keyword_boundary() {
        assert!(parse_table_sdl("t", "typet { id: ID }").is_err());
    }

    #[test]
    fn test_unknown_directive() {
        let err = parse_table_sdl("t", "type t { id: ID! @primaryKey }").unwrap_err();
        assert!(err.to_string().contains("unknown directive '@primaryKey'"));
    }

    #[test]
    fn test_undeclared_type() {
        let err = parse_table_sdl("t", "type t { id: ID! owner: person }").unwrap_err();
        assert!(err.to_string().contains("undeclared type 'person'"));
    }

    #[test]
    fn test_table_not_found() {
        let err = parse_table_sdl("missing", "type t { id: ID! }").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_list_foreign_rejected() {
        assert!(parse_table_sdl("t", "type t { ids: [ID] @foreign(table: \"x\") }").is_err());
    }

    #[test]
    fn test_escaped_string_argument() {
        let schemas = parse_table_sdl(
            "t",
            r#"type t { note: String @default(value: "say \"hi\"\n") }"#,
        )
        .unwrap();
        assert_eq!(schemas["t"]["note"].default, Some(Value::from("say \"hi\"\n")));
    }
}
