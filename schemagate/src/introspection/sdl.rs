use crate::schema::{default_args, CharSize, FieldSchemas, FieldType, Kind, OnDelete, SortOrder, DEFAULT_INDEX_ORDER};
use crate::value::{format_rfc3339, Value};

/// Render the fields of `table` as an SDL type definition the parser
/// accepts.
///
/// Fields are grouped: primary keys, plain columns, indexed columns,
/// foreign keys, then linked fields.
pub fn generate_sdl(table: &str, fields: &FieldSchemas) -> String {
    let mut ordered: Vec<&FieldType> = fields.values().collect();
    ordered.sort_by_key(|f| (rank(f), f.primary.map(|p| p.order).unwrap_or(0)));

    let mut out = format!("type {table} {{\n");
    for field in ordered {
        out.push_str("  ");
        out.push_str(&render_field(field));
        out.push('\n');
    }
    out.push('}');
    out
}

fn rank(field: &FieldType) -> u8 {
    if field.is_linked() {
        4
    } else if field.is_primary() {
        0
    } else if field.foreign.is_some() {
        3
    } else if !field.index_info.is_empty() {
        2
    } else {
        1
    }
}

fn type_name(field: &FieldType) -> String {
    match (&field.link, &field.nested, field.kind) {
        (Some(link), _, _) => link.type_name.clone(),
        (None, Some(nested), _) => nested.clone(),
        (None, None, Kind::Object) => Kind::JSON.as_str().to_string(),
        (None, None, kind) => kind.as_str().to_string(),
    }
}

fn render_field(field: &FieldType) -> String {
    let mut ty = type_name(field);
    if field.is_list {
        ty = format!("[{ty}]");
    }
    if field.required {
        ty.push('!');
    }

    let mut directives = Vec::new();
    if let Some(primary) = field.primary {
        let mut args = Vec::new();
        if primary.auto_increment {
            args.push("autoIncrement: true".to_string());
        }
        if primary.order != DEFAULT_INDEX_ORDER {
            args.push(format!("order: {}", primary.order));
        }
        directives.push(with_args("primary", &args));
    }
    if field.args.is_some() && field.args != default_args(field.kind) {
        if let Some(args) = field.args {
            directives.push(format!("@args(precision: {}, scale: {})", args.precision, args.scale));
        }
    }
    if field.kind.is_sized() && field.size != CharSize::default() {
        let value = match field.size {
            CharSize::Limited(n) => n.to_string(),
            CharSize::Max => "\"max\"".to_string(),
        };
        directives.push(format!("@size(value: {value})"));
    }
    if field.is_created_at {
        directives.push("@createdAt".to_string());
    }
    if field.is_updated_at {
        directives.push("@updatedAt".to_string());
    }
    for info in &field.index_info {
        let mut args = Vec::new();
        if info.group != field.name {
            args.push(format!("group: {}", quoted(&info.group)));
        }
        if info.order != DEFAULT_INDEX_ORDER {
            args.push(format!("order: {}", info.order));
        }
        if info.sort == SortOrder::Desc {
            args.push("sort: \"desc\"".to_string());
        }
        directives.push(with_args(if info.is_unique { "unique" } else { "index" }, &args));
    }
    if let Some(value) = &field.default {
        directives.push(format!("@default(value: {})", literal(value)));
    }
    if let Some(link) = &field.link {
        let mut args = vec![
            format!("table: {}", quoted(&link.table)),
            format!("from: {}", quoted(&link.from)),
            format!("to: {}", quoted(&link.to)),
        ];
        if let Some(f) = &link.field {
            args.push(format!("field: {}", quoted(f)));
        }
        if let Some(db) = &link.db {
            args.push(format!("db: {}", quoted(db)));
        }
        directives.push(with_args("link", &args));
    }
    if let Some(fk) = &field.foreign {
        let mut args = vec![format!("table: {}", quoted(&fk.table))];
        if fk.to != "id" {
            args.push(format!("field: {}", quoted(&fk.to)));
        }
        if fk.on_delete == OnDelete::Cascade {
            args.push("onDelete: \"cascade\"".to_string());
        }
        directives.push(with_args("foreign", &args));
    }

    let mut line = format!("{}: {}", field.name, ty);
    for directive in directives {
        line.push(' ');
        line.push_str(&directive);
    }
    line
}

fn with_args(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        format!("@{name}")
    } else {
        format!("@{name}({})", args.join(", "))
    }
}

fn quoted(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::String(s) => quoted(s),
        Value::DateTime(t) => quoted(&format_rfc3339(t)),
        Value::NativeDate(_) => value
            .as_datetime()
            .map(|t| quoted(&format_rfc3339(&t)))
            .unwrap_or_else(|| "null".to_string()),
        Value::Bytes(bytes) => quoted(&String::from_utf8_lossy(bytes)),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(doc) => {
            let entries: Vec<String> = doc.iter().map(|(k, v)| format!("{k}: {}", literal(v))).collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}
