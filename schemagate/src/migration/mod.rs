//! Plan the DDL that brings a live relational table in line with its
//! declared schema.

pub mod ddl;
pub mod index;

pub use ddl::{column_type, qualified_table, ColumnDef, DdlStatement};
pub use index::{index_groups, IndexGroup};

use crate::error::{Result, SchemaGateError};
use crate::schema::*;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Ordered DDL for one database.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    pub db_type: DbType,
    pub db_name: String,
    pub statements: Vec<DdlStatement>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Every statement rendered for the plan's dialect, in order.
    pub fn to_sql(&self) -> Vec<String> {
        self.statements
            .iter()
            .flat_map(|s| s.to_sql(self.db_type, &self.db_name))
            .collect()
    }

    pub fn has_destructive_changes(&self) -> bool {
        self.statements.iter().any(|s| s.is_destructive())
    }
}

/// Plan `table`, creating any table its foreign keys point at first.
pub fn plan_table(
    db_type: DbType,
    db_name: &str,
    table: &str,
    desired: &CollectionSchemas,
    current: &CollectionSchemas,
) -> Result<MigrationPlan> {
    let mut planner = Planner::new(db_type, desired, current);
    if !db_type.is_document_store() {
        planner.plan(table)?;
    }
    Ok(planner.finish(db_name))
}

/// Plan every desired table in declaration order as one batch.
pub fn plan_all(
    db_type: DbType,
    db_name: &str,
    desired: &CollectionSchemas,
    current: &CollectionSchemas,
) -> Result<MigrationPlan> {
    let mut planner = Planner::new(db_type, desired, current);
    if !db_type.is_document_store() {
        for table in desired.keys() {
            if is_table(desired, table) {
                planner.plan(table)?;
            }
        }
    }
    Ok(planner.finish(db_name))
}

/// Plan `table` of database `db_alias` against the published snapshot.
pub fn plan_snapshot_table(
    snapshot: &SchemaSnapshot,
    db_alias: &str,
    table: &str,
    current: &CollectionSchemas,
) -> Result<MigrationPlan> {
    let (info, desired) = match (snapshot.database(db_alias), snapshot.collection(db_alias)) {
        (Some(info), Some(desired)) => (info, desired),
        _ => {
            return Err(SchemaGateError::migration(
                table,
                format!("schema not initialized for database '{db_alias}'"),
            ))
        }
    };
    plan_table(info.db_type, &info.name, table, desired, current)
}

/// Embedded object types share the collection with tables. Only entries
/// nobody embeds are tables.
fn is_table(collection: &CollectionSchemas, name: &str) -> bool {
    !collection
        .values()
        .flat_map(|fields| fields.values())
        .any(|f| f.nested.as_deref() == Some(name) && !f.is_linked())
}

struct Planner<'a> {
    db_type: DbType,
    desired: &'a CollectionSchemas,
    current: &'a CollectionSchemas,
    planned: HashSet<String>,
    in_progress: HashSet<String>,
    statements: Vec<DdlStatement>,
    deferred: Vec<DdlStatement>,
}

impl<'a> Planner<'a> {
    fn new(db_type: DbType, desired: &'a CollectionSchemas, current: &'a CollectionSchemas) -> Self {
        Planner {
            db_type,
            desired,
            current,
            planned: HashSet::new(),
            in_progress: HashSet::new(),
            statements: Vec::new(),
            deferred: Vec::new(),
        }
    }

    fn finish(mut self, db_name: &str) -> MigrationPlan {
        self.statements.append(&mut self.deferred);
        MigrationPlan {
            db_type: self.db_type,
            db_name: db_name.to_string(),
            statements: self.statements,
        }
    }

    fn plan(&mut self, table: &str) -> Result<()> {
        if self.planned.contains(table) || self.in_progress.contains(table) {
            return Ok(());
        }
        let (all_desired, all_current) = (self.desired, self.current);
        let desired = match all_desired.get(table) {
            Some(fields) => fields,
            None => return Ok(()),
        };
        self.in_progress.insert(table.to_string());
        log::debug!("Planning table '{table}' on {}", self.db_type);

        for field in physical_fields(desired) {
            check_field(table, field)?;
        }
        for field in desired.values().filter(|f| f.is_linked()) {
            check_linked_field(table, field)?;
        }

        // Referenced tables first. A target already in progress closes a
        // cycle and its foreign key is deferred.
        for field in physical_fields(desired) {
            if let Some(fk) = &field.foreign {
                if !all_current.contains_key(&fk.table) {
                    if !all_desired.contains_key(&fk.table) {
                        return Err(SchemaGateError::migration(
                            table,
                            format!("schema not provided for table '{}' referenced by '{}'", fk.table, field.name),
                        ));
                    }
                    self.plan(&fk.table)?;
                }
            }
        }

        let created;
        let current = match all_current.get(table) {
            Some(current) => current,
            None => {
                let create = self.create_table(table, desired)?;
                self.statements.push(create);
                created = synthesized_current(desired);
                &created
            }
        };

        let desired_indexes = index_groups(table, desired, true)?;
        let mut current_indexes = index_groups(table, current, false)?;

        self.removal_pass(table, desired, current, &mut current_indexes)?;
        self.field_pass(table, desired, current, &mut current_indexes)?;

        for (group, live) in &current_indexes {
            if !desired_indexes.contains_key(group) {
                self.statements.push(DdlStatement::DropIndex {
                    table: table.to_string(),
                    name: live.drop_name(table, group),
                });
            }
        }
        for (group, wanted) in &desired_indexes {
            let create = DdlStatement::CreateIndex {
                table: table.to_string(),
                name: IndexInfo::index_name_for(table, group),
                unique: wanted.unique,
                columns: wanted.columns(),
            };
            match current_indexes.get(group) {
                None => self.statements.push(create),
                Some(live) if !live.same_shape(wanted) => {
                    self.statements.push(DdlStatement::DropIndex {
                        table: table.to_string(),
                        name: live.drop_name(table, group),
                    });
                    self.statements.push(create);
                }
                Some(_) => {}
            }
        }

        self.in_progress.remove(table);
        self.planned.insert(table.to_string());
        Ok(())
    }

    fn create_table(&self, table: &str, desired: &FieldSchemas) -> Result<DdlStatement> {
        let mut keys: Vec<&FieldType> = physical_fields(desired).filter(|f| f.is_primary()).collect();
        keys.sort_by_key(|f| f.primary.map(|p| p.order).unwrap_or(DEFAULT_INDEX_ORDER));
        if keys.len() > 1 {
            for (i, key) in keys.iter().enumerate() {
                if key.primary.map(|p| p.order as usize) != Some(i + 1) {
                    return Err(SchemaGateError::migration(
                        table,
                        format!("invalid order sequence provided for composite primary key '{}'", key.name),
                    ));
                }
            }
        }

        let mut columns = Vec::new();
        for field in keys.iter().copied().chain(physical_fields(desired).filter(|f| !f.is_primary())) {
            columns.push(ColumnDef::for_field(self.db_type, table, field, field.required)?);
        }
        Ok(DdlStatement::CreateTable {
            table: table.to_string(),
            columns,
            primary_key: keys.iter().map(|f| f.name.clone()).collect(),
        })
    }

    fn removal_pass(
        &mut self,
        table: &str,
        desired: &FieldSchemas,
        current: &FieldSchemas,
        current_indexes: &mut IndexMap<String, IndexGroup>,
    ) -> Result<()> {
        for live in physical_fields(current) {
            let keep = desired.get(&live.name).map(|f| !f.is_linked()).unwrap_or(false);
            if keep {
                continue;
            }
            if live.is_primary() {
                return Err(SchemaGateError::migration(
                    table,
                    format!(
                        "field '{}' with primary key cannot be removed, delete the table to change primary key",
                        live.name
                    ),
                ));
            }
            self.drop_column(table, live, current_indexes);
        }
        Ok(())
    }

    fn field_pass(
        &mut self,
        table: &str,
        desired: &FieldSchemas,
        current: &FieldSchemas,
        current_indexes: &mut IndexMap<String, IndexGroup>,
    ) -> Result<()> {
        for field in physical_fields(desired) {
            let live = match current.get(&field.name) {
                Some(live) if !live.is_linked() => live,
                _ => {
                    if field.is_primary() {
                        return Err(SchemaGateError::migration(
                            table,
                            format!("cannot add primary key field '{}' to an existing table", field.name),
                        ));
                    }
                    self.add_column(table, field)?;
                    continue;
                }
            };

            let desired_type = column_type(self.db_type, table, field)?;
            let live_type = column_type(self.db_type, table, live)?;
            let type_changed = desired_type != live_type;

            if live.is_primary() {
                if type_changed || !field.is_primary() {
                    return Err(SchemaGateError::migration(
                        table,
                        format!(
                            "cannot change type of field '{}' with primary key, delete the table to change primary key",
                            field.name
                        ),
                    ));
                }
                if field.foreign.is_some() || !field.required || field.default.is_some() {
                    return Err(SchemaGateError::migration(
                        table,
                        format!(
                            "mutation is not allowed on field '{}' with primary key, delete the table to change primary key",
                            field.name
                        ),
                    ));
                }
            } else if field.is_primary() {
                return Err(SchemaGateError::migration(
                    table,
                    format!("cannot make existing field '{}' a primary key", field.name),
                ));
            }

            if type_changed {
                log::debug!("Column '{table}.{}' changes type: {live_type} -> {desired_type}", field.name);
                self.drop_column(table, live, current_indexes);
                self.add_column(table, field)?;
                continue;
            }
            self.modify_column(table, field, live, desired_type);
        }
        Ok(())
    }

    /// Drop a column together with its constraints, default and indexes.
    fn drop_column(
        &mut self,
        table: &str,
        live: &FieldType,
        current_indexes: &mut IndexMap<String, IndexGroup>,
    ) {
        if let Some(fk) = &live.foreign {
            self.statements.push(DdlStatement::DropForeignKey {
                table: table.to_string(),
                constraint: fk.constraint_name.clone(),
            });
        }
        if live.default.is_some() {
            self.statements.push(DdlStatement::DropDefault {
                table: table.to_string(),
                column: live.name.clone(),
            });
        }
        for info in &live.index_info {
            if let Some(group) = current_indexes.shift_remove(&info.group) {
                self.statements.push(DdlStatement::DropIndex {
                    table: table.to_string(),
                    name: group.drop_name(table, &info.group),
                });
            }
        }
        self.statements.push(DdlStatement::DropColumn {
            table: table.to_string(),
            column: live.name.clone(),
        });
    }

    fn add_column(&mut self, table: &str, field: &FieldType) -> Result<()> {
        let column = ColumnDef::for_field(self.db_type, table, field, false)?;
        let sql_type = column.sql_type.clone();
        self.statements.push(DdlStatement::AddColumn {
            table: table.to_string(),
            column,
        });
        if field.required {
            self.statements.push(DdlStatement::SetNotNull {
                table: table.to_string(),
                column: field.name.clone(),
                sql_type,
                default: None,
            });
        }
        if let Some(fk) = &field.foreign {
            self.add_foreign_key(table, field, fk);
        }
        if let Some(value) = &field.default {
            self.statements.push(DdlStatement::SetDefault {
                table: table.to_string(),
                column: field.name.clone(),
                value: value.clone(),
            });
        }
        Ok(())
    }

    fn modify_column(&mut self, table: &str, field: &FieldType, live: &FieldType, sql_type: String) {
        let default_changed = match (&field.default, &live.default) {
            (Some(want), Some(have)) => !defaults_equal(field.kind, want, have),
            (None, None) => false,
            _ => true,
        };

        if field.required != live.required {
            let column = field.name.clone();
            let table = table.to_string();
            let default = if default_changed { None } else { live.default.clone() };
            self.statements.push(if field.required {
                DdlStatement::SetNotNull { table, column, sql_type, default }
            } else {
                DdlStatement::DropNotNull { table, column, sql_type, default }
            });
        }

        let fk_changed = match (&field.foreign, &live.foreign) {
            (Some(want), Some(have)) => {
                want.table != have.table || want.to != have.to || want.on_delete != have.on_delete
            }
            (None, None) => false,
            _ => true,
        };
        if fk_changed {
            if let Some(have) = &live.foreign {
                self.statements.push(DdlStatement::DropForeignKey {
                    table: table.to_string(),
                    constraint: have.constraint_name.clone(),
                });
            }
        }

        if default_changed && live.default.is_some() {
            self.statements.push(DdlStatement::DropDefault {
                table: table.to_string(),
                column: field.name.clone(),
            });
        }

        if fk_changed {
            if let Some(want) = &field.foreign {
                self.add_foreign_key(table, field, want);
            }
        }
        if default_changed {
            if let Some(value) = &field.default {
                self.statements.push(DdlStatement::SetDefault {
                    table: table.to_string(),
                    column: field.name.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    fn add_foreign_key(&mut self, table: &str, field: &FieldType, fk: &ForeignKeyInfo) {
        let statement = DdlStatement::AddForeignKey {
            table: table.to_string(),
            column: field.name.clone(),
            constraint: fk.constraint_name.clone(),
            ref_table: fk.table.clone(),
            ref_column: fk.to.clone(),
            on_delete: fk.on_delete,
        };
        if self.in_progress.contains(&fk.table) && fk.table != table {
            log::debug!("Deferring foreign key '{}' until '{}' is planned", fk.constraint_name, fk.table);
            self.deferred.push(statement);
        } else {
            self.statements.push(statement);
        }
    }
}

/// Definition checks every relational column must pass.
fn check_field(table: &str, field: &FieldType) -> Result<()> {
    let error = |message: String| Err(SchemaGateError::migration(table, message));
    if field.is_list {
        return error(format!(
            "invalid type for field '{}': array type without link directive is not supported in sql creation",
            field.name
        ));
    }
    if field.kind == Kind::Object {
        return error(format!(
            "invalid type for field '{}': object type is not supported in sql creation",
            field.name
        ));
    }
    if field.is_primary() && !field.required {
        return error(format!("primary key '{}' must be not null", field.name));
    }
    if field.kind == Kind::JSON {
        if field.is_primary() {
            return error(format!("cannot set primary key on field '{}' having type json", field.name));
        }
        if !field.index_info.is_empty() {
            return error(format!("cannot set index on field '{}' having type json", field.name));
        }
    }
    Ok(())
}

fn check_linked_field(table: &str, field: &FieldType) -> Result<()> {
    if field.kind == Kind::JSON {
        return Err(SchemaGateError::migration(
            table,
            format!("cannot set link directive on field '{}' having type json", field.name),
        ));
    }
    if field.default.is_some() {
        return Err(SchemaGateError::migration(
            table,
            format!("cannot set default directive on linked field '{}'", field.name),
        ));
    }
    Ok(())
}

/// Columns as they exist right after `CREATE TABLE`: declared type,
/// nullability and primary key, but no foreign keys, defaults or indexes.
fn synthesized_current(desired: &FieldSchemas) -> FieldSchemas {
    physical_fields(desired)
        .map(|f| {
            let mut live = FieldType::new(&f.name, f.kind);
            live.required = f.required;
            live.is_list = f.is_list;
            live.args = f.args;
            live.size = f.size;
            live.primary = f.primary;
            live.nested = f.nested.clone();
            (f.name.clone(), live)
        })
        .collect()
}

/// Compare a declared default with the one read back from the database.
pub fn defaults_equal(kind: Kind, want: &Value, have: &Value) -> bool {
    if let (Some(a), Some(b)) = (want.as_f64(), have.as_f64()) {
        return (a - b).abs() < f64::EPSILON * a.abs().max(b.abs()).max(1.0);
    }
    if kind == Kind::JSON {
        return as_json(want) == as_json(have);
    }
    match (want, have) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::DateTime(a), Value::String(b)) | (Value::String(b), Value::DateTime(a)) => {
            crate::value::parse_rfc3339(b).map(|b| b == *a).unwrap_or(false)
        }
        _ => want == have,
    }
}

fn as_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => {
            serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.clone()))
        }
        other => serde_json::Value::from(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::{inspect_table, ColumnRow, IndexRow};
    use pretty_assertions::assert_eq;
    use sqlparser::dialect::PostgreSqlDialect;
    use sqlparser::parser::Parser;

    fn schema(table: &str, sdl: &str) -> CollectionSchemas {
        parse_table_sdl(table, sdl).unwrap()
    }

    fn merged(parts: &[(&str, &str)]) -> CollectionSchemas {
        let mut out = CollectionSchemas::new();
        for (table, sdl) in parts {
            out.extend(schema(table, sdl));
        }
        out
    }

    const USERS: &str = r#"
        type users {
            id: ID! @primary
            first_name: String! @index(group: "n", order: 1)
            last_name: String! @index(group: "n", order: 2)
        }
    "#;

    #[test]
    fn test_create_table_then_composite_index() {
        let plan = plan_table(DbType::Postgres, "public", "users", &schema("users", USERS), &CollectionSchemas::new())
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            vec![
                "CREATE TABLE public.users (id character varying(100) NOT NULL, first_name text NOT NULL, last_name text NOT NULL, PRIMARY KEY (id))",
                "CREATE INDEX index__users__n ON public.users (first_name asc, last_name asc)",
            ]
        );
    }

    #[test]
    fn test_removing_primary_key_is_refused() {
        let current = schema("users", USERS);
        let desired = schema(
            "users",
            r#"type users {
                id: ID!
                first_name: String! @index(group: "n", order: 1)
                last_name: String! @index(group: "n", order: 2)
            }"#,
        );
        let err = plan_table(DbType::MySQL, "shop", "users", &desired, &current).unwrap_err();
        assert!(matches!(err, SchemaGateError::Migration { .. }), "{err}");
    }

    #[test]
    fn test_dropping_primary_column_is_refused() {
        let current = schema("users", USERS);
        let desired = schema("users", "type users { first_name: String! last_name: String! }");
        assert!(plan_table(DbType::Postgres, "public", "users", &desired, &current).is_err());
    }

    #[test]
    fn test_document_stores_need_no_ddl() {
        let plan = plan_table(DbType::Mongo, "app", "users", &schema("users", USERS), &CollectionSchemas::new())
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unchanged_schema_is_a_no_op() {
        let desired = schema("users", USERS);
        let plan = plan_table(DbType::SQLServer, "dbo", "users", &desired, &desired).unwrap();
        assert!(plan.is_empty(), "{:?}", plan.statements);
    }

    const BLOG: &[(&str, &str)] = &[
        (
            "post",
            r#"type post {
                id: Integer! @primary(autoIncrement: true)
                title: VarChar! @size(value: 200)
                status: String! @default(value: "draft")
                score: Float @default(value: 0)
                author_id: ID @foreign(table: "author", field: "id", onDelete: "cascade")
                published: Boolean @default(value: false)
                created: DateTime! @createdAt
                tag: String @unique
            }"#,
        ),
        (
            "author",
            r#"type author {
                id: ID! @primary
                name: String!
                posts: [post] @link(table: "post", from: "id", to: "author_id")
            }"#,
        ),
    ];

    #[test]
    fn test_foreign_target_created_first() {
        let desired = merged(BLOG);
        let plan = plan_table(DbType::Postgres, "public", "post", &desired, &CollectionSchemas::new()).unwrap();
        let sql = plan.to_sql();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE public.author (id character varying(100) NOT NULL, name text NOT NULL, PRIMARY KEY (id))",
                "CREATE TABLE public.post (id serial NOT NULL, title character varying(200) NOT NULL, status text NOT NULL, score double precision, author_id character varying(100), published boolean, created timestamp(6) without time zone NOT NULL, tag text, PRIMARY KEY (id))",
                "ALTER TABLE public.post ALTER COLUMN status SET DEFAULT 'draft'",
                "ALTER TABLE public.post ALTER COLUMN score SET DEFAULT 0",
                "ALTER TABLE public.post ADD CONSTRAINT c_post_author_id FOREIGN KEY (author_id) REFERENCES public.author (id) ON DELETE CASCADE",
                "ALTER TABLE public.post ALTER COLUMN published SET DEFAULT false",
                "CREATE UNIQUE INDEX index__post__tag ON public.post (tag asc)",
            ]
        );

        let dialect = PostgreSqlDialect {};
        for statement in &sql {
            Parser::parse_sql(&dialect, statement).unwrap_or_else(|e| panic!("{statement}: {e}"));
        }
    }

    #[test]
    fn test_plan_all_plans_each_table_once() {
        let desired = merged(BLOG);
        let plan = plan_all(DbType::MySQL, "blog", &desired, &CollectionSchemas::new()).unwrap();
        let creates = plan
            .statements
            .iter()
            .filter(|s| matches!(s, DdlStatement::CreateTable { .. }))
            .count();
        assert_eq!(creates, 2);
        let sql = plan.to_sql();
        assert!(sql[0].starts_with("CREATE TABLE author ("));
        assert!(sql[1].starts_with("CREATE TABLE post (id integer NOT NULL AUTO_INCREMENT,"));
    }

    #[test]
    fn test_foreign_key_cycle_is_deferred() {
        let desired = merged(&[
            (
                "a",
                r#"type a { id: ID! @primary b_id: ID @foreign(table: "b") }"#,
            ),
            (
                "b",
                r#"type b { id: ID! @primary a_id: ID @foreign(table: "a") }"#,
            ),
        ]);
        let plan = plan_all(DbType::Postgres, "public", &desired, &CollectionSchemas::new()).unwrap();
        let sql = plan.to_sql();
        assert_eq!(sql.len(), 4);
        assert!(sql[0].starts_with("CREATE TABLE public.b "));
        assert!(sql[1].starts_with("CREATE TABLE public.a "));
        assert_eq!(
            sql[2],
            "ALTER TABLE public.a ADD CONSTRAINT c_a_b_id FOREIGN KEY (b_id) REFERENCES public.b (id)"
        );
        assert_eq!(
            sql[3],
            "ALTER TABLE public.b ADD CONSTRAINT c_b_a_id FOREIGN KEY (a_id) REFERENCES public.a (id)"
        );
    }

    #[test]
    fn test_missing_foreign_target() {
        let desired = schema("a", r#"type a { id: ID! @primary x_id: ID @foreign(table: "x") }"#);
        assert!(plan_table(DbType::Postgres, "public", "a", &desired, &CollectionSchemas::new()).is_err());
    }

    #[test]
    fn test_type_change_drops_and_adds() {
        let current = schema(
            "t",
            r#"type t { id: ID! @primary v: String @index(group: "v") }"#,
        );
        let desired = schema(
            "t",
            r#"type t { id: ID! @primary v: Integer! @index(group: "v") }"#,
        );
        let plan = plan_table(DbType::MySQL, "shop", "t", &desired, &current).unwrap();
        assert_eq!(
            plan.to_sql(),
            vec![
                "DROP INDEX index__t__v ON t",
                "ALTER TABLE t DROP COLUMN v",
                "ALTER TABLE t ADD v integer",
                "ALTER TABLE t MODIFY v integer NOT NULL",
                "CREATE INDEX index__t__v ON t (v asc)",
            ]
        );
        assert!(plan.has_destructive_changes());
    }

    #[test]
    fn test_directive_changes() {
        let current = schema(
            "post",
            r#"type post {
                id: ID! @primary
                author_id: ID @foreign(table: "author")
                state: String! @default(value: "draft")
                note: String
            }"#,
        );
        let desired = schema(
            "post",
            r#"type post {
                id: ID! @primary
                author_id: ID
                state: String! @default(value: "new")
                note: String!
            }"#,
        );
        let plan = plan_table(DbType::MySQL, "shop", "post", &desired, &current).unwrap();
        assert_eq!(
            plan.to_sql(),
            vec![
                "ALTER TABLE post DROP FOREIGN KEY c_post_author_id",
                "ALTER TABLE post DROP INDEX c_post_author_id",
                "ALTER TABLE post ALTER state DROP DEFAULT",
                "ALTER TABLE post ALTER state SET DEFAULT ('new')",
                "ALTER TABLE post MODIFY note longtext NOT NULL",
            ]
        );
    }

    #[test]
    fn test_primary_key_mutations_refused() {
        let current = schema("t", "type t { id: Integer! @primary }");
        for sdl in [
            "type t { id: Integer! @primary @default(value: 1) }",
            r#"type t { id: Integer! @primary @foreign(table: "t") }"#,
            "type t { id: BigInteger! @primary }",
        ] {
            let desired = schema("t", sdl);
            assert!(plan_table(DbType::Postgres, "public", "t", &desired, &current).is_err(), "{sdl}");
        }
        let desired = schema("t", "type t { id: Integer! @primary other: String! @primary(order: 2) }");
        assert!(plan_table(DbType::Postgres, "public", "t", &desired, &current).is_err());
    }

    #[test]
    fn test_definition_checks() {
        for sdl in [
            "type t { id: ID! @primary tags: [String] }",
            "type t { id: ID @primary }",
            "type t { id: ID! @primary meta: JSON @index }",
            "type t { id: JSON! @primary }",
            "type t { id: ID! @primary a: Integer! @primary(order: 3) }",
        ] {
            let desired = schema("t", sdl);
            assert!(
                plan_table(DbType::Postgres, "public", "t", &desired, &CollectionSchemas::new()).is_err(),
                "{sdl}"
            );
        }
    }

    fn column(name: &str, data_type: &str, nullable: bool) -> ColumnRow {
        ColumnRow {
            column_name: name.into(),
            data_type: data_type.into(),
            nullable,
            ..Default::default()
        }
    }

    fn index_row(column: &str, name: &str, order: u32) -> IndexRow {
        IndexRow {
            column_name: column.into(),
            index_name: name.into(),
            order,
            sort: "asc".into(),
            is_unique: false,
            is_primary: false,
        }
    }

    #[test]
    fn test_replanning_after_apply_is_empty() {
        let desired = merged(BLOG);

        let post_columns = vec![
            ColumnRow {
                auto_increment: true,
                default: Some("nextval('post_id_seq'::regclass)".into()),
                ..column("id", "integer", false)
            },
            ColumnRow {
                varchar_size: Some(200),
                ..column("title", "character varying", false)
            },
            ColumnRow {
                default: Some("'draft'::text".into()),
                ..column("status", "text", false)
            },
            ColumnRow {
                default: Some("0".into()),
                ..column("score", "double precision", true)
            },
            ColumnRow {
                varchar_size: Some(100),
                ref_table: Some("author".into()),
                ref_column: Some("id".into()),
                delete_rule: Some("CASCADE".into()),
                constraint_name: Some("c_post_author_id".into()),
                ..column("author_id", "character varying", true)
            },
            ColumnRow {
                default: Some("false".into()),
                ..column("published", "boolean", true)
            },
            ColumnRow {
                datetime_precision: Some(6),
                ..column("created", "timestamp without time zone", false)
            },
            column("tag", "text", true),
        ];
        let post_indexes = vec![
            IndexRow {
                is_primary: true,
                is_unique: true,
                ..index_row("id", "post_pkey", 1)
            },
            IndexRow {
                is_unique: true,
                ..index_row("tag", "index__post__tag", 1)
            },
        ];
        let author_columns = vec![
            ColumnRow {
                varchar_size: Some(100),
                ..column("id", "character varying", false)
            },
            column("name", "text", false),
        ];
        let author_indexes = vec![IndexRow {
            is_primary: true,
            is_unique: true,
            ..index_row("id", "author_pkey", 1)
        }];

        let mut current = CollectionSchemas::new();
        current.insert(
            "post".into(),
            inspect_table(DbType::Postgres, "post", &post_columns, &post_indexes, desired.get("post")).unwrap(),
        );
        current.insert(
            "author".into(),
            inspect_table(DbType::Postgres, "author", &author_columns, &author_indexes, desired.get("author"))
                .unwrap(),
        );

        let plan = plan_all(DbType::Postgres, "public", &desired, &current).unwrap();
        assert_eq!(plan.statements, vec![]);
    }

    fn replan(db_type: DbType, desired: &CollectionSchemas, tables: &[(&str, Vec<ColumnRow>, Vec<IndexRow>)]) -> MigrationPlan {
        let mut current = CollectionSchemas::new();
        for (table, columns, indexes) in tables {
            let fields = inspect_table(db_type, table, columns, indexes, desired.get(*table)).unwrap();
            current.insert(table.to_string(), fields);
        }
        plan_all(db_type, "app", desired, &current).unwrap()
    }

    fn primary_row(column: &str, name: &str) -> IndexRow {
        IndexRow {
            is_primary: true,
            is_unique: true,
            ..index_row(column, name, 1)
        }
    }

    #[test]
    fn test_replanning_mysql_is_empty() {
        let desired = merged(BLOG);
        let post = vec![
            ColumnRow {
                auto_increment: true,
                ..column("id", "int", false)
            },
            ColumnRow {
                varchar_size: Some(200),
                ..column("title", "varchar", false)
            },
            ColumnRow {
                default: Some("('draft')".into()),
                ..column("status", "longtext", false)
            },
            ColumnRow {
                default: Some("0".into()),
                ..column("score", "double", true)
            },
            ColumnRow {
                varchar_size: Some(100),
                ref_table: Some("author".into()),
                ref_column: Some("id".into()),
                delete_rule: Some("CASCADE".into()),
                constraint_name: Some("c_post_author_id".into()),
                ..column("author_id", "varchar", true)
            },
            ColumnRow {
                default: Some("0".into()),
                ..column("published", "tinyint", true)
            },
            ColumnRow {
                datetime_precision: Some(6),
                ..column("created", "datetime", false)
            },
            column("tag", "longtext", true),
        ];
        let post_indexes = vec![
            primary_row("id", "PRIMARY"),
            index_row("author_id", "c_post_author_id", 1),
            IndexRow {
                is_unique: true,
                ..index_row("tag", "index__post__tag", 1)
            },
        ];
        let author = vec![
            ColumnRow {
                varchar_size: Some(100),
                ..column("id", "varchar", false)
            },
            column("name", "longtext", false),
        ];

        let plan = replan(
            DbType::MySQL,
            &desired,
            &[
                ("post", post, post_indexes),
                ("author", author, vec![primary_row("id", "PRIMARY")]),
            ],
        );
        assert_eq!(plan.statements, vec![]);
    }

    #[test]
    fn test_replanning_sqlserver_is_empty() {
        let desired = schema(
            "item",
            r#"type item {
                id: Integer! @primary(autoIncrement: true)
                code: Char @size(value: "max")
                state: String! @default(value: "draft")
                qty: Integer @default(value: 0)
                active: Boolean @default(value: true)
                meta: JSON
            }"#,
        );
        let columns = vec![
            ColumnRow {
                auto_increment: true,
                ..column("id", "int", false)
            },
            ColumnRow {
                varchar_size: Some(4000),
                ..column("code", "nchar", true)
            },
            ColumnRow {
                varchar_size: Some(-1),
                default: Some("(N'draft')".into()),
                ..column("state", "nvarchar", false)
            },
            ColumnRow {
                default: Some("((0))".into()),
                ..column("qty", "int", true)
            },
            ColumnRow {
                default: Some("((1))".into()),
                ..column("active", "bit", true)
            },
            ColumnRow {
                varchar_size: Some(-1),
                ..column("meta", "nvarchar", true)
            },
        ];

        let plan = replan(
            DbType::SQLServer,
            &desired,
            &[("item", columns, vec![primary_row("id", "PK__item__3213E83F")])],
        );
        assert_eq!(plan.statements, vec![]);
    }

    #[test]
    fn test_replanning_postgres_char_max_is_empty() {
        let desired = schema("t", r#"type t { id: ID! @primary big: Char @size(value: "max") }"#);
        let created = plan_table(DbType::Postgres, "app", "t", &desired, &CollectionSchemas::new()).unwrap();
        assert_eq!(
            created.to_sql(),
            vec!["CREATE TABLE app.t (id character varying(100) NOT NULL, big character(10485760), PRIMARY KEY (id))"]
        );

        let columns = vec![
            ColumnRow {
                varchar_size: Some(100),
                ..column("id", "character varying", false)
            },
            ColumnRow {
                varchar_size: Some(10_485_760),
                ..column("big", "character", true)
            },
        ];
        let plan = replan(DbType::Postgres, &desired, &[("t", columns, vec![primary_row("id", "t_pkey")])]);
        assert_eq!(plan.statements, vec![]);
    }

    #[test]
    fn test_column_turned_into_link_is_dropped() {
        let desired = schema(
            "t",
            r#"type t {
                id: ID! @primary
                x: [post] @link(table: "post", from: "id", to: "t_id")
            }"#,
        );
        let columns = vec![
            ColumnRow {
                varchar_size: Some(100),
                ..column("id", "character varying", false)
            },
            column("x", "text", true),
        ];
        let plan = replan(DbType::Postgres, &desired, &[("t", columns, vec![primary_row("id", "t_pkey")])]);
        assert_eq!(plan.to_sql(), vec!["ALTER TABLE app.t DROP COLUMN x"]);
    }

    #[test]
    fn test_mysql_nullability_change_keeps_default() {
        let current = schema("post", r#"type post { id: ID! @primary state: String! @default(value: "draft") }"#);
        let desired = schema("post", r#"type post { id: ID! @primary state: String @default(value: "draft") }"#);
        let plan = plan_table(DbType::MySQL, "shop", "post", &desired, &current).unwrap();
        assert_eq!(
            plan.to_sql(),
            vec!["ALTER TABLE post MODIFY state longtext NULL DEFAULT ('draft')"]
        );
    }

    #[test]
    fn test_snapshot_not_initialized() {
        let err = plan_snapshot_table(&SchemaSnapshot::default(), "db", "users", &CollectionSchemas::new())
            .unwrap_err();
        assert!(err.to_string().contains("schema not initialized"));
    }

    #[test]
    fn test_defaults_compared_by_value() {
        assert!(defaults_equal(Kind::Float, &Value::Int(0), &Value::Float(0.0)));
        assert!(defaults_equal(
            Kind::JSON,
            &Value::from("{\"a\": 1}"),
            &Value::from("{\"a\":1}")
        ));
        assert!(!defaults_equal(Kind::String, &Value::from("a"), &Value::from("b")));
    }
}
