use crate::error::{Result, SchemaGateError};
use crate::schema::{physical_fields, FieldSchemas, IndexInfo, SortOrder};
use indexmap::IndexMap;

/// Columns of one index group, sorted by their order within the group.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexGroup {
    pub unique: bool,
    /// Name of the live index, when known.
    pub constraint_name: Option<String>,
    pub members: Vec<IndexMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMember {
    pub column: String,
    pub order: u32,
    pub sort: SortOrder,
}

impl IndexGroup {
    /// Same members, order, sort and uniqueness. The live name is ignored.
    pub fn same_shape(&self, other: &IndexGroup) -> bool {
        self.unique == other.unique && self.members == other.members
    }

    pub fn columns(&self) -> Vec<(String, SortOrder)> {
        self.members.iter().map(|m| (m.column.clone(), m.sort)).collect()
    }

    /// Name to drop the group by.
    pub fn drop_name(&self, table: &str, group: &str) -> String {
        self.constraint_name
            .clone()
            .unwrap_or_else(|| IndexInfo::index_name_for(table, group))
    }
}

/// Group the index memberships of a table's fields by index group.
///
/// A group is unique if any member is declared unique. With `strict`, the
/// member orders of each group must run 1..n.
pub fn index_groups(table: &str, fields: &FieldSchemas, strict: bool) -> Result<IndexMap<String, IndexGroup>> {
    let mut groups: IndexMap<String, IndexGroup> = IndexMap::new();
    for field in physical_fields(fields) {
        for info in &field.index_info {
            let group = groups.entry(info.group.clone()).or_insert_with(|| IndexGroup {
                unique: false,
                constraint_name: info.constraint_name.clone(),
                members: Vec::new(),
            });
            group.unique |= info.is_unique;
            group.members.push(IndexMember {
                column: field.name.clone(),
                order: info.order,
                sort: info.sort,
            });
        }
    }

    for (name, group) in groups.iter_mut() {
        group.members.sort_by_key(|m| m.order);
        if !strict {
            continue;
        }
        for (i, member) in group.members.iter().enumerate() {
            if member.order as usize != i + 1 {
                return Err(SchemaGateError::migration(
                    table,
                    format!("invalid order sequence provided for index '{name}'"),
                ));
            }
        }
    }
    Ok(groups)
}
