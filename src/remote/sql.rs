//! Parameterized SQL for the entity tables, plus JSON-to-Postgres binding.

use crate::contract::SortSpec;
use crate::entity::EntityDescriptor;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;
use std::collections::HashMap;

/// Quote identifier for PostgreSQL (safe: only from static descriptors).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn select_column_list(entity: &EntityDescriptor) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholder(entity: &EntityDescriptor, column: &str, n: usize) -> String {
    match entity.column(column) {
        Some(c) => format!("${}::{}", n, c.pg_type),
        None => format!("${}", n),
    }
}

/// ORDER BY from a sort spec; unknown fields fall back to the PK so a bad
/// spec never produces invalid SQL.
fn order_clause(entity: &EntityDescriptor, sort: Option<&str>) -> String {
    let (field, desc) = match sort {
        Some(spec) => {
            let s = SortSpec::parse(spec);
            if entity.has_column(s.field) {
                (s.field, s.descending)
            } else {
                (entity.pk, false)
            }
        }
        None => (entity.pk, false),
    };
    format!(
        " ORDER BY {}{}",
        quoted(field),
        if desc { " DESC" } else { "" }
    )
}

/// SELECT by primary key. Caller binds id as sole param.
pub fn select_by_id(entity: &EntityDescriptor, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        select_column_list(entity),
        table,
        quoted(entity.pk)
    );
    q
}

/// SELECT list with exact-match filters (snake_case columns), sort, limit.
pub fn select_list(
    entity: &EntityDescriptor,
    schema: &str,
    filters: &[(String, Value)],
    sort: Option<&str>,
    limit: Option<usize>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    let mut where_parts = Vec::new();
    for (col, val) in filters {
        if !entity.has_column(col) {
            // A non-null value under a key that is not a column can never
            // match a row; the mirror client excludes such rows too. A null
            // value matches every row, same as a key no mirror row carries.
            if !val.is_null() {
                where_parts.push("1 = 0".to_string());
            }
            continue;
        }
        if val.is_null() {
            where_parts.push(format!("{} IS NULL", quoted(col)));
        } else {
            let n = q.push_param(val.clone());
            where_parts.push(format!("{} = {}", quoted(col), placeholder(entity, col, n)));
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_column_list(entity),
        table,
        where_clause,
        order_clause(entity, sort),
        limit_clause
    );
    q
}

/// SELECT rows WHERE column IN (values). The batched lookup behind
/// hybrid plan resolution.
pub fn select_by_column_in(
    entity: &EntityDescriptor,
    schema: &str,
    column: &str,
    values: &[Value],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    let cols = select_column_list(entity);
    if values.is_empty() {
        q.sql = format!("SELECT {} FROM {} WHERE 1 = 0", cols, table);
        return q;
    }
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| {
            let n = q.push_param(v.clone());
            placeholder(entity, column, n)
        })
        .collect();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY {}",
        cols,
        table,
        quoted(column),
        placeholders.join(", "),
        quoted(entity.pk)
    );
    q
}

/// INSERT from body (snake_case keys). Columns with a DB default are
/// omitted when the body has no value, so the default applies.
pub fn insert(entity: &EntityDescriptor, schema: &str, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in entity.columns {
        let val = body.get(c.name).cloned();
        if val.is_none() && c.has_default {
            continue;
        }
        let n = q.push_param(val.unwrap_or(Value::Null));
        cols.push(quoted(c.name));
        placeholders.push(format!("${}::{}", n, c.pg_type));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(entity)
    );
    q
}

/// UPDATE by id: SET only columns present in body. Touches updated_at when
/// the table carries it. Caller guarantees a non-empty change-set.
pub fn update(
    entity: &EntityDescriptor,
    schema: &str,
    id: &Value,
    body: &HashMap<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    let mut sets = Vec::new();
    for c in entity.columns {
        let Some(v) = body.get(c.name) else { continue };
        if c.name == entity.pk {
            continue;
        }
        let n = q.push_param(v.clone());
        sets.push(format!("{} = ${}::{}", quoted(c.name), n, c.pg_type));
    }
    if entity.has_column("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        table,
        sets.join(", "),
        quoted(entity.pk),
        id_param,
        select_column_list(entity)
    );
    q
}

/// DELETE by id. Caller binds id as sole param.
pub fn delete(entity: &EntityDescriptor, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1 RETURNING {}",
        table,
        quoted(entity.pk),
        select_column_list(entity)
    );
    q
}

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => {
                if let Ok(u) = uuid::Uuid::parse_str(s) {
                    PgBindValue::Uuid(u)
                } else {
                    PgBindValue::String(s.clone())
                }
            }
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Uuid(u) => {
                let u_str = u.to_string();
                <&str as Encode<Postgres>>::encode_by_ref(&u_str.as_str(), buf)?
            }
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use serde_json::json;

    #[test]
    fn list_filters_and_sort_shape_the_query() {
        let d = EntityKind::Assignments.descriptor();
        let filters = vec![("student_id".to_string(), json!("u-1"))];
        let q = select_list(d, "atril", &filters, Some("-created_at"), Some(20));
        assert!(q.sql.contains("WHERE \"student_id\" = $1::uuid"));
        assert!(q.sql.contains("ORDER BY \"created_at\" DESC"));
        assert!(q.sql.ends_with("LIMIT 20"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn unknown_sort_field_falls_back_to_pk() {
        let d = EntityKind::Pieces.descriptor();
        let q = select_list(d, "atril", &[], Some("dropTables"), None);
        assert!(q.sql.contains("ORDER BY \"id\""));
    }

    #[test]
    fn unknown_filter_key_matches_nothing() {
        let d = EntityKind::Assignments.descriptor();
        let filters = vec![("no_such_field".to_string(), json!("x"))];
        let q = select_list(d, "atril", &filters, None, None);
        assert!(q.sql.contains("WHERE 1 = 0"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn null_filter_becomes_is_null() {
        let d = EntityKind::Assignments.descriptor();
        let filters = vec![("teacher_id".to_string(), Value::Null)];
        let q = select_list(d, "atril", &filters, None, None);
        assert!(q.sql.contains("\"teacher_id\" IS NULL"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn batched_in_query_binds_each_id_once() {
        let d = EntityKind::Plans.descriptor();
        let ids = vec![json!("a"), json!("b"), json!("c")];
        let q = select_by_column_in(d, "atril", "id", &ids);
        assert!(q.sql.contains("IN ($1::uuid, $2::uuid, $3::uuid)"));
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn empty_id_set_selects_nothing() {
        let d = EntityKind::Plans.descriptor();
        let q = select_by_column_in(d, "atril", "id", &[]);
        assert!(q.sql.contains("WHERE 1 = 0"));
    }

    #[test]
    fn insert_omits_defaulted_columns_without_values() {
        let d = EntityKind::Pieces.descriptor();
        let body: HashMap<String, Value> =
            [("nombre".to_string(), json!("Estudio 1"))].into_iter().collect();
        let q = insert(d, "atril", &body);
        // The column list starts after the table name; the PK and audit
        // columns are left to their defaults.
        assert!(q.sql.contains("(\"nombre\""));
        assert!(!q.sql.contains("(\"id\""));
        // nombre, descripcion, video_url, metadata; defaulted columns omitted.
        assert_eq!(q.params.len(), 4);
        assert!(q.sql.contains("RETURNING"));
    }

    #[test]
    fn update_sets_only_present_columns_and_touches_updated_at() {
        let d = EntityKind::Assignments.descriptor();
        let body: HashMap<String, Value> =
            [("plan_id".to_string(), json!("tpl-1"))].into_iter().collect();
        let q = update(d, "atril", &json!("a-1"), &body);
        assert!(q.sql.contains("SET \"plan_id\" = $1::uuid, \"updated_at\" = NOW() WHERE"));
        assert_eq!(q.params.len(), 2);
    }
}
