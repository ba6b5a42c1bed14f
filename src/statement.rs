//! Builds the four statement kinds from a derived schema.
//!
//! Identifiers (table and column names) come from the schema only, never
//! from caller input; record values always travel as named parameters.

use crate::schema::{ColumnDef, Schema};
use std::fmt::Write;

pub(crate) fn create_table(schema: &Schema) -> String {
    let mut sql = String::with_capacity(128);
    sql.push_str("CREATE TABLE IF NOT EXISTS ");
    sql.push_str(schema.table());
    sql.push_str(" (");
    for (i, col) in schema.columns().iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&col.name);
        sql.push(' ');
        sql.push_str(col.storage.sql_type());
        for modifier in &col.modifiers {
            sql.push(' ');
            sql.push_str(modifier);
        }
    }
    sql.push(')');
    sql
}

pub(crate) fn insert(schema: &Schema) -> String {
    let mut sql = String::with_capacity(128);
    sql.push_str("INSERT INTO ");
    sql.push_str(schema.table());
    sql.push_str(" (");
    let data_columns = &schema.columns()[1..];
    for (i, col) in data_columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&col.name);
    }
    sql.push_str(") VALUES (");
    for (i, col) in data_columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push(':');
        sql.push_str(&col.name);
    }
    sql.push(')');
    sql
}

/// Equality filters ANDed together, newest records first. `LIMIT` takes the
/// literal count; everything else is a named parameter.
pub(crate) fn select(schema: &Schema, filters: &[&ColumnDef], limit: Option<u32>) -> String {
    let mut sql = String::with_capacity(128);
    sql.push_str("SELECT * FROM ");
    sql.push_str(schema.table());
    for (i, col) in filters.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        let _ = write!(sql, "{} = :{}", col.name, col.name);
    }
    let _ = write!(sql, " ORDER BY {} DESC", schema.primary_key().name);
    if let Some(limit) = limit {
        let _ = write!(sql, " LIMIT {limit}");
    }
    sql
}

pub(crate) fn update(schema: &Schema) -> String {
    let mut sql = String::with_capacity(128);
    sql.push_str("UPDATE ");
    sql.push_str(schema.table());
    sql.push_str(" SET ");
    for (i, col) in schema.columns()[1..].iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        let _ = write!(sql, "{} = :{}", col.name, col.name);
    }
    let pk = &schema.primary_key().name;
    let _ = write!(sql, " WHERE {pk} = :{pk}");
    sql
}

pub(crate) fn delete(schema: &Schema) -> String {
    let pk = &schema.primary_key().name;
    format!("DELETE FROM {} WHERE {pk} = :{pk}", schema.table())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, FieldDef};
    use crate::value::StorageType;

    fn person_schema() -> Schema {
        let fields = vec![
            FieldDef::with_default("name", "default"),
            FieldDef::typed("age", StorageType::Integer),
            FieldDef::with_default("cakes", 0),
        ];
        schema::derive("person", &fields).unwrap().0
    }

    #[test]
    fn create_table_text() {
        assert_eq!(
            create_table(&person_schema()),
            "CREATE TABLE IF NOT EXISTS person \
             (idx INTEGER PRIMARY KEY, name TEXT, age INTEGER, cakes INTEGER)"
        );
    }

    #[test]
    fn create_table_with_modifiers() {
        let fields = vec![FieldDef::typed("email", StorageType::Text).unique()];
        let schema = schema::derive("account", &fields).unwrap().0;
        assert_eq!(
            create_table(&schema),
            "CREATE TABLE IF NOT EXISTS account (idx INTEGER PRIMARY KEY, email TEXT UNIQUE)"
        );
    }

    #[test]
    fn insert_excludes_primary_key() {
        assert_eq!(
            insert(&person_schema()),
            "INSERT INTO person (name, age, cakes) VALUES (:name, :age, :cakes)"
        );
    }

    #[test]
    fn select_unfiltered_orders_newest_first() {
        assert_eq!(
            select(&person_schema(), &[], None),
            "SELECT * FROM person ORDER BY idx DESC"
        );
    }

    #[test]
    fn select_filters_are_anded() {
        let schema = person_schema();
        let filters: Vec<_> = ["cakes", "age"]
            .iter()
            .map(|f| schema.column_for_field(f).unwrap())
            .collect();
        assert_eq!(
            select(&schema, &filters, Some(1)),
            "SELECT * FROM person WHERE cakes = :cakes AND age = :age \
             ORDER BY idx DESC LIMIT 1"
        );
    }

    #[test]
    fn update_sets_every_data_column() {
        assert_eq!(
            update(&person_schema()),
            "UPDATE person SET name = :name, age = :age, cakes = :cakes WHERE idx = :idx"
        );
    }

    #[test]
    fn delete_by_primary_key() {
        assert_eq!(delete(&person_schema()), "DELETE FROM person WHERE idx = :idx");
    }
}
