//! Parameterized `INSERT` and `UPDATE` builders.

use crate::error::{EtlError, Result};

/// A SQL statement plus the field names to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
}

/// Quote a column name for SQLite.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schemas a table name may be qualified with.
pub const KNOWN_SCHEMAS: &[&str] = &["main", "temp"];

/// Split `main.orders` into its schema and table parts.
///
/// Only a prefix naming a known schema counts as a qualifier, so a table
/// literally named `a.b` stays whole.
#[must_use]
pub fn split_schema(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table))
            if !table.is_empty() && KNOWN_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(schema)) =>
        {
            (Some(schema), table)
        }
        _ => (None, name),
    }
}

/// Quote a possibly schema-qualified table name.
#[must_use]
pub fn quote_table(name: &str) -> String {
    match split_schema(name) {
        (Some(schema), table) => format!("{}.{}", quote_identifier(schema), quote_identifier(table)),
        (None, table) => quote_identifier(table),
    }
}

/// `INSERT INTO t ("A", "B") VALUES (?1, ?2)`
///
/// # Errors
///
/// Fails if there are no fields to insert.
pub fn insert(table: &str, fields: &[&str]) -> Result<Statement> {
    if fields.is_empty() {
        return Err(EtlError::Write(format!("no fields to insert into {table}")));
    }
    let columns: Vec<String> = fields.iter().map(|f| quote_identifier(f)).collect();
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{i}")).collect();
    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_table(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params: fields.iter().map(|f| (*f).to_string()).collect(),
    })
}

/// `UPDATE t SET "B" = ?1 WHERE "A" = ?2`
///
/// Key columns match field names without regard to case. Every key must be
/// among `fields`, and at least one non-key field must remain to set.
///
/// # Errors
///
/// Fails on an empty key list, a missing key field, or nothing to set.
pub fn update(table: &str, fields: &[&str], keys: &[String]) -> Result<Statement> {
    if keys.is_empty() {
        return Err(EtlError::Configuration(format!(
            "update of {table} requires at least one key column"
        )));
    }
    let is_key = |field: &str| keys.iter().any(|k| k.eq_ignore_ascii_case(field));
    let set_fields: Vec<&str> = fields.iter().copied().filter(|f| !is_key(f)).collect();
    if set_fields.is_empty() {
        return Err(EtlError::Write(format!(
            "update of {table} has no non-key fields to set"
        )));
    }
    let key_fields = keys
        .iter()
        .map(|key| {
            fields
                .iter()
                .copied()
                .find(|f| f.eq_ignore_ascii_case(key))
                .ok_or_else(|| EtlError::Write(format!("record is missing key column {key}")))
        })
        .collect::<Result<Vec<&str>>>()?;

    let mut params = Vec::with_capacity(set_fields.len() + key_fields.len());
    let mut assignments = Vec::with_capacity(set_fields.len());
    for field in &set_fields {
        params.push((*field).to_string());
        assignments.push(format!("{} = ?{}", quote_identifier(field), params.len()));
    }
    let mut conditions = Vec::with_capacity(key_fields.len());
    for field in &key_fields {
        params.push((*field).to_string());
        conditions.push(format!("{} = ?{}", quote_identifier(field), params.len()));
    }

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            quote_table(table),
            assignments.join(", "),
            conditions.join(" AND ")
        ),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lists_fields_in_order() {
        let stmt = insert("orders", &["ID", "NAME"]).unwrap();
        assert_eq!(stmt.sql, r#"INSERT INTO "orders" ("ID", "NAME") VALUES (?1, ?2)"#);
        assert_eq!(stmt.params, vec!["ID", "NAME"]);
    }

    #[test]
    fn update_sets_non_keys_and_matches_keys() {
        let keys = vec!["id".to_string(), "region".to_string()];
        let stmt = update("main.orders", &["AMOUNT", "ID", "NAME", "REGION"], &keys).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "main"."orders" SET "AMOUNT" = ?1, "NAME" = ?2 WHERE "ID" = ?3 AND "REGION" = ?4"#
        );
        assert_eq!(stmt.params, vec!["AMOUNT", "NAME", "ID", "REGION"]);
    }

    #[test]
    fn only_known_schemas_qualify_table_names() {
        assert_eq!(split_schema("main.orders"), (Some("main"), "orders"));
        assert_eq!(split_schema("TEMP.scratch"), (Some("TEMP"), "scratch"));
        assert_eq!(split_schema("a.b"), (None, "a.b"));
        assert_eq!(split_schema("main."), (None, "main."));
        assert_eq!(quote_table("a.b"), r#""a.b""#);
        assert_eq!(quote_table("main.a.b"), r#""main"."a.b""#);
    }

    #[test]
    fn update_rejects_missing_keys_and_empty_sets() {
        let keys = vec!["ID".to_string()];
        assert!(matches!(update("t", &["NAME"], &keys), Err(EtlError::Write(_))));
        assert!(matches!(update("t", &["ID"], &keys), Err(EtlError::Write(_))));
        assert!(matches!(update("t", &["ID", "NAME"], &[]), Err(EtlError::Configuration(_))));
    }

    #[test]
    fn identifiers_escape_quotes() {
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }
}
