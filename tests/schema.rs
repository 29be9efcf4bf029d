use anyhow::Result;
use sheetpipe::schema::{DataCategory, SchemaProvider, SqliteSchemaProvider, describe_table};
use sheetpipe::testing::TempDatabase;

const DDL: &str = "CREATE TABLE Invoices (
    INVOICE_ID BIGINT PRIMARY KEY,
    CUSTOMER VARCHAR(80) NOT NULL,
    STATUS TEXT NOT NULL DEFAULT 'OPEN',
    TOTAL DECIMAL(10, 2),
    RATE DOUBLE PRECISION,
    PAID BOOLEAN,
    ISSUED DATE NOT NULL,
    UPDATED_AT TIMESTAMP,
    NOTES CLOB,
    SCAN BLOB,
    EXTRA
);";

#[test]
fn describes_columns_in_order() -> Result<()> {
    let db = TempDatabase::with_schema(DDL)?;
    let table = SqliteSchemaProvider::new(db.path()).table_structure("invoices");

    assert!(table.exists);
    assert_eq!(table.table_name, "Invoices");
    let summary: Vec<(&str, DataCategory, u32)> = table
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.data_type, c.ordinal))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("INVOICE_ID", DataCategory::BigInt, 1),
            ("CUSTOMER", DataCategory::Text, 2),
            ("STATUS", DataCategory::Text, 3),
            ("TOTAL", DataCategory::Numeric, 4),
            ("RATE", DataCategory::Float, 5),
            ("PAID", DataCategory::Boolean, 6),
            ("ISSUED", DataCategory::Date, 7),
            ("UPDATED_AT", DataCategory::Timestamp, 8),
            ("NOTES", DataCategory::Clob, 9),
            ("SCAN", DataCategory::Binary, 10),
            ("EXTRA", DataCategory::Other, 11),
        ]
    );
    Ok(())
}

#[test]
fn sizes_defaults_and_keys_are_reported() -> Result<()> {
    let db = TempDatabase::with_schema(DDL)?;
    let table = SqliteSchemaProvider::new(db.path()).table_structure("Invoices");

    let customer = table.column("customer").ok_or_else(|| anyhow::anyhow!("no CUSTOMER"))?;
    assert_eq!(customer.type_name, "VARCHAR");
    assert_eq!(customer.size, Some(80));
    assert!(!customer.nullable);

    let total = table.column("TOTAL").ok_or_else(|| anyhow::anyhow!("no TOTAL"))?;
    assert_eq!((total.size, total.scale), (Some(10), Some(2)));

    let status = table.column("status").ok_or_else(|| anyhow::anyhow!("no STATUS"))?;
    assert_eq!(status.default_value.as_deref(), Some("'OPEN'"));
    assert!(!status.is_required());

    let id = table.column("invoice_id").ok_or_else(|| anyhow::anyhow!("no INVOICE_ID"))?;
    assert!(id.primary_key);

    assert_eq!(table.required_columns(), vec!["CUSTOMER", "ISSUED"]);
    Ok(())
}

#[test]
fn missing_tables_and_databases_are_reported_not_raised() -> Result<()> {
    let db = TempDatabase::with_schema(DDL)?;

    let provider = SqliteSchemaProvider::new(db.path());
    let missing = provider.table_structure("payments");
    assert!(!missing.exists);
    assert!(missing.columns.is_empty());
    assert!(missing.message.is_some_and(|m| m.contains("payments")));
    assert!(!provider.table_exists("payments"));
    assert!(provider.table_exists("INVOICES"));

    let nowhere = SqliteSchemaProvider::new(db.file_path("nowhere.db")).table_structure("invoices");
    assert!(!nowhere.exists);
    assert!(nowhere.message.is_some());
    Ok(())
}

#[test]
fn describe_table_works_on_an_open_connection() -> Result<()> {
    let db = TempDatabase::with_schema(DDL)?;
    let conn = db.connect()?;

    let table = describe_table(&conn, " invoices ")?;
    assert_eq!(table.columns.len(), 11);

    let json = serde_json::to_value(&table)?;
    assert_eq!(json["tableName"], "Invoices");
    assert_eq!(json["columns"][0]["dataType"], "bigint");
    assert_eq!(json["columns"][0]["primaryKey"], true);
    Ok(())
}

#[test]
fn main_prefix_qualifies_and_dotted_names_stay_whole() -> Result<()> {
    let db = TempDatabase::with_schema(r#"CREATE TABLE "a.b" (ID INTEGER NOT NULL, LABEL TEXT);"#)?;
    let provider = SqliteSchemaProvider::new(db.path());

    let dotted = provider.table_structure("a.b");
    assert!(dotted.exists);
    assert_eq!(dotted.table_name, "a.b");
    assert_eq!(dotted.required_columns(), vec!["ID"]);

    let qualified = provider.table_structure("main.a.b");
    assert!(qualified.exists);
    assert_eq!(qualified.table_name, "main.a.b");
    assert_eq!(qualified.columns.len(), 2);

    assert!(!provider.table_exists("a"));
    Ok(())
}
