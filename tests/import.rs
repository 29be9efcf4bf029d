mod support;

use anyhow::Result;
use sheetpipe::config::{ExtraField, ImportConfig, ImportMode};
use sheetpipe::error::EtlError;
use sheetpipe::generator::ValueGeneratorRegistry;
use sheetpipe::import::{Importer, expand_inputs};
use sheetpipe::testing::{ORDERS_DDL, TempDatabase};
use std::collections::HashSet;
use std::sync::Arc;
use support::{W, orders_workbook, write_sheets, write_xlsx};

fn importer(db: &TempDatabase) -> Importer {
    Importer::new(db.path(), Arc::new(ValueGeneratorRegistry::with_builtins()))
}

fn id_rows(ids: &[Option<f64>]) -> Vec<Vec<W>> {
    let mut rows = vec![vec![W::S("ID"), W::S("NAME")]];
    rows.extend(
        ids.iter()
            .map(|id| vec![id.map_or(W::Blank, W::N), W::S("someone")]),
    );
    rows
}

#[test]
fn orders_end_to_end() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    let file = orders_workbook(db.dir())?;
    let importer = importer(&db);

    let mut config = ImportConfig::for_table("orders");
    config.batch_size = 2;
    let report = importer.import_file(&file, &config);

    assert!(report.success, "{}", report.message);
    assert_eq!(
        (report.total_records, report.success_records, report.failure_records),
        (3, 2, 1)
    );
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row_number, 4);
    assert_eq!(report.errors[0].message, "missing required column: ID");
    assert_eq!(report.errors[0].row_data, "Row 4: [, C, 30]");
    assert!(report.finished_at >= report.started_at);

    let conn = db.connect()?;
    let amounts: Vec<(i64, String, f64)> = conn
        .prepare("SELECT ID, NAME, AMOUNT FROM orders ORDER BY ID")?
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<rusqlite::Result<_>>()?;
    assert_eq!(amounts, vec![(1, "A".to_string(), 10.0), (2, "B".to_string(), 20.5)]);

    assert_eq!(importer.report(report.task_id), Some(report));
    Ok(())
}

#[test]
fn failed_batch_rolls_back_the_whole_file() -> Result<()> {
    let db = TempDatabase::with_schema("CREATE TABLE people (ID INTEGER PRIMARY KEY, NAME TEXT);")?;
    let file = db.file_path("dupes.xlsx");
    write_xlsx(&file, id_rows(&[Some(1.0), Some(2.0), Some(1.0)]))?;

    let mut config = ImportConfig::for_table("people");
    config.batch_size = 1;
    let report = importer(&db).import_file(&file, &config);

    assert!(!report.success);
    assert!(report.message.contains("batch write failed"), "{}", report.message);
    assert_eq!(report.total_records, 3);
    assert_eq!(db.count_rows("people")?, 0);
    Ok(())
}

#[test]
fn stop_on_error_keeps_rows_before_the_failure() -> Result<()> {
    let db = TempDatabase::with_schema("CREATE TABLE people (ID INTEGER NOT NULL, NAME TEXT);")?;
    let file = db.file_path("people.xlsx");
    let ids: Vec<Option<f64>> = (1..=10).map(|i| (i != 4).then_some(f64::from(i))).collect();
    write_xlsx(&file, id_rows(&ids))?;

    let mut config = ImportConfig::for_table("people");
    config.ignore_errors = false;
    let report = importer(&db).import_file(&file, &config);

    assert!(report.success, "{}", report.message);
    assert_eq!(
        (report.total_records, report.success_records, report.failure_records),
        (4, 3, 1)
    );
    assert!(report.message.contains("stopped"));
    assert_eq!(db.count_rows("people")?, 3);
    Ok(())
}

#[test]
fn generated_and_default_columns_need_no_sheet_column() -> Result<()> {
    let db = TempDatabase::with_schema(
        "CREATE TABLE people (
            ID INTEGER NOT NULL,
            TOKEN TEXT NOT NULL,
            NAME TEXT NOT NULL,
            STATUS TEXT,
            SOURCE TEXT
        );",
    )?;
    let file = db.file_path("names.xlsx");
    write_xlsx(
        &file,
        vec![
            vec![W::S("Name"), W::S("Status")],
            vec![W::S("Ada"), W::Blank],
            vec![W::S("Grace"), W::S("ACTIVE")],
        ],
    )?;

    let mut config = ImportConfig::for_table("people");
    config.generators.insert("id".into(), "snowflake".into());
    config.generators.insert("TOKEN".into(), "uuid-no-dashes".into());
    config.default_values.insert("STATUS".into(), "NEW".into());
    config.extra_fields.push(ExtraField {
        column: "SOURCE".into(),
        default_value: Some("excel".into()),
        generator: None,
    });
    let report = importer(&db).import_file(&file, &config);
    assert!(report.success, "{}", report.message);
    assert_eq!(report.success_records, 2);

    let conn = db.connect()?;
    let rows: Vec<(i64, String, String, String, String)> = conn
        .prepare("SELECT ID, TOKEN, NAME, STATUS, SOURCE FROM people ORDER BY NAME")?
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)))?
        .collect::<rusqlite::Result<_>>()?;

    assert_eq!(rows.len(), 2);
    assert_ne!(rows[0].0, rows[1].0);
    assert!(rows.iter().all(|r| r.1.len() == 32));
    assert_eq!((rows[0].3.as_str(), rows[1].3.as_str()), ("NEW", "ACTIVE"));
    assert!(rows.iter().all(|r| r.4 == "excel"));
    Ok(())
}

#[test]
fn required_override_fails_every_row() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    let file = orders_workbook(db.dir())?;

    let mut config = ImportConfig::for_table("orders");
    config.required_columns.push("NAME".into());
    config.auto_mapping = false;
    config.column_mappings.insert("AMOUNT".into(), "AMOUNT".into());
    let report = importer(&db).import_file(&file, &config);

    assert!(report.success);
    assert_eq!(report.success_records, 0);
    assert_eq!(report.failure_records, 3);
    assert!(report.errors.iter().all(|e| e.message.contains("NAME")));
    assert_eq!(db.count_rows("orders")?, 0);
    Ok(())
}

#[test]
fn update_mode_changes_existing_rows() -> Result<()> {
    let db = TempDatabase::with_schema("CREATE TABLE people (ID INTEGER PRIMARY KEY, NAME TEXT, CITY TEXT);")?;
    db.connect()?
        .execute_batch("INSERT INTO people VALUES (1, 'Ada', NULL), (2, 'Grace', NULL);")?;
    let file = db.file_path("cities.xlsx");
    write_xlsx(
        &file,
        vec![
            vec![W::S("ID"), W::S("CITY")],
            vec![W::N(1.0), W::S("London")],
            vec![W::N(2.0), W::S("Arlington")],
        ],
    )?;

    let mut config = ImportConfig::for_table("people");
    config.mode = ImportMode::Update;
    config.key_columns = vec!["ID".into()];
    let report = importer(&db).import_file(&file, &config);
    assert!(report.success, "{}", report.message);

    let cities: Vec<String> = db
        .connect()?
        .prepare("SELECT CITY FROM people ORDER BY ID")?
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    assert_eq!(cities, vec!["London", "Arlington"]);
    assert_eq!(db.count_rows("people")?, 2);
    Ok(())
}

#[test]
fn named_sheet_and_header_offset() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    let file = db.file_path("book.xlsx");
    write_sheets(
        &file,
        &[
            ("Cover", vec![vec![W::S("Orders export")]]),
            (
                "Data",
                vec![
                    vec![W::S("exported 2024-01-15")],
                    vec![W::S("Order"), W::S("Client")],
                    vec![W::N(7.0), W::S("ACME")],
                    vec![],
                    vec![W::N(8.0), W::S("Globex")],
                ],
            ),
        ],
    )?;

    let mut config = ImportConfig::for_table("ORDERS");
    config.sheet_name = Some("Data".into());
    config.header_row = 1;
    config.data_start_row = 2;
    config.auto_mapping = false;
    config.column_mappings.insert("order".into(), "ID".into());
    config.column_mappings.insert("client".into(), "NAME".into());
    let report = importer(&db).import_file(&file, &config);

    assert!(report.success, "{}", report.message);
    assert_eq!(report.total_records, 3);
    assert_eq!(report.success_records, 2);
    assert_eq!(report.skipped_records, 1);
    assert_eq!(db.count_rows("orders")?, 2);
    Ok(())
}

#[test]
fn setup_failures_become_failed_reports() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    let file = orders_workbook(db.dir())?;
    let importer = importer(&db);

    let missing_table = importer.import_file(&file, &ImportConfig::for_table("invoices"));
    assert!(!missing_table.success);
    assert!(missing_table.message.contains("does not exist"), "{}", missing_table.message);

    let csv = db.file_path("orders.csv");
    std::fs::write(&csv, "ID,NAME\n1,A\n")?;
    let unsupported = importer.import_file(&csv, &ImportConfig::for_table("orders"));
    assert!(!unsupported.success);
    assert!(unsupported.message.contains("unsupported file format"));

    let mut zero = ImportConfig::for_table("orders");
    zero.batch_size = 0;
    let invalid = importer.import_file(&file, &zero);
    assert!(!invalid.success);
    assert!(invalid.message.contains("configuration error"));

    let mut no_sheet = ImportConfig::for_table("orders");
    no_sheet.sheet_name = Some("Returns".into());
    assert!(!importer.import_file(&file, &no_sheet).success);

    assert_eq!(importer.task_count(), 4);
    assert!(importer.report(uuid::Uuid::new_v4()).is_none());
    assert_eq!(db.count_rows("orders")?, 0);
    Ok(())
}

#[test]
fn parallel_files_each_get_their_own_transaction() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    let first = db.file_path("first.xlsx");
    let second = db.file_path("second.xlsx");
    write_xlsx(&first, id_rows(&[Some(1.0), Some(2.0)]))?;
    write_xlsx(&second, id_rows(&[Some(3.0), None, Some(4.0)]))?;

    let reports = importer(&db).import_files(
        &[first.clone(), second.clone()],
        &ImportConfig::for_table("orders"),
        true,
    );

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.success));
    assert_eq!(reports[0].file, first.display().to_string());
    assert_eq!(reports[1].failure_records, 1);
    let task_ids: HashSet<_> = reports.iter().map(|r| r.task_id).collect();
    assert_eq!(task_ids.len(), 2);
    assert_eq!(db.count_rows("orders")?, 4);
    Ok(())
}

#[test]
fn importer_exposes_schema_and_generators() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    let importer = importer(&db);

    let table = importer.describe_table("ORDERS");
    assert!(table.exists);
    assert_eq!(table.required_columns(), vec!["ID"]);

    let ids: Vec<String> = importer.generators().into_iter().map(|g| g.id).collect();
    assert!(ids.contains(&"snowflake".to_string()));
    Ok(())
}

#[test]
fn reports_serialize_in_camel_case() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    let file = orders_workbook(db.dir())?;
    let report = importer(&db).import_file(&file, &ImportConfig::for_table("orders"));

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["successRecords"], 2);
    assert_eq!(json["errors"][0]["rowNumber"], 4);
    assert!(json["taskId"].is_string());
    assert!(json["elapsedMs"].is_u64());
    Ok(())
}

#[test]
fn inputs_expand_globs_in_sorted_order() -> Result<()> {
    let db = TempDatabase::with_schema(ORDERS_DDL)?;
    for name in ["b.xlsx", "a.xlsx", "c.xls"] {
        std::fs::write(db.file_path(name), b"")?;
    }
    let dir = db.dir();
    let pattern = format!("{}/*.xlsx", dir.display());
    let plain = db.file_path("later.xlsx").display().to_string();

    let files = expand_inputs(&[pattern.as_str(), plain.as_str()])?;
    let names: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["a.xlsx", "b.xlsx", "later.xlsx"]);

    let none = format!("{}/*.xlsm", dir.display());
    assert!(matches!(expand_inputs(&[none]), Err(EtlError::NotFound(_))));
    assert!(matches!(expand_inputs(&["[".to_string() + "*"]), Err(EtlError::Configuration(_))));
    Ok(())
}

#[test]
fn note_only_rows_do_not_abort_the_import() -> Result<()> {
    let db = TempDatabase::with_schema("CREATE TABLE contacts (NAME TEXT, CITY TEXT);")?;
    let file = db.file_path("contacts.xlsx");
    write_xlsx(
        &file,
        vec![
            vec![W::S("NAME"), W::S("CITY"), W::S("NOTES")],
            vec![W::S("Ada"), W::S("London"), W::Blank],
            vec![W::Blank, W::Blank, W::S("just a note")],
            vec![W::S("Grace"), W::S("NYC"), W::Blank],
        ],
    )?;

    let report = importer(&db).import_file(&file, &ImportConfig::for_table("contacts"));

    assert!(report.success, "{}", report.message);
    assert_eq!(report.total_records, 3);
    assert_eq!(report.success_records, 2);
    assert_eq!(report.skipped_records, 1);
    assert!(report.errors.is_empty());
    assert_eq!(db.count_rows("contacts")?, 2);
    Ok(())
}
