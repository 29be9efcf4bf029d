use anyhow::Result;
use sheetpipe::config::{ExtraField, ImportConfig};
use sheetpipe::error::EtlError;
use sheetpipe::generator::{ValueGenerator, ValueGeneratorRegistry};
use sheetpipe::mapping::auto::{auto_map, build_mapper};
use sheetpipe::mapping::{FieldMapper, FieldMapping, VIRTUAL_COLUMN_PREFIX};
use sheetpipe::schema::{DataCategory, TableColumn, TableStructure};
use sheetpipe::testing::{RowBuilder, header_row};
use sheetpipe::{ProcessContext, Value, ValueKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

struct Counter {
    next: AtomicI64,
}

impl Counter {
    fn new() -> Self {
        Self { next: AtomicI64::new(100) }
    }
}

impl ValueGenerator for Counter {
    fn id(&self) -> &str {
        "counter"
    }

    fn name(&self) -> &str {
        "Counter"
    }

    fn description(&self) -> &str {
        "Increments from 100"
    }

    fn value_type(&self) -> ValueKind {
        ValueKind::Long
    }

    fn generate(&self, _ctx: &ProcessContext) -> sheetpipe::Result<Value> {
        Ok(Value::Long(self.next.fetch_add(1, Ordering::SeqCst)))
    }
}

fn column(name: &str, category: DataCategory, nullable: bool, default: Option<&str>, ordinal: u32) -> TableColumn {
    TableColumn {
        name: name.to_string(),
        data_type: category,
        type_name: format!("{category:?}").to_ascii_uppercase(),
        size: None,
        scale: None,
        nullable,
        primary_key: false,
        default_value: default.map(str::to_string),
        ordinal,
    }
}

fn orders_table() -> TableStructure {
    TableStructure {
        table_name: "ORDERS".into(),
        exists: true,
        message: None,
        columns: vec![
            column("ORDER_ID", DataCategory::BigInt, false, None, 1),
            column("CUSTOMER", DataCategory::Text, false, None, 2),
            column("STATUS", DataCategory::Text, false, Some("'NEW'"), 3),
            column("AMOUNT", DataCategory::Numeric, true, None, 4),
            column("BATCH", DataCategory::Text, true, None, 5),
        ],
    }
}

fn registry() -> ValueGeneratorRegistry {
    let registry = ValueGeneratorRegistry::new();
    registry.register(Arc::new(Counter::new()));
    registry
}

#[test]
fn headers_match_case_insensitively_after_trimming() -> Result<()> {
    let header = header_row(0, &["  Customer ", "AMOUNT"]);
    let row = RowBuilder::new().text("ACME").number(12.5).build(1);

    let mut mapper = FieldMapper::new(true);
    mapper.add_mapping("customer", "CUSTOMER", true);
    mapper.add_mapping("amount", "AMOUNT", false);
    let index = mapper.build_column_index(&header);

    let fields = mapper.extract_record(&row, &index, &ProcessContext::new())?;
    assert_eq!(fields["CUSTOMER"], Value::from("ACME"));
    assert_eq!(fields["AMOUNT"], Value::Decimal("12.5".parse()?));
    Ok(())
}

#[test]
fn case_sensitive_mapper_ignores_different_case() -> Result<()> {
    let header = header_row(0, &["Customer"]);
    let row = RowBuilder::new().text("ACME").build(1);

    let mut mapper = FieldMapper::new(false);
    mapper.add_mapping("customer", "CUSTOMER", false);
    let index = mapper.build_column_index(&header);

    let fields = mapper.extract_record(&row, &index, &ProcessContext::new())?;
    assert!(fields.is_empty());
    Ok(())
}

#[test]
fn resolution_order_is_source_then_generator_then_default() -> Result<()> {
    let counter: Arc<dyn ValueGenerator> = Arc::new(Counter::new());
    let mapping = FieldMapping::new("ID", "ID")
        .default_value("0")
        .generator(counter);
    let ctx = ProcessContext::new();

    assert_eq!(mapping.resolve(Some(Value::Int(7)), &ctx)?, Some(Value::Int(7)));
    assert_eq!(mapping.resolve(None, &ctx)?, Some(Value::Long(100)));
    assert_eq!(mapping.resolve(None, &ctx)?, Some(Value::Long(101)));

    let defaulted = FieldMapping::new("ID", "ID").default_value("0");
    assert_eq!(defaulted.resolve(None, &ctx)?, Some(Value::from("0")));
    Ok(())
}

#[test]
fn required_mapping_without_value_fails_the_record() -> Result<()> {
    let header = header_row(0, &["NAME"]);
    let mut mapper = FieldMapper::new(true);
    mapper.add_mapping("ID", "ID", true);
    mapper.add_mapping("NAME", "NAME", false);
    let index = mapper.build_column_index(&header);

    for i in 1..=3 {
        let row = RowBuilder::new().text("x").build(i);
        match mapper.extract_record(&row, &index, &ProcessContext::new()) {
            Err(EtlError::MissingRequiredField { column }) => assert_eq!(column, "ID"),
            other => anyhow::bail!("expected missing ID, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn optional_fields_without_value_are_omitted() -> Result<()> {
    let header = header_row(0, &["A", "B"]);
    let row = RowBuilder::new().text("a").empty().build(1);

    let mut mapper = FieldMapper::new(true);
    mapper.add_mapping("A", "A", false);
    mapper.add_mapping("B", "B", false);
    let index = mapper.build_column_index(&header);

    let fields = mapper.extract_record(&row, &index, &ProcessContext::new())?;
    assert_eq!(fields.len(), 1);
    assert!(!fields.contains_key("B"));
    Ok(())
}

#[test]
fn later_mapping_for_the_same_column_replaces_the_earlier() {
    let mut mapper = FieldMapper::new(true);
    mapper.add_mapping("Name", "FIRST", false);
    mapper.add_mapping("NAME", "SECOND", true);

    assert_eq!(mapper.len(), 1);
    let mapping = mapper.get("name").map(|m| (m.target_field.as_str(), m.required));
    assert_eq!(mapping, Some(("SECOND", true)));
}

#[test]
fn blank_headers_are_not_indexed() {
    let header = RowBuilder::new().text("A").empty().text("   ").text("D").build(0);
    let index = FieldMapper::new(true).build_column_index(&header);

    assert_eq!(index.len(), 2);
    assert_eq!(index.position("d"), Some(3));
    let names: Vec<(usize, &str)> = index.headers().collect();
    assert_eq!(names, vec![(0, "A"), (3, "D")]);
}

#[test]
fn auto_map_uses_declared_names_and_metadata() {
    let table = orders_table();
    let index = FieldMapper::new(true).build_column_index(&header_row(0, &["order_id", "Customer", "Status", "Notes"]));

    let mut mapper = FieldMapper::new(true);
    let mapped = auto_map(&mut mapper, &index, &table);

    assert_eq!(mapped, 3);
    let summary: Vec<(&str, &str, bool)> = mapper
        .mappings()
        .iter()
        .map(|m| (m.source_column.as_str(), m.target_field.as_str(), m.required))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("order_id", "ORDER_ID", true),
            ("Customer", "CUSTOMER", true),
            ("Status", "STATUS", false),
        ]
    );
}

#[test]
fn build_mapper_attaches_rules_extras_and_overrides() -> Result<()> {
    let table = orders_table();
    let index = FieldMapper::new(true).build_column_index(&header_row(0, &["CUSTOMER", "AMOUNT"]));

    let mut config = ImportConfig::for_table("orders");
    config.generators.insert("order_id".into(), "counter".into());
    config.default_values.insert("Amount".into(), "0".into());
    config.extra_fields.push(ExtraField {
        column: "BATCH".into(),
        default_value: Some("B-1".into()),
        generator: None,
    });
    config.required_columns.push("AMOUNT".into());

    let mapper = build_mapper(&config, &table, &index, &registry());

    let order_id = mapper
        .mappings()
        .iter()
        .find(|m| m.target_field == "ORDER_ID")
        .ok_or_else(|| anyhow::anyhow!("ORDER_ID not mapped"))?;
    assert!(order_id.is_virtual());
    assert!(order_id.generator.is_some());

    let batch = mapper
        .get(&format!("{VIRTUAL_COLUMN_PREFIX}BATCH"))
        .ok_or_else(|| anyhow::anyhow!("BATCH not mapped"))?;
    assert_eq!(batch.default_value.as_deref(), Some("B-1"));

    let amount = mapper.get("AMOUNT").ok_or_else(|| anyhow::anyhow!("AMOUNT not mapped"))?;
    assert!(amount.required);
    assert_eq!(amount.default_value.as_deref(), Some("0"));

    let row = RowBuilder::new().text("ACME").empty().build(1);
    let fields = mapper.extract_record(&row, &index, &ProcessContext::new())?;
    assert_eq!(fields["ORDER_ID"], Value::Long(100));
    assert_eq!(fields["CUSTOMER"], Value::from("ACME"));
    assert_eq!(fields["AMOUNT"], Value::from("0"));
    assert_eq!(fields["BATCH"], Value::from("B-1"));
    Ok(())
}

#[test]
fn manual_mapping_skips_unknown_destinations() {
    let table = orders_table();
    let index = FieldMapper::new(true).build_column_index(&header_row(0, &["Client", "Total", "Note"]));

    let mut config = ImportConfig::for_table("orders");
    config.auto_mapping = false;
    config.column_mappings.insert("Client".into(), "customer".into());
    config.column_mappings.insert("Total".into(), "AMOUNT".into());
    config.column_mappings.insert("Note".into(), "NOTES".into());

    let mapper = build_mapper(&config, &table, &index, &registry());

    let targets: Vec<&str> = mapper.mappings().iter().map(|m| m.target_field.as_str()).collect();
    assert_eq!(targets, vec!["CUSTOMER", "AMOUNT"]);
    assert!(mapper.get("client").is_some_and(|m| m.required));
}

#[test]
fn unknown_generator_falls_back_to_plain_mapping() {
    let table = orders_table();
    let index = FieldMapper::new(true).build_column_index(&header_row(0, &["ORDER_ID"]));

    let mut config = ImportConfig::for_table("orders");
    config.generators.insert("ORDER_ID".into(), "no-such-generator".into());
    config.extra_fields.push(ExtraField {
        column: "BATCH".into(),
        default_value: None,
        generator: Some("no-such-generator".into()),
    });

    let mapper = build_mapper(&config, &table, &index, &registry());

    assert_eq!(mapper.len(), 1);
    assert!(mapper.get("ORDER_ID").is_some_and(|m| m.generator.is_none()));
}

#[test]
fn required_column_with_no_source_fails_every_record() -> Result<()> {
    let table = orders_table();
    let index = FieldMapper::new(true).build_column_index(&header_row(0, &["CUSTOMER"]));

    let mut config = ImportConfig::for_table("orders");
    config.required_columns.push("AMOUNT".into());
    let mapper = build_mapper(&config, &table, &index, &registry());

    let row = RowBuilder::new().text("ACME").build(1);
    let outcome = mapper.extract_record(&row, &index, &ProcessContext::new());
    assert!(matches!(outcome, Err(EtlError::MissingRequiredField { column }) if column == "AMOUNT"));
    Ok(())
}
