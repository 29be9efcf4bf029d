//! Building a [`FieldMapper`] from table metadata and run configuration.
//!
//! Auto mode matches each header name against the destination columns.
//! Manual mode follows the configured header-to-column map. Either way,
//! configured defaults and generators are then attached, extra fields are
//! added as virtual columns, and required-column overrides are applied.
//! Anything that cannot be honoured is skipped with a warning. A bad mapping
//! entry never fails the run.

use super::{ColumnIndex, FieldMapper, FieldMapping};
use crate::config::ImportConfig;
use crate::generator::ValueGeneratorRegistry;
use crate::schema::TableStructure;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Add one mapping per header column whose name matches a destination column.
///
/// `required` comes from the column's nullability and default clause.
/// Returns how many headers were mapped.
pub fn auto_map(mapper: &mut FieldMapper, index: &ColumnIndex, table: &TableStructure) -> usize {
    let mut mapped = 0;
    for (_, header) in index.headers() {
        match table.column(header) {
            Some(column) => {
                debug!(header, column = %column.name, "auto-mapped column");
                mapper.add(FieldMapping::new(header, &column.name).required(column.is_required()));
                mapped += 1;
            }
            None => warn!(
                header,
                table = %table.table_name,
                "header has no matching destination column, skipping"
            ),
        }
    }
    mapped
}

/// Build the complete mapper for one run.
#[must_use]
pub fn build_mapper(
    config: &ImportConfig,
    table: &TableStructure,
    index: &ColumnIndex,
    registry: &ValueGeneratorRegistry,
) -> FieldMapper {
    let mut mapper = FieldMapper::new(config.case_insensitive);

    if config.auto_mapping {
        auto_map(&mut mapper, index, table);
    } else {
        for (header, column_name) in &config.column_mappings {
            match table.column(column_name) {
                Some(column) => {
                    debug!(header, column = %column.name, "mapped column");
                    mapper.add(FieldMapping::new(header.trim(), &column.name).required(column.is_required()));
                }
                None => warn!(
                    header,
                    column = %column_name,
                    table = %table.table_name,
                    "mapped destination column does not exist, skipping"
                ),
            }
        }
    }

    attach_rules(&mut mapper, config, registry);
    add_unmapped_rule_columns(&mut mapper, config, table, registry);
    add_extra_fields(&mut mapper, config, table, registry);
    apply_required_overrides(&mut mapper, config, table);

    info!(
        table = %table.table_name,
        mappings = mapper.len(),
        auto = config.auto_mapping,
        "built field mapper"
    );
    mapper
}

/// Find a rule keyed by destination column (ignoring case) or by header name.
fn lookup<'a>(rules: &'a BTreeMap<String, String>, column: &str, header: &str) -> Option<&'a str> {
    rules
        .iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(column))
        .or_else(|| rules.iter().find(|(key, _)| key.trim() == header))
        .map(|(_, value)| value.as_str())
}

fn attach_rules(mapper: &mut FieldMapper, config: &ImportConfig, registry: &ValueGeneratorRegistry) {
    let columns: Vec<(String, String)> = mapper
        .mappings()
        .iter()
        .map(|m| (m.source_column.clone(), m.target_field.clone()))
        .collect();

    for (header, column) in columns {
        let Some(mapping) = mapper.get_mut(&header) else {
            continue;
        };
        if let Some(default) = lookup(&config.default_values, &column, &header) {
            mapping.default_value = Some(default.to_string());
        }
        if let Some(id) = lookup(&config.generators, &column, &header) {
            match registry.get(id) {
                Some(generator) => mapping.generator = Some(generator),
                None => warn!(
                    generator = id,
                    column = %column,
                    "unknown generator, falling back to plain mapping"
                ),
            }
        }
    }
}

/// Columns with a default or generator but no header become virtual fields.
fn add_unmapped_rule_columns(
    mapper: &mut FieldMapper,
    config: &ImportConfig,
    table: &TableStructure,
    registry: &ValueGeneratorRegistry,
) {
    let keys: Vec<&String> = config
        .default_values
        .keys()
        .chain(config.generators.keys())
        .collect();
    for key in keys {
        let Some(column) = table.column(key) else {
            continue;
        };
        if mapper.by_target_mut(&column.name).is_some() {
            continue;
        }
        let mut mapping = FieldMapping::virtual_field(&column.name).required(column.is_required());
        if let Some(default) = lookup(&config.default_values, &column.name, "") {
            mapping = mapping.default_value(default);
        }
        if let Some(id) = lookup(&config.generators, &column.name, "") {
            match registry.get(id) {
                Some(generator) => mapping = mapping.generator(generator),
                None => warn!(generator = id, column = %column.name, "unknown generator, ignoring"),
            }
        }
        if mapping.default_value.is_some() || mapping.generator.is_some() {
            debug!(column = %column.name, "added virtual column for configured rule");
            mapper.add(mapping);
        }
    }
}

fn add_extra_fields(
    mapper: &mut FieldMapper,
    config: &ImportConfig,
    table: &TableStructure,
    registry: &ValueGeneratorRegistry,
) {
    for extra in &config.extra_fields {
        let Some(column) = table.column(&extra.column) else {
            warn!(column = %extra.column, table = %table.table_name, "extra field does not exist, skipping");
            continue;
        };
        let mut mapping = FieldMapping::virtual_field(&column.name).required(column.is_required());
        if let Some(default) = &extra.default_value {
            mapping = mapping.default_value(default.clone());
        }
        if let Some(id) = &extra.generator {
            match registry.get(id) {
                Some(generator) => mapping = mapping.generator(generator),
                None => warn!(generator = %id, column = %column.name, "unknown generator for extra field"),
            }
        }
        if mapping.default_value.is_none() && mapping.generator.is_none() {
            warn!(column = %column.name, "extra field has no usable default or generator, ignoring");
            continue;
        }
        debug!(column = %column.name, "added extra field");
        mapper.add(mapping);
    }
}

fn apply_required_overrides(mapper: &mut FieldMapper, config: &ImportConfig, table: &TableStructure) {
    for name in &config.required_columns {
        if let Some(mapping) = mapper.by_target_mut(name) {
            mapping.required = true;
            continue;
        }
        match table.column(name) {
            // A virtual source with no rules: every record reports it missing.
            Some(column) => {
                mapper.add(FieldMapping::virtual_field(&column.name).required(true));
            }
            None => warn!(column = %name, table = %table.table_name, "required column does not exist, skipping"),
        }
    }
}
