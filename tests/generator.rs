use anyhow::Result;
use sheetpipe::generator::{SnowflakeGenerator, UuidGenerator, ValueGenerator, ValueGeneratorRegistry};
use sheetpipe::{ProcessContext, Value, ValueKind};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn builtins_are_registered_and_sorted() {
    let registry = ValueGeneratorRegistry::with_builtins();
    let ids: Vec<String> = registry.descriptors().into_iter().map(|d| d.id).collect();

    let mut expected = vec!["snowflake", "uuid", "uuid-no-dashes"];
    if cfg!(feature = "timestamp-generator") {
        expected.insert(1, "timestamp");
    }
    assert_eq!(ids, expected);
    assert!(registry.has("uuid"));
    assert!(!registry.has("sequence"));
}

#[test]
fn register_replaces_and_unregister_removes() {
    let registry = ValueGeneratorRegistry::new();
    assert!(registry.is_empty());

    assert!(registry.register(Arc::new(UuidGenerator::new())).is_none());
    assert!(registry.register(Arc::new(UuidGenerator::new())).is_some());
    assert_eq!(registry.len(), 1);

    assert!(registry.unregister("uuid").is_some());
    assert!(registry.unregister("uuid").is_none());
    assert!(registry.get("uuid").is_none());
}

#[test]
fn uuids_are_text_in_both_shapes() -> Result<()> {
    let ctx = ProcessContext::new();

    let dashed = UuidGenerator::new();
    assert_eq!(dashed.value_type(), ValueKind::Text);
    let Value::Text(id) = dashed.generate(&ctx)? else {
        anyhow::bail!("uuid generator must produce text");
    };
    assert_eq!(id.len(), 36);
    assert_eq!(id.matches('-').count(), 4);
    uuid::Uuid::parse_str(&id)?;

    let compact = UuidGenerator::without_dashes();
    assert_eq!(compact.id(), "uuid-no-dashes");
    let Value::Text(id) = compact.generate(&ctx)? else {
        anyhow::bail!("uuid generator must produce text");
    };
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    Ok(())
}

#[test]
fn snowflake_ids_increase_and_decompose() -> Result<()> {
    let generator = SnowflakeGenerator::new(3, 7)?;
    let ids = (0..10_000)
        .map(|_| generator.next_id())
        .collect::<sheetpipe::Result<Vec<i64>>>()?;

    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let (ms, datacenter, worker, _) = SnowflakeGenerator::decompose(ids[0]);
    assert_eq!((datacenter, worker), (7, 3));
    let now = chrono::Utc::now().timestamp_millis();
    assert!(ms <= now && now - ms < 60_000);
    Ok(())
}

#[test]
fn snowflake_rejects_out_of_range_ids() {
    assert!(SnowflakeGenerator::new(32, 0).is_err());
    assert!(SnowflakeGenerator::new(0, -1).is_err());
    assert!(SnowflakeGenerator::new(31, 31).is_ok());
}

#[test]
fn snowflake_is_unique_across_threads() -> Result<()> {
    let registry = Arc::new(ValueGeneratorRegistry::with_builtins());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || -> sheetpipe::Result<Vec<Value>> {
                let ctx = ProcessContext::new();
                let generator = registry
                    .get("snowflake")
                    .ok_or_else(|| sheetpipe::EtlError::NotFound("snowflake".into()))?;
                (0..2_000).map(|_| generator.generate(&ctx)).collect()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        let values = handle.join().map_err(|_| anyhow::anyhow!("generator thread panicked"))??;
        for value in values {
            let Value::Long(id) = value else {
                anyhow::bail!("snowflake must produce longs, got {value:?}");
            };
            assert!(seen.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(seen.len(), 8_000);
    Ok(())
}

#[cfg(feature = "timestamp-generator")]
#[test]
fn timestamps_are_current() -> Result<()> {
    let registry = ValueGeneratorRegistry::with_builtins();
    let generator = registry
        .get("timestamp")
        .ok_or_else(|| anyhow::anyhow!("timestamp generator missing"))?;

    let before = chrono::Utc::now().naive_utc();
    let value = generator.generate(&ProcessContext::new())?;
    let after = chrono::Utc::now().naive_utc();

    let Value::Timestamp(ts) = value else {
        anyhow::bail!("expected a timestamp, got {value:?}");
    };
    assert!(before <= ts && ts <= after);
    assert_eq!(generator.value_type(), ValueKind::Timestamp);
    Ok(())
}
