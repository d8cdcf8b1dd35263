use chrono::{NaiveDate, Utc};
use tracing::info;

use dwh::pipeline::LoadPipeline;
use dwh::report::LoadReport;
use dwh::schema::WarehouseSchema;
use dwh::source::SnapshotSource;
use dwh::source::memory::MemorySnapshotSource;
use dwh::source::ndjson::NdjsonSnapshotSource;
use dwh::store::WarehouseStore;
use dwh::store::memory::MemoryWarehouse;
use dwh::store::ndjson::NdjsonWarehouse;
use dwh_config::shared::{LoaderConfig, SourceConfig, StoreConfig};

use crate::error::{LoaderError, LoaderResult};

/// Builds the pipeline from configuration and executes one load run.
///
/// Source and store backends are dispatched statically from their config
/// variants.
pub async fn start_loader(config: LoaderConfig) -> LoaderResult<LoadReport> {
    let schema = WarehouseSchema::try_from(&config.warehouse).map_err(LoaderError::Load)?;
    let load_date = resolve_load_date(config.load_date.as_deref())?;

    info!(
        %load_date,
        dimensions = schema.dimensions.len(),
        facts = schema.facts.len(),
        "starting warehouse loader"
    );

    match (&config.source, &config.store) {
        (SourceConfig::Memory, StoreConfig::Memory) => {
            run_pipeline(schema, MemorySnapshotSource::new(), MemoryWarehouse::new(), load_date)
                .await
        }
        (SourceConfig::Memory, StoreConfig::Ndjson { dir }) => {
            run_pipeline(
                schema,
                MemorySnapshotSource::new(),
                NdjsonWarehouse::new(dir),
                load_date,
            )
            .await
        }
        (SourceConfig::Ndjson { dir }, StoreConfig::Memory) => {
            run_pipeline(
                schema,
                NdjsonSnapshotSource::new(dir),
                MemoryWarehouse::new(),
                load_date,
            )
            .await
        }
        (SourceConfig::Ndjson { dir: source_dir }, StoreConfig::Ndjson { dir: store_dir }) => {
            run_pipeline(
                schema,
                NdjsonSnapshotSource::new(source_dir),
                NdjsonWarehouse::new(store_dir),
                load_date,
            )
            .await
        }
    }
}

async fn run_pipeline<S, W>(
    schema: WarehouseSchema,
    source: S,
    store: W,
    load_date: NaiveDate,
) -> LoaderResult<LoadReport>
where
    S: SnapshotSource,
    W: WarehouseStore,
{
    let pipeline = LoadPipeline::new(schema, source, store);
    let report = pipeline.run(load_date).await?;

    info!("{report}");

    Ok(report)
}

/// Parses the configured load date override, defaulting to today.
fn resolve_load_date(configured: Option<&str>) -> LoaderResult<NaiveDate> {
    match configured {
        Some(raw) => raw
            .parse()
            .map_err(|err: chrono::ParseError| LoaderError::config(err)),
        None => Ok(Utc::now().date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_load_date_parses_override() {
        let date = resolve_load_date(Some("2024-03-01")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_resolve_load_date_rejects_garbage() {
        assert!(resolve_load_date(Some("yesterday")).is_err());
    }

    #[test]
    fn test_resolve_load_date_defaults_to_today() {
        assert!(resolve_load_date(None).is_ok());
    }
}
