//! One ingest run, end to end.
//!
//! resolve → fetch → project (per zip code, lazily) → collect → drop
//! incomplete rows → one `save` call. Any failure before the save loses
//! the whole batch; nothing is persisted for earlier zip codes.

use crate::batch::ForecastTable;
use crate::db::{RecordSink, SaveReceipt};
use crate::ingest::ForecastSource;
use crate::logging::{self, DataSource};
use crate::model::{IngestError, ZipCode};
use crate::projection::forecast_rows;
use crate::schema::FORECAST_SCHEMA;
use chrono::{DateTime, FixedOffset};

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Rows projected before filtering.
    pub rows: usize,
    /// Rows dropped for having an empty column.
    pub dropped: usize,
    pub receipt: SaveReceipt,
}

/// Run one ingest pass over `zipcodes`.
///
/// `now` must be captured by the caller once, before this is called; it
/// stamps `date_fetched` on every record of the batch.
pub fn run<S, K>(
    source: &S,
    sink: &mut K,
    zipcodes: Vec<ZipCode>,
    now: DateTime<FixedOffset>,
) -> Result<RunSummary, IngestError>
where
    S: ForecastSource + ?Sized,
    K: RecordSink + ?Sized,
{
    logging::info(
        DataSource::System,
        None,
        &format!(
            "starting run for {} zip code(s), fetched at {}",
            zipcodes.len(),
            now.to_rfc3339()
        ),
    );

    let table = ForecastTable::collect(forecast_rows(source, zipcodes, now))?;
    let rows = table.len();

    let batch = table.drop_incomplete();
    batch.log_preview();

    let receipt = sink.save(&FORECAST_SCHEMA, &batch.to_records())?;

    logging::info(
        DataSource::System,
        None,
        &format!(
            "run complete: {} rows projected, {} dropped, {} written to {}",
            rows, batch.dropped, receipt.written, receipt.table
        ),
    );

    Ok(RunSummary {
        rows,
        dropped: batch.dropped,
        receipt,
    })
}
