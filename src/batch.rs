//! Batch assembly and filtering.
//!
//! Collects the projector's rows into one in-memory table, drops every row
//! with an empty column, and converts the survivors into uniform records for
//! the storage sink. The whole filtered batch is saved in a single call.

use crate::logging::{self, DataSource};
use crate::model::{ForecastRecord, ForecastRow, IngestError};
use crate::schema::{ColumnValue, Record};

/// Number of records logged as a preview once the batch is filtered.
pub const PREVIEW_ROWS: usize = 3;

/// All rows projected in one run, in projection order.
#[derive(Debug, Default)]
pub struct ForecastTable {
    rows: Vec<ForecastRow>,
}

impl ForecastTable {
    /// Drains `rows`. The first error aborts collection and is returned.
    pub fn collect<I>(rows: I) -> Result<ForecastTable, IngestError>
    where
        I: IntoIterator<Item = Result<ForecastRow, IngestError>>,
    {
        let rows = rows.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(ForecastTable { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop every row that has an empty column. Rows are dropped whole;
    /// nothing is defaulted.
    pub fn drop_incomplete(self) -> FilteredBatch {
        let total = self.rows.len();
        let mut records = Vec::with_capacity(total);

        for row in &self.rows {
            match row.complete() {
                Some(record) => records.push(record),
                None => logging::debug(
                    DataSource::System,
                    Some(row.zipcode.as_str()),
                    &format!(
                        "dropping row for {} (missing: {})",
                        row.date
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "unknown date".to_string()),
                        row.missing_columns().join(", ")
                    ),
                ),
            }
        }

        let dropped = total - records.len();
        logging::log_batch_summary(total, records.len(), dropped);

        FilteredBatch { records, dropped }
    }
}

impl FromIterator<ForecastRow> for ForecastTable {
    fn from_iter<T: IntoIterator<Item = ForecastRow>>(iter: T) -> Self {
        ForecastTable {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Complete records ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredBatch {
    pub records: Vec<ForecastRecord>,
    /// Rows removed for having an empty column.
    pub dropped: usize,
}

impl FilteredBatch {
    /// Uniform records, one per complete row, in table order.
    pub fn to_records(&self) -> Vec<Record> {
        self.records.iter().map(to_record).collect()
    }

    /// Log the head of the batch at debug level.
    pub fn log_preview(&self) {
        for record in self.records.iter().take(PREVIEW_ROWS) {
            logging::debug(
                DataSource::System,
                Some(record.zipcode.as_str()),
                &format!(
                    "{} tmax={} tmin={} humidity={} precip_prob={} heat_index={}",
                    record.date,
                    record.tmax,
                    record.tmin,
                    record.humidity,
                    record.precip_prob,
                    record.heat_index
                ),
            );
        }
    }
}

/// Flatten a record into column name → value.
pub fn to_record(record: &ForecastRecord) -> Record {
    let text = |s: &str| ColumnValue::Text(s.to_string());
    let cells = [
        ("source", text(&record.source)),
        ("date_fetched", ColumnValue::Date(record.date_fetched)),
        ("date", ColumnValue::Date(record.date)),
        ("zipcode", text(record.zipcode.as_str())),
        ("latitude", ColumnValue::Float(record.latitude)),
        ("longitude", ColumnValue::Float(record.longitude)),
        ("tmax", ColumnValue::Float(record.tmax)),
        ("tmin", ColumnValue::Float(record.tmin)),
        ("humidity", ColumnValue::Float(record.humidity)),
        ("wind_speed", ColumnValue::Float(record.wind_speed)),
        ("pressure", ColumnValue::Float(record.pressure)),
        ("precip_total", ColumnValue::Float(record.precip_total)),
        ("precip_prob", ColumnValue::Float(record.precip_prob)),
        ("sunrise", ColumnValue::Timestamp(record.sunrise)),
        ("sunset", ColumnValue::Timestamp(record.sunset)),
        ("cloud_cover", ColumnValue::Float(record.cloud_cover)),
        ("heat_index", ColumnValue::Float(record.heat_index)),
    ];

    cells
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
