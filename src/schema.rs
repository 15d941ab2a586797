//! Storage schema descriptors.
//!
//! A `TableSchema` is what the storage sink is handed alongside the records:
//! table name, primary key, retrieval order and per-column types. The SQL
//! helpers render it for Postgres.

use crate::model::IngestError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Descriptor types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Date,
    Float,
    Timestamp,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Date => "DATE",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Timestamp => "TIMESTAMPTZ",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Date => write!(f, "date"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Timestamp => write!(f, "timestamp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{} {}", self.column, direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: &'static str,
    pub primary_key: &'static [&'static str],
    pub order_by: OrderBy,
    pub columns: &'static [Column],
}

// ---------------------------------------------------------------------------
// Uniform records
// ---------------------------------------------------------------------------

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Text(String),
    Date(NaiveDate),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnType {
        match self {
            ColumnValue::Text(_) => ColumnType::Text,
            ColumnValue::Date(_) => ColumnType::Date,
            ColumnValue::Float(_) => ColumnType::Float,
            ColumnValue::Timestamp(_) => ColumnType::Timestamp,
        }
    }
}

/// Column name to value; the shape handed to a storage sink.
pub type Record = BTreeMap<String, ColumnValue>;

// ---------------------------------------------------------------------------
// Forecast table
// ---------------------------------------------------------------------------

const fn col(name: &'static str, kind: ColumnType) -> Column {
    Column { name, kind }
}

/// The daily forecast table. Column order matches `ForecastRecord`.
pub static FORECAST_SCHEMA: TableSchema = TableSchema {
    name: "daily_forecasts",
    primary_key: &["date", "date_fetched", "zipcode", "source"],
    order_by: OrderBy {
        column: "date_fetched",
        descending: true,
    },
    columns: &[
        col("source", ColumnType::Text),
        col("date_fetched", ColumnType::Date),
        col("date", ColumnType::Date),
        col("zipcode", ColumnType::Text),
        col("latitude", ColumnType::Float),
        col("longitude", ColumnType::Float),
        col("tmax", ColumnType::Float),
        col("tmin", ColumnType::Float),
        col("humidity", ColumnType::Float),
        col("wind_speed", ColumnType::Float),
        col("pressure", ColumnType::Float),
        col("precip_total", ColumnType::Float),
        col("precip_prob", ColumnType::Float),
        col("sunrise", ColumnType::Timestamp),
        col("sunset", ColumnType::Timestamp),
        col("cloud_cover", ColumnType::Float),
        col("heat_index", ColumnType::Float),
    ],
};

// ---------------------------------------------------------------------------
// Schema operations
// ---------------------------------------------------------------------------

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Checks that `record` has exactly this schema's columns, each with a
    /// value of the declared type.
    pub fn validate(&self, record: &Record) -> Result<(), IngestError> {
        let mismatch = |reason: String| IngestError::SchemaMismatch {
            table: self.name.to_string(),
            reason,
        };

        for column in self.columns {
            match record.get(column.name) {
                None => return Err(mismatch(format!("missing column '{}'", column.name))),
                Some(value) if value.kind() != column.kind => {
                    return Err(mismatch(format!(
                        "column '{}' is {}, expected {}",
                        column.name,
                        value.kind(),
                        column.kind
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(extra) = record.keys().find(|k| self.column(k).is_none()) {
            return Err(mismatch(format!("unknown column '{}'", extra)));
        }

        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` with every column `NOT NULL`.
    pub fn create_table_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {} {} NOT NULL", c.name, c.kind.sql_type()))
            .collect();
        defs.push(format!("    PRIMARY KEY ({})", self.primary_key.join(", ")));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            defs.join(",\n")
        )
    }

    /// Index backing the retrieval order.
    pub fn create_order_index_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {}_{}_idx ON {} ({})",
            self.name, self.order_by.column, self.name, self.order_by
        )
    }

    /// Insert one row, overwriting the non-key columns on a key conflict.
    /// Parameters follow `columns` order.
    pub fn upsert_sql(&self) -> String {
        let names = self.column_names();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
        let updates: Vec<String> = names
            .iter()
            .filter(|name| !self.primary_key.contains(*name))
            .map(|name| format!("{} = EXCLUDED.{}", name, name))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            self.name,
            names.join(", "),
            placeholders.join(", "),
            self.primary_key.join(", "),
            updates.join(", ")
        )
    }

    /// Rows for one zip code, newest fetch first.
    pub fn latest_for_zipcode_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE zipcode = $1 ORDER BY {}, date ASC",
            self.column_names().join(", "),
            self.name,
            self.order_by
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
