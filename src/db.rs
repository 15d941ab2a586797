//! Storage sinks.
//!
//! `RecordSink` is the black-box `save(schema, records)` collaborator. The
//! Postgres sink creates the table on first use and upserts the whole batch
//! in one transaction, keyed by the schema's primary key. `MemorySink` keeps
//! the same upsert semantics in process, for dry runs and tests.

use crate::logging::{self, DataSource};
use crate::model::IngestError;
use crate::schema::{ColumnType, ColumnValue, Record, TableSchema};
use chrono::{DateTime, NaiveDate, Utc};
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use std::collections::BTreeMap;

/// Acknowledgment returned by a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub table: String,
    /// Records handed to the sink.
    pub submitted: usize,
    /// Rows inserted or updated.
    pub written: u64,
}

pub trait RecordSink {
    /// Persist every record in one batch. Either all records are written or
    /// none are.
    fn save(&mut self, schema: &TableSchema, records: &[Record]) -> Result<SaveReceipt, IngestError>;
}

fn validate_all(schema: &TableSchema, records: &[Record]) -> Result<(), IngestError> {
    records.iter().try_for_each(|r| schema.validate(r))
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

pub struct PostgresSink {
    client: Client,
}

impl PostgresSink {
    pub fn connect(database_url: &str) -> Result<PostgresSink, IngestError> {
        let client = Client::connect(database_url, NoTls)?;
        logging::debug(DataSource::Database, None, "connected");
        Ok(PostgresSink { client })
    }

    /// Create the table and its retrieval index if they do not exist.
    pub fn ensure_table(&mut self, schema: &TableSchema) -> Result<(), IngestError> {
        self.client.batch_execute(&format!(
            "{};\n{};",
            schema.create_table_sql(),
            schema.create_order_index_sql()
        ))?;
        Ok(())
    }

    /// Stored rows for one zip code, newest fetch first.
    pub fn latest_for_zipcode(
        &mut self,
        schema: &TableSchema,
        zipcode: &str,
    ) -> Result<Vec<Record>, IngestError> {
        let rows = self
            .client
            .query(schema.latest_for_zipcode_sql().as_str(), &[&zipcode])?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = Record::new();
            for (i, column) in schema.columns.iter().enumerate() {
                let value = match column.kind {
                    ColumnType::Text => ColumnValue::Text(row.try_get::<_, String>(i)?),
                    ColumnType::Date => ColumnValue::Date(row.try_get::<_, NaiveDate>(i)?),
                    ColumnType::Float => ColumnValue::Float(row.try_get::<_, f64>(i)?),
                    ColumnType::Timestamp => {
                        ColumnValue::Timestamp(row.try_get::<_, DateTime<Utc>>(i)?)
                    }
                };
                record.insert(column.name.to_string(), value);
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn sql_param(value: &ColumnValue) -> &(dyn ToSql + Sync) {
    match value {
        ColumnValue::Text(v) => v,
        ColumnValue::Date(v) => v,
        ColumnValue::Float(v) => v,
        ColumnValue::Timestamp(v) => v,
    }
}

impl RecordSink for PostgresSink {
    fn save(&mut self, schema: &TableSchema, records: &[Record]) -> Result<SaveReceipt, IngestError> {
        validate_all(schema, records)?;
        self.ensure_table(schema)?;

        let sql = schema.upsert_sql();
        let mut tx = self.client.transaction()?;
        let statement = tx.prepare(&sql)?;

        let mut written = 0;
        for record in records {
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(schema.columns.len());
            for column in schema.columns {
                let value = record.get(column.name).ok_or_else(|| IngestError::SchemaMismatch {
                    table: schema.name.to_string(),
                    reason: format!("missing column '{}'", column.name),
                })?;
                params.push(sql_param(value));
            }
            written += tx.execute(&statement, &params)?;
        }
        tx.commit()?;

        logging::info(
            DataSource::Database,
            None,
            &format!("upserted {} rows into {}", written, schema.name),
        );

        Ok(SaveReceipt {
            table: schema.name.to_string(),
            submitted: records.len(),
            written,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps saved records per table, upserting on the primary key.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, Vec<Record>>,
    saves: usize,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn records(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of `save` calls received.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl RecordSink for MemorySink {
    fn save(&mut self, schema: &TableSchema, records: &[Record]) -> Result<SaveReceipt, IngestError> {
        validate_all(schema, records)?;
        self.saves += 1;

        let same_key = |a: &Record, b: &Record| {
            schema
                .primary_key
                .iter()
                .all(|k| a.get(*k) == b.get(*k))
        };

        let table = self.tables.entry(schema.name.to_string()).or_default();
        for record in records {
            match table.iter_mut().find(|existing| same_key(existing, record)) {
                Some(existing) => *existing = record.clone(),
                None => table.push(record.clone()),
            }
        }

        Ok(SaveReceipt {
            table: schema.name.to_string(),
            submitted: records.len(),
            written: records.len() as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
