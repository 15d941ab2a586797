//! Daily forecast ingest.
//!
//! Resolves each target zip code to coordinates, fetches the multi-day
//! forecast for those coordinates, flattens the daily entries into rows and
//! upserts the complete rows into Postgres in a single batch.

pub mod batch;
pub mod config;
pub mod db;
pub mod ingest;
pub mod locations;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod projection;
pub mod schema;
