//! Row projection: nested forecast payloads in, flat rows out.
//!
//! `forecast_rows` walks the target zip codes in order and, for each one,
//! resolves its location, fetches its forecast and yields one `ForecastRow`
//! per daily entry in the order the provider returned them. Network calls
//! happen lazily as the iterator advances, and the iterator cannot be
//! restarted: it owns the zip code list and is spent after one pass.
//!
//! The first error ends the sequence. Callers collecting into a `Result`
//! therefore abort the whole run on any failed call.

use crate::ingest::darksky::DailyEntry;
use crate::ingest::ForecastSource;
use crate::locations;
use crate::logging::{self, DataSource};
use crate::model::{ForecastRow, IngestError, Location, ZipCode, SOURCE_DARKSKY};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use chrono_tz::Tz;
use std::iter::FusedIterator;

/// Zone in which a day's timestamp is read as a calendar date.
///
/// Daily timestamps are local midnights, so the date has to come from a real
/// zone with DST rules, not from a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayZone {
    /// The forecast location's zone, as named by the provider.
    Named(Tz),
    /// The host's local zone, used when the provider names none.
    Host,
}

impl DayZone {
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            DayZone::Named(tz) => at.with_timezone(tz).date_naive(),
            DayZone::Host => at.with_timezone(&Local).date_naive(),
        }
    }
}

/// Everything a row carries besides the day's own metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct RowContext {
    pub zipcode: ZipCode,
    pub location: Location,
    /// Shared by every row of the run.
    pub date_fetched: NaiveDate,
    pub zone: DayZone,
}

/// Project one daily entry. Absent metrics stay `None`; they are not
/// defaulted.
pub fn project_day(ctx: &RowContext, day: &DailyEntry) -> Result<ForecastRow, IngestError> {
    Ok(ForecastRow {
        source: SOURCE_DARKSKY.to_string(),
        date_fetched: ctx.date_fetched,
        date: day.time.map(|t| local_date(t, ctx.zone)).transpose()?,
        zipcode: ctx.zipcode.clone(),
        latitude: ctx.location.latitude,
        longitude: ctx.location.longitude,
        tmax: day.temperature_high,
        tmin: day.temperature_low,
        humidity: day.humidity,
        wind_speed: day.wind_speed,
        pressure: day.pressure,
        precip_total: day.precip_intensity_max,
        precip_prob: day.precip_probability,
        sunrise: day.sunrise_time.map(utc_timestamp).transpose()?,
        sunset: day.sunset_time.map(utc_timestamp).transpose()?,
        cloud_cover: day.cloud_cover,
        heat_index: day.apparent_temperature_high,
    })
}

fn utc_timestamp(secs: i64) -> Result<DateTime<Utc>, IngestError> {
    DateTime::from_timestamp(secs, 0).ok_or(IngestError::InvalidTimestamp(secs))
}

fn local_date(secs: i64, zone: DayZone) -> Result<NaiveDate, IngestError> {
    Ok(zone.date_of(utc_timestamp(secs)?))
}

/// Lazily project rows for `zipcodes`.
///
/// `now` is captured once by the caller before the first fetch; its
/// calendar date becomes `date_fetched` for every row.
pub fn forecast_rows<S>(source: &S, zipcodes: Vec<ZipCode>, now: DateTime<FixedOffset>) -> ForecastRows<'_, S>
where
    S: ForecastSource + ?Sized,
{
    ForecastRows {
        source,
        zipcodes: zipcodes.into_iter(),
        date_fetched: now.date_naive(),
        current: None,
        halted: false,
    }
}

/// Iterator returned by [`forecast_rows`].
pub struct ForecastRows<'a, S: ForecastSource + ?Sized> {
    source: &'a S,
    zipcodes: std::vec::IntoIter<ZipCode>,
    date_fetched: NaiveDate,
    current: Option<ZipForecast>,
    halted: bool,
}

struct ZipForecast {
    ctx: RowContext,
    days: std::vec::IntoIter<DailyEntry>,
}

impl<S: ForecastSource + ?Sized> ForecastRows<'_, S> {
    /// Resolve and fetch for one zip code.
    fn open(&self, zipcode: ZipCode) -> Result<ZipForecast, IngestError> {
        let location = self.source.locate(&zipcode)?;
        let payload = self.source.forecast(location.longitude, location.latitude)?;
        let zone = match payload.zone() {
            Some(tz) => DayZone::Named(tz),
            None => {
                logging::warn(
                    DataSource::Forecast,
                    Some(zipcode.as_str()),
                    &format!(
                        "no usable time zone in forecast ({:?}), dating days in host zone",
                        payload.timezone
                    ),
                );
                DayZone::Host
            }
        };

        logging::info(
            DataSource::Forecast,
            Some(zipcode.as_str()),
            &format!(
                "projecting {} forecast days for {}",
                payload.daily.data.len(),
                locations::describe(&zipcode)
            ),
        );

        Ok(ZipForecast {
            ctx: RowContext {
                zipcode,
                location,
                date_fetched: self.date_fetched,
                zone,
            },
            days: payload.daily.data.into_iter(),
        })
    }
}

impl<S: ForecastSource + ?Sized> Iterator for ForecastRows<'_, S> {
    type Item = Result<ForecastRow, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.halted {
                return None;
            }

            if let Some(current) = self.current.as_mut() {
                if let Some(day) = current.days.next() {
                    let row = project_day(&current.ctx, &day);
                    if row.is_err() {
                        self.halted = true;
                    }
                    return Some(row);
                }
                self.current = None;
            }

            let zipcode = self.zipcodes.next()?;
            match self.open(zipcode) {
                Ok(forecast) => self.current = Some(forecast),
                Err(e) => {
                    self.halted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<S: ForecastSource + ?Sized> FusedIterator for ForecastRows<'_, S> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::darksky::{DailyBlock, ForecastPayload};
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Canned collaborator that records every call it receives.
    struct FakeSource {
        locations: HashMap<String, Location>,
        payloads: Vec<((f64, f64), ForecastPayload)>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new() -> Self {
            FakeSource {
                locations: HashMap::new(),
                payloads: Vec::new(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn with(mut self, zip: &str, location: Location, days: Vec<DailyEntry>) -> Self {
            self.locations.insert(zip.to_string(), location);
            self.payloads.push((
                (location.longitude, location.latitude),
                payload(days),
            ));
            self
        }
    }

    impl ForecastSource for FakeSource {
        fn locate(&self, zipcode: &ZipCode) -> Result<Location, IngestError> {
            self.calls.borrow_mut().push(format!("locate {}", zipcode));
            self.locations
                .get(zipcode.as_str())
                .copied()
                .ok_or_else(|| IngestError::HttpStatus {
                    url: format!("fake/info.json/{}/degrees", zipcode),
                    status: 404,
                })
        }

        fn forecast(&self, longitude: f64, latitude: f64) -> Result<ForecastPayload, IngestError> {
            self.calls
                .borrow_mut()
                .push(format!("forecast {},{}", latitude, longitude));
            self.payloads
                .iter()
                .find(|(key, _)| *key == (longitude, latitude))
                .map(|(_, p)| p.clone())
                .ok_or_else(|| IngestError::HttpStatus {
                    url: format!("fake/{},{}", latitude, longitude),
                    status: 500,
                })
        }
    }

    fn payload(days: Vec<DailyEntry>) -> ForecastPayload {
        ForecastPayload {
            latitude: None,
            longitude: None,
            timezone: Some("America/New_York".to_string()),
            daily: DailyBlock { summary: None, data: days },
        }
    }

    fn day(time: i64, high: f64) -> DailyEntry {
        DailyEntry {
            time: Some(time),
            temperature_high: Some(high),
            temperature_low: Some(55.0),
            humidity: Some(0.5),
            wind_speed: Some(5.0),
            pressure: Some(1013.0),
            precip_intensity_max: Some(0.0),
            precip_probability: Some(0.0),
            sunrise_time: Some(time - 30000),
            sunset_time: Some(time + 10000),
            cloud_cover: Some(0.2),
            apparent_temperature_high: Some(high + 1.0),
        }
    }

    fn richmond() -> Location {
        Location { latitude: 37.5, longitude: -77.32 }
    }

    fn eastern_now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 11, 14, 9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_single_day_scenario() {
        let source = FakeSource::new().with("23250", richmond(), vec![day(1700000000, 75.0)]);

        let rows: Vec<ForecastRow> = forecast_rows(&source, vec![ZipCode::from("23250")], eastern_now())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.source, "Darksky");
        assert_eq!(row.zipcode.as_str(), "23250");
        assert_eq!(row.latitude, 37.5);
        assert_eq!(row.longitude, -77.32);
        assert_eq!(row.tmax, Some(75.0));
        assert_eq!(row.tmin, Some(55.0));
        assert_eq!(row.heat_index, Some(76.0));
        assert_eq!(row.date_fetched, NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
        // 1700000000 is 2023-11-14 22:13:20 UTC, 17:13 in UTC-5
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2023, 11, 14));
        assert_eq!(row.sunrise, Some(Utc.timestamp_opt(1699970000, 0).unwrap()));
    }

    #[test]
    fn test_n_days_yield_n_rows_in_provider_order() {
        // Deliberately out of chronological order
        let days = vec![day(1700172800, 60.0), day(1700000000, 75.0), day(1700086400, 70.0)];
        let source = FakeSource::new().with("23250", richmond(), days);

        let rows: Vec<ForecastRow> = forecast_rows(&source, vec![ZipCode::from("23250")], eastern_now())
            .collect::<Result<_, _>>()
            .unwrap();

        let highs: Vec<_> = rows.iter().map(|r| r.tmax).collect();
        assert_eq!(highs, vec![Some(60.0), Some(75.0), Some(70.0)]);
    }

    #[test]
    fn test_rows_carry_their_zipcodes_coordinates_and_shared_date_fetched() {
        let dc = Location { latitude: 38.9, longitude: -77.04 };
        let source = FakeSource::new()
            .with("23250", richmond(), vec![day(1700000000, 75.0), day(1700086400, 70.0)])
            .with("20001", dc, vec![day(1700000000, 68.0)]);

        let zips = vec![ZipCode::from("23250"), ZipCode::from("20001")];
        let rows: Vec<ForecastRow> = forecast_rows(&source, zips, eastern_now())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 3);
        for row in &rows {
            let expected = if row.zipcode.as_str() == "23250" { richmond() } else { dc };
            assert_eq!((row.latitude, row.longitude), (expected.latitude, expected.longitude));
            assert_eq!(row.date_fetched, rows[0].date_fetched);
        }
        assert_eq!(rows[2].zipcode.as_str(), "20001");
    }

    #[test]
    fn test_fetches_are_lazy_and_sequential() {
        let dc = Location { latitude: 38.9, longitude: -77.04 };
        let source = FakeSource::new()
            .with("23250", richmond(), vec![day(1700000000, 75.0)])
            .with("20001", dc, vec![day(1700000000, 68.0)]);

        let mut rows = forecast_rows(
            &source,
            vec![ZipCode::from("23250"), ZipCode::from("20001")],
            eastern_now(),
        );
        assert!(source.calls.borrow().is_empty());

        rows.next().unwrap().unwrap();
        assert_eq!(*source.calls.borrow(), vec!["locate 23250", "forecast 37.5,-77.32"]);

        rows.next().unwrap().unwrap();
        assert_eq!(source.calls.borrow().len(), 4);
        assert_eq!(source.calls.borrow()[2], "locate 20001");

        assert!(rows.next().is_none());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_first_failure_ends_the_sequence() {
        let source = FakeSource::new().with("20001", richmond(), vec![day(1700000000, 68.0)]);

        let mut rows = forecast_rows(
            &source,
            vec![ZipCode::from("99999"), ZipCode::from("20001")],
            eastern_now(),
        );

        let first = rows.next().unwrap();
        assert!(matches!(first, Err(IngestError::HttpStatus { status: 404, .. })));
        assert!(rows.next().is_none());
        // The second zip code is never attempted
        assert_eq!(source.calls.borrow().len(), 1);
    }

    #[test]
    fn test_missing_metric_is_left_empty() {
        let mut entry = day(1700000000, 75.0);
        entry.humidity = None;
        let source = FakeSource::new().with("23250", richmond(), vec![entry]);

        let rows: Vec<ForecastRow> = forecast_rows(&source, vec![ZipCode::from("23250")], eastern_now())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows[0].humidity, None);
        assert_eq!(rows[0].missing_columns(), vec!["humidity"]);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let ctx = RowContext {
            zipcode: ZipCode::from("23250"),
            location: richmond(),
            date_fetched: NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
            zone: DayZone::Named(chrono_tz::America::New_York),
        };
        let entry = day(1700000000, 75.0);

        assert_eq!(project_day(&ctx, &entry).unwrap(), project_day(&ctx, &entry).unwrap());
    }

    #[test]
    fn test_day_date_uses_provider_zone() {
        // 1700000000 is 2023-11-14 22:13:20 UTC; in Tokyo it is already the 15th
        let ctx = RowContext {
            zipcode: ZipCode::from("23250"),
            location: richmond(),
            date_fetched: NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
            zone: DayZone::Named(chrono_tz::Asia::Tokyo),
        };
        let row = project_day(&ctx, &day(1700000000, 75.0)).unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2023, 11, 15));
    }

    #[test]
    fn test_out_of_range_timestamp_is_an_error() {
        let ctx = RowContext {
            zipcode: ZipCode::from("23250"),
            location: richmond(),
            date_fetched: NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
            zone: DayZone::Named(chrono_tz::Tz::UTC),
        };
        let mut entry = day(1700000000, 75.0);
        entry.sunset_time = Some(i64::MAX);

        let err = project_day(&ctx, &entry).unwrap_err();
        assert!(matches!(err, IngestError::InvalidTimestamp(i64::MAX)));
    }

    #[test]
    fn test_days_across_spring_forward_keep_distinct_dates() {
        use crate::batch::ForecastTable;
        use crate::db::{MemorySink, RecordSink};
        use crate::schema::FORECAST_SCHEMA;

        // New York local midnights 2024-03-08 .. 2024-03-11. DST starts on
        // the 10th, so the last gap is 23 hours.
        let days = vec![
            day(1709874000, 60.0),
            day(1709960400, 61.0),
            day(1710046800, 62.0),
            day(1710129600, 63.0),
        ];
        let source = FakeSource::new().with("23250", richmond(), days);
        let now = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 8, 9, 0, 0)
            .unwrap();

        let table = ForecastTable::collect(forecast_rows(&source, vec![ZipCode::from("23250")], now))
            .unwrap();
        let batch = table.drop_incomplete();
        let dates: Vec<_> = batch.records.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-03-08", "2024-03-09", "2024-03-10", "2024-03-11"]);

        let mut sink = MemorySink::new();
        sink.save(&FORECAST_SCHEMA, &batch.to_records()).unwrap();
        assert_eq!(sink.records(FORECAST_SCHEMA.name).len(), 4);
    }

    #[test]
    fn test_unnamed_zone_falls_back_to_host_zone() {
        let mut source = FakeSource::new().with("23250", richmond(), vec![day(1700000000, 75.0)]);
        source.payloads[0].1.timezone = Some("Not/A_Zone".to_string());

        let rows: Vec<ForecastRow> = forecast_rows(&source, vec![ZipCode::from("23250")], eastern_now())
            .collect::<Result<_, _>>()
            .unwrap();

        let expected = Utc.timestamp_opt(1700000000, 0).unwrap().with_timezone(&Local).date_naive();
        assert_eq!(rows[0].date, Some(expected));
    }
}
