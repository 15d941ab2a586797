use argh::FromArgs;
use chrono::Local;
use forecast_ingest::config::Config;
use forecast_ingest::db::{MemorySink, PostgresSink};
use forecast_ingest::ingest::ApiClients;
use forecast_ingest::locations;
use forecast_ingest::logging::{self, DataSource};
use forecast_ingest::model::IngestError;
use forecast_ingest::pipeline;
use forecast_ingest::schema::FORECAST_SCHEMA;

#[derive(FromArgs)]
/// Fetch daily forecasts for the target zip codes and store them
struct Args {
    /// optional TOML settings file
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// print the filtered batch as JSON instead of writing to the database
    #[argh(switch)]
    dry_run: bool,
}

fn main() {
    let args: Args = argh::from_env();

    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init_logger(config.log_level, config.log_file.as_deref()) {
        eprintln!("Failed to open log file: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&config, args.dry_run) {
        logging::log_failure(DataSource::System, None, "forecast ingest", &e);
        std::process::exit(1);
    }
}

fn run(config: &Config, dry_run: bool) -> Result<(), IngestError> {
    // Captured once; every record in the batch shares this instant
    let now = Local::now().fixed_offset();
    let clients = ApiClients::new(config)?;
    let zipcodes = locations::all_zipcodes();

    if dry_run {
        let mut sink = MemorySink::new();
        pipeline::run(&clients, &mut sink, zipcodes, now)?;
        println!(
            "{}",
            serde_json::to_string_pretty(sink.records(FORECAST_SCHEMA.name))?
        );
    } else {
        let mut sink = PostgresSink::connect(config.require_database_url()?)?;
        pipeline::run(&clients, &mut sink, zipcodes, now)?;
    }

    Ok(())
}
