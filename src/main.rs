use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use trip_atlas_stops::autocomplete::{self, NamedLocation, REFERENCE_LOCATIONS};
use trip_atlas_stops::index::FeedIndex;
use trip_atlas_stops::join::{OperatorScope, RouteCache};
use trip_atlas_stops::model::{AgencyId, Coordinate, RouteTypeCode};
use trip_atlas_stops::municipality::{self, Borders, DEFAULT_NAME_PROPERTY};
use trip_atlas_stops::report::{self, AutocompleteReport};
use trip_atlas_stops::{aggregate, feed};

#[derive(Parser, Debug)]
#[command(
    name = "trip-atlas-stops",
    version,
    about = "Stop statistics and stop name search on a GTFS feed"
)]
struct Args {
    /// GTFS feed, either a zip archive or an extracted folder
    feed: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Show debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare the stop name search strategies for a query
    Autocomplete {
        query: String,
        /// Latitude of the user, replaces the built-in reference cities
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Stops of an operator ordered by the average number of daily stops
    StopsBySize { agency: String },
    /// Route types available at each stop
    Modes {
        #[arg(long)]
        agency: Option<String>,
    },
    /// Stops of an operator grouped by basic transport mode
    StopsByMode { agency: String },
    /// Stops where an operator runs any of the given route types
    StopsForModes {
        agency: String,
        /// Comma separated route type codes, e.g. 700,401
        #[arg(value_delimiter = ',', required = true)]
        codes: Vec<RouteTypeCode>,
    },
    /// Average departures per day for every stop, as CSV
    AverageDepartures {
        /// Write the CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Append the municipality to every stop name, as CSV
    Municipalities {
        /// GeoJSON feature collection with municipality borders
        borders: PathBuf,
        /// Feature property holding the municipality name
        #[arg(long, default_value = DEFAULT_NAME_PROPERTY)]
        name_property: String,
        /// Write the CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logger(verbose: bool) -> Result<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()?;
    Ok(())
}

async fn load_index(feed_path: PathBuf) -> Result<FeedIndex> {
    let index = tokio::task::spawn_blocking(move || -> Result<FeedIndex> {
        let records = feed::load_feed(&feed_path)?;
        Ok(FeedIndex::build(records)?)
    })
    .await
    .context("Feed loading task failed")??;
    log::info!(
        "Indexed {} stops, {} trips over {} service days.",
        index.stops().len(),
        index.trip_count(),
        index.days_seen()
    );
    Ok(index)
}

fn autocomplete_stops(
    index: &FeedIndex,
    query: &str,
    position: Option<Coordinate>,
    json: bool,
) -> Result<()> {
    let locations = match position {
        Some(coordinate) => vec![NamedLocation {
            name: "the given position",
            coordinate,
        }],
        None => REFERENCE_LOCATIONS.to_vec(),
    };
    let reports: Vec<_> = locations
        .into_iter()
        .map(|location| AutocompleteReport {
            query,
            location,
            results: autocomplete::autocomplete(index.stops(), query, location.coordinate),
        })
        .collect();

    let mut out = std::io::stdout().lock();
    if json {
        return report::write_json(&mut out, &reports);
    }
    for report in &reports {
        report::write_autocomplete(&mut out, report)?;
    }
    Ok(())
}

fn stops_by_size(index: &FeedIndex, agency_id: AgencyId, json: bool) -> Result<()> {
    let mut cache = RouteCache::new(index);
    let averages = aggregate::average_daily_stops(&mut cache, agency_id);
    cache.finish("stops-by-size");

    let mut out = std::io::stdout().lock();
    if json {
        report::write_json(&mut out, &averages)
    } else {
        report::write_stop_averages(&mut out, &averages)
    }
}

fn modes(index: &FeedIndex, scope: OperatorScope, json: bool) -> Result<()> {
    let mut cache = RouteCache::new(index);
    let modes = aggregate::transport_modes_by_stop(&mut cache, scope);
    cache.finish("modes");

    let mut out = std::io::stdout().lock();
    if json {
        report::write_json(&mut out, &modes)
    } else {
        report::write_stop_modes(&mut out, &modes)
    }
}

fn stops_by_mode(index: &FeedIndex, agency_id: AgencyId, json: bool) -> Result<()> {
    let mut cache = RouteCache::new(index);
    let buckets = aggregate::stops_by_basic_mode(&mut cache, agency_id);
    cache.finish("stops-by-mode");

    let mut out = std::io::stdout().lock();
    if json {
        report::write_json(&mut out, &buckets)
    } else {
        report::write_stops_by_mode(&mut out, agency_id, &buckets)
    }
}

fn stops_for_modes(
    index: &FeedIndex,
    agency_id: AgencyId,
    codes: &[RouteTypeCode],
    json: bool,
) -> Result<()> {
    let whitelist: HashSet<RouteTypeCode> = codes.iter().copied().collect();
    let mut cache = RouteCache::new(index);
    let stop_ids = aggregate::stops_matching_mode_whitelist(&mut cache, agency_id, &whitelist);
    cache.finish("stops-for-modes");

    let mut out = std::io::stdout().lock();
    if json {
        report::write_json(&mut out, &stop_ids)
    } else {
        report::write_stop_ids(&mut out, &stop_ids)
    }
}

fn average_departures(index: &FeedIndex, output: Option<PathBuf>, json: bool) -> Result<()> {
    let mut cache = RouteCache::new(index);
    let departures = aggregate::average_departures_per_stop(&mut cache);
    cache.finish("average-departures");

    match output {
        Some(output_path) => {
            log::info!("Writing departures to {:?}", output_path);
            let file = std::fs::File::create(&output_path)
                .with_context(|| format!("Failed to create {:?}", output_path))?;
            report::write_departures_csv(file, &departures)
        }
        None if json => report::write_json(&mut std::io::stdout().lock(), &departures),
        None => report::write_departures_csv(std::io::stdout().lock(), &departures),
    }
}

fn municipalities(
    index: &FeedIndex,
    borders: &Borders,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let stops = municipality::assign_municipalities(index.stops(), borders);
    match output {
        Some(output_path) => {
            log::info!("Writing stops to {:?}", output_path);
            let file = std::fs::File::create(&output_path)
                .with_context(|| format!("Failed to create {:?}", output_path))?;
            report::write_municipalities_csv(file, &stops)
        }
        None if json => report::write_json(&mut std::io::stdout().lock(), &stops),
        None => report::write_municipalities_csv(std::io::stdout().lock(), &stops),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose)?;

    let index = load_index(args.feed).await?;
    match args.command {
        Command::Autocomplete { query, lat, lon } => {
            let position = lat.zip(lon).map(|(lat, lon)| Coordinate::new(lat, lon));
            autocomplete_stops(&index, &query, position, args.json)?;
        }
        Command::StopsBySize { agency } => {
            stops_by_size(&index, AgencyId::new(&agency), args.json)?;
        }
        Command::Modes { agency } => {
            let scope = OperatorScope::from(agency.as_deref().map(AgencyId::new));
            modes(&index, scope, args.json)?;
        }
        Command::StopsByMode { agency } => {
            stops_by_mode(&index, AgencyId::new(&agency), args.json)?;
        }
        Command::StopsForModes { agency, codes } => {
            stops_for_modes(&index, AgencyId::new(&agency), &codes, args.json)?;
        }
        Command::AverageDepartures { output } => {
            average_departures(&index, output, args.json)?;
        }
        Command::Municipalities {
            borders,
            name_property,
            output,
        } => {
            let borders = Borders::load(&borders, &name_property)?;
            municipalities(&index, &borders, output, args.json)?;
        }
    }
    std::io::stdout().flush()?;
    Ok(())
}
