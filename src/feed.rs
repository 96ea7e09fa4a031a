use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{Datelike, NaiveDate, Weekday};
use gtfs_structures::{Calendar, Exception, LocationType};
use serde::Deserialize;

use crate::error::{FeedError, Result};
use crate::mode::route_type_code;
use crate::model::*;

/// Reads a GTFS archive (zip file or extracted folder) into plain records.
pub fn load_feed(gtfs_path: &Path) -> Result<FeedRecords> {
    log::info!("Loading GTFS data from {:?}", gtfs_path);
    let read_error = |source| FeedError::FeedRead {
        path: gtfs_path.to_path_buf(),
        source,
    };
    let gtfs = gtfs_structures::RawGtfs::from_path(gtfs_path).map_err(read_error)?;

    log::info!("Preparing agencies.");
    let agencies = gtfs.agencies.map_err(read_error)?;
    // Routes may leave agency_id empty when the feed has a single agency.
    let sole_agency = match agencies.as_slice() {
        [agency] => agency.id.as_deref().map(AgencyId::new),
        _ => None,
    };

    log::info!("Preparing stops...");
    let mut stops = vec![];
    for stop in gtfs.stops.map_err(read_error)? {
        let (Some(latitude), Some(longitude)) = (stop.latitude, stop.longitude) else {
            if matches!(
                stop.location_type,
                LocationType::GenericNode | LocationType::BoardingArea
            ) {
                log::debug!("Skipping stop {} without coordinates.", stop.id);
                continue;
            }
            return Err(FeedError::malformed("stops", &stop.id, "missing coordinates"));
        };
        stops.push(Stop {
            id: StopId::new(&stop.id),
            name: stop.name.clone().unwrap_or_default(),
            location: Coordinate::new(latitude, longitude),
        });
    }

    log::info!("Preparing routes.");
    let parsed_routes = gtfs.routes.map_err(read_error)?;
    let raw_route_types = read_raw_route_types(gtfs_path)?;
    let mut routes = vec![];
    for route in parsed_routes {
        let agency_id = match (&route.agency_id, sole_agency) {
            (Some(agency_id), _) => AgencyId::new(agency_id),
            (None, Some(agency_id)) => agency_id,
            (None, None) => AgencyId::new(""),
        };
        routes.push(Route {
            id: RouteId::new(&route.id),
            agency_id,
            route_type: raw_route_types
                .get(&route.id)
                .copied()
                .unwrap_or_else(|| route_type_code(route.route_type)),
        });
    }

    log::info!("Preparing trips.");
    let mut trips = vec![];
    for trip in gtfs.trips.map_err(read_error)? {
        trips.push(Trip {
            id: TripId::new(&trip.id),
            route_id: RouteId::new(&trip.route_id),
            service_id: ServiceId::new(&trip.service_id),
        });
    }

    log::info!("Preparing calendars.");
    let mut operating_days = BTreeSet::new();
    if let Some(calendars) = gtfs.calendar {
        for calendar in calendars.map_err(read_error)? {
            let service_id = ServiceId::new(&calendar.id);
            for date in days_in_service(&calendar) {
                operating_days.insert((service_id, date));
            }
        }
    }
    if let Some(calendar_dates) = gtfs.calendar_dates {
        for calendar_date in calendar_dates.map_err(read_error)? {
            let key = (ServiceId::new(&calendar_date.service_id), calendar_date.date);
            match calendar_date.exception_type {
                Exception::Added => {
                    operating_days.insert(key);
                }
                Exception::Deleted => {
                    operating_days.remove(&key);
                }
            }
        }
    }
    let service_dates = operating_days
        .into_iter()
        .map(|(service_id, date)| ServiceDate { service_id, date })
        .collect();

    log::info!("Preparing stop times.");
    let stop_times = gtfs
        .stop_times
        .map_err(read_error)?
        .iter()
        .map(|stop_time| StopTime {
            trip_id: TripId::new(&stop_time.trip_id),
            stop_id: StopId::new(&stop_time.stop_id),
        })
        .collect();

    Ok(FeedRecords {
        stops,
        routes,
        trips,
        service_dates,
        stop_times,
    })
}

#[derive(Deserialize)]
struct RouteTypeRecord {
    route_id: String,
    route_type: String,
}

/// Route types exactly as written in routes.txt.
///
/// The GTFS parser folds extended route types into basic ones (700 becomes 3),
/// so the codes are read a second time without interpretation.
fn read_raw_route_types(gtfs_path: &Path) -> Result<HashMap<String, RouteTypeCode>> {
    let io_error = |source| FeedError::Io {
        path: gtfs_path.to_path_buf(),
        source,
    };
    if gtfs_path.is_dir() {
        let file = File::open(gtfs_path.join("routes.txt")).map_err(io_error)?;
        return parse_route_types(file, gtfs_path);
    }

    let archive_error = |source| FeedError::Archive {
        path: gtfs_path.to_path_buf(),
        source,
    };
    let file = File::open(gtfs_path).map_err(io_error)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(archive_error)?;
    let entry_name = archive
        .file_names()
        .find(|name| *name == "routes.txt" || name.ends_with("/routes.txt"))
        .map(str::to_owned);
    let Some(entry_name) = entry_name else {
        log::warn!("No routes.txt in {:?}, using parsed route types.", gtfs_path);
        return Ok(HashMap::new());
    };
    let entry = archive.by_name(&entry_name).map_err(archive_error)?;
    parse_route_types(entry, gtfs_path)
}

fn parse_route_types(reader: impl Read, gtfs_path: &Path) -> Result<HashMap<String, RouteTypeCode>> {
    let mut route_types = HashMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    for rec in reader.deserialize() {
        let rec: RouteTypeRecord = rec.map_err(|source| FeedError::Csv {
            path: gtfs_path.to_path_buf(),
            table: "routes",
            source,
        })?;
        match rec.route_type.parse() {
            Ok(code) => {
                route_types.insert(rec.route_id, code);
            }
            Err(_) => log::debug!(
                "Route {} has route type {:?}, which is not a number.",
                rec.route_id,
                rec.route_type
            ),
        }
    }
    Ok(route_types)
}

fn runs_on_weekday(calendar: &Calendar, weekday: Weekday) -> bool {
    match weekday {
        Weekday::Mon => calendar.monday,
        Weekday::Tue => calendar.tuesday,
        Weekday::Wed => calendar.wednesday,
        Weekday::Thu => calendar.thursday,
        Weekday::Fri => calendar.friday,
        Weekday::Sat => calendar.saturday,
        Weekday::Sun => calendar.sunday,
    }
}

/// Every date between start and end (inclusive) on which the weekly schedule runs.
fn days_in_service(calendar: &Calendar) -> impl Iterator<Item = NaiveDate> + '_ {
    calendar
        .start_date
        .iter_days()
        .take_while(move |date| *date <= calendar.end_date)
        .filter(move |date| runs_on_weekday(calendar, date.weekday()))
}
