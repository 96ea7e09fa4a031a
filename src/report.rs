use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::aggregate::{StopAverage, StopDepartures, StopModes, StopRef};
use crate::autocomplete::{NamedLocation, StrategyResult};
use crate::mode::BasicMode;
use crate::model::{AgencyId, StopId};
use crate::municipality::StopMunicipality;

/// Rounds half away from zero to the given number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn write_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct AutocompleteReport<'a> {
    pub query: &'a str,
    pub location: NamedLocation,
    pub results: Vec<StrategyResult>,
}

pub fn write_autocomplete(out: &mut impl Write, report: &AutocompleteReport) -> Result<()> {
    writeln!(
        out,
        "Search results for {} for a user in {}:",
        report.query, report.location.name
    )?;
    writeln!(out, "================================")?;
    for result in &report.results {
        writeln!(out, "{}:", result.strategy.description())?;
        for name in &result.names {
            writeln!(out, "{name}")?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn write_stop_averages(out: &mut impl Write, averages: &[StopAverage]) -> Result<()> {
    for average in averages {
        writeln!(out, "{}: {}", average.stop_id, round_to(average.average, 2))?;
    }
    Ok(())
}

pub fn write_stop_modes(out: &mut impl Write, modes: &[StopModes]) -> Result<()> {
    for stop in modes {
        let codes: Vec<String> = stop.route_types.iter().map(|code| code.to_string()).collect();
        writeln!(
            out,
            "At stop {} the following types of transport are available: {}",
            stop.stop_id,
            codes.join(",")
        )?;
    }
    Ok(())
}

pub fn write_stops_by_mode(
    out: &mut impl Write,
    agency_id: AgencyId,
    buckets: &BTreeMap<BasicMode, Vec<StopRef>>,
) -> Result<()> {
    writeln!(out, "Stops for operator {agency_id} per transport mode:")?;
    writeln!(out)?;
    for (mode, stops) in buckets {
        writeln!(out, "{mode}")?;
        writeln!(out, "===================")?;
        for stop in stops {
            writeln!(out, "{}, {}", stop.stop_id, stop.name)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_stop_ids(out: &mut impl Write, stop_ids: &[StopId]) -> Result<()> {
    for stop_id in stop_ids {
        writeln!(out, "{stop_id}")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct DepartureRow<'a> {
    stop_id: &'a str,
    stop_name: &'a str,
    stop_lat: f64,
    stop_lon: f64,
    avg_stop_times: String,
}

/// Stops without any stop times get a plain `0`.
fn format_average_departures(stop: &StopDepartures) -> String {
    if stop.stop_times == 0 {
        "0".to_string()
    } else {
        format!("{:?}", round_to(stop.average, 4))
    }
}

/// Writes one CSV row per stop, with a header line.
pub fn write_departures_csv(out: impl Write, departures: &[StopDepartures]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for stop in departures {
        writer.serialize(DepartureRow {
            stop_id: stop.stop_id.as_str(),
            stop_name: &stop.name,
            stop_lat: stop.location.latitude,
            stop_lon: stop.location.longitude,
            avg_stop_times: format_average_departures(stop),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct StopRow<'a> {
    stop_id: &'a str,
    stop_name: &'a str,
    stop_lat: f64,
    stop_lon: f64,
}

/// Writes stops with their municipality appended to the name, in stops.txt columns.
pub fn write_municipalities_csv(out: impl Write, stops: &[StopMunicipality]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for stop in stops {
        writer.serialize(StopRow {
            stop_id: stop.stop_id.as_str(),
            stop_name: &stop.name,
            stop_lat: stop.location.latitude,
            stop_lon: stop.location.longitude,
        })?;
    }
    writer.flush()?;
    Ok(())
}
