use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use indicatif::ProgressIterator;

use crate::error::{FeedError, Result};
use crate::model::*;

/// Lookup tables over one loaded feed. Built once, read-only afterwards.
#[derive(Debug)]
pub struct FeedIndex {
    stops: Vec<Stop>,
    trip_by_id: HashMap<TripId, Trip>,
    route_by_id: HashMap<RouteId, Route>,
    service_dates_by_service_id: HashMap<ServiceId, HashSet<NaiveDate>>,
    stop_times_by_stop_id: HashMap<StopId, Vec<StopTime>>,
    // Distinct dates over every service in the feed.
    days_seen: usize,
}

pub(crate) fn progress_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {human_pos:>7}/{human_len:7} {msg}",
    )
    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
}

impl FeedIndex {
    pub fn build(records: FeedRecords) -> Result<FeedIndex> {
        let FeedRecords {
            stops,
            routes,
            trips,
            service_dates,
            stop_times,
        } = records;

        log::info!("Indexing {} stops.", stops.len());
        for stop in &stops {
            if stop.id.as_str().is_empty() {
                return Err(FeedError::malformed("stops", &stop.name, "empty stop_id"));
            }
            if !stop.location.latitude.is_finite() || !stop.location.longitude.is_finite() {
                return Err(FeedError::malformed(
                    "stops",
                    stop.id.as_str(),
                    "coordinates are not finite",
                ));
            }
        }

        log::info!("Indexing {} routes.", routes.len());
        let mut route_by_id = HashMap::with_capacity(routes.len());
        for route in routes {
            if route.id.as_str().is_empty() {
                return Err(FeedError::malformed("routes", "", "empty route_id"));
            }
            route_by_id.insert(route.id, route);
        }

        log::info!("Indexing {} trips.", trips.len());
        let mut trip_by_id = HashMap::with_capacity(trips.len());
        for trip in trips {
            if trip.id.as_str().is_empty() {
                return Err(FeedError::malformed("trips", "", "empty trip_id"));
            }
            if trip_by_id.insert(trip.id, trip).is_some() {
                log::debug!("Duplicate trip id, keeping the last one.");
            }
        }

        log::info!("Indexing {} service dates.", service_dates.len());
        let mut service_dates_by_service_id: HashMap<ServiceId, HashSet<NaiveDate>> =
            HashMap::new();
        let mut all_dates = HashSet::new();
        for service_date in service_dates {
            service_dates_by_service_id
                .entry(service_date.service_id)
                .or_default()
                .insert(service_date.date);
            all_dates.insert(service_date.date);
        }

        let mut stop_times_by_stop_id: HashMap<StopId, Vec<StopTime>> = HashMap::new();
        for stop_time in stop_times
            .into_iter()
            .progress_with_style(progress_style())
            .with_message("Group stop times by stop.")
            .with_finish(indicatif::ProgressFinish::AndLeave)
        {
            stop_times_by_stop_id
                .entry(stop_time.stop_id)
                .or_default()
                .push(stop_time);
        }

        Ok(FeedIndex {
            stops,
            trip_by_id,
            route_by_id,
            service_dates_by_service_id,
            stop_times_by_stop_id,
            days_seen: all_dates.len(),
        })
    }

    /// Stops in feed order.
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn trip(&self, id: TripId) -> Option<&Trip> {
        self.trip_by_id.get(&id)
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.route_by_id.get(&id)
    }

    pub fn trip_count(&self) -> usize {
        self.trip_by_id.len()
    }

    pub fn service_dates(&self, id: ServiceId) -> Option<&HashSet<NaiveDate>> {
        self.service_dates_by_service_id.get(&id)
    }

    /// Number of distinct days a service runs. Unknown services run on 0 days.
    pub fn service_day_count(&self, id: ServiceId) -> usize {
        self.service_dates(id).map_or(0, |dates| dates.len())
    }

    /// Stop times at a stop, in feed order.
    pub fn stop_times_at(&self, stop_id: StopId) -> &[StopTime] {
        self.stop_times_by_stop_id
            .get(&stop_id)
            .map(|stop_times| stop_times.as_slice())
            .unwrap_or(&[])
    }

    pub fn days_seen(&self) -> usize {
        self.days_seen
    }
}
