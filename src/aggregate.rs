use std::collections::{BTreeMap, HashMap, HashSet};

use indicatif::ProgressIterator;
use serde::Serialize;

use crate::index::{progress_style, FeedIndex};
use crate::join::{matches_agency, OperatorScope, RouteCache};
use crate::mode::BasicMode;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopAverage {
    pub stop_id: StopId,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopModes {
    pub stop_id: StopId,
    /// Distinct raw route types, in order of first encounter.
    pub route_types: Vec<RouteTypeCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopRef {
    pub stop_id: StopId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopDepartures {
    pub stop_id: StopId,
    pub name: String,
    pub location: Coordinate,
    /// Stop times at this stop whose trip is known.
    pub stop_times: usize,
    pub average: f64,
}

fn stops_with_progress<'a>(
    index: &'a FeedIndex,
    message: &'static str,
) -> impl Iterator<Item = &'a Stop> {
    index
        .stops()
        .iter()
        .progress_with_style(progress_style())
        .with_message(message)
        .with_finish(indicatif::ProgressFinish::AndLeave)
}

fn per_day(visits: usize, days_seen: usize) -> f64 {
    if days_seen == 0 {
        0.0
    } else {
        visits as f64 / days_seen as f64
    }
}

/// Average number of times per day an operator's vehicles stop at each stop.
///
/// Every trip serving a stop contributes the number of its visits to the stop
/// times the number of days its service runs. The sum is divided by the number
/// of distinct days seen in the whole feed, not only the operator's days.
/// The result is sorted ascending, smallest stops first. Stops the operator
/// does not serve are left out.
pub fn average_daily_stops(cache: &mut RouteCache, agency_id: AgencyId) -> Vec<StopAverage> {
    let index = cache.index();
    let days_seen = index.days_seen();
    if days_seen == 0 {
        log::warn!("The feed has no service dates, every average will be 0.");
    }

    let mut result = vec![];
    for stop in stops_with_progress(index, "Count visits per stop.") {
        let mut visits_by_trip: Vec<(TripId, usize)> = vec![];
        let mut position_by_trip: HashMap<TripId, usize> = HashMap::new();
        for stop_time in index.stop_times_at(stop.id) {
            let Some(route) = cache.resolve_route_for_trip(stop_time.trip_id) else {
                continue;
            };
            if !matches_agency(route, agency_id) {
                continue;
            }
            let position = *position_by_trip
                .entry(stop_time.trip_id)
                .or_insert_with(|| {
                    visits_by_trip.push((stop_time.trip_id, 0));
                    visits_by_trip.len() - 1
                });
            visits_by_trip[position].1 += 1;
        }
        if visits_by_trip.is_empty() {
            continue;
        }

        let servings: usize = visits_by_trip
            .iter()
            .filter_map(|(trip_id, visits)| {
                let trip = index.trip(*trip_id)?;
                Some(visits * index.service_day_count(trip.service_id))
            })
            .sum();
        result.push(StopAverage {
            stop_id: stop.id,
            average: per_day(servings, days_seen),
        });
    }

    result.sort_by(|a, b| a.average.total_cmp(&b.average));
    result
}

/// Distinct route types serving each stop. Stops without matching traffic are left out.
pub fn transport_modes_by_stop(cache: &mut RouteCache, scope: OperatorScope) -> Vec<StopModes> {
    let index = cache.index();
    let mut result = vec![];
    for stop in stops_with_progress(index, "Collect route types per stop.") {
        let mut route_types = vec![];
        for stop_time in index.stop_times_at(stop.id) {
            let Some(route) = cache.resolve_route_for_trip(stop_time.trip_id) else {
                continue;
            };
            if scope.admits(route) && !route_types.contains(&route.route_type) {
                route_types.push(route.route_type);
            }
        }
        if !route_types.is_empty() {
            result.push(StopModes {
                stop_id: stop.id,
                route_types,
            });
        }
    }
    result
}

/// Stops of one operator grouped by basic mode. A stop served by several modes
/// is listed under each of them. Route types without a basic mode are dropped.
pub fn stops_by_basic_mode(
    cache: &mut RouteCache,
    agency_id: AgencyId,
) -> BTreeMap<BasicMode, Vec<StopRef>> {
    let index = cache.index();
    let mut buckets: BTreeMap<BasicMode, Vec<StopRef>> = BTreeMap::new();
    let mut unknown_routes = HashSet::new();
    for stop in stops_with_progress(index, "Group stops by mode.") {
        let mut modes_at_stop = vec![];
        for stop_time in index.stop_times_at(stop.id) {
            let Some(route) = cache.resolve_route_for_trip(stop_time.trip_id) else {
                continue;
            };
            if !matches_agency(route, agency_id) {
                continue;
            }
            match BasicMode::from_route_type(route.route_type) {
                Some(mode) => {
                    if !modes_at_stop.contains(&mode) {
                        modes_at_stop.push(mode);
                    }
                }
                None => {
                    if unknown_routes.insert(route.id) {
                        log::debug!(
                            "Route {} has route type {} without a basic mode.",
                            route.id,
                            route.route_type
                        );
                        cache.note_unknown_route_type();
                    }
                }
            }
        }
        for mode in modes_at_stop {
            buckets.entry(mode).or_default().push(StopRef {
                stop_id: stop.id,
                name: stop.name.clone(),
            });
        }
    }
    buckets
}

/// Stops where the operator runs at least one of the whitelisted route types.
/// Codes are compared exactly, without reducing them to basic modes.
pub fn stops_matching_mode_whitelist(
    cache: &mut RouteCache,
    agency_id: AgencyId,
    whitelist: &HashSet<RouteTypeCode>,
) -> Vec<StopId> {
    transport_modes_by_stop(cache, OperatorScope::Agency(agency_id))
        .into_iter()
        .filter(|modes| modes.route_types.iter().any(|code| whitelist.contains(code)))
        .map(|modes| modes.stop_id)
        .collect()
}

/// Average departures per operating day for every stop, across all operators.
///
/// Trips only need to resolve to a service, not to a route. Stops without
/// traffic get an average of 0. Output follows the feed's stop order.
pub fn average_departures_per_stop(cache: &mut RouteCache) -> Vec<StopDepartures> {
    let index = cache.index();
    let days_seen = index.days_seen();
    let mut unresolved = HashSet::new();

    let mut result = Vec::with_capacity(index.stops().len());
    for stop in stops_with_progress(index, "Count departures per stop.") {
        let mut departures = 0;
        let mut stop_times = 0;
        for stop_time in index.stop_times_at(stop.id) {
            match index.trip(stop_time.trip_id) {
                Some(trip) => {
                    stop_times += 1;
                    departures += index.service_day_count(trip.service_id);
                }
                None => {
                    if unresolved.insert(stop_time.trip_id) {
                        cache.note_unresolved_trip();
                    }
                }
            }
        }
        result.push(StopDepartures {
            stop_id: stop.id,
            name: stop.name.clone(),
            location: stop.location,
            stop_times,
            average: per_day(departures, days_seen),
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::*;
    use approx::assert_abs_diff_eq;

    fn build(records: FeedRecords) -> FeedIndex {
        FeedIndex::build(records).unwrap()
    }

    fn single_trip_feed() -> FeedRecords {
        FeedRecords {
            stops: vec![stop("X", "Stop X", 59.33, 18.06)],
            routes: vec![route("R1", "276", 3)],
            trips: vec![trip("T1", "R1", "S1")],
            service_dates: vec![
                service_date("S1", 1),
                service_date("S1", 2),
                service_date("S1", 3),
            ],
            stop_times: vec![stop_time("T1", "X"), stop_time("T1", "X")],
        }
    }

    fn mixed_feed() -> FeedRecords {
        FeedRecords {
            stops: vec![
                stop("A", "Alpha", 59.0, 18.0),
                stop("B", "Beta", 59.1, 18.1),
                stop("C", "Gamma", 59.2, 18.2),
                stop("D", "Delta", 59.3, 18.3),
            ],
            routes: vec![
                route("bus", "276", 700),
                route("tram", "276", 0),
                route("lift", "276", 6),
                route("ferry", "300", 1000),
            ],
            trips: vec![
                trip("T_bus", "bus", "daily"),
                trip("T_tram", "tram", "weekend"),
                trip("T_lift", "lift", "daily"),
                trip("T_ferry", "ferry", "daily"),
                trip("T_orphan", "nowhere", "daily"),
            ],
            service_dates: vec![
                service_date("daily", 1),
                service_date("daily", 2),
                service_date("daily", 3),
                service_date("daily", 4),
                service_date("weekend", 2),
                service_date("weekend", 3),
            ],
            stop_times: vec![
                stop_time("T_bus", "A"),
                stop_time("T_tram", "A"),
                stop_time("T_tram", "B"),
                stop_time("T_bus", "B"),
                stop_time("T_bus", "B"),
                stop_time("T_ferry", "C"),
                stop_time("T_lift", "D"),
                stop_time("T_orphan", "D"),
                stop_time("T_missing", "D"),
            ],
        }
    }

    #[test]
    fn repeated_visits_multiply_service_days() {
        let index = build(single_trip_feed());
        let mut cache = RouteCache::new(&index);
        let averages = average_daily_stops(&mut cache, AgencyId::new("276"));
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].stop_id, StopId::new("X"));
        assert_abs_diff_eq!(averages[0].average, 2.0);
    }

    #[test]
    fn averages_use_feed_wide_days_and_sort_ascending() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        let averages = average_daily_stops(&mut cache, AgencyId::new("276"));
        let ids: Vec<_> = averages.iter().map(|a| a.stop_id.as_str()).collect();
        // A: bus 1 x 4 + tram 1 x 2 = 6, B: tram 2 + bus 2 x 4 = 10, D: lift 4.
        assert_eq!(ids, ["D", "A", "B"]);
        assert_abs_diff_eq!(averages[0].average, 1.0);
        assert_abs_diff_eq!(averages[1].average, 1.5);
        assert_abs_diff_eq!(averages[2].average, 2.5);
        assert!(averages.windows(2).all(|w| w[0].average <= w[1].average));
    }

    #[test]
    fn operator_without_traffic_has_no_averages() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        assert!(average_daily_stops(&mut cache, AgencyId::new("999")).is_empty());
    }

    #[test]
    fn unresolved_references_are_skipped() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        let averages = average_daily_stops(&mut cache, AgencyId::new("276"));
        assert_eq!(averages.len(), 3);
        let skips = cache.skips();
        assert_eq!(skips.unresolved_trips, 1);
        assert_eq!(skips.unresolved_routes, 1);
    }

    #[test]
    fn modes_per_stop_keep_first_encounter_order() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        let modes = transport_modes_by_stop(&mut cache, OperatorScope::All);
        assert_eq!(
            modes,
            vec![
                StopModes {
                    stop_id: StopId::new("A"),
                    route_types: vec![700, 0],
                },
                StopModes {
                    stop_id: StopId::new("B"),
                    route_types: vec![0, 700],
                },
                StopModes {
                    stop_id: StopId::new("C"),
                    route_types: vec![1000],
                },
                StopModes {
                    stop_id: StopId::new("D"),
                    route_types: vec![6],
                },
            ]
        );
    }

    #[test]
    fn modes_per_stop_can_be_scoped_to_an_operator() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        let scope = OperatorScope::Agency(AgencyId::new("300"));
        let modes = transport_modes_by_stop(&mut cache, scope);
        assert_eq!(modes.len(), 1);
        assert_eq!(modes[0].stop_id, StopId::new("C"));
    }

    #[test]
    fn stops_are_grouped_by_basic_mode() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        let buckets = stops_by_basic_mode(&mut cache, AgencyId::new("276"));
        let modes: Vec<_> = buckets.keys().copied().collect();
        assert_eq!(modes, [BasicMode::Tram, BasicMode::Bus]);

        let ids = |mode: BasicMode| -> Vec<&str> {
            buckets[&mode].iter().map(|s| s.stop_id.as_str()).collect()
        };
        assert_eq!(ids(BasicMode::Tram), ["A", "B"]);
        assert_eq!(ids(BasicMode::Bus), ["A", "B"]);
        assert_eq!(buckets[&BasicMode::Bus][0].name, "Alpha");
        assert_eq!(cache.skips().unknown_route_types, 1);
    }

    #[test]
    fn whitelist_matches_raw_codes_only() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        let agency = AgencyId::new("276");

        let bus = HashSet::from([700]);
        assert_eq!(
            stops_matching_mode_whitelist(&mut cache, agency, &bus),
            [StopId::new("A"), StopId::new("B")]
        );

        let basic_bus = HashSet::from([3]);
        assert!(stops_matching_mode_whitelist(&mut cache, agency, &basic_bus).is_empty());

        let lift_or_ferry = HashSet::from([6, 1000]);
        assert_eq!(
            stops_matching_mode_whitelist(&mut cache, agency, &lift_or_ferry),
            [StopId::new("D")]
        );
    }

    #[test]
    fn departures_cover_every_stop() {
        let index = build(mixed_feed());
        let mut cache = RouteCache::new(&index);
        let departures = average_departures_per_stop(&mut cache);
        let averages: Vec<_> = departures.iter().map(|d| d.average).collect();
        // D counts the lift and the orphan trip, whose route is unknown.
        assert_eq!(averages, [1.5, 2.5, 1.0, 2.0]);
        let stop_times: Vec<_> = departures.iter().map(|d| d.stop_times).collect();
        assert_eq!(stop_times, [2, 3, 1, 2]);
        assert_eq!(cache.skips().unresolved_trips, 1);
    }

    #[test]
    fn empty_calendar_gives_zero_averages() {
        let mut records = single_trip_feed();
        records.service_dates.clear();
        let index = build(records);
        let mut cache = RouteCache::new(&index);
        let averages = average_daily_stops(&mut cache, AgencyId::new("276"));
        assert_eq!(averages[0].average, 0.0);
    }
}
