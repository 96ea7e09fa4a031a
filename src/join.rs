use std::collections::HashMap;

use serde::Serialize;

use crate::index::FeedIndex;
use crate::model::{AgencyId, Route, TripId};

/// Rows skipped during one query because a reference did not resolve or a
/// route type had no basic mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub unresolved_trips: usize,
    pub unresolved_routes: usize,
    pub unknown_route_types: usize,
}

impl SkipCounts {
    pub fn is_empty(&self) -> bool {
        *self == SkipCounts::default()
    }
}

/// Memoizes trip -> route resolution for the duration of one query.
///
/// Many stop times share a trip, so each trip is resolved through the index
/// at most once. Misses are cached too.
pub struct RouteCache<'a> {
    index: &'a FeedIndex,
    route_by_trip: HashMap<TripId, Option<&'a Route>>,
    skips: SkipCounts,
}

impl<'a> RouteCache<'a> {
    pub fn new(index: &'a FeedIndex) -> Self {
        RouteCache {
            index,
            route_by_trip: HashMap::new(),
            skips: SkipCounts::default(),
        }
    }

    pub fn index(&self) -> &'a FeedIndex {
        self.index
    }

    /// Returns `None` when either the trip or its route is missing from the feed.
    pub fn resolve_route_for_trip(&mut self, trip_id: TripId) -> Option<&'a Route> {
        if let Some(route) = self.route_by_trip.get(&trip_id) {
            return *route;
        }
        let index = self.index;
        let route = match index.trip(trip_id) {
            Some(trip) => {
                let route = index.route(trip.route_id);
                if route.is_none() {
                    log::debug!("Route {} of trip {} not found.", trip.route_id, trip_id);
                    self.skips.unresolved_routes += 1;
                }
                route
            }
            None => {
                log::debug!("Trip {} not found.", trip_id);
                self.skips.unresolved_trips += 1;
                None
            }
        };
        self.route_by_trip.insert(trip_id, route);
        route
    }

    pub(crate) fn note_unknown_route_type(&mut self) {
        self.skips.unknown_route_types += 1;
    }

    pub(crate) fn note_unresolved_trip(&mut self) {
        self.skips.unresolved_trips += 1;
    }

    pub fn skips(&self) -> SkipCounts {
        self.skips
    }

    pub fn cached_trips(&self) -> usize {
        self.route_by_trip.len()
    }

    /// Forgets every memoized route and skip count.
    pub fn reset(&mut self) {
        self.route_by_trip.clear();
        self.skips = SkipCounts::default();
    }

    /// Logs the skip counts of the finished query.
    pub fn finish(&self, query: &str) -> SkipCounts {
        if self.skips.is_empty() {
            log::debug!("{query}: every reference resolved.");
        } else {
            log::info!(
                "{query}: skipped {} unresolved trips, {} unresolved routes, {} unknown route types.",
                self.skips.unresolved_trips,
                self.skips.unresolved_routes,
                self.skips.unknown_route_types
            );
        }
        self.skips
    }
}

pub fn matches_agency(route: &Route, agency_id: AgencyId) -> bool {
    route.agency_id == agency_id
}

/// Which operators a query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorScope {
    All,
    Agency(AgencyId),
}

impl OperatorScope {
    pub fn admits(&self, route: &Route) -> bool {
        match self {
            OperatorScope::All => true,
            OperatorScope::Agency(agency_id) => matches_agency(route, *agency_id),
        }
    }
}

impl From<Option<AgencyId>> for OperatorScope {
    fn from(agency_id: Option<AgencyId>) -> Self {
        agency_id.map_or(OperatorScope::All, OperatorScope::Agency)
    }
}
