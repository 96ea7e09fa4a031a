//! Stop name autocompletion.
//!
//! Six strategies are computed side by side so their results can be compared:
//! the query either has to match the start of a stop name or may appear anywhere
//! in it, and the matches are then ordered alphabetically, restricted to a
//! radius around the user, or ordered by distance to the user.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Coordinate, Stop};

pub const RESULT_LIMIT: usize = 5;
pub const GEOFENCE_RADIUS_M: f64 = 30_000.0;
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NamedLocation {
    pub name: &'static str,
    pub coordinate: Coordinate,
}

pub const REFERENCE_LOCATIONS: [NamedLocation; 2] = [
    NamedLocation {
        name: "Stockholm",
        coordinate: Coordinate::new(59.3293, 18.0686),
    },
    NamedLocation {
        name: "Göteborg",
        coordinate: Coordinate::new(57.7089, 11.9746),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    StartOfName,
    AnywhereInName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ranking {
    Alphabetical,
    InArea,
    ByDistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Strategy {
    pub match_kind: MatchKind,
    pub ranking: Ranking,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::new(MatchKind::StartOfName, Ranking::Alphabetical),
        Strategy::new(MatchKind::StartOfName, Ranking::InArea),
        Strategy::new(MatchKind::StartOfName, Ranking::ByDistance),
        Strategy::new(MatchKind::AnywhereInName, Ranking::Alphabetical),
        Strategy::new(MatchKind::AnywhereInName, Ranking::InArea),
        Strategy::new(MatchKind::AnywhereInName, Ranking::ByDistance),
    ];

    pub const fn new(match_kind: MatchKind, ranking: Ranking) -> Self {
        Strategy {
            match_kind,
            ranking,
        }
    }

    pub fn description(&self) -> &'static str {
        match (self.match_kind, self.ranking) {
            (MatchKind::StartOfName, Ranking::Alphabetical) => {
                "Search in start of name, alphabetical"
            }
            (MatchKind::StartOfName, Ranking::InArea) => "Search in start of name, in 30km radius",
            (MatchKind::StartOfName, Ranking::ByDistance) => {
                "Search in start of name, ordered by distance"
            }
            (MatchKind::AnywhereInName, Ranking::Alphabetical) => {
                "Search anywhere in name, alphabetical"
            }
            (MatchKind::AnywhereInName, Ranking::InArea) => {
                "Search anywhere in name, in 30km radius"
            }
            (MatchKind::AnywhereInName, Ranking::ByDistance) => {
                "Search anywhere in name, ordered by distance"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyResult {
    #[serde(flatten)]
    pub strategy: Strategy,
    pub names: Vec<String>,
}

/// Case-insensitive test whether `name` starts with `query`.
pub fn prefix_match(name: &str, query: &str) -> bool {
    name.to_lowercase().starts_with(&query.to_lowercase())
}

/// Case-insensitive test whether `query` appears anywhere in `name`.
pub fn substring_match(name: &str, query: &str) -> bool {
    name.to_lowercase().contains(&query.to_lowercase())
}

/// Great-circle distance in meters.
pub fn haversine_distance(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Matches keyed by stop name. A later stop with the same name replaces the
/// distance of an earlier one but keeps its original position.
#[derive(Default)]
struct DistanceByName {
    entries: Vec<(String, f64)>,
    position_by_name: HashMap<String, usize>,
}

impl DistanceByName {
    fn record(&mut self, name: &str, distance: f64) {
        match self.position_by_name.get(name) {
            Some(&position) => self.entries[position].1 = distance,
            None => {
                self.position_by_name
                    .insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), distance));
            }
        }
    }

    fn into_nearest(mut self) -> Vec<String> {
        self.entries.sort_by(|a, b| a.1.total_cmp(&b.1));
        self.entries
            .into_iter()
            .take(RESULT_LIMIT)
            .map(|(name, _)| name)
            .collect()
    }
}

fn first_alphabetical(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.truncate(RESULT_LIMIT);
    names
}

#[derive(Default)]
struct Matches {
    alphabetical: Vec<String>,
    in_area: Vec<String>,
    by_distance: DistanceByName,
}

impl Matches {
    fn add(&mut self, stop: &Stop, distance: f64) {
        self.alphabetical.push(stop.name.clone());
        if distance < GEOFENCE_RADIUS_M {
            self.in_area.push(stop.name.clone());
        }
        self.by_distance.record(&stop.name, distance);
    }

    fn finish(self, match_kind: MatchKind) -> [StrategyResult; 3] {
        let result = |ranking, names| StrategyResult {
            strategy: Strategy::new(match_kind, ranking),
            names,
        };
        [
            result(Ranking::Alphabetical, first_alphabetical(self.alphabetical)),
            result(Ranking::InArea, first_alphabetical(self.in_area)),
            result(Ranking::ByDistance, self.by_distance.into_nearest()),
        ]
    }
}

/// Runs all six strategies for one query and one user location, in the order of
/// [`Strategy::ALL`].
pub fn autocomplete(stops: &[Stop], query: &str, location: Coordinate) -> Vec<StrategyResult> {
    let mut start_of_name = Matches::default();
    let mut anywhere_in_name = Matches::default();

    for stop in stops {
        if !substring_match(&stop.name, query) {
            continue;
        }
        let distance = haversine_distance(location, stop.location);
        if prefix_match(&stop.name, query) {
            start_of_name.add(stop, distance);
        }
        anywhere_in_name.add(stop, distance);
    }

    let mut results = Vec::with_capacity(Strategy::ALL.len());
    results.extend(start_of_name.finish(MatchKind::StartOfName));
    results.extend(anywhere_in_name.finish(MatchKind::AnywhereInName));
    results
}
