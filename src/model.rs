use chrono::NaiveDate;
use serde::Serialize;
use ustr::{ustr, Ustr};

macro_rules! interned_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub Ustr);

        impl $name {
            pub fn new(s: &str) -> Self {
                Self(ustr(s))
            }

            pub fn as_str(&self) -> &'static str {
                self.0.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.0.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

interned_id!(StopId);
interned_id!(RouteId);
interned_id!(TripId);
interned_id!(ServiceId);
interned_id!(AgencyId);

/// Raw GTFS `route_type` value, including extended codes (e.g. 700 for bus service).
pub type RouteTypeCode = i16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub location: Coordinate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub agency_id: AgencyId,
    pub route_type: RouteTypeCode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub service_id: ServiceId,
}

/// A scheduled visit of a trip to a stop. A trip may visit the same stop more than once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopTime {
    pub trip_id: TripId,
    pub stop_id: StopId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceDate {
    pub service_id: ServiceId,
    pub date: NaiveDate,
}

/// All rows of one feed, as handed over by the reader.
#[derive(Debug, Clone, Default)]
pub struct FeedRecords {
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub service_dates: Vec<ServiceDate>,
    pub stop_times: Vec<StopTime>,
}
