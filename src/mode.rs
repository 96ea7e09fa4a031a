use serde::Serialize;

use crate::model::RouteTypeCode;

/// The five coarse transport modes every route type is reduced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BasicMode {
    Tram,
    Metro,
    Train,
    Bus,
    Ferry,
}

impl BasicMode {
    pub const ALL: [BasicMode; 5] = [
        BasicMode::Tram,
        BasicMode::Metro,
        BasicMode::Train,
        BasicMode::Bus,
        BasicMode::Ferry,
    ];

    /// Reduces a basic or extended GTFS route type to a basic mode.
    ///
    /// Extended ranges follow https://developers.google.com/transit/gtfs/reference/extended-route-types.
    /// Cable cars, gondolas, funiculars, air, taxi and miscellaneous services have no
    /// basic mode and yield `None`.
    pub fn from_route_type(route_type: RouteTypeCode) -> Option<BasicMode> {
        match route_type {
            0 => Some(BasicMode::Tram),
            1 => Some(BasicMode::Metro),
            2 => Some(BasicMode::Train),
            3 => Some(BasicMode::Bus),
            4 => Some(BasicMode::Ferry),
            // Railway service
            100..=199 => Some(BasicMode::Train),
            // Coach service
            200..=299 => Some(BasicMode::Bus),
            // Urban railway, metro and underground service
            400..=699 => Some(BasicMode::Metro),
            // Bus and trolleybus service
            700..=899 => Some(BasicMode::Bus),
            900..=999 => Some(BasicMode::Tram),
            // Water transport and ferry service
            1000..=1099 | 1200..=1299 => Some(BasicMode::Ferry),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BasicMode::Tram => "TRAM",
            BasicMode::Metro => "METRO",
            BasicMode::Train => "TRAIN",
            BasicMode::Bus => "BUS",
            BasicMode::Ferry => "FERRY",
        }
    }
}

impl std::fmt::Display for BasicMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Turns the route type parsed by `gtfs_structures` back into its GTFS code.
///
/// The parser folds whole extended families into one variant, so e.g. 700 and 3
/// both come back as 3. Codes it does not recognize are kept as-is.
pub fn route_type_code(route_type: gtfs_structures::RouteType) -> RouteTypeCode {
    use gtfs_structures::RouteType;
    match route_type {
        RouteType::Tramway => 0,
        RouteType::Subway => 1,
        RouteType::Rail => 2,
        RouteType::Bus => 3,
        RouteType::Ferry => 4,
        RouteType::CableCar => 5,
        RouteType::Gondola => 6,
        RouteType::Funicular => 7,
        RouteType::Coach => 200,
        RouteType::Air => 1100,
        RouteType::Taxi => 1500,
        RouteType::Other(other) => other,
    }
}
