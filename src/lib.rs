//! Stop statistics and stop name search over a GTFS feed.
//!
//! [`feed::load_feed`] reads a feed into plain records, [`index::FeedIndex`]
//! indexes them once, and the queries in [`aggregate`] and [`autocomplete`]
//! run against the index. [`join::RouteCache`] memoizes trip to route lookups
//! for the duration of one query. [`municipality`] adds the municipality to
//! stop names using administrative borders from GeoJSON.

pub mod aggregate;
pub mod autocomplete;
pub mod error;
pub mod feed;
pub mod index;
pub mod join;
pub mod mode;
pub mod model;
pub mod municipality;
pub mod report;
