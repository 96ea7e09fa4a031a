//! Municipality lookup for stops.
//!
//! Borders come from a GeoJSON feature collection of administrative areas, e.g.
//! an osm-boundaries export. A stop belongs to the first area whose polygon
//! contains it, tested with even-odd ray casting. Features that carry a `bbox`
//! are skipped early when the stop lies outside of it.

use std::path::Path;

use geojson::{FeatureCollection, GeoJson};
use indicatif::ProgressIterator;
use serde::Serialize;

use crate::error::BorderError;
use crate::index::progress_style;
use crate::model::{Coordinate, Stop, StopId};

pub const DEFAULT_NAME_PROPERTY: &str = "official_name";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub min_latitude: f64,
    pub max_longitude: f64,
    pub max_latitude: f64,
}

impl BoundingBox {
    /// Reads a 2D GeoJSON bbox, `[west, south, east, north]`.
    fn from_geojson(bbox: &[f64]) -> Option<BoundingBox> {
        let [lon1, lat1, lon2, lat2] = bbox else {
            return None;
        };
        Some(BoundingBox {
            min_longitude: lon1.min(*lon2),
            min_latitude: lat1.min(*lat2),
            max_longitude: lon1.max(*lon2),
            max_latitude: lat1.max(*lat2),
        })
    }

    /// Points on the edge are outside.
    pub fn contains(&self, point: Coordinate) -> bool {
        self.min_longitude < point.longitude
            && point.longitude < self.max_longitude
            && self.min_latitude < point.latitude
            && point.latitude < self.max_latitude
    }
}

/// Ring vertices as `(longitude, latitude)`.
type Ring = Vec<(f64, f64)>;

#[derive(Debug, Clone)]
pub struct Municipality {
    pub name: String,
    bbox: Option<BoundingBox>,
    // Outer rings and holes of every polygon.
    rings: Vec<Ring>,
}

impl Municipality {
    pub fn contains(&self, point: Coordinate) -> bool {
        if let Some(bbox) = self.bbox {
            if !bbox.contains(point) {
                return false;
            }
        }
        self.rings
            .iter()
            .filter(|ring| ray_crosses_odd(ring, point))
            .count()
            % 2
            == 1
    }
}

/// Whether a ray from `point` towards the east crosses the ring an odd number of times.
fn ray_crosses_odd(ring: &[(f64, f64)], point: Coordinate) -> bool {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let Some(&last) = ring.last() else {
        return false;
    };
    let mut previous = last;
    for &(xi, yi) in ring {
        let (xj, yj) = previous;
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        previous = (xi, yi);
    }
    inside
}

fn to_ring(positions: &[Vec<f64>]) -> Ring {
    positions
        .iter()
        .filter_map(|position| match position.as_slice() {
            [longitude, latitude, ..] => Some((*longitude, *latitude)),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Borders {
    municipalities: Vec<Municipality>,
}

impl Borders {
    pub fn load(path: &Path, name_property: &str) -> Result<Borders, BorderError> {
        log::info!("Loading borders from {:?}", path);
        let text = std::fs::read_to_string(path).map_err(|source| BorderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Borders::from_geojson(&text, name_property)
    }

    /// Keeps polygon and multipolygon features that have a name in `name_property`.
    pub fn from_geojson(text: &str, name_property: &str) -> Result<Borders, BorderError> {
        let geojson: GeoJson = text.parse()?;
        let collection = FeatureCollection::try_from(geojson)?;

        let mut municipalities = vec![];
        for feature in &collection.features {
            let Some(name) = feature.property(name_property).and_then(|value| value.as_str())
            else {
                log::debug!("Skipping border feature without {name_property}.");
                continue;
            };
            let rings: Vec<Ring> = match feature.geometry.as_ref().map(|geometry| &geometry.value) {
                Some(geojson::Value::Polygon(polygon)) => {
                    polygon.iter().map(|ring| to_ring(ring)).collect()
                }
                Some(geojson::Value::MultiPolygon(polygons)) => polygons
                    .iter()
                    .flatten()
                    .map(|ring| to_ring(ring))
                    .collect(),
                _ => {
                    log::debug!("Skipping border {name}, it has no polygon.");
                    continue;
                }
            };
            municipalities.push(Municipality {
                name: name.to_string(),
                bbox: feature.bbox.as_deref().and_then(BoundingBox::from_geojson),
                rings,
            });
        }
        log::info!("Loaded {} municipality borders.", municipalities.len());
        Ok(Borders { municipalities })
    }

    pub fn len(&self) -> usize {
        self.municipalities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }

    /// The first municipality in file order that contains the point.
    pub fn municipality_at(&self, point: Coordinate) -> Option<&str> {
        self.municipalities
            .iter()
            .find(|municipality| municipality.contains(point))
            .map(|municipality| municipality.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopMunicipality {
    pub stop_id: StopId,
    /// Stop name followed by the municipality in parentheses, when one was found.
    pub name: String,
    pub location: Coordinate,
    pub municipality: Option<String>,
}

pub fn name_with_municipality(name: &str, municipality: Option<&str>) -> String {
    match municipality {
        Some(municipality) => format!("{name} ({municipality})"),
        None => name.to_string(),
    }
}

pub fn assign_municipalities(stops: &[Stop], borders: &Borders) -> Vec<StopMunicipality> {
    let result: Vec<_> = stops
        .iter()
        .progress_with_style(progress_style())
        .with_message("Find municipality per stop.")
        .with_finish(indicatif::ProgressFinish::AndLeave)
        .map(|stop| {
            let municipality = borders.municipality_at(stop.location);
            StopMunicipality {
                stop_id: stop.id,
                name: name_with_municipality(&stop.name, municipality),
                location: stop.location,
                municipality: municipality.map(str::to_string),
            }
        })
        .collect();
    let unassigned = result.iter().filter(|s| s.municipality.is_none()).count();
    if unassigned > 0 {
        log::info!("{unassigned} stops lie outside every border.");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::stop;

    // Solna is a square with a square hole; Lidingö is a multipolygon of two
    // islands; Nacka has a bbox smaller than its polygon.
    const BORDERS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "official_name": "Solna" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[18.0, 59.3], [18.1, 59.3], [18.1, 59.4], [18.0, 59.4], [18.0, 59.3]],
                        [[18.04, 59.34], [18.06, 59.34], [18.06, 59.36], [18.04, 59.36], [18.04, 59.34]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "official_name": "Lidingö" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[18.2, 59.3], [18.3, 59.3], [18.3, 59.4], [18.2, 59.4], [18.2, 59.3]]],
                        [[[18.4, 59.3], [18.5, 59.3], [18.5, 59.4], [18.4, 59.4], [18.4, 59.3]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "bbox": [18.6, 59.3, 18.65, 59.4],
                "properties": { "official_name": "Nacka" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[18.6, 59.3], [18.7, 59.3], [18.7, 59.4], [18.6, 59.4], [18.6, 59.3]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "No official name" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[17.0, 58.0], [19.0, 58.0], [19.0, 60.0], [17.0, 60.0], [17.0, 58.0]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "official_name": "Just a point" },
                "geometry": { "type": "Point", "coordinates": [18.05, 59.35] }
            }
        ]
    }"#;

    fn borders() -> Borders {
        Borders::from_geojson(BORDERS, DEFAULT_NAME_PROPERTY).unwrap()
    }

    fn at(borders: &Borders, longitude: f64, latitude: f64) -> Option<&str> {
        borders.municipality_at(Coordinate::new(latitude, longitude))
    }

    #[test]
    fn only_named_polygons_are_kept() {
        assert_eq!(borders().len(), 3);
    }

    #[test]
    fn points_inside_and_outside_a_polygon() {
        let borders = borders();
        assert_eq!(at(&borders, 18.01, 59.31), Some("Solna"));
        assert_eq!(at(&borders, 18.09, 59.39), Some("Solna"));
        assert_eq!(at(&borders, 18.15, 59.35), None);
        assert_eq!(at(&borders, 18.05, 59.45), None);
        assert_eq!(at(&borders, 17.95, 59.35), None);
    }

    #[test]
    fn holes_are_not_part_of_the_polygon() {
        let borders = borders();
        assert_eq!(at(&borders, 18.05, 59.35), None);
        assert_eq!(at(&borders, 18.03, 59.35), Some("Solna"));
    }

    #[test]
    fn every_part_of_a_multipolygon_counts() {
        let borders = borders();
        assert_eq!(at(&borders, 18.25, 59.35), Some("Lidingö"));
        assert_eq!(at(&borders, 18.45, 59.35), Some("Lidingö"));
        assert_eq!(at(&borders, 18.35, 59.35), None);
    }

    #[test]
    fn bbox_excludes_points_before_the_polygon_test() {
        let borders = borders();
        assert_eq!(at(&borders, 18.62, 59.35), Some("Nacka"));
        // Inside the polygon, outside the bbox.
        assert_eq!(at(&borders, 18.68, 59.35), None);
        // On the bbox edge.
        assert_eq!(at(&borders, 18.65, 59.35), None);
    }

    #[test]
    fn bbox_edges_are_exclusive() {
        let bbox = BoundingBox::from_geojson(&[18.0, 59.0, 19.0, 60.0]).unwrap();
        assert!(bbox.contains(Coordinate::new(59.5, 18.5)));
        assert!(!bbox.contains(Coordinate::new(59.0, 18.5)));
        assert!(!bbox.contains(Coordinate::new(59.5, 19.0)));
        assert!(BoundingBox::from_geojson(&[18.0, 59.0, 0.0, 19.0, 60.0, 10.0]).is_none());
    }

    #[test]
    fn other_name_properties_can_be_used() {
        let borders = Borders::from_geojson(BORDERS, "name").unwrap();
        assert_eq!(borders.len(), 1);
        assert_eq!(at(&borders, 18.05, 59.35), Some("No official name"));
    }

    #[test]
    fn invalid_geojson_is_an_error() {
        assert!(Borders::from_geojson("{", DEFAULT_NAME_PROPERTY).is_err());
        let point = r#"{ "type": "Point", "coordinates": [18.0, 59.0] }"#;
        assert!(Borders::from_geojson(point, DEFAULT_NAME_PROPERTY).is_err());
    }

    #[test]
    fn stop_names_get_their_municipality() {
        let stops = vec![
            stop("A", "Solna centrum", 59.31, 18.01),
            stop("B", "Gåshaga brygga", 59.35, 18.45),
            stop("C", "Ute på sjön", 59.35, 18.35),
        ];
        let stops = assign_municipalities(&stops, &borders());
        let names: Vec<_> = stops.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["Solna centrum (Solna)", "Gåshaga brygga (Lidingö)", "Ute på sjön"]
        );
        assert_eq!(stops[1].municipality.as_deref(), Some("Lidingö"));
        assert_eq!(stops[2].municipality, None);
    }
}
