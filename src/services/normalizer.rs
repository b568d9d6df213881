use tracing::debug;

use crate::models::place::{Category, Coordinate, Place};
use crate::services::geo;
use crate::services::overpass_client::RawElement;

/// Placeholder some mappers leave on unnamed venues. A record carrying it has
/// no usable identity and is dropped.
pub const PLACEHOLDER_NAME: &str = "Unknown";

const ADDRESS_TAGS: [&str; 4] = ["addr:housenumber", "addr:street", "addr:city", "addr:postcode"];

/// Converts one raw Overpass element into a `Place`, or drops it. Dropping is
/// a normal outcome, not an error.
pub fn normalize(raw: &RawElement, origin: Coordinate, radius: u32) -> Option<Place> {
    let name = raw
        .tags
        .get("name")
        .map(|value| value.trim())
        .filter(|value| !value.is_empty() && *value != PLACEHOLDER_NAME)?
        .to_string();

    let location = match (raw.lat, raw.lon, &raw.center) {
        (Some(lat), Some(lon), _) => Coordinate { lat, lon },
        (_, _, Some(center)) => Coordinate {
            lat: center.lat,
            lon: center.lon,
        },
        _ => return None,
    };

    let category = raw
        .tags
        .get("amenity")
        .and_then(|tag| Category::from_amenity(tag))?;

    // The upstream `around` filter is approximate, tighten to the true radius.
    let distance = geo::distance_meters(origin, location);
    if distance > radius as f64 {
        return None;
    }

    Some(Place {
        name,
        location,
        distance_meters: distance.round() as u32,
        category,
        opening_hours: optional_tag(raw, "opening_hours"),
        cuisine: optional_tag(raw, "cuisine"),
        phone: optional_tag(raw, "phone"),
        website: optional_tag(raw, "website"),
        email: optional_tag(raw, "email"),
        address: assemble_address(raw),
    })
}

pub fn normalize_all(elements: &[RawElement], origin: Coordinate, radius: u32) -> Vec<Place> {
    let places: Vec<Place> = elements
        .iter()
        .filter_map(|element| normalize(element, origin, radius))
        .collect();

    let dropped = elements.len() - places.len();
    if dropped > 0 {
        debug!(
            "Dropped {} of {} raw Overpass records during normalization",
            dropped,
            elements.len()
        );
    }

    places
}

fn optional_tag(raw: &RawElement, key: &str) -> Option<String> {
    raw.tags
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// House number, street, city, postcode joined with commas, blanks skipped.
fn assemble_address(raw: &RawElement) -> Option<String> {
    let components: Vec<&str> = ADDRESS_TAGS
        .iter()
        .filter_map(|key| raw.tags.get(*key))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if components.is_empty() {
        None
    } else {
        Some(components.join(", "))
    }
}
