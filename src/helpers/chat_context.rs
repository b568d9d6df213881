use crate::models::place::Place;

/// Rendered wherever a missing optional field must still show up as text.
/// The data model itself never carries this sentinel.
pub const NO_INFORMATION: &str = "no information";

/// Formats the top picks as the textual context handed to the external chat
/// collaborator. The core never depends on that call succeeding.
pub fn places_context(places: &[Place], top_n: usize) -> String {
    let shown = top_n.min(places.len());
    let mut lines = Vec::with_capacity(shown + 1);
    lines.push(format!("Nearby food places ({} shown):", shown));

    for place in places.iter().take(top_n) {
        lines.push(format!(
            "- {} ({}), {} m away. Address: {}. Opening hours: {}. Cuisine: {}. Phone: {}. Website: {}. Email: {}.",
            place.name,
            place.category.as_amenity(),
            place.distance_meters,
            field(&place.address),
            field(&place.opening_hours),
            field(&place.cuisine),
            field(&place.phone),
            field(&place.website),
            field(&place.email),
        ));
    }

    lines.join("\n")
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NO_INFORMATION)
}
