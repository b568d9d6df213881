use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::models::place::Place;
use crate::services::normalizer::PLACEHOLDER_NAME;

/// Field weights behind the "most informative" pick. Tuning constants carried
/// over from the earlier prototypes.
#[derive(Clone, Debug)]
pub struct CompletenessWeights {
    pub opening_hours: f64,
    pub cuisine: f64,
    pub phone: f64,
    pub website: f64,
    pub email: f64,
    pub address: f64,
    pub named: f64,
}

impl Default for CompletenessWeights {
    fn default() -> Self {
        Self {
            opening_hours: 2.0,
            cuisine: 2.0,
            phone: 1.5,
            website: 1.0,
            email: 0.5,
            address: 1.5,
            named: 1.0,
        }
    }
}

#[skip_serializing_none]
#[derive(Clone, Serialize, Debug)]
pub struct Recommendation {
    pub nearest: Option<Place>,
    pub most_informative: Option<Place>,
}

/// Ascending by distance; equal distances keep their discovery order.
pub fn rank(mut places: Vec<Place>) -> Vec<Place> {
    places.sort_by_key(|place| place.distance_meters);
    places
}

pub fn completeness_score(place: &Place, weights: &CompletenessWeights) -> f64 {
    let mut score = 0.0;
    if place.opening_hours.is_some() {
        score += weights.opening_hours;
    }
    if place.cuisine.is_some() {
        score += weights.cuisine;
    }
    if place.phone.is_some() {
        score += weights.phone;
    }
    if place.website.is_some() {
        score += weights.website;
    }
    if place.email.is_some() {
        score += weights.email;
    }
    if place.address.is_some() {
        score += weights.address;
    }
    if !place.name.is_empty() && place.name != PLACEHOLDER_NAME {
        score += weights.named;
    }
    score
}

/// Expects `places` already distance-sorted. Score ties keep the earlier, and
/// therefore nearer, entry.
pub fn recommend(places: &[Place], weights: &CompletenessWeights) -> Recommendation {
    let nearest = places.first().cloned();

    let mut most_informative: Option<&Place> = None;
    let mut best_score = f64::NEG_INFINITY;
    for place in places {
        let score = completeness_score(place, weights);
        if score > best_score {
            best_score = score;
            most_informative = Some(place);
        }
    }

    Recommendation {
        nearest,
        most_informative: most_informative.cloned(),
    }
}
