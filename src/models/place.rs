use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// WGS-84 degrees. Range validation happens at the request boundary, not here.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Restaurant,
    Cafe,
    Bar,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Restaurant, Category::Cafe, Category::Bar];

    pub fn from_amenity(tag: &str) -> Option<Category> {
        match tag {
            "restaurant" => Some(Category::Restaurant),
            "cafe" => Some(Category::Cafe),
            "bar" => Some(Category::Bar),
            _ => None,
        }
    }

    pub fn as_amenity(&self) -> &'static str {
        match self {
            Category::Restaurant => "restaurant",
            Category::Cafe => "cafe",
            Category::Bar => "bar",
        }
    }
}

/// A food place as served to clients. `distance_meters` is fixed against the
/// query origin at normalization time and never recomputed afterwards.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Place {
    pub name: String,
    pub location: Coordinate,
    pub distance_meters: u32,
    pub category: Category,
    pub opening_hours: Option<String>,
    pub cuisine: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}
