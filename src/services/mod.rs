pub mod clock;
pub mod geo;
pub mod normalizer;
pub mod overpass_client;
pub mod place_cache;
pub mod ranking;
