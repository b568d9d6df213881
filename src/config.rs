use clap::Parser;

#[derive(Parser, Clone)]
pub struct Config {
    #[clap(env, long, default_value = "development")]
    pub environment: String,

    /// Comma-separated origins allowed by CORS.
    #[clap(env, long, default_value = "http://localhost:3000")]
    pub origin_urls: String,

    #[clap(env, long, default_value_t = 3000)]
    pub port: u16,

    #[clap(env, long, default_value = "https://overpass-api.de/api/interpreter")]
    pub overpass_url: String,

    /// Maximum age of the cached query result before it counts as stale.
    #[clap(env, long, default_value_t = 120)]
    pub cache_ttl_secs: u64,

    /// Origins closer than this count as the same query, absorbing GPS jitter.
    #[clap(env, long, default_value_t = 100.0)]
    pub location_tolerance_meters: f64,

    #[clap(env, long, default_value_t = 12)]
    pub upstream_timeout_secs: u64,

    #[clap(env, long, default_value_t = 3)]
    pub upstream_retry_limit: usize,

    #[clap(env, long, default_value_t = 1)]
    pub upstream_backoff_secs: u64,

    /// Where the best-effort places snapshot lands. Unset disables the export.
    #[clap(env, long)]
    pub places_export_path: Option<String>,
}
