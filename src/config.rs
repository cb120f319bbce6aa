use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

const DEFAULT_THUMBNAIL: &str =
    "https://via.placeholder.com/300x500/161616/FFFFFF?text=ClipNow";
const DEFAULT_AVATAR: &str = "https://i.pravatar.cc/150?img=0";

pub struct Config {
    /// Videos per feed page.
    pub page_size: usize,
    /// Hard ceiling the metadata API enforces; the request queue spaces
    /// dispatches to stay under it.
    pub requests_per_minute: u32,
    /// A channel is only re-scanned after this many seconds.
    pub channel_recheck_secs: u64,
    /// Recent uploads requested per channel scan.
    pub max_results_per_channel: u32,
    pub youtube_api_key: Option<String>,
    pub default_thumbnail: String,
    pub default_avatar: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            page_size: try_load("FEED_PAGE_SIZE", "5"),
            requests_per_minute: try_load("YOUTUBE_REQUESTS_PER_MINUTE", "5"),
            channel_recheck_secs: try_load("CHANNEL_RECHECK_SECS", "3600"),
            max_results_per_channel: try_load("CHANNEL_SCAN_RESULTS", "5"),
            youtube_api_key: env::var("YOUTUBE_API_KEY").ok(),
            default_thumbnail: try_load("DEFAULT_THUMBNAIL", DEFAULT_THUMBNAIL),
            default_avatar: try_load("DEFAULT_AVATAR", DEFAULT_AVATAR),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 5,
            requests_per_minute: 5,
            channel_recheck_secs: 3600,
            max_results_per_channel: 5,
            youtube_api_key: None,
            default_thumbnail: DEFAULT_THUMBNAIL.to_string(),
            default_avatar: DEFAULT_AVATAR.to_string(),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
