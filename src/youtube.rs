//! YouTube metadata client and the channel import pipeline.
//!
//! Channel scans, detail lookups, and searches all go out through the shared
//! [`RequestQueue`](crate::queue::RequestQueue), so a scan over many
//! channels never bursts past the API quota. Imports are deduplicated by the
//! source video id with an existence query before the insert. Two importers
//! racing the same id could both pass that check; with a single scan job the
//! window is narrow and a duplicate import is rare and non-corrupting, so it
//! is accepted rather than locked away.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use ulid::Ulid;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ApiError, AppError};
use crate::models::{BotAccount, Channel, ChannelStats, VideoDetails};
use crate::queue::RequestQueue;
use crate::store::{
    increment, server_timestamp, set, DocPath, Document, Filter, Query, Store, Write,
};
use crate::user::USERS_COLLECTION;
use crate::utils::{parse_iso8601_duration, truncate_chars};
use crate::videos::VIDEOS_COLLECTION;

pub(crate) const CHANNELS_COLLECTION: &str = "youtube_channels";

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";
const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";
const CHANNELS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/channels";

const TITLE_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 500;

/// Request/response capability toward the metadata API. One call, one URL,
/// one parsed JSON body or a status-tagged error.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn fetch_json(&self, url: Url) -> Result<Value, ApiError>;
}

pub struct HttpMetadataApi {
    client: reqwest::Client,
}

impl HttpMetadataApi {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMetadataApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataApi for HttpMetadataApi {
    async fn fetch_json(&self, url: Url) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

// Wire shapes for the slices of the API responses we read.

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    #[serde(rename = "default")]
    fallback: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    items: Vec<DetailsItem>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DetailsItem {
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Deserialize, Default)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(default)]
    items: Vec<StatsItem>,
}

#[derive(Deserialize, Default)]
struct StatsItem {
    #[serde(default)]
    statistics: Statistics,
}

// The API serializes counters as strings.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    subscriber_count: Option<String>,
    view_count: Option<String>,
    video_count: Option<String>,
}

/// A recent upload as reported by a channel scan.
#[derive(Debug, Clone)]
pub struct SourceVideo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub thumbnail_url: Option<String>,
}

pub struct YouTubeService {
    store: Arc<dyn Store>,
    api: Arc<dyn MetadataApi>,
    queue: RequestQueue,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
}

impl YouTubeService {
    pub fn new(
        store: Arc<dyn Store>,
        api: Arc<dyn MetadataApi>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) -> Self {
        let queue = RequestQueue::new(config.requests_per_minute, Arc::clone(&clock));
        Self {
            store,
            api,
            queue,
            clock,
            config,
        }
    }

    /// Scans every channel due for a re-check and imports uploads not seen
    /// before. One channel failing is logged and skipped; the scan carries
    /// on and reports how many videos actually landed.
    pub async fn check_channels(&self) -> Result<usize, AppError> {
        let channels = self.due_channels().await?;
        info!(count = channels.len(), "scanning channels for new uploads");

        let mut imported = 0;
        for channel in &channels {
            match self.check_channel(channel).await {
                Ok(count) => imported += count,
                Err(err) => {
                    warn!(channel = %channel.channel_id, error = %err, "channel scan failed");
                    continue;
                }
            }
        }

        info!(imported, "channel scan finished");
        Ok(imported)
    }

    /// Channels that are active and whose last check is older than the
    /// re-check interval. Channels never checked carry no timestamp and are
    /// picked up once one is written.
    pub async fn due_channels(&self) -> Result<Vec<Channel>, AppError> {
        let due_before =
            self.clock.now_ms() as i64 - (self.config.channel_recheck_secs as i64) * 1_000;

        let docs = self
            .store
            .query(
                CHANNELS_COLLECTION,
                Query::new()
                    .filter(Filter::Eq("is_active".to_string(), json!(true)))
                    .filter(Filter::Lt("last_checked".to_string(), json!(due_before))),
            )
            .await?;

        Ok(docs.iter().map(channel_from_doc).collect())
    }

    /// Fetches one channel's recent uploads and imports the new ones.
    pub async fn check_channel(&self, channel: &Channel) -> Result<usize, AppError> {
        let videos = self.fetch_channel_videos(channel).await?;

        let mut imported = 0;
        for video in &videos {
            match self.process_video(video, channel).await {
                Ok(true) => imported += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(video = %video.video_id, error = %err, "skipping video");
                }
            }
        }

        Ok(imported)
    }

    /// True when no imported record carries this source video id yet.
    pub async fn is_new(&self, original_id: &str) -> Result<bool, AppError> {
        let docs = self
            .store
            .query(
                VIDEOS_COLLECTION,
                Query::new()
                    .filter(Filter::Eq("original_id".to_string(), json!(original_id)))
                    .limit(1),
            )
            .await?;

        Ok(docs.is_empty())
    }

    /// Searches the platform for videos matching a free-text query.
    pub async fn search_videos(
        &self,
        search: &str,
        max_results: u32,
    ) -> Result<Vec<SourceVideo>, AppError> {
        let url = self.endpoint(
            SEARCH_ENDPOINT,
            &[
                ("q", search),
                ("part", "snippet"),
                ("maxResults", &max_results.to_string()),
                ("type", "video"),
                ("order", "relevance"),
            ],
        )?;

        let body = self.queued_fetch(url).await?;
        let parsed: SearchResponse =
            serde_json::from_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(parsed.items.into_iter().filter_map(source_video).collect())
    }

    /// Refreshes subscriber/view/video counters for every channel due a
    /// check. Returns how many channels were updated.
    pub async fn update_channel_stats(&self) -> Result<usize, AppError> {
        let channels = self.due_channels().await?;

        let mut updated = 0;
        for channel in &channels {
            match self.refresh_channel_stats(channel).await {
                Ok(()) => updated += 1,
                Err(err) => {
                    warn!(channel = %channel.channel_id, error = %err, "stats refresh failed");
                    continue;
                }
            }
        }

        info!(updated, "channel statistics refreshed");
        Ok(updated)
    }

    async fn refresh_channel_stats(&self, channel: &Channel) -> Result<(), AppError> {
        let stats = self.fetch_channel_statistics(&channel.channel_id).await?;

        self.store
            .commit(vec![Write::Update {
                path: DocPath::new(CHANNELS_COLLECTION, &channel.id),
                fields: vec![
                    set("subscribers", json!(stats.subscriber_count)),
                    set("total_views", json!(stats.view_count)),
                    set("video_count", json!(stats.video_count)),
                    server_timestamp("last_stats_update"),
                ],
            }])
            .await?;

        Ok(())
    }

    async fn fetch_channel_videos(&self, channel: &Channel) -> Result<Vec<SourceVideo>, AppError> {
        let url = self.endpoint(
            SEARCH_ENDPOINT,
            &[
                ("channelId", channel.channel_id.as_str()),
                ("part", "snippet,id"),
                ("order", "date"),
                ("maxResults", &self.config.max_results_per_channel.to_string()),
                ("type", "video"),
            ],
        )?;

        let body = self.queued_fetch(url).await?;

        // The check timestamp moves only after the fetch actually succeeded.
        self.store
            .commit(vec![Write::Update {
                path: DocPath::new(CHANNELS_COLLECTION, &channel.id),
                fields: vec![server_timestamp("last_checked")],
            }])
            .await?;

        let parsed: SearchResponse =
            serde_json::from_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(parsed.items.into_iter().filter_map(source_video).collect())
    }

    async fn process_video(&self, video: &SourceVideo, channel: &Channel) -> Result<bool, AppError> {
        if !self.is_new(&video.video_id).await? {
            return Ok(false);
        }
        self.import_video(video, channel).await
    }

    /// Writes one upload into the store. The detail side fetch and the bot
    /// activity bump are best-effort; the primary insert stands on its own.
    async fn import_video(&self, video: &SourceVideo, channel: &Channel) -> Result<bool, AppError> {
        let Some(bot) = self.find_channel_bot(&video.channel_id).await? else {
            warn!(channel = %video.channel_id, "no bot account for channel, skipping import");
            return Ok(false);
        };

        let details = match self.fetch_video_details(&video.video_id).await {
            Ok(details) => details,
            Err(err) => {
                warn!(video = %video.video_id, error = %err, "detail fetch failed, importing with defaults");
                VideoDetails::default()
            }
        };

        let description = if video.description.is_empty() {
            "No description".to_string()
        } else {
            truncate_chars(&video.description, DESCRIPTION_MAX_CHARS)
        };

        self.store
            .commit(vec![Write::Create {
                path: DocPath::new(VIDEOS_COLLECTION, Ulid::new().to_string()),
                fields: vec![
                    set("title", json!(truncate_chars(&video.title, TITLE_MAX_CHARS))),
                    set("description", json!(description)),
                    set("url", json!(format!("https://youtu.be/{}", video.video_id))),
                    set("original_id", json!(video.video_id)),
                    set(
                        "thumbnail",
                        json!(video
                            .thumbnail_url
                            .clone()
                            .unwrap_or_else(|| self.config.default_thumbnail.clone())),
                    ),
                    set("author_id", json!(bot.id)),
                    set(
                        "author_name",
                        json!(bot.name.clone().unwrap_or_else(|| video.channel_title.clone())),
                    ),
                    set(
                        "author_avatar",
                        json!(bot
                            .avatar_url
                            .clone()
                            .unwrap_or_else(|| self.config.default_avatar.clone())),
                    ),
                    set("is_public", json!(true)),
                    set("category", json!(channel.category)),
                    set("duration_seconds", json!(details.duration_seconds)),
                    set("views", json!(0)),
                    set("likes", json!(0)),
                    set("comments", json!(0)),
                    server_timestamp("created_at"),
                ],
            }])
            .await?;

        if let Err(err) = self
            .store
            .commit(vec![Write::Update {
                path: DocPath::new(USERS_COLLECTION, &bot.id),
                fields: vec![
                    server_timestamp("last_activity"),
                    increment("total_imported", 1),
                ],
            }])
            .await
        {
            warn!(bot = %bot.id, error = %err, "bot activity update failed");
        }

        info!(video = %video.video_id, bot = %bot.id, "imported video");
        Ok(true)
    }

    async fn fetch_video_details(&self, video_id: &str) -> Result<VideoDetails, AppError> {
        let url = self.endpoint(
            VIDEOS_ENDPOINT,
            &[("id", video_id), ("part", "contentDetails,statistics")],
        )?;

        let body = self.queued_fetch(url).await?;
        let parsed: DetailsResponse =
            serde_json::from_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        let item = parsed.items.into_iter().next().unwrap_or_default();

        Ok(VideoDetails {
            duration_seconds: parse_iso8601_duration(&item.content_details.duration),
        })
    }

    async fn fetch_channel_statistics(&self, channel_id: &str) -> Result<ChannelStats, AppError> {
        let url = self.endpoint(
            CHANNELS_ENDPOINT,
            &[("id", channel_id), ("part", "statistics")],
        )?;

        let body = self.queued_fetch(url).await?;
        let parsed: StatsResponse =
            serde_json::from_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        let stats = parsed.items.into_iter().next().unwrap_or_default().statistics;

        Ok(ChannelStats {
            subscriber_count: parse_count(stats.subscriber_count),
            view_count: parse_count(stats.view_count),
            video_count: parse_count(stats.video_count),
        })
    }

    async fn find_channel_bot(&self, channel_id: &str) -> Result<Option<BotAccount>, AppError> {
        let docs = self
            .store
            .query(
                USERS_COLLECTION,
                Query::new()
                    .filter(Filter::Eq(
                        "youtube_channel_id".to_string(),
                        json!(channel_id),
                    ))
                    .limit(1),
            )
            .await?;

        Ok(docs.first().map(|doc| BotAccount {
            id: doc.id.clone(),
            name: doc.str_field("display_name").map(str::to_string),
            avatar_url: doc.str_field("avatar_url").map(str::to_string),
        }))
    }

    async fn queued_fetch(&self, url: Url) -> Result<Value, ApiError> {
        let api = Arc::clone(&self.api);
        self.queue
            .enqueue(move || async move { api.fetch_json(url).await })
            .await
    }

    fn endpoint(&self, base: &str, params: &[(&str, &str)]) -> Result<Url, AppError> {
        let key = self
            .config
            .youtube_api_key
            .as_deref()
            .ok_or_else(|| AppError::Validation("metadata API key not configured".to_string()))?;

        let mut pairs: Vec<(&str, &str)> = vec![("key", key)];
        pairs.extend_from_slice(params);

        Url::parse_with_params(base, &pairs)
            .map_err(|err| AppError::Validation(err.to_string()))
    }
}

fn channel_from_doc(doc: &Document) -> Channel {
    Channel {
        id: doc.id.clone(),
        channel_id: doc.str_field("channel_id").unwrap_or_default().to_string(),
        category: doc.str_field("category").unwrap_or("General").to_string(),
        last_checked_ms: doc.i64_field("last_checked"),
    }
}

fn source_video(item: SearchItem) -> Option<SourceVideo> {
    let video_id = item.id.video_id?;
    let thumbnail_url = best_thumbnail(&item.snippet.thumbnails);

    Some(SourceVideo {
        video_id,
        title: item.snippet.title,
        description: item.snippet.description,
        channel_id: item.snippet.channel_id,
        channel_title: item.snippet.channel_title,
        thumbnail_url,
    })
}

fn best_thumbnail(thumbnails: &Thumbnails) -> Option<String> {
    [
        &thumbnails.maxres,
        &thumbnails.standard,
        &thumbnails.high,
        &thumbnails.medium,
        &thumbnails.fallback,
    ]
    .into_iter()
    .find_map(|t| t.as_ref().map(|t| t.url.clone()))
}

fn parse_count(raw: Option<String>) -> u64 {
    raw.and_then(|value| value.parse().ok()).unwrap_or(0)
}
