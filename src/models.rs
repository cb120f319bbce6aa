use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in account. Created on a successful auth callback, cleared on
/// sign-out; exactly one live instance, owned by the view state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub avatar_url: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub verified: bool,
}

/// A feed video as cached locally. Counters are only ever moved by atomic
/// store increments, never overwritten from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Id the video carries on its source platform. Unique across everything
    /// the import pipeline wrote.
    pub original_id: String,
    pub url: String,
    pub thumbnail_url: String,
    pub author: Author,
    pub like_count: u64,
    pub comment_count: u64,
    pub view_count: u64,
    pub category: String,
    pub duration_seconds: u32,
    pub created_at: DateTime<Utc>,
    pub is_public: bool,
}

/// A tracked external channel the import job scans.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Store document id.
    pub id: String,
    /// Channel id on the source platform.
    pub channel_id: String,
    pub category: String,
    pub last_checked_ms: Option<i64>,
}

/// Publishing account that imported videos are attributed to.
#[derive(Debug, Clone)]
pub struct BotAccount {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Extended per-video detail fetched as a best-effort side call during
/// import. Missing detail falls back to defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDetails {
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelStats {
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
}

/// Who-to-follow row.
#[derive(Debug, Clone)]
pub struct ChannelSuggestion {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub follower_count: u64,
    pub is_following: bool,
}

/// Display info carried alongside a follow toggle.
#[derive(Debug, Clone, Default)]
pub struct FollowMeta {
    pub name: Option<String>,
}
