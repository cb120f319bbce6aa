//! Feed loading and pagination.
//!
//! The feed is cursor-paged: every successful non-empty page replaces the
//! stored cursor, an empty page leaves it alone so the caller just re-reads
//! the tail. Only one feed fetch runs at a time; a request arriving while
//! one is in flight is dropped and the caller re-requests later.

use chrono::DateTime;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Author, VideoRecord};
use crate::state::ViewState;
use crate::store::{Cursor, Direction, Document, Filter, Query, Store};

pub(crate) const VIDEOS_COLLECTION: &str = "videos";
const CREATED_AT: &str = "created_at";

/// Fetches the first feed page. `Ok(false)` means a fetch was already in
/// flight and this request was dropped.
pub(crate) async fn load_feed(
    store: &dyn Store,
    state: &ViewState,
    config: &Config,
) -> Result<bool, AppError> {
    if !state.begin_feed_load() {
        return Ok(false);
    }

    match fetch_page(store, config, None).await {
        Ok((videos, cursor)) => {
            if videos.is_empty() {
                state.feed_failed();
                return Err(AppError::NotFound("no public videos".to_string()));
            }
            info!(count = videos.len(), "feed loaded");
            state.feed_loaded(videos, cursor, false);
            Ok(true)
        }
        Err(err) => {
            state.feed_failed();
            Err(err)
        }
    }
}

/// Continues the feed from the stored cursor, appending to the loaded list.
/// An empty page signals end-of-feed and changes nothing.
pub(crate) async fn load_more(
    store: &dyn Store,
    state: &ViewState,
    config: &Config,
) -> Result<bool, AppError> {
    if !state.begin_feed_load() {
        return Ok(false);
    }
    let cursor = state.cursor();

    match fetch_page(store, config, cursor).await {
        Ok((videos, cursor)) => {
            info!(count = videos.len(), "feed page appended");
            state.feed_loaded(videos, cursor, true);
            Ok(true)
        }
        Err(err) => {
            state.feed_failed();
            Err(err)
        }
    }
}

async fn fetch_page(
    store: &dyn Store,
    config: &Config,
    cursor: Option<Cursor>,
) -> Result<(Vec<VideoRecord>, Option<Cursor>), AppError> {
    let mut query = Query::new()
        .filter(Filter::Eq("is_public".to_string(), json!(true)))
        .order_by(CREATED_AT, Direction::Descending)
        .limit(config.page_size);
    if let Some(cursor) = cursor {
        query = query.start_after(cursor);
    }

    let docs = store.query(VIDEOS_COLLECTION, query).await?;
    let cursor = docs.last().map(|doc| Cursor::after(doc, CREATED_AT));
    let videos = docs.iter().map(|doc| video_from_doc(doc, config)).collect();

    Ok((videos, cursor))
}

/// Maps a raw store document into a record the UI can render, substituting
/// defaults for anything missing or malformed.
pub(crate) fn video_from_doc(doc: &Document, config: &Config) -> VideoRecord {
    VideoRecord {
        id: doc.id.clone(),
        title: non_empty(doc.str_field("title"), "Untitled Video"),
        description: doc
            .str_field("description")
            .unwrap_or_default()
            .trim()
            .to_string(),
        original_id: doc.str_field("original_id").unwrap_or_default().to_string(),
        url: doc.str_field("url").unwrap_or_default().to_string(),
        thumbnail_url: non_empty(doc.str_field("thumbnail"), &config.default_thumbnail),
        author: Author {
            id: doc.str_field("author_id").unwrap_or_default().to_string(),
            name: non_empty(doc.str_field("author_name"), "Unknown Creator"),
            avatar_url: non_empty(doc.str_field("author_avatar"), &config.default_avatar),
            verified: doc.bool_field("author_verified").unwrap_or(false),
        },
        like_count: doc.u64_field("likes").unwrap_or(0),
        comment_count: doc.u64_field("comments").unwrap_or(0),
        view_count: doc.u64_field("views").unwrap_or(0),
        category: non_empty(doc.str_field("category"), "General"),
        duration_seconds: doc.u64_field("duration_seconds").unwrap_or(0) as u32,
        created_at: DateTime::from_timestamp_millis(doc.i64_field(CREATED_AT).unwrap_or(0))
            .unwrap_or(DateTime::UNIX_EPOCH),
        is_public: doc.bool_field("is_public").unwrap_or(true),
    }
}

fn non_empty(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::state::ViewState;
    use crate::store::memory::MemoryStore;
    use crate::store::{set, DocPath, Store, Write};

    use super::{load_feed, load_more};

    async fn seed_videos(store: &MemoryStore, count: i64) {
        let writes: Vec<Write> = (1..=count)
            .map(|n| Write::Create {
                path: DocPath::new("videos", format!("v{n}")),
                fields: vec![
                    set("title", json!(format!("Clip {n}"))),
                    set("is_public", json!(true)),
                    set("created_at", json!(n * 1_000)),
                    set("likes", json!(0)),
                ],
            })
            .collect();
        store.commit(writes).await.unwrap();
    }

    #[tokio::test]
    async fn load_feed_takes_newest_page() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        let state = ViewState::new();
        let config = Config::default();
        seed_videos(&store, 7).await;

        assert!(load_feed(&store, &state, &config).await.unwrap());

        let snapshot = state.snapshot();
        let ids: Vec<&str> = snapshot.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v7", "v6", "v5", "v4", "v3"]);
        assert!(!snapshot.is_loading);
        assert!(snapshot.cursor.is_some());
    }

    #[tokio::test]
    async fn load_more_appends_and_empty_page_keeps_cursor() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        let state = ViewState::new();
        let config = Config::default();
        seed_videos(&store, 5).await;

        assert!(load_feed(&store, &state, &config).await.unwrap());
        let end_cursor = state.snapshot().cursor;
        assert!(end_cursor.is_some());

        // The feed is exhausted: nothing appends and the cursor stays put.
        assert!(load_more(&store, &state, &config).await.unwrap());
        let snapshot = state.snapshot();
        assert_eq!(snapshot.videos.len(), 5);
        assert_eq!(snapshot.cursor, end_cursor);

        // Asking again repeats the same tail read without moving anything.
        assert!(load_more(&store, &state, &config).await.unwrap());
        assert_eq!(state.snapshot().cursor, end_cursor);
    }

    #[tokio::test]
    async fn load_more_walks_pages_in_order() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        let state = ViewState::new();
        let config = Config::default();
        seed_videos(&store, 7).await;

        load_feed(&store, &state, &config).await.unwrap();
        load_more(&store, &state, &config).await.unwrap();

        let snapshot = state.snapshot();
        let ids: Vec<&str> = snapshot.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v7", "v6", "v5", "v4", "v3", "v2", "v1"]);
    }

    #[tokio::test]
    async fn second_fetch_while_loading_is_dropped() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        let state = ViewState::new();
        let config = Config::default();
        seed_videos(&store, 3).await;

        assert!(state.begin_feed_load());
        assert!(!load_feed(&store, &state, &config).await.unwrap());
        assert!(state.snapshot().videos.is_empty());
    }

    #[tokio::test]
    async fn empty_feed_reports_failure_and_settles() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        let state = ViewState::new();
        let config = Config::default();

        let result = load_feed(&store, &state, &config).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(!state.snapshot().is_loading);
    }

    #[tokio::test]
    async fn defaults_fill_missing_fields() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        let state = ViewState::new();
        let config = Config::default();
        store
            .commit(vec![Write::Create {
                path: DocPath::new("videos", "bare"),
                fields: vec![set("is_public", json!(true)), set("created_at", json!(1))],
            }])
            .await
            .unwrap();

        load_feed(&store, &state, &config).await.unwrap();

        let snapshot = state.snapshot();
        let video = &snapshot.videos[0];
        assert_eq!(video.title, "Untitled Video");
        assert_eq!(video.author.name, "Unknown Creator");
        assert_eq!(video.thumbnail_url, config.default_thumbnail);
        assert_eq!(video.like_count, 0);
    }
}
