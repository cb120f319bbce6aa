//! Like, follow, and watch mutations.
//!
//! Every toggle is a relation document plus a counter move on the owning
//! record, committed as one batch so the pair lands atomically or not at
//! all. The mutation guard keeps a second tap on the same entity from
//! racing the first; the local membership set is updated only after the
//! store accepted the batch.

use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::guard::{MutationGuard, Relation};
use crate::models::{ChannelSuggestion, FollowMeta};
use crate::state::ViewState;
use crate::store::{
    increment, server_timestamp, set, Direction, DocPath, Filter, Query, Store, Write,
};
use crate::user::{following_collection, liked_collection, watched_collection, USERS_COLLECTION};
use crate::utils::validate_entity_id;
use crate::videos::VIDEOS_COLLECTION;

const SUGGESTED_CHANNEL_LIMIT: usize = 10;

/// Flips the caller's like on a video. Resolves to the new liked state, or
/// `None` when a toggle for the same video is still settling.
pub(crate) async fn toggle_like(
    store: &dyn Store,
    state: &ViewState,
    guard: &MutationGuard,
    video_id: &str,
) -> Result<Option<bool>, AppError> {
    validate_entity_id(video_id)?;
    let user = state.identity().ok_or(AppError::NotAuthenticated)?;

    guard
        .run(Relation::Liked, video_id, || async move {
            let liked = state.contains(Relation::Liked, video_id);
            let relation = DocPath::new(liked_collection(&user.id), video_id);
            let video = DocPath::new(VIDEOS_COLLECTION, video_id);

            let writes = if liked {
                vec![
                    Write::Delete { path: relation },
                    Write::Update {
                        path: video,
                        fields: vec![increment("likes", -1)],
                    },
                ]
            } else {
                vec![
                    Write::Create {
                        path: relation,
                        fields: vec![
                            set("user_id", json!(user.id)),
                            server_timestamp("liked_at"),
                        ],
                    },
                    Write::Update {
                        path: video,
                        fields: vec![increment("likes", 1)],
                    },
                ]
            };
            store.commit(writes).await?;

            if liked {
                state.remove(Relation::Liked, video_id);
            } else {
                state.insert(Relation::Liked, video_id);
            }
            info!(video = video_id, liked = !liked, "like toggled");
            Ok(!liked)
        })
        .await
}

/// Flips the caller's follow on a channel, moving its follower counter in
/// the same batch.
pub(crate) async fn toggle_follow(
    store: &dyn Store,
    state: &ViewState,
    guard: &MutationGuard,
    channel_id: &str,
    meta: &FollowMeta,
) -> Result<Option<bool>, AppError> {
    validate_entity_id(channel_id)?;
    let user = state.identity().ok_or(AppError::NotAuthenticated)?;

    guard
        .run(Relation::Following, channel_id, || async move {
            let following = state.contains(Relation::Following, channel_id);
            let relation = DocPath::new(following_collection(&user.id), channel_id);
            let channel = DocPath::new(USERS_COLLECTION, channel_id);

            let writes = if following {
                vec![
                    Write::Delete { path: relation },
                    Write::Update {
                        path: channel,
                        fields: vec![increment("followers", -1)],
                    },
                ]
            } else {
                vec![
                    Write::Create {
                        path: relation,
                        fields: vec![
                            set("follower_id", json!(user.id)),
                            set("follower_name", json!(user.display_name)),
                            server_timestamp("followed_at"),
                        ],
                    },
                    Write::Update {
                        path: channel,
                        fields: vec![increment("followers", 1)],
                    },
                ]
            };
            store.commit(writes).await?;

            if following {
                state.remove(Relation::Following, channel_id);
            } else {
                state.insert(Relation::Following, channel_id);
            }
            info!(
                channel = channel_id,
                name = meta.name.as_deref().unwrap_or("Unknown"),
                following = !following,
                "follow toggled"
            );
            Ok(!following)
        })
        .await
}

/// Records the first complete watch of a video. Watching is insert-only:
/// repeat watches neither rewrite the relation nor move the view counter.
pub(crate) async fn mark_watched(
    store: &dyn Store,
    state: &ViewState,
    guard: &MutationGuard,
    video_id: &str,
) -> Result<Option<bool>, AppError> {
    validate_entity_id(video_id)?;
    let user = state.identity().ok_or(AppError::NotAuthenticated)?;

    if state.contains(Relation::Watched, video_id) {
        return Ok(None);
    }

    guard
        .run(Relation::Watched, video_id, || async move {
            let writes = vec![
                Write::Create {
                    path: DocPath::new(watched_collection(&user.id), video_id),
                    fields: vec![server_timestamp("watched_at")],
                },
                Write::Update {
                    path: DocPath::new(VIDEOS_COLLECTION, video_id),
                    fields: vec![increment("views", 1)],
                },
            ];
            store.commit(writes).await?;

            state.insert(Relation::Watched, video_id);
            info!(video = video_id, "watch recorded");
            Ok(true)
        })
        .await
}

/// Creators ranked by follower count, decorated with whether the caller
/// already follows them.
pub(crate) async fn suggested_channels(
    store: &dyn Store,
    state: &ViewState,
) -> Result<Vec<ChannelSuggestion>, AppError> {
    let docs = store
        .query(
            USERS_COLLECTION,
            Query::new()
                .filter(Filter::Eq("is_creator".to_string(), json!(true)))
                .order_by("followers", Direction::Descending)
                .limit(SUGGESTED_CHANNEL_LIMIT),
        )
        .await?;

    let following = state.snapshot().following;
    Ok(docs
        .iter()
        .map(|doc| ChannelSuggestion {
            id: doc.id.clone(),
            name: doc
                .str_field("display_name")
                .unwrap_or("Unknown Creator")
                .to_string(),
            avatar_url: doc.str_field("avatar_url").unwrap_or_default().to_string(),
            follower_count: doc.u64_field("followers").unwrap_or(0),
            is_following: following.contains(&doc.id),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::clock::ManualClock;
    use crate::error::{AppError, StoreError};
    use crate::guard::MutationGuard;
    use crate::models::{FollowMeta, Identity};
    use crate::state::ViewState;
    use crate::store::memory::MemoryStore;
    use crate::store::{set, DocPath, Document, Query, Store, Write};

    use super::{mark_watched, suggested_channels, toggle_follow, toggle_like};

    fn signed_in_state() -> ViewState {
        let state = ViewState::new();
        state.set_session(
            Identity {
                id: "u1".to_string(),
                display_name: "Aya".to_string(),
                email: "aya@example.com".to_string(),
                avatar_url: String::new(),
                email_verified: true,
            },
            HashSet::new(),
            HashSet::new(),
            HashSet::new(),
        );
        state
    }

    async fn store_with_video() -> MemoryStore {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        store
            .commit(vec![Write::Create {
                path: DocPath::new("videos", "v1"),
                fields: vec![set("likes", json!(5)), set("views", json!(0))],
            }])
            .await
            .unwrap();
        store
    }

    async fn like_count(store: &MemoryStore) -> i64 {
        store
            .get(&DocPath::new("videos", "v1"))
            .await
            .unwrap()
            .unwrap()
            .i64_field("likes")
            .unwrap()
    }

    #[tokio::test]
    async fn like_round_trip_moves_counter_and_set() {
        let store = store_with_video().await;
        let state = signed_in_state();
        let guard = MutationGuard::new();

        let liked = toggle_like(&store, &state, &guard, "v1").await.unwrap();
        assert_eq!(liked, Some(true));
        assert_eq!(like_count(&store).await, 6);
        assert!(state.snapshot().liked.contains("v1"));
        assert!(store
            .get(&DocPath::new("users/u1/liked", "v1"))
            .await
            .unwrap()
            .is_some());

        let unliked = toggle_like(&store, &state, &guard, "v1").await.unwrap();
        assert_eq!(unliked, Some(false));
        assert_eq!(like_count(&store).await, 5);
        assert!(!state.snapshot().liked.contains("v1"));
        assert!(store
            .get(&DocPath::new("users/u1/liked", "v1"))
            .await
            .unwrap()
            .is_none());
    }

    /// Store wrapper that parks the first commit until released, to hold a
    /// toggle open across another call.
    struct GatedStore {
        inner: MemoryStore,
        release: Notify,
        gated: std::sync::Mutex<bool>,
    }

    #[async_trait]
    impl Store for GatedStore {
        async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
            self.inner.get(path).await
        }

        async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>, StoreError> {
            self.inner.query(collection, query).await
        }

        async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
            let gate = {
                let mut gated = self.gated.lock().unwrap();
                std::mem::replace(&mut *gated, false)
            };
            if gate {
                self.release.notified().await;
            }
            self.inner.commit(writes).await
        }
    }

    #[tokio::test]
    async fn toggle_while_previous_is_settling_is_rejected() {
        let store = GatedStore {
            inner: store_with_video().await,
            release: Notify::new(),
            gated: std::sync::Mutex::new(true),
        };
        let state = signed_in_state();
        let guard = MutationGuard::new();

        let held = toggle_like(&store, &state, &guard, "v1");
        let second = async {
            tokio::task::yield_now().await;
            let result = toggle_like(&store, &state, &guard, "v1").await;
            store.release.notify_one();
            result
        };

        let (held, second) = tokio::join!(held, second);
        assert_eq!(held.unwrap(), Some(true));
        assert_eq!(second.unwrap(), None);
        assert_eq!(like_count(&store.inner).await, 6);
    }

    #[tokio::test]
    async fn failed_batch_leaves_local_state_untouched() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        let state = signed_in_state();
        let guard = MutationGuard::new();

        // No such video document, so the counter update rejects the batch.
        let result = toggle_like(&store, &state, &guard, "ghost").await;
        assert!(result.is_err());
        assert!(!state.snapshot().liked.contains("ghost"));
        assert!(store
            .get(&DocPath::new("users/u1/liked", "ghost"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn toggles_require_a_session() {
        let store = store_with_video().await;
        let state = ViewState::new();
        let guard = MutationGuard::new();

        let result = toggle_like(&store, &state, &guard, "v1").await;
        assert!(matches!(result, Err(AppError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_any_write() {
        let store = store_with_video().await;
        let state = signed_in_state();
        let guard = MutationGuard::new();

        let result = toggle_like(&store, &state, &guard, "videos/../x").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(like_count(&store).await, 5);
    }

    #[tokio::test]
    async fn follow_round_trip() {
        let store = MemoryStore::new(Arc::new(ManualClock::new(0)));
        store
            .commit(vec![Write::Create {
                path: DocPath::new("users", "creator1"),
                fields: vec![
                    set("display_name", json!("Creator One")),
                    set("followers", json!(10)),
                    set("is_creator", json!(true)),
                ],
            }])
            .await
            .unwrap();
        let state = signed_in_state();
        let guard = MutationGuard::new();
        let meta = FollowMeta {
            name: Some("Creator One".to_string()),
        };

        let followed = toggle_follow(&store, &state, &guard, "creator1", &meta)
            .await
            .unwrap();
        assert_eq!(followed, Some(true));
        let channel = store
            .get(&DocPath::new("users", "creator1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(channel.i64_field("followers"), Some(11));
        assert!(state.snapshot().following.contains("creator1"));

        let suggestions = suggested_channels(&store, &state).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].is_following);

        let unfollowed = toggle_follow(&store, &state, &guard, "creator1", &meta)
            .await
            .unwrap();
        assert_eq!(unfollowed, Some(false));
        let channel = store
            .get(&DocPath::new("users", "creator1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(channel.i64_field("followers"), Some(10));
    }

    #[tokio::test]
    async fn repeat_watches_do_not_move_the_counter() {
        let store = store_with_video().await;
        let state = signed_in_state();
        let guard = MutationGuard::new();

        assert_eq!(
            mark_watched(&store, &state, &guard, "v1").await.unwrap(),
            Some(true)
        );
        assert_eq!(
            mark_watched(&store, &state, &guard, "v1").await.unwrap(),
            None
        );

        let video = store
            .get(&DocPath::new("videos", "v1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(video.i64_field("views"), Some(1));
    }
}
