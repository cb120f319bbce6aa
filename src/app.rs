//! Application facade.
//!
//! Owns one instance of everything the UI talks to: the view state, the
//! mutation guard, and the import service with its request queue. Every
//! UI-facing operation resolves to an [`Outcome`]; nothing here throws past
//! the boundary. Failures are logged in full and surfaced as a short status
//! line.

use std::sync::Arc;

use tracing::error;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::AppError;
use crate::guard::MutationGuard;
use crate::models::{ChannelSuggestion, FollowMeta, Identity};
use crate::social;
use crate::state::{Snapshot, ViewState};
use crate::store::Store;
use crate::user;
use crate::videos;
use crate::youtube::{MetadataApi, YouTubeService};

/// How a UI action settled: it ran, it was ignored (already in progress or
/// already in the requested state), or it failed with a user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    Ignored,
    Failed { message: String },
}

pub struct App {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    state: Arc<ViewState>,
    guard: MutationGuard,
    youtube: YouTubeService,
}

impl App {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        api: Arc<dyn MetadataApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let youtube = YouTubeService::new(Arc::clone(&store), api, clock, Arc::clone(&config));

        Self {
            config,
            store,
            state: Arc::new(ViewState::new()),
            guard: MutationGuard::new(),
            youtube,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn youtube(&self) -> &YouTubeService {
        &self.youtube
    }

    pub async fn sign_in(&self, identity: Identity) -> Outcome {
        settle(
            "sign_in",
            user::sign_in(self.store.as_ref(), &self.state, identity)
                .await
                .map(Some),
        )
    }

    pub fn sign_out(&self) {
        user::sign_out(&self.state);
    }

    pub async fn toggle_like(&self, video_id: &str) -> Outcome {
        settle(
            "toggle_like",
            social::toggle_like(self.store.as_ref(), &self.state, &self.guard, video_id).await,
        )
    }

    pub async fn toggle_follow(&self, channel_id: &str, meta: FollowMeta) -> Outcome {
        settle(
            "toggle_follow",
            social::toggle_follow(
                self.store.as_ref(),
                &self.state,
                &self.guard,
                channel_id,
                &meta,
            )
            .await,
        )
    }

    pub async fn mark_watched(&self, video_id: &str) -> Outcome {
        settle(
            "mark_watched",
            social::mark_watched(self.store.as_ref(), &self.state, &self.guard, video_id).await,
        )
    }

    pub async fn load_feed(&self) -> Outcome {
        settle(
            "load_feed",
            videos::load_feed(self.store.as_ref(), &self.state, &self.config)
                .await
                .map(|ran| ran.then_some(())),
        )
    }

    pub async fn load_more(&self) -> Outcome {
        settle(
            "load_more",
            videos::load_more(self.store.as_ref(), &self.state, &self.config)
                .await
                .map(|ran| ran.then_some(())),
        )
    }

    /// Who-to-follow suggestions; empty on failure rather than erroring.
    pub async fn suggested_channels(&self) -> Vec<ChannelSuggestion> {
        match social::suggested_channels(self.store.as_ref(), &self.state).await {
            Ok(suggestions) => suggestions,
            Err(err) => {
                error!(error = %err, "loading suggested channels failed");
                Vec::new()
            }
        }
    }

    /// Entry point for the import job scheduler. Resolves to how many new
    /// videos landed; a failed scan reports zero instead of erroring.
    pub async fn check_all_channels_for_new_content(&self) -> usize {
        match self.youtube.check_channels().await {
            Ok(imported) => imported,
            Err(err) => {
                error!(error = %err, "channel scan failed");
                0
            }
        }
    }

    pub async fn update_channel_statistics(&self) -> usize {
        match self.youtube.update_channel_stats().await {
            Ok(updated) => updated,
            Err(err) => {
                error!(error = %err, "channel statistics update failed");
                0
            }
        }
    }
}

fn settle<T>(action: &'static str, result: Result<Option<T>, AppError>) -> Outcome {
    match result {
        Ok(Some(_)) => Outcome::Completed,
        Ok(None) => Outcome::Ignored,
        Err(err) => {
            error!(action, error = %err, "operation failed");
            Outcome::Failed {
                message: err.user_message().to_string(),
            }
        }
    }
}
