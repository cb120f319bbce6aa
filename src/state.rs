//! Process-wide view state.
//!
//! One mutable snapshot of everything the UI renders from: the signed-in
//! identity, the loaded feed, the pagination cursor, and the membership
//! sets. Readers get owned copies; every change goes through a mutator here,
//! so a snapshot handed out earlier can never bleed back in.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::guard::Relation;
use crate::models::{Identity, VideoRecord};
use crate::store::Cursor;

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub identity: Option<Identity>,
    pub videos: Vec<VideoRecord>,
    pub is_loading: bool,
    /// Where the last feed page ended. Replaced only by non-empty pages, so
    /// an exhausted feed keeps re-reading its tail instead of skipping ahead.
    pub cursor: Option<Cursor>,
    pub liked: HashSet<String>,
    pub following: HashSet<String>,
    pub watched: HashSet<String>,
}

#[derive(Default)]
pub struct ViewState {
    inner: Mutex<Snapshot>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().unwrap().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().unwrap().identity.clone()
    }

    pub(crate) fn cursor(&self) -> Option<Cursor> {
        self.inner.lock().unwrap().cursor.clone()
    }

    pub(crate) fn set_session(
        &self,
        identity: Identity,
        liked: HashSet<String>,
        following: HashSet<String>,
        watched: HashSet<String>,
    ) {
        let mut state = self.inner.lock().unwrap();
        state.identity = Some(identity);
        state.liked = liked;
        state.following = following;
        state.watched = watched;
    }

    /// Drops the identity and every membership set. The public feed itself
    /// stays; it is not tied to a session.
    pub(crate) fn clear_session(&self) {
        let mut state = self.inner.lock().unwrap();
        state.identity = None;
        state.liked.clear();
        state.following.clear();
        state.watched.clear();
    }

    /// Claims the single feed-fetch slot. Returns `false` while another
    /// fetch is in flight; that caller's request is dropped, not queued.
    pub(crate) fn begin_feed_load(&self) -> bool {
        let mut state = self.inner.lock().unwrap();
        if state.is_loading {
            return false;
        }
        state.is_loading = true;
        true
    }

    pub(crate) fn feed_loaded(
        &self,
        videos: Vec<VideoRecord>,
        cursor: Option<Cursor>,
        append: bool,
    ) {
        let mut state = self.inner.lock().unwrap();
        if append {
            state.videos.extend(videos);
        } else if !videos.is_empty() {
            state.videos = videos;
        }
        if let Some(cursor) = cursor {
            state.cursor = Some(cursor);
        }
        state.is_loading = false;
    }

    pub(crate) fn feed_failed(&self) {
        self.inner.lock().unwrap().is_loading = false;
    }

    pub(crate) fn contains(&self, relation: Relation, id: &str) -> bool {
        let state = self.inner.lock().unwrap();
        members(&state, relation).contains(id)
    }

    pub(crate) fn insert(&self, relation: Relation, id: &str) {
        let mut state = self.inner.lock().unwrap();
        members_mut(&mut state, relation).insert(id.to_string());
    }

    pub(crate) fn remove(&self, relation: Relation, id: &str) {
        let mut state = self.inner.lock().unwrap();
        members_mut(&mut state, relation).remove(id);
    }
}

fn members(state: &Snapshot, relation: Relation) -> &HashSet<String> {
    match relation {
        Relation::Liked => &state.liked,
        Relation::Following => &state.following,
        Relation::Watched => &state.watched,
    }
}

fn members_mut(state: &mut Snapshot, relation: Relation) -> &mut HashSet<String> {
    match relation {
        Relation::Liked => &mut state.liked,
        Relation::Following => &mut state.following,
        Relation::Watched => &mut state.watched,
    }
}
