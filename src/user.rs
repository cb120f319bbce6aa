//! Session lifecycle: profile bootstrap on first sign-in, membership-set
//! loading, sign-out invalidation.

use std::collections::HashSet;

use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::models::Identity;
use crate::state::ViewState;
use crate::store::{server_timestamp, set, DocPath, Query, Store, Write};
use crate::utils::validate_entity_id;

pub(crate) const USERS_COLLECTION: &str = "users";

// Safety limits on how much membership state one session pulls down.
const LIKED_LOAD_LIMIT: usize = 100;
const FOLLOWING_LOAD_LIMIT: usize = 500;
const WATCHED_LOAD_LIMIT: usize = 500;

pub(crate) fn liked_collection(user_id: &str) -> String {
    format!("{USERS_COLLECTION}/{user_id}/liked")
}

pub(crate) fn following_collection(user_id: &str) -> String {
    format!("{USERS_COLLECTION}/{user_id}/following")
}

pub(crate) fn watched_collection(user_id: &str) -> String {
    format!("{USERS_COLLECTION}/{user_id}/watched")
}

/// Installs the identity delivered by the auth callback: makes sure the
/// profile document exists, loads the caller's membership sets, then
/// publishes everything to the view state in one step.
pub(crate) async fn sign_in(
    store: &dyn Store,
    state: &ViewState,
    identity: Identity,
) -> Result<(), AppError> {
    validate_entity_id(&identity.id)?;

    ensure_profile(store, &identity).await?;

    let liked = load_relation_ids(store, &liked_collection(&identity.id), LIKED_LOAD_LIMIT).await?;
    let following = load_relation_ids(
        store,
        &following_collection(&identity.id),
        FOLLOWING_LOAD_LIMIT,
    )
    .await?;
    let watched =
        load_relation_ids(store, &watched_collection(&identity.id), WATCHED_LOAD_LIMIT).await?;

    info!(
        user = %identity.id,
        liked = liked.len(),
        following = following.len(),
        watched = watched.len(),
        "session loaded"
    );
    state.set_session(identity, liked, following, watched);

    Ok(())
}

pub(crate) fn sign_out(state: &ViewState) {
    state.clear_session();
    info!("session cleared");
}

async fn ensure_profile(store: &dyn Store, identity: &Identity) -> Result<(), AppError> {
    let path = DocPath::new(USERS_COLLECTION, &identity.id);
    if store.get(&path).await?.is_some() {
        return Ok(());
    }

    // First sign-in: profile and default preferences land in one batch.
    store
        .commit(vec![
            Write::Create {
                path,
                fields: vec![
                    set("display_name", json!(identity.display_name)),
                    set("email", json!(identity.email)),
                    set("avatar_url", json!(identity.avatar_url)),
                    set("email_verified", json!(identity.email_verified)),
                    set("followers", json!(0)),
                    set("is_creator", json!(false)),
                    set("verified", json!(false)),
                    server_timestamp("created_at"),
                    server_timestamp("last_active"),
                ],
            },
            Write::Create {
                path: DocPath::new(
                    format!("{USERS_COLLECTION}/{}/metadata", identity.id),
                    "preferences",
                ),
                fields: vec![
                    set("theme", json!("dark")),
                    set("notifications", json!(true)),
                ],
            },
        ])
        .await?;

    info!(user = %identity.id, "created profile");
    Ok(())
}

async fn load_relation_ids(
    store: &dyn Store,
    collection: &str,
    limit: usize,
) -> Result<HashSet<String>, AppError> {
    let docs = store.query(collection, Query::new().limit(limit)).await?;
    Ok(docs.into_iter().map(|doc| doc.id).collect())
}
