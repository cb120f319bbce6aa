//! # ClipNow client core
//!
//! Request coordination for a short-video client that sits between a UI
//! layer, a hosted document database, and a quota-limited video metadata
//! API. Rendering, auth callbacks, and push delivery live elsewhere; this
//! crate owns the traffic discipline between them.
//!
//!
//!
//! # Components
//!
//! - [`guard`]: per-entity in-flight markers. A second like/follow tap on
//!   the same entity while the first is still settling is a no-op, so the
//!   store never sees two racing read-modify-write pairs.
//!
//! - [`queue`]: the rate-limited request queue. Every metadata API call
//!   funnels through one FIFO drain loop that spaces dispatches to stay
//!   under the per-minute quota, no matter how many callers burst at once.
//!
//! - [`state`]: the process-wide view state: signed-in identity, loaded
//!   feed, pagination cursor, and the liked/following/watched sets. Readers
//!   get owned snapshots; all changes go through mutators.
//!
//! - [`youtube`]: the import pipeline. Scans tracked channels through the
//!   queue, deduplicates by source video id before inserting, and tolerates
//!   per-channel and per-video failures without aborting the batch.
//!
//! The document database is reached only through the [`store`] capability
//! trait (point reads, filtered queries with cursors, atomic batches with
//! server timestamps and counter increments). [`store::memory::MemoryStore`]
//! implements it in-process for tests and the importer harness.
//!
//!
//!
//! # Concurrency model
//!
//! All operations are cooperative async tasks on one logical thread. Shared
//! state is owned by its component and touched only through that
//! component's methods; locks are held across lookups, never across awaits.
//! Nothing here cancels mid-flight: abandoning a returned future's result
//! does not stop the underlying store or API call.
//!
//!
//!
//! # Time
//!
//! Rate-limit spacing and server timestamps read the clock through the
//! [`clock::Clock`] capability. Production wires [`clock::SystemClock`];
//! tests drive [`clock::ManualClock`] so rate-limited paths run instantly
//! while still observing real spacing.

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod queue;
pub mod social;
pub mod state;
pub mod store;
pub mod user;
pub mod utils;
pub mod videos;
pub mod youtube;

pub use app::{App, Outcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{ApiError, AppError, StoreError};
pub use models::{ChannelSuggestion, FollowMeta, Identity, VideoRecord};
pub use state::Snapshot;
pub use store::memory::MemoryStore;
pub use store::Store;
pub use youtube::{HttpMetadataApi, MetadataApi};
