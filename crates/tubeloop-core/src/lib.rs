//! Tubeloop Core Library
//!
//! This crate provides the core functionality for the Tubeloop player:
//! - Video identifier parsing for YouTube URLs
//! - Playlist storage with de-duplication and bulk import/export
//! - Play-order control (sequential, shuffle, single loop)
//! - Coordination of an embedded player driven by host callbacks

pub mod config;
pub mod coordinator;
pub mod error;
pub mod order;
pub mod player;
pub mod playlist;
pub mod storage;
pub mod transfer;
pub mod youtube;

pub use config::{AppConfig, Preferences};
pub use coordinator::{PlaybackCoordinator, PlayerStatus, SessionEvent};
pub use error::{Error, Result};
pub use order::{OrderController, PlayMode};
pub use player::{PlayerEvent, PlayerFactory, PlayerHandle};
pub use playlist::{ImportSummary, PlaylistEntry, PlaylistStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use youtube::{VideoId, parse_video_id};
