//! Spotify playlist access.
//!
//! - `client`: authenticated HTTP calls
//! - `fetcher`: paginated snapshot assembly with a retained cursor

mod client;
mod fetcher;

pub use client::{
    AccessToken, PAGE_SIZE, PlaylistMetadata, SpotifyClient, SpotifyConfig, TracksPage,
};
pub use fetcher::{FetchCursor, FetchOutcome, PlaylistFetcher, SnapshotSource};
