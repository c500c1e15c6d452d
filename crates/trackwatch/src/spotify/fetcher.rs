//! Playlist snapshot assembly.
//!
//! The fetcher owns a cursor that survives across cycles. Each fetch starts
//! reading pages at the retained offset, so a snapshot holds only the tracks
//! found from that position onwards.
//!
//! Offset policy, applied after every page:
//!
//! - a next page exists: offset advances one page and the fetch is marked
//!   recovering (we are still catching up)
//! - last page: the fetch is marked recovering when the offset we read from
//!   is a multiple of the page size, and the offset jumps to `total`
//!
//! A cold start therefore always reads from 0 as "recovering", which keeps a
//! pre-existing playlist from being announced track by track. The page
//! alignment check also fires when `total` itself happens to be a multiple of
//! the page size, suppressing notifications while that holds.

use async_trait::async_trait;
use tracing::info;

use trackwatch_core::emit;
use trackwatch_core::metrics::events::TracksFetched;

use super::client::{PAGE_SIZE, SpotifyClient};
use crate::error::UpstreamError;
use crate::model::Snapshot;

/// Result of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub snapshot: Snapshot,
    /// True when the snapshot is known to be incomplete; notifications are
    /// withheld for the cycle.
    pub recovering: bool,
}

/// Something that can produce the current snapshot of the watched playlist.
#[async_trait]
pub trait SnapshotSource: Send {
    async fn fetch_snapshot(&mut self) -> Result<FetchOutcome, UpstreamError>;
}

/// Retained pagination position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCursor {
    pub offset: u64,
    pub recovering: bool,
}

impl FetchCursor {
    /// Apply the offset policy for a page read at `self.offset`.
    pub fn advance(&mut self, has_next: bool, total: u64) {
        if has_next {
            self.offset += PAGE_SIZE;
            self.recovering = true;
        } else {
            self.recovering = self.offset % PAGE_SIZE == 0;
            self.offset = total;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    Tail,
    Full,
}

/// Fetches playlist snapshots from Spotify.
#[derive(Debug)]
pub struct PlaylistFetcher {
    client: SpotifyClient,
    cursor: FetchCursor,
    mode: FetchMode,
}

impl PlaylistFetcher {
    /// Follow the playlist tail, resuming from the retained offset.
    pub fn new(client: SpotifyClient) -> Self {
        Self {
            client,
            cursor: FetchCursor::default(),
            mode: FetchMode::Tail,
        }
    }

    /// Read the whole playlist on every fetch.
    pub fn full_scan(client: SpotifyClient) -> Self {
        Self {
            client,
            cursor: FetchCursor::default(),
            mode: FetchMode::Full,
        }
    }

    pub fn cursor(&self) -> FetchCursor {
        self.cursor
    }
}

#[async_trait]
impl SnapshotSource for PlaylistFetcher {
    async fn fetch_snapshot(&mut self) -> Result<FetchOutcome, UpstreamError> {
        let token = self.client.authenticate().await?;
        let metadata = self.client.playlist_metadata(&token).await?;

        if self.mode == FetchMode::Full {
            self.cursor = FetchCursor::default();
        }
        let start_offset = self.cursor.offset;
        let mut tracks = Vec::new();

        loop {
            let offset = self.cursor.offset;
            let page = self.client.tracks_page(&token, offset).await?;
            let has_next = page.has_next();
            let total = page.total;

            let items = page.into_items();
            emit!(TracksFetched {
                count: items.len(),
                offset,
            });
            tracks.extend(items);

            self.cursor.advance(has_next, total);
            if !has_next {
                break;
            }
        }

        if self.mode == FetchMode::Full {
            self.cursor.recovering = false;
        }

        info!(
            playlist = %metadata.name,
            id = %metadata.id,
            tracks = tracks.len(),
            start_offset,
            next_offset = self.cursor.offset,
            recovering = self.cursor.recovering,
            "Fetched playlist"
        );

        let external_link = metadata.external_link().to_string();
        Ok(FetchOutcome {
            snapshot: Snapshot {
                id: metadata.id,
                name: metadata.name,
                external_link,
                tracks,
            },
            recovering: self.cursor.recovering,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_single_page_is_recovering() {
        let mut cursor = FetchCursor::default();
        cursor.advance(false, 42);

        assert!(cursor.recovering);
        assert_eq!(cursor.offset, 42);
    }

    #[test]
    fn test_unaligned_offset_settles() {
        let mut cursor = FetchCursor {
            offset: 42,
            recovering: true,
        };
        cursor.advance(false, 43);

        assert!(!cursor.recovering);
        assert_eq!(cursor.offset, 43);
    }

    #[test]
    fn test_multi_page_walk() {
        let mut cursor = FetchCursor::default();

        cursor.advance(true, 250);
        assert_eq!(cursor.offset, 100);
        assert!(cursor.recovering);

        cursor.advance(true, 250);
        assert_eq!(cursor.offset, 200);
        assert!(cursor.recovering);

        // Last page read from an aligned offset
        cursor.advance(false, 250);
        assert_eq!(cursor.offset, 250);
        assert!(cursor.recovering);

        // Next cycle reads from 250 and settles
        cursor.advance(false, 251);
        assert_eq!(cursor.offset, 251);
        assert!(!cursor.recovering);
    }

    #[test]
    fn test_page_aligned_total_keeps_recovering() {
        // A playlist of exactly 200 tracks parks the cursor on an aligned
        // offset, so every following cycle counts as recovering.
        let mut cursor = FetchCursor {
            offset: 150,
            recovering: false,
        };
        cursor.advance(false, 200);
        assert_eq!(cursor.offset, 200);
        assert!(!cursor.recovering);

        cursor.advance(false, 200);
        assert_eq!(cursor.offset, 200);
        assert!(cursor.recovering);

        cursor.advance(false, 200);
        assert!(cursor.recovering);
    }

    #[test]
    fn test_shrinking_playlist_moves_offset_back() {
        let mut cursor = FetchCursor {
            offset: 57,
            recovering: false,
        };
        cursor.advance(false, 40);
        assert_eq!(cursor.offset, 40);
        assert!(!cursor.recovering);
    }
}
