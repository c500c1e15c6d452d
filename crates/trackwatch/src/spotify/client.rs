//! Spotify Web API client.
//!
//! Thin wrapper over `reqwest` that authenticates with the client-credentials
//! flow and exposes the three reads the poller needs: playlist metadata,
//! one page of playlist tracks, and a user's display name. Every request goes
//! through the shared [`RetryPolicy`].

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use snafu::prelude::*;
use std::time::{Duration, Instant};
use tracing::debug;

use trackwatch_core::emit;
use trackwatch_core::metrics::events::UpstreamRequest;
use trackwatch_core::retry::RetryPolicy;

use crate::error::{
    DecodeSnafu, InvalidUrlSnafu, RateLimitedSnafu, StatusSnafu, TransportSnafu, UpstreamError,
};
use crate::model::Item;
use crate::notify::UserDirectory;

/// Number of tracks requested per page.
pub const PAGE_SIZE: u64 = 100;

const TRACK_FIELDS: &str =
    "items(added_by.id,track(id,name,artists(name),external_urls)),next,total";
const PLAYLIST_FIELDS: &str = "id,name,external_urls";

/// Endpoints and credentials for the Spotify API.
#[derive(Clone, PartialEq, Eq)]
pub struct SpotifyConfig {
    pub token_url: String,
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub playlist_id: String,
}

impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("playlist_id", &self.playlist_id)
            .finish()
    }
}

/// Bearer token obtained from the client-credentials exchange.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: String,
}

/// Playlist metadata.
#[derive(Debug, Deserialize)]
pub struct PlaylistMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

impl PlaylistMetadata {
    pub fn external_link(&self) -> &str {
        &self.external_urls.spotify
    }
}

/// One page of playlist tracks.
#[derive(Debug, Deserialize)]
pub struct TracksPage {
    #[serde(default)]
    items: Vec<PlaylistEntry>,
    pub next: Option<String>,
    #[serde(default)]
    pub total: u64,
}

impl TracksPage {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Convert the page into items, skipping entries without a track id
    /// (local files, unavailable tracks).
    pub fn into_items(self) -> Vec<Item> {
        self.items
            .into_iter()
            .filter_map(PlaylistEntry::into_item)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    added_by: Option<UserRef>,
    track: Option<TrackObject>,
}

impl PlaylistEntry {
    fn into_item(self) -> Option<Item> {
        let track = self.track?;
        let item_id = track.id.filter(|id| !id.is_empty())?;

        Some(Item {
            item_id,
            title: track.name,
            artist_names: track.artists.into_iter().map(|a| a.name).collect(),
            external_link: track.external_urls.spotify,
            added_by_id: self
                .added_by
                .and_then(|user| user.id)
                .filter(|id| !id.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    display_name: Option<String>,
}

/// Spotify Web API client.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    config: SpotifyConfig,
    retry: RetryPolicy,
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client, config: SpotifyConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            config,
            retry,
        }
    }

    /// Exchange the client credentials for a bearer token.
    pub async fn authenticate(&self) -> Result<AccessToken, UpstreamError> {
        let endpoint = "token";
        let config = &self.config;

        let response: TokenResponse = self
            .retry
            .run(endpoint, || async move {
                let start = Instant::now();
                let result = self
                    .http
                    .post(&config.token_url)
                    .basic_auth(&config.client_id, Some(&config.client_secret))
                    .form(&[("grant_type", "client_credentials")])
                    .send()
                    .await;
                let response = check_status(endpoint, start, result).await?;
                response
                    .json::<TokenResponse>()
                    .await
                    .context(DecodeSnafu { endpoint })
            })
            .await?;

        debug!("Obtained access token");
        Ok(AccessToken(response.access_token))
    }

    /// Fetch id, name and link of the configured playlist.
    pub async fn playlist_metadata(
        &self,
        token: &AccessToken,
    ) -> Result<PlaylistMetadata, UpstreamError> {
        let url = format!("{}/playlists/{}", self.config.api_url, self.config.playlist_id);
        self.get_json("playlist", &url, token, &[("fields", PLAYLIST_FIELDS.to_string())])
            .await
    }

    /// Fetch one page of tracks starting at `offset`.
    pub async fn tracks_page(
        &self,
        token: &AccessToken,
        offset: u64,
    ) -> Result<TracksPage, UpstreamError> {
        let url = format!(
            "{}/playlists/{}/tracks",
            self.config.api_url, self.config.playlist_id
        );
        let query = [
            ("offset", offset.to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("fields", TRACK_FIELDS.to_string()),
        ];
        self.get_json("tracks", &url, token, &query).await
    }

    /// Fetch a user's display name, if they have one.
    pub async fn user_display_name(
        &self,
        token: &AccessToken,
        user_id: &str,
    ) -> Result<Option<String>, UpstreamError> {
        let url = user_url(&self.config.api_url, user_id)?;
        let profile: UserProfile = self.get_json("user", url.as_str(), token, &[]).await?;
        Ok(profile.display_name)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        token: &AccessToken,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        self.retry
            .run(endpoint, || async move {
                let start = Instant::now();
                let result = self
                    .http
                    .get(url)
                    .bearer_auth(token.as_str())
                    .query(query)
                    .send()
                    .await;
                let response = check_status(endpoint, start, result).await?;
                response.json::<T>().await.context(DecodeSnafu { endpoint })
            })
            .await
    }
}

#[async_trait]
impl UserDirectory for SpotifyClient {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, UpstreamError> {
        let token = self.authenticate().await?;
        self.user_display_name(&token, user_id).await
    }
}

/// `{api}/users/{id}` with the id encoded as a single path segment.
fn user_url(api_url: &str, user_id: &str) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(api_url)
        .ok()
        .filter(|url| !url.cannot_be_a_base())
        .context(InvalidUrlSnafu { url: api_url })?;
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("users").push(user_id);
    }
    Ok(url)
}

/// Record the request and turn non-success statuses into errors.
async fn check_status(
    endpoint: &'static str,
    start: Instant,
    result: Result<Response, reqwest::Error>,
) -> Result<Response, UpstreamError> {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            emit!(UpstreamRequest {
                endpoint,
                status: 0,
                duration: start.elapsed(),
            });
            return Err(e).context(TransportSnafu { endpoint });
        }
    };

    let status = response.status();
    emit!(UpstreamRequest {
        endpoint,
        status: status.as_u16(),
        duration: start.elapsed(),
    });

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parse_retry_after(&response);
        return RateLimitedSnafu {
            endpoint,
            retry_after,
        }
        .fail();
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return StatusSnafu {
            endpoint,
            status: status.as_u16(),
            body,
        }
        .fail();
    }

    Ok(response)
}

/// Parse a `Retry-After` header given in whole seconds.
fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_without_track_id_are_skipped() {
        let page: TracksPage = serde_json::from_value(serde_json::json!({
            "items": [
                {
                    "added_by": { "id": "alice" },
                    "track": {
                        "id": "t1",
                        "name": "Song",
                        "artists": [{ "name": "A" }, { "name": "B" }],
                        "external_urls": { "spotify": "https://open.spotify.com/track/t1" }
                    }
                },
                { "added_by": { "id": "bob" }, "track": null },
                {
                    "added_by": null,
                    "track": { "id": null, "name": "Local file", "artists": [], "external_urls": {} }
                }
            ],
            "next": null,
            "total": 3
        }))
        .unwrap();

        assert!(!page.has_next());

        let items = page.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "t1");
        assert_eq!(items[0].artist_names, vec!["A", "B"]);
        assert_eq!(items[0].added_by_id.as_deref(), Some("alice"));
        assert_eq!(items[0].external_link, "https://open.spotify.com/track/t1");
    }

    #[test]
    fn test_user_url_encodes_id_as_one_segment() {
        let url = user_url("https://api.spotify.com/v1", "a/b?c#d").unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/users/a%2Fb%3Fc%23d");

        let url = user_url("https://api.spotify.com/v1/", "alice").unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/users/alice");
    }

    #[test]
    fn test_user_url_rejects_bad_base() {
        let err = user_url("not a url", "alice").unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidUrl { .. }));
    }

    #[test]
    fn test_metadata_link() {
        let metadata: PlaylistMetadata = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "name": "Mix",
            "external_urls": { "spotify": "https://open.spotify.com/playlist/p1" }
        }))
        .unwrap();

        assert_eq!(metadata.external_link(), "https://open.spotify.com/playlist/p1");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = SpotifyConfig {
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            api_url: "https://api.spotify.com/v1".to_string(),
            client_id: "client".to_string(),
            client_secret: "hunter2".to_string(),
            playlist_id: "p1".to_string(),
        };
        assert!(!format!("{config:?}").contains("hunter2"));
        assert!(!format!("{:?}", AccessToken("secret-token".to_string())).contains("secret"));
    }
}
