use super::{ArtistImage, ArtistSearch, CatalogError, PlaylistStore, ResolvedArtist, TopTracks, Track};
use crate::config::CatalogConfig;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Catalog client for the Spotify Web API.
///
/// The access token is used as-is; obtaining and refreshing it happens elsewhere.
pub struct SpotifyCatalog {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    market: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: Page<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    id: String,
    name: String,
    uri: String,
    #[serde(default)]
    images: Vec<ApiImage>,
    #[serde(default)]
    genres: Vec<String>,
    popularity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    tracks: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    // Local files in playlists have no id
    id: Option<String>,
    name: String,
    uri: String,
    #[serde(default)]
    artists: Vec<ApiTrackArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiTrackArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl From<ApiArtist> for ResolvedArtist {
    fn from(artist: ApiArtist) -> Self {
        Self {
            id: artist.id,
            name: artist.name,
            uri: artist.uri,
            images: artist
                .images
                .into_iter()
                .map(|image| ArtistImage {
                    url: image.url,
                    width: image.width,
                    height: image.height,
                })
                .collect(),
            genres: artist.genres,
            popularity: artist.popularity,
        }
    }
}

impl From<ApiTrack> for Track {
    fn from(track: ApiTrack) -> Self {
        Self {
            id: track.id.unwrap_or_default(),
            name: track.name,
            uri: track.uri,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

impl SpotifyCatalog {
    pub fn new(
        access_token: &str,
        base_url: &str,
        market: &str,
        request_timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            market: market.to_string(),
        })
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        if config.access_token.is_empty() {
            return Err(CatalogError::MissingAccessToken);
        }
        Self::new(
            &config.access_token,
            config.base_url(),
            &config.market,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        log::trace!("GET {url} {query:?}");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, retry_after.as_deref(), body))
}

/// Map a non-success response to the matching catalog error
fn status_error(status: StatusCode, retry_after: Option<&str>, body: String) -> CatalogError {
    match status {
        StatusCode::UNAUTHORIZED => CatalogError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited {
            retry_after_seconds: retry_after.and_then(|value| value.trim().parse().ok()),
        },
        _ => {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            CatalogError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[async_trait]
impl ArtistSearch for SpotifyCatalog {
    async fn search_artist(&self, name: &str) -> Result<Option<ResolvedArtist>, CatalogError> {
        let url = format!("{}/search", self.base_url);
        let response: SearchResponse = self
            .get_json(&url, &[("q", name), ("type", "artist"), ("limit", "1")])
            .await?;

        let best = response.artists.items.into_iter().next().map(ResolvedArtist::from);
        match &best {
            Some(artist) => log::debug!("Catalog matched '{name}' to '{}' ({})", artist.name, artist.id),
            None => log::debug!("Catalog has no artist matching '{name}'"),
        }
        Ok(best)
    }
}

#[async_trait]
impl TopTracks for SpotifyCatalog {
    async fn top_tracks(&self, artist: &ResolvedArtist) -> Result<Vec<Track>, CatalogError> {
        let url = format!("{}/artists/{}/top-tracks", self.base_url, artist.id);
        let response: TopTracksResponse =
            self.get_json(&url, &[("market", self.market.as_str())]).await?;
        Ok(response.tracks.into_iter().map(Track::from).collect())
    }
}

#[async_trait]
impl PlaylistStore for SpotifyCatalog {
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, CatalogError> {
        let mut tracks = Vec::new();
        let first = format!("{}/playlists/{playlist_id}/tracks", self.base_url);
        let mut page: Page<PlaylistItem> = self
            .get_json(&first, &[("limit", "100"), ("market", self.market.as_str())])
            .await?;

        loop {
            tracks.extend(page.items.into_iter().filter_map(|item| item.track).map(Track::from));
            let Some(next) = page.next else {
                break;
            };
            // `next` already carries the paging query
            page = self.get_json(&next, &[]).await?;
        }

        log::debug!("Fetched {} tracks from playlist {playlist_id}", tracks.len());
        Ok(tracks)
    }

    async fn append_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError> {
        let url = format!("{}/playlists/{playlist_id}/tracks", self.base_url);
        log::trace!("POST {url} ({} uris)", uris.len());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "uris": uris }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
