pub mod fixture;
pub mod spotify;

pub use fixture::StaticCatalog;
pub use spotify::SpotifyCatalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors raised by catalog collaborators
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Catalog rejected the access token")]
    Unauthorized,
    #[error("No catalog access token configured; set catalog.access_token or pass --access-token")]
    MissingAccessToken,
    #[error("{}", rate_limit_message(.retry_after_seconds))]
    RateLimited { retry_after_seconds: Option<u64> },
    #[error("Catalog API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Unknown playlist '{0}'")]
    UnknownPlaylist(String),
    #[error("Failed to load catalog fixture: {0}")]
    Fixture(String),
}

fn rate_limit_message(retry_after_seconds: &Option<u64>) -> String {
    match retry_after_seconds {
        Some(seconds) => format!("Rate limited: retry after {seconds} seconds"),
        None => "Rate limited".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A canonical artist record as returned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtist {
    /// Catalog identifier, the only field compared when deduplicating
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub images: Vec<ArtistImage>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

impl ResolvedArtist {
    #[must_use]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            uri: format!("spotify:artist:{id}"),
            images: Vec::new(),
            genres: Vec::new(),
            popularity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
    /// Names of the credited artists, in catalog order
    #[serde(default)]
    pub artists: Vec<String>,
}

impl Track {
    #[must_use]
    pub fn new(id: &str, name: &str, artists: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            uri: format!("spotify:track:{id}"),
            artists: artists.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// Resolves a free-text artist name to the catalog's best match
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtistSearch: Send + Sync {
    /// Returns at most one best-guess artist, or `None` when nothing matched
    async fn search_artist(&self, name: &str) -> Result<Option<ResolvedArtist>, CatalogError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopTracks: Send + Sync {
    async fn top_tracks(&self, artist: &ResolvedArtist) -> Result<Vec<Track>, CatalogError>;
}

/// Read and append access to user playlists
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// All tracks currently in the playlist
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, CatalogError>;

    /// Append track URIs in one request; callers keep batches within the catalog limit
    async fn append_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError>;
}
