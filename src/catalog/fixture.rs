use super::{ArtistSearch, CatalogError, PlaylistStore, ResolvedArtist, TopTracks, Track};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// In-memory catalog for offline runs and tests.
///
/// Artist search is a case-insensitive exact name match. Appended tracks are
/// recorded per playlist and can be read back with [`StaticCatalog::appended`].
#[derive(Debug, Default, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    artists: Vec<ResolvedArtist>,
    #[serde(default)]
    top_tracks: HashMap<String, Vec<Track>>,
    #[serde(default)]
    playlists: HashMap<String, Vec<Track>>,
    #[serde(skip)]
    appended: Mutex<HashMap<String, Vec<String>>>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON file with `artists`, `top_tracks` and `playlists` keys
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Fixture(format!("{}: {e}", path.display())))?;
        let catalog: Self = serde_json::from_str(&contents)
            .map_err(|e| CatalogError::Fixture(format!("{}: {e}", path.display())))?;
        log::info!(
            "Loaded catalog fixture with {} artists and {} playlists from {}",
            catalog.artists.len(),
            catalog.playlists.len(),
            path.display()
        );
        Ok(catalog)
    }

    #[must_use]
    pub fn with_artist(mut self, artist: ResolvedArtist) -> Self {
        self.artists.push(artist);
        self
    }

    #[must_use]
    pub fn with_top_tracks(mut self, artist_id: &str, tracks: Vec<Track>) -> Self {
        self.top_tracks.insert(artist_id.to_string(), tracks);
        self
    }

    #[must_use]
    pub fn with_playlist(mut self, playlist_id: &str, tracks: Vec<Track>) -> Self {
        self.playlists.insert(playlist_id.to_string(), tracks);
        self
    }

    /// URIs appended to a playlist so far, in append order
    #[must_use]
    pub fn appended(&self, playlist_id: &str) -> Vec<String> {
        self.appended
            .lock()
            .map(|appended| appended.get(playlist_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtistSearch for StaticCatalog {
    async fn search_artist(&self, name: &str) -> Result<Option<ResolvedArtist>, CatalogError> {
        let wanted = name.to_lowercase();
        Ok(self
            .artists
            .iter()
            .find(|artist| artist.name.to_lowercase() == wanted)
            .cloned())
    }
}

#[async_trait]
impl TopTracks for StaticCatalog {
    async fn top_tracks(&self, artist: &ResolvedArtist) -> Result<Vec<Track>, CatalogError> {
        Ok(self.top_tracks.get(&artist.id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PlaylistStore for StaticCatalog {
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, CatalogError> {
        self.playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownPlaylist(playlist_id.to_string()))
    }

    async fn append_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError> {
        let mut appended = self
            .appended
            .lock()
            .map_err(|_| CatalogError::Fixture("append log poisoned".to_string()))?;
        appended
            .entry(playlist_id.to_string())
            .or_default()
            .extend(uris.iter().cloned());
        Ok(())
    }
}
