use crate::catalog::{CatalogError, PlaylistStore, ResolvedArtist, TopTracks, Track};
use crate::config::PlaylistConfig;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Largest number of URIs the catalog accepts in a single append request
pub const MAX_APPEND_BATCH: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("Failed to read playlist '{playlist_id}': {source}")]
    Read {
        playlist_id: String,
        #[source]
        source: CatalogError,
    },
    #[error("Append to '{playlist_id}' stopped after {appended} of {total} tracks: {source}")]
    Append {
        playlist_id: String,
        appended: usize,
        total: usize,
        #[source]
        source: CatalogError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistOptions {
    pub tracks_per_artist: usize,
    pub append_batch_size: usize,
    pub dry_run: bool,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self::from_config(&PlaylistConfig::default())
    }
}

impl PlaylistOptions {
    #[must_use]
    pub fn from_config(config: &PlaylistConfig) -> Self {
        Self {
            tracks_per_artist: config.tracks_per_artist,
            append_batch_size: config.append_batch_size,
            dry_run: config.dry_run,
        }
    }

    fn batch_size(&self) -> usize {
        self.append_batch_size.clamp(1, MAX_APPEND_BATCH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackFetchFailure {
    pub artist_id: String,
    pub artist_name: String,
    pub cause: String,
}

/// Top tracks gathered for a set of artists, unique by URI
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectedTracks {
    pub tracks: Vec<Track>,
    pub failures: Vec<TrackFetchFailure>,
}

impl CollectedTracks {
    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        self.tracks.iter().map(|track| track.uri.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendReport {
    pub playlist_id: String,
    pub appended: usize,
    pub requests: usize,
    pub dry_run: bool,
}

/// Fetches top tracks for resolved artists and appends them to a playlist
pub struct PlaylistBuilder<T, P> {
    top_tracks: Arc<T>,
    store: Arc<P>,
    options: PlaylistOptions,
}

impl<T: TopTracks, P: PlaylistStore> PlaylistBuilder<T, P> {
    pub fn new(top_tracks: Arc<T>, store: Arc<P>, options: PlaylistOptions) -> Self {
        Self {
            top_tracks,
            store,
            options,
        }
    }

    /// Fetch every artist's top tracks concurrently. A failed fetch is
    /// recorded and the remaining artists still contribute.
    pub async fn collect_tracks(&self, artists: &[ResolvedArtist]) -> CollectedTracks {
        let fetches = artists.iter().map(|artist| async move {
            (artist, self.top_tracks.top_tracks(artist).await)
        });

        let mut collected = CollectedTracks::default();
        let mut seen_uris = HashSet::new();

        for (artist, fetched) in join_all(fetches).await {
            match fetched {
                Ok(tracks) => {
                    let before = collected.tracks.len();
                    for track in tracks.into_iter().take(self.options.tracks_per_artist) {
                        if track.uri.is_empty() || !seen_uris.insert(track.uri.clone()) {
                            continue;
                        }
                        collected.tracks.push(track);
                    }
                    debug!(
                        "Took {} top tracks from '{}'",
                        collected.tracks.len() - before,
                        artist.name
                    );
                }
                Err(e) => {
                    warn!("Failed to fetch top tracks for '{}': {e}", artist.name);
                    collected.failures.push(TrackFetchFailure {
                        artist_id: artist.id.clone(),
                        artist_name: artist.name.clone(),
                        cause: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Collected {} tracks from {} artists ({} failed)",
            collected.tracks.len(),
            artists.len(),
            collected.failures.len()
        );
        collected
    }

    /// Append URIs in catalog-sized chunks, stopping at the first failed chunk
    pub async fn append(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<AppendReport, PlaylistError> {
        let mut report = AppendReport {
            playlist_id: playlist_id.to_string(),
            appended: 0,
            requests: 0,
            dry_run: self.options.dry_run,
        };

        for chunk in uris.chunks(self.options.batch_size()) {
            if self.options.dry_run {
                info!(
                    "DRY RUN: Would append {} tracks to playlist {playlist_id}",
                    chunk.len()
                );
            } else {
                self.store
                    .append_tracks(playlist_id, chunk)
                    .await
                    .map_err(|source| PlaylistError::Append {
                        playlist_id: playlist_id.to_string(),
                        appended: report.appended,
                        total: uris.len(),
                        source,
                    })?;
                report.requests += 1;
            }
            report.appended += chunk.len();
        }

        info!(
            "Appended {} tracks to playlist {playlist_id} in {} requests",
            report.appended, report.requests
        );
        Ok(report)
    }

    /// Collect top tracks for `artists` and append them to the playlist
    pub async fn build(
        &self,
        playlist_id: &str,
        artists: &[ResolvedArtist],
    ) -> Result<(CollectedTracks, AppendReport), PlaylistError> {
        let collected = self.collect_tracks(artists).await;
        let report = self.append(playlist_id, &collected.uris()).await?;
        Ok((collected, report))
    }

    /// Artist names credited on a playlist's tracks, unique, in order of first appearance
    pub async fn discover_artists(&self, playlist_id: &str) -> Result<Vec<String>, PlaylistError> {
        let tracks = self
            .store
            .playlist_tracks(playlist_id)
            .await
            .map_err(|source| PlaylistError::Read {
                playlist_id: playlist_id.to_string(),
                source,
            })?;

        let mut seen = HashSet::new();
        let names: Vec<String> = tracks
            .iter()
            .flat_map(|track| track.artists.iter())
            .map(|name| name.trim())
            .filter(|name| !name.is_empty() && seen.insert(name.to_string()))
            .map(str::to_string)
            .collect();

        info!(
            "Discovered {} artists across {} tracks in playlist {playlist_id}",
            names.len(),
            tracks.len()
        );
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockPlaylistStore, MockTopTracks};

    fn options(tracks_per_artist: usize, append_batch_size: usize) -> PlaylistOptions {
        PlaylistOptions {
            tracks_per_artist,
            append_batch_size,
            dry_run: false,
        }
    }

    fn uris(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("spotify:track:{i}")).collect()
    }

    #[test_log::test(tokio::test)]
    async fn should_keep_collecting_when_one_artist_fails() {
        let mut top_tracks = MockTopTracks::new();
        top_tracks.expect_top_tracks().returning(|artist| match artist.id.as_str() {
            "a" => Ok(vec![
                Track::new("1", "One", &["A"]),
                Track::new("2", "Two", &["A"]),
                Track::new("3", "Three", &["A"]),
            ]),
            _ => Err(CatalogError::RateLimited {
                retry_after_seconds: Some(5),
            }),
        });

        let builder = PlaylistBuilder::new(
            Arc::new(top_tracks),
            Arc::new(MockPlaylistStore::new()),
            options(2, 100),
        );
        let artists = vec![ResolvedArtist::new("a", "A"), ResolvedArtist::new("b", "B")];
        let collected = builder.collect_tracks(&artists).await;

        assert_eq!(collected.uris(), vec!["spotify:track:1", "spotify:track:2"]);
        assert_eq!(collected.failures.len(), 1);
        assert_eq!(collected.failures[0].artist_id, "b");
    }

    #[test_log::test(tokio::test)]
    async fn should_drop_tracks_shared_between_artists() {
        let mut top_tracks = MockTopTracks::new();
        top_tracks.expect_top_tracks().returning(|artist| {
            Ok(vec![
                Track::new("collab", "Collab", &["A", "B"]),
                Track::new(&format!("solo-{}", artist.id), "Solo", &[artist.name.as_str()]),
            ])
        });

        let builder = PlaylistBuilder::new(
            Arc::new(top_tracks),
            Arc::new(MockPlaylistStore::new()),
            options(5, 100),
        );
        let artists = vec![ResolvedArtist::new("a", "A"), ResolvedArtist::new("b", "B")];
        let collected = builder.collect_tracks(&artists).await;

        assert_eq!(
            collected.uris(),
            vec![
                "spotify:track:collab",
                "spotify:track:solo-a",
                "spotify:track:solo-b"
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn should_append_in_chunks_of_at_most_one_hundred() {
        let mut store = MockPlaylistStore::new();
        store
            .expect_append_tracks()
            .times(3)
            .returning(|playlist_id, chunk| {
                assert_eq!(playlist_id, "pl");
                assert!(chunk.len() <= MAX_APPEND_BATCH);
                Ok(())
            });

        let builder = PlaylistBuilder::new(
            Arc::new(MockTopTracks::new()),
            Arc::new(store),
            options(5, 500),
        );
        let report = builder.append("pl", &uris(250)).await.unwrap();

        assert_eq!(report.appended, 250);
        assert_eq!(report.requests, 3);
    }

    #[test_log::test(tokio::test)]
    async fn should_report_progress_when_a_chunk_fails() {
        let mut store = MockPlaylistStore::new();
        let mut calls = 0;
        store.expect_append_tracks().returning(move |_, _| {
            calls += 1;
            if calls == 2 {
                Err(CatalogError::Unauthorized)
            } else {
                Ok(())
            }
        });

        let builder = PlaylistBuilder::new(
            Arc::new(MockTopTracks::new()),
            Arc::new(store),
            options(5, 10),
        );
        let err = builder.append("pl", &uris(25)).await.unwrap_err();

        assert!(matches!(
            err,
            PlaylistError::Append {
                appended: 10,
                total: 25,
                ..
            }
        ));
    }

    #[test_log::test(tokio::test)]
    async fn should_not_touch_playlist_in_dry_run() {
        let mut store = MockPlaylistStore::new();
        store.expect_append_tracks().never();

        let builder = PlaylistBuilder::new(
            Arc::new(MockTopTracks::new()),
            Arc::new(store),
            PlaylistOptions {
                dry_run: true,
                ..options(5, 100)
            },
        );
        let report = builder.append("pl", &uris(120)).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.appended, 120);
        assert_eq!(report.requests, 0);
    }
}
