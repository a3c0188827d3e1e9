use playlist_seeder::catalog::StaticCatalog;
use playlist_seeder::playlist::{PlaylistBuilder, PlaylistError, PlaylistOptions};
use playlist_seeder::resolver::{ArtistResolver, ResolveOptions};
use playlist_seeder::SeparatorPolicy;
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_catalog() -> Arc<StaticCatalog> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("catalog.json");
    Arc::new(StaticCatalog::from_json_file(path).unwrap())
}

fn builder(
    catalog: &Arc<StaticCatalog>,
    tracks_per_artist: usize,
) -> PlaylistBuilder<StaticCatalog, StaticCatalog> {
    PlaylistBuilder::new(
        Arc::clone(catalog),
        Arc::clone(catalog),
        PlaylistOptions {
            tracks_per_artist,
            append_batch_size: 2,
            dry_run: false,
        },
    )
}

#[test_log::test(tokio::test)]
async fn test_pasted_text_to_playlist() {
    let catalog = fixture_catalog();
    let resolver = ArtistResolver::new(Arc::clone(&catalog), ResolveOptions::default());

    let result = resolver
        .resolve_text(
            "• Pink Floyd\n• Radiohead\n• The Nonexistents\n• radiohead",
            SeparatorPolicy::Auto,
        )
        .await
        .unwrap();

    let mut resolved: Vec<&str> = result.artists.iter().map(|a| a.name.as_str()).collect();
    resolved.sort_unstable();
    assert_eq!(resolved, vec!["Pink Floyd", "Radiohead"]);
    assert_eq!(result.unmatched, vec!["The Nonexistents"]);

    let (collected, report) = builder(&catalog, 2)
        .build("road-trip", &result.artists)
        .await
        .unwrap();

    assert_eq!(collected.tracks.len(), 4);
    assert_eq!(report.appended, 4);
    assert_eq!(report.requests, 2);

    let mut appended = catalog.appended("road-trip");
    appended.sort();
    assert_eq!(
        appended,
        vec![
            "spotify:track:pf1",
            "spotify:track:pf2",
            "spotify:track:rh1",
            "spotify:track:rh2"
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_artist_without_top_tracks_contributes_nothing() {
    let catalog = fixture_catalog();
    let resolver = ArtistResolver::new(Arc::clone(&catalog), ResolveOptions::default());
    let result = resolver
        .resolve(vec!["Portishead".to_string()])
        .await
        .unwrap();

    let collected = builder(&catalog, 5).collect_tracks(&result.artists).await;
    assert!(collected.tracks.is_empty());
    assert!(collected.failures.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_discovered_artists_feed_the_resolver() {
    let catalog = fixture_catalog();
    let names = builder(&catalog, 5)
        .discover_artists("road-trip")
        .await
        .unwrap();

    assert_eq!(
        names,
        vec!["Radiohead", "Portishead", "Massive Attack", "Elizabeth Fraser"]
    );

    let resolver = ArtistResolver::new(Arc::clone(&catalog), ResolveOptions::default());
    let result = resolver.resolve(names).await.unwrap();
    assert_eq!(result.artists.len(), 2);
    assert_eq!(result.unmatched.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_discovering_unknown_playlist_fails() {
    let catalog = fixture_catalog();
    let err = builder(&catalog, 5)
        .discover_artists("missing")
        .await
        .unwrap_err();

    assert!(matches!(err, PlaylistError::Read { ref playlist_id, .. } if playlist_id == "missing"));
}
