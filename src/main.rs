use clap::{Parser, Subcommand};
use config::ConfigError;
use log::info;
use playlist_seeder::catalog::{
    ArtistSearch, PlaylistStore, SpotifyCatalog, StaticCatalog, TopTracks,
};
use playlist_seeder::config::PlaylistSeederConfig;
use playlist_seeder::normalizer::{normalize, SeparatorPolicy};
use playlist_seeder::playlist::{PlaylistBuilder, PlaylistOptions};
use playlist_seeder::resolver::{ArtistResolver, BatchResult, ResolveOptions};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "playlist-seeder")]
#[command(about = "Turn a list of artist names into a playlist of their top tracks")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Catalog access token
    #[arg(long)]
    access_token: Option<String>,

    /// Use a JSON catalog fixture instead of the Spotify API
    #[arg(long)]
    catalog_fixture: Option<PathBuf>,

    /// Per-lookup timeout in seconds (0 waits indefinitely)
    #[arg(long)]
    lookup_timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct TextInput {
    /// Artist names; read from --file or stdin when omitted
    text: Option<String>,

    /// Read artist names from a file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// How to split the text: auto, comma, space or newline
    #[arg(short, long)]
    separator: Option<SeparatorPolicy>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the candidate artist names extracted from the text
    Normalize {
        #[command(flatten)]
        input: TextInput,
    },
    /// Look up every candidate name in the catalog
    Resolve {
        #[command(flatten)]
        input: TextInput,
    },
    /// Resolve artists and append their top tracks to a playlist
    Build {
        /// Target playlist id
        #[arg(short, long)]
        playlist: String,

        #[command(flatten)]
        input: TextInput,

        /// Maximum number of top tracks per artist
        #[arg(short, long)]
        tracks_per_artist: Option<usize>,

        /// Dry run mode - don't actually append anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List the artists credited on an existing playlist
    Discover {
        /// Playlist id to read
        #[arg(short, long)]
        playlist: String,
    },
}

/// Load configuration from args with optional config file override
fn load_config_from_args(args: &Args) -> std::result::Result<PlaylistSeederConfig, ConfigError> {
    let config = if let Some(config_path) = &args.config {
        PlaylistSeederConfig::load_with_file(Some(config_path))?
    } else {
        PlaylistSeederConfig::load()?
    };

    Ok(merge_args_into_config(config, args))
}

/// Merge command line arguments into the configuration
fn merge_args_into_config(mut config: PlaylistSeederConfig, args: &Args) -> PlaylistSeederConfig {
    if let Some(token) = &args.access_token {
        config.catalog.access_token = token.clone();
    }
    if let Some(timeout) = args.lookup_timeout {
        config.resolver.lookup_timeout_seconds = timeout;
    }

    if let Commands::Build {
        tracks_per_artist,
        dry_run,
        ..
    } = &args.command
    {
        if let Some(tracks_per_artist) = tracks_per_artist {
            config.playlist.tracks_per_artist = *tracks_per_artist;
        }
        if *dry_run {
            config.playlist.dry_run = true;
        }
    }

    config
}

fn read_text(input: &TextInput) -> CliResult<String> {
    if let Some(text) = &input.text {
        return Ok(text.clone());
    }
    if let Some(path) = &input.file {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_names(names: &[String], json: bool) -> CliResult<()> {
    if json {
        return print_json(&names);
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn print_batch(result: &BatchResult, json: bool) -> CliResult<()> {
    if json {
        return print_json(result);
    }
    for artist in &result.artists {
        println!("{}\t{}", artist.name, artist.uri);
    }
    for name in &result.unmatched {
        println!("no match: {name}");
    }
    if let Some(summary) = result.failure_summary() {
        eprintln!("{summary}");
    }
    Ok(())
}

async fn run<C>(catalog: Arc<C>, config: &PlaylistSeederConfig, args: &Args) -> CliResult<()>
where
    C: ArtistSearch + TopTracks + PlaylistStore + 'static,
{
    let resolver = ArtistResolver::new(
        Arc::clone(&catalog),
        ResolveOptions::from_config(&config.resolver),
    );
    let builder = PlaylistBuilder::new(
        Arc::clone(&catalog),
        Arc::clone(&catalog),
        PlaylistOptions::from_config(&config.playlist),
    );
    let separator_for = |input: &TextInput| {
        input
            .separator
            .unwrap_or(config.resolver.default_separator)
    };

    match &args.command {
        Commands::Normalize { input } => {
            let names = normalize(&read_text(input)?, separator_for(input));
            print_names(&names, args.json)?;
        }
        Commands::Resolve { input } => {
            let result = resolver
                .resolve_text(&read_text(input)?, separator_for(input))
                .await?;
            print_batch(&result, args.json)?;
        }
        Commands::Build {
            playlist, input, ..
        } => {
            let result = resolver
                .resolve_text(&read_text(input)?, separator_for(input))
                .await?;
            if let Some(summary) = result.failure_summary() {
                eprintln!("{summary}");
            }
            let (collected, report) = builder.build(playlist, &result.artists).await?;
            if args.json {
                print_json(&report)?;
            } else {
                let verb = if report.dry_run { "Would append" } else { "Appended" };
                println!(
                    "{verb} {} tracks from {} artists to playlist {}",
                    report.appended,
                    result.artists.len(),
                    report.playlist_id
                );
                for failure in &collected.failures {
                    eprintln!("top tracks failed for {}: {}", failure.artist_name, failure.cause);
                }
            }
        }
        Commands::Discover { playlist } => {
            let names = builder.discover_artists(playlist).await?;
            print_names(&names, args.json)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let args = Args::parse();

    let config = load_config_from_args(&args)
        .map_err(|e| format!("Failed to load configuration: {e}"))?;

    if let Some(fixture) = &args.catalog_fixture {
        info!("Using catalog fixture {}", fixture.display());
        let catalog = Arc::new(StaticCatalog::from_json_file(fixture)?);
        run(catalog, &config, &args).await
    } else if matches!(args.command, Commands::Normalize { .. }) {
        // Splitting text never consults the catalog
        run(Arc::new(StaticCatalog::new()), &config, &args).await
    } else {
        info!("Using catalog at {}", config.catalog.base_url());
        let catalog = Arc::new(SpotifyCatalog::from_config(&config.catalog)?);
        run(catalog, &config, &args).await
    }
}
