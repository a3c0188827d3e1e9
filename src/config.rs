use crate::normalizer::SeparatorPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistSeederConfig {
    pub resolver: ResolverConfig,
    pub catalog: CatalogConfig,
    pub playlist: PlaylistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Separator policy used when none is given on the command line
    pub default_separator: SeparatorPolicy,
    /// Per-lookup timeout in seconds; 0 waits indefinitely
    pub lookup_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog API (defaults to <https://api.spotify.com/v1>)
    pub base_url: Option<String>,
    /// Pre-issued bearer token
    pub access_token: String,
    /// Market used for top tracks and playlist relinking
    pub market: String,
    /// HTTP request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Maximum number of top tracks taken from each artist
    pub tracks_per_artist: usize,
    /// Number of URIs sent per append request (the catalog accepts at most 100)
    pub append_batch_size: usize,
    /// Log what would be appended without touching the playlist
    pub dry_run: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_separator: SeparatorPolicy::Auto,
            lookup_timeout_seconds: 10,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: String::new(),
            market: "US".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            tracks_per_artist: 5,
            append_batch_size: 100,
            dry_run: false,
        }
    }
}

impl CatalogConfig {
    /// Get the catalog base URL with fallback to the public Spotify API
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(crate::catalog::spotify::DEFAULT_BASE_URL)
    }
}

impl PlaylistSeederConfig {
    /// Get default configuration file paths in order of preference
    #[must_use]
    pub fn get_default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("playlist-seeder.toml"),
            PathBuf::from("config/playlist-seeder.toml"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("playlist-seeder").join("config.toml"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".playlist-seeder.toml"));
        }

        paths
    }

    /// Load configuration with priority: environment, config file, defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_file::<&str>(None)
    }

    /// Load configuration with a specific config file
    pub fn load_with_file<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(file_path) = config_file {
            let file_path = file_path.as_ref();
            if !file_path.exists() {
                return Err(ConfigError::Message(format!(
                    "Config file not found: {}",
                    file_path.display()
                )));
            }
            builder = builder.add_source(File::from(file_path));
        } else if let Some(found) = Self::get_default_config_paths()
            .into_iter()
            .find(|path| path.exists())
        {
            log::debug!("Using config file {}", found.display());
            builder = builder.add_source(File::from(found));
        }

        builder = builder.add_source(
            Environment::with_prefix("PLAYLIST_SEEDER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
