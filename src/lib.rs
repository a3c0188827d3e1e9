pub mod catalog;
pub mod config;
pub mod normalizer;
pub mod playlist;
pub mod resolver;

pub use catalog::{ArtistSearch, CatalogError, PlaylistStore, ResolvedArtist, TopTracks, Track};
pub use normalizer::{normalize, SeparatorPolicy};
pub use resolver::{
    resolve_all, start_batch, ArtistResolver, BatchHandle, BatchResult, BatchStatus,
    LookupFailure, ResolveError, ResolveOptions,
};
