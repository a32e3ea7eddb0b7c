//! The media catalog the assistant's tools query.
//!
//! [`MediaCatalog`] is the seam between tool handlers and the data source.
//! [`TmdbCatalog`] talks to The Movie Database, [`InMemoryCatalog`] serves a
//! fixed list and is used offline and in tests.

#[macro_use]
extern crate tracing;

mod error;
mod item;
mod memory;
mod query;
mod tmdb;

use async_trait::async_trait;

pub use error::CatalogError;
pub use item::{MediaListItem, MediaType};
pub use memory::InMemoryCatalog;
pub use query::{
    DiscoverQuery, QueryParams, SearchQuery, SearchScope, TimeWindow,
    TrendingQuery,
};
pub use tmdb::{TmdbCatalog, TmdbConfig, TmdbConfigBuilder};

/// A source of movies and TV shows.
///
/// Implementations should be cheap to share; tool handlers hold them in an
/// `Arc` and call them from concurrently running tasks.
#[async_trait]
pub trait MediaCatalog: Send + Sync + 'static {
    /// Searches titles by free text.
    async fn search(
        &self,
        query: SearchQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError>;

    /// Lists titles of one type matching the filters.
    async fn discover(
        &self,
        query: DiscoverQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError>;

    /// Lists currently trending titles.
    async fn trending(
        &self,
        query: TrendingQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError>;
}
