//! Handlers backed by the media catalog.

use std::future::ready;
use std::sync::Arc;

use cinescout_catalog::{
    CatalogError, DiscoverQuery, MediaCatalog, MediaListItem, MediaType,
    SearchQuery, SearchScope, TimeWindow, TrendingQuery,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::tool::{Error, Tool, ToolName, ToolResult};

fn into_result(
    result: Result<Vec<MediaListItem>, CatalogError>,
) -> ToolResult {
    let items = result?;
    Ok(json!({ "results": items }))
}

/// Arguments of `search_media`.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct SearchMediaInput {
    /// Title, person or keywords to search for.
    pub query: String,
    /// Restrict the search to movies or TV shows. Searches both if omitted.
    #[serde(default)]
    pub media_type: Option<SearchScope>,
    /// Release year (first air year for TV).
    #[serde(default)]
    pub year: Option<u32>,
    /// Result page, starting at 1.
    #[serde(default)]
    pub page: Option<u32>,
    /// Language of titles and overviews, e.g. `en-US`.
    #[serde(default)]
    pub language: Option<String>,
}

/// Searches movies and TV shows by free text.
pub struct SearchMedia {
    catalog: Arc<dyn MediaCatalog>,
}

impl SearchMedia {
    /// Creates the handler.
    #[inline]
    pub fn new(catalog: Arc<dyn MediaCatalog>) -> Self {
        Self { catalog }
    }
}

impl Tool for SearchMedia {
    type Input = SearchMediaInput;

    fn name(&self) -> ToolName {
        ToolName::SearchMedia
    }

    fn description(&self) -> &str {
        "Search movies and TV shows by title or keywords. Use it when the \
         user names a specific title, or to find titles similar to one."
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let catalog = Arc::clone(&self.catalog);
        async move {
            let query = input.query.trim();
            if query.is_empty() {
                let reason = "query must not be empty";
                return Err(Error::invalid_input().with_reason(reason));
            }
            let query = SearchQuery {
                query: query.to_owned(),
                scope: input.media_type.unwrap_or_default(),
                year: input.year,
                page: input.page,
                language: input.language,
            };
            into_result(catalog.search(query).await)
        }
    }
}

/// Arguments of `discover_movies` and `discover_tv`.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct DiscoverInput {
    /// Genre identifiers that all results must have.
    #[serde(default)]
    pub genres: Option<Vec<u32>>,
    /// Release year (first air year for TV).
    #[serde(default)]
    pub year: Option<u32>,
    /// Minimum average rating, 0 to 10.
    #[serde(default)]
    pub min_rating: Option<f32>,
    /// ISO 639-1 code of the original language, e.g. `ko`.
    #[serde(default)]
    pub original_language: Option<String>,
    /// Sort order, e.g. `popularity.desc` or `vote_average.desc`.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Result page, starting at 1.
    #[serde(default)]
    pub page: Option<u32>,
    /// Language of titles and overviews, e.g. `en-US`.
    #[serde(default)]
    pub language: Option<String>,
}

/// Lists titles of one media type by genre, year and rating.
pub struct Discover {
    catalog: Arc<dyn MediaCatalog>,
    media_type: MediaType,
}

impl Discover {
    /// Creates the handler for movies.
    #[inline]
    pub fn movies(catalog: Arc<dyn MediaCatalog>) -> Self {
        Self {
            catalog,
            media_type: MediaType::Movie,
        }
    }

    /// Creates the handler for TV shows.
    #[inline]
    pub fn tv(catalog: Arc<dyn MediaCatalog>) -> Self {
        Self {
            catalog,
            media_type: MediaType::Tv,
        }
    }
}

impl Tool for Discover {
    type Input = DiscoverInput;

    fn name(&self) -> ToolName {
        match self.media_type {
            MediaType::Movie => ToolName::DiscoverMovies,
            MediaType::Tv => ToolName::DiscoverTv,
        }
    }

    fn description(&self) -> &str {
        match self.media_type {
            MediaType::Movie => {
                "Find movies by genre, release year, rating or original \
                 language. Common genre ids: 28 action, 12 adventure, \
                 16 animation, 35 comedy, 80 crime, 18 drama, 14 fantasy, \
                 27 horror, 9648 mystery, 10749 romance, 878 science fiction, \
                 53 thriller."
            }
            MediaType::Tv => {
                "Find TV shows by genre, first air year, rating or original \
                 language. Common genre ids: 10759 action & adventure, \
                 16 animation, 35 comedy, 80 crime, 18 drama, 9648 mystery, \
                 10765 sci-fi & fantasy."
            }
        }
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let catalog = Arc::clone(&self.catalog);
        let query = DiscoverQuery {
            media_type: self.media_type,
            genres: input.genres.unwrap_or_default(),
            year: input.year,
            min_rating: input.min_rating,
            original_language: input.original_language,
            sort_by: input.sort_by,
            page: input.page,
            language: input.language,
        };
        async move { into_result(catalog.discover(query).await) }
    }
}

/// Arguments of `get_trending`.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct TrendingInput {
    /// Only movies or only TV shows. Both if omitted.
    #[serde(default)]
    pub media_type: Option<MediaType>,
    /// Trending today or this week. Defaults to this week.
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    /// Language of titles and overviews, e.g. `en-US`.
    #[serde(default)]
    pub language: Option<String>,
}

/// Lists currently trending titles.
pub struct GetTrending {
    catalog: Arc<dyn MediaCatalog>,
}

impl GetTrending {
    /// Creates the handler.
    #[inline]
    pub fn new(catalog: Arc<dyn MediaCatalog>) -> Self {
        Self { catalog }
    }
}

impl Tool for GetTrending {
    type Input = TrendingInput;

    fn name(&self) -> ToolName {
        ToolName::GetTrending
    }

    fn description(&self) -> &str {
        "List what is popular right now. Use it for open-ended requests \
         like \"what should I watch\"."
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let catalog = Arc::clone(&self.catalog);
        let query = TrendingQuery {
            media_type: input.media_type,
            time_window: input.time_window.unwrap_or_default(),
            language: input.language,
        };
        async move { into_result(catalog.trending(query).await) }
    }
}

/// Arguments of `present_results`.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema)]
pub struct PresentResultsInput {
    /// One sentence on why these results answer the request.
    #[serde(default)]
    pub rationale: Option<String>,
}

/// The completion signal: the model calls it once it has found enough
/// titles to answer.
pub struct PresentResults;

impl Tool for PresentResults {
    type Input = PresentResultsInput;

    fn name(&self) -> ToolName {
        ToolName::PresentResults
    }

    fn description(&self) -> &str {
        "Call this once the results gathered so far answer the user's \
         request. Do not call other tools in the same turn."
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        if let Some(rationale) = &input.rationale {
            trace!("presenting results: {rationale}");
        }
        ready(Ok::<Value, Error>(json!({ "acknowledged": true })))
    }
}
