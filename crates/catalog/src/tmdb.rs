use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};
use serde::Deserialize;

use crate::{
    CatalogError, DiscoverQuery, MediaCatalog, MediaListItem, MediaType,
    QueryParams, SearchQuery, SearchScope, TrendingQuery,
};

/// Builder for [`TmdbConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TmdbConfigBuilder {
    access_token: String,
    base_url: Option<String>,
    max_results: Option<usize>,
}

impl TmdbConfigBuilder {
    /// Creates a builder with the given API read access token.
    #[inline]
    pub fn with_access_token<S: Into<String>>(access_token: S) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: None,
            max_results: None,
        }
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Caps the number of items returned per call.
    #[inline]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> TmdbConfig {
        TmdbConfig {
            access_token: self.access_token,
            base_url: self
                .base_url
                .unwrap_or_else(|| "https://api.themoviedb.org/3".to_owned()),
            max_results: self.max_results.unwrap_or(10),
        }
    }
}

impl Debug for TmdbConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbConfigBuilder")
            .field("access_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_results", &self.max_results)
            .finish()
    }
}

/// Configuration for [`TmdbCatalog`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TmdbConfig {
    access_token: String,
    base_url: String,
    max_results: usize,
}

impl Debug for TmdbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbConfig")
            .field("access_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_results", &self.max_results)
            .finish()
    }
}

/// A [`MediaCatalog`] backed by The Movie Database HTTP API.
#[derive(Clone, Debug)]
pub struct TmdbCatalog {
    client: Client,
    config: Arc<TmdbConfig>,
}

impl TmdbCatalog {
    /// Creates a new catalog client with the given configuration.
    #[inline]
    pub fn new(config: TmdbConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    async fn get(
        &self,
        path: &str,
        params: QueryParams,
        default_type: Option<MediaType>,
    ) -> Result<Vec<MediaListItem>, CatalogError> {
        let url = build_url(&self.config.base_url, path, &params)?;
        debug!("GET {path} {:?}", params.pairs());

        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| CatalogError::Transport(err.to_string()))?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(CatalogError::RateLimited);
            }
            status if !status.is_success() => {
                return Err(CatalogError::Status(status.as_u16()));
            }
            _ => {}
        }

        let page: ResultPage = resp
            .json()
            .await
            .map_err(|err| CatalogError::Decode(err.to_string()))?;
        Ok(page
            .results
            .into_iter()
            .filter_map(|raw| raw.into_item(default_type))
            .take(self.config.max_results)
            .collect())
    }
}

#[async_trait]
impl MediaCatalog for TmdbCatalog {
    async fn search(
        &self,
        query: SearchQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError> {
        let year_param = match query.scope {
            SearchScope::Tv => "first_air_date_year",
            SearchScope::Movie | SearchScope::Multi => "year",
        };
        let params = QueryParams::new()
            .text("query", Some(&query.query))
            .number(year_param, query.year)
            .number("page", query.page)
            .text("language", query.language.as_deref());
        let default_type = match query.scope {
            SearchScope::Movie => Some(MediaType::Movie),
            SearchScope::Tv => Some(MediaType::Tv),
            SearchScope::Multi => None,
        };
        let path = format!("/search/{}", query.scope.as_str());
        self.get(&path, params, default_type).await
    }

    async fn discover(
        &self,
        query: DiscoverQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError> {
        let year_param = match query.media_type {
            MediaType::Movie => "primary_release_year",
            MediaType::Tv => "first_air_date_year",
        };
        let params = QueryParams::new()
            .list("with_genres", &query.genres)
            .number(year_param, query.year)
            .decimal("vote_average.gte", query.min_rating)
            .text("with_original_language", query.original_language.as_deref())
            .text("sort_by", query.sort_by.as_deref())
            .number("page", query.page)
            .text("language", query.language.as_deref());
        self.get(
            &format!("/discover/{}", query.media_type.as_str()),
            params,
            Some(query.media_type),
        )
        .await
    }

    async fn trending(
        &self,
        query: TrendingQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError> {
        let segment = query.media_type.map_or("all", MediaType::as_str);
        let params =
            QueryParams::new().text("language", query.language.as_deref());
        self.get(
            &format!("/trending/{segment}/{}", query.time_window.as_str()),
            params,
            query.media_type,
        )
        .await
    }
}

fn build_url(
    base_url: &str,
    path: &str,
    params: &QueryParams,
) -> Result<Url, CatalogError> {
    let base_url = base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base_url}{path}"))
        .map_err(|err| CatalogError::InvalidQuery(err.to_string()))?;
    if !params.pairs().is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in params.pairs() {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

#[derive(Deserialize)]
struct ResultPage {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Deserialize)]
struct RawResult {
    id: u64,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    #[serde(default)]
    overview: String,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f32>,
    #[serde(default)]
    genre_ids: Vec<u32>,
}

impl RawResult {
    fn into_item(
        self,
        default_type: Option<MediaType>,
    ) -> Option<MediaListItem> {
        // Multi-search and trending results may contain people.
        let media_type = match self.media_type.as_deref() {
            Some("movie") => MediaType::Movie,
            Some("tv") => MediaType::Tv,
            Some(_) => return None,
            None => default_type?,
        };
        let title = self.title.or(self.name)?;
        let release_date = self
            .release_date
            .or(self.first_air_date)
            .filter(|d| !d.is_empty());
        Some(MediaListItem {
            id: self.id,
            media_type,
            title,
            overview: self.overview,
            release_date,
            poster_path: self.poster_path,
            vote_average: self.vote_average,
            genre_ids: self.genre_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let params = QueryParams::new()
            .text("query", Some("spirited away"))
            .text("language", Some("zh-CN"));
        let url =
            build_url("https://api.example.com/3/", "/search/multi", &params)
                .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/3/search/multi?query=spirited+away&language=zh-CN"
        );

        let url = build_url(
            "https://api.example.com/3",
            "/trending/all/week",
            &QueryParams::new(),
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/3/trending/all/week");
    }

    #[test]
    fn test_decode_results() {
        let page: ResultPage = serde_json::from_str(
            r#"{
                "page": 1,
                "results": [
                    {
                        "id": 1,
                        "media_type": "movie",
                        "title": "Alien",
                        "overview": "In space",
                        "release_date": "1979-05-25",
                        "vote_average": 8.1,
                        "genre_ids": [27, 878]
                    },
                    {
                        "id": 2,
                        "media_type": "tv",
                        "name": "Twin Peaks",
                        "first_air_date": "1990-04-08"
                    },
                    {"id": 3, "media_type": "person", "name": "Sigourney"},
                    {"id": 4, "title": "No type", "release_date": ""}
                ]
            }"#,
        )
        .unwrap();
        let items = page
            .results
            .into_iter()
            .filter_map(|raw| raw.into_item(Some(MediaType::Movie)))
            .collect::<Vec<_>>();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Alien");
        assert_eq!(items[0].release_year(), Some(1979));
        assert_eq!(items[1].media_type, MediaType::Tv);
        assert_eq!(items[1].title, "Twin Peaks");
        assert_eq!(items[2].media_type, MediaType::Movie);
        assert_eq!(items[2].release_date, None);
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = TmdbConfigBuilder::with_access_token("secret").build();
        let printed = format!("{config:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("api.themoviedb.org"));
    }
}
