use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::item::MediaType;

/// What a text search should look for.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Movies only.
    Movie,
    /// TV shows only.
    Tv,
    /// Both movies and TV shows.
    #[default]
    Multi,
}

impl SearchScope {
    /// Returns the path segment the catalog uses for this scope.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            SearchScope::Movie => "movie",
            SearchScope::Tv => "tv",
            SearchScope::Multi => "multi",
        }
    }
}

/// A free-text search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub scope: SearchScope,
    pub year: Option<u32>,
    pub page: Option<u32>,
    pub language: Option<String>,
}

/// A filtered listing of one media type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoverQuery {
    pub media_type: MediaType,
    pub genres: Vec<u32>,
    pub year: Option<u32>,
    pub min_rating: Option<f32>,
    pub original_language: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    pub language: Option<String>,
}

impl DiscoverQuery {
    /// Creates an unfiltered query for the given media type.
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            genres: vec![],
            year: None,
            min_rating: None,
            original_language: None,
            sort_by: None,
            page: None,
            language: None,
        }
    }
}

/// The period trending titles are computed over.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    #[default]
    Week,
}

impl TimeWindow {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
        }
    }
}

/// Currently trending titles.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendingQuery {
    /// `None` means both movies and TV shows.
    pub media_type: Option<MediaType>,
    pub time_window: TimeWindow,
    pub language: Option<String>,
}

/// Outbound query parameters.
///
/// Absent or falsy values (empty strings, zero, empty lists) are never
/// added, so the catalog only sees the filters that were actually set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.pairs.push((name, value.to_owned()));
        }
        self
    }

    pub fn number(mut self, name: &'static str, value: Option<u32>) -> Self {
        if let Some(value) = value.filter(|v| *v != 0) {
            self.pairs.push((name, value.to_string()));
        }
        self
    }

    pub fn decimal(mut self, name: &'static str, value: Option<f32>) -> Self {
        if let Some(value) = value.filter(|v| *v > 0.0 && v.is_finite()) {
            self.pairs.push((name, value.to_string()));
        }
        self
    }

    pub fn list(mut self, name: &'static str, values: &[u32]) -> Self {
        if !values.is_empty() {
            let joined = values
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            self.pairs.push((name, joined));
        }
        self
    }

    #[inline]
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}
