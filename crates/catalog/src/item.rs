use std::fmt::{self, Display};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kind of a catalog entry.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A feature film.
    Movie,
    /// A television series.
    Tv,
}

impl MediaType {
    /// Returns the path segment the catalog uses for this type.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movie or TV show as presented to the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaListItem {
    /// Catalog identifier, unique per media type.
    pub id: u64,
    /// Whether this is a movie or a TV show.
    pub media_type: MediaType,
    /// Display title.
    pub title: String,
    /// Short synopsis.
    #[serde(default)]
    pub overview: String,
    /// First release (or first air) date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// Relative path of the poster image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    /// Average user rating out of 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f32>,
    /// Genre identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genre_ids: Vec<u32>,
}

impl MediaListItem {
    /// Returns the release year, if the release date is known.
    pub fn release_year(&self) -> Option<u32> {
        self.release_date.as_deref()?.get(..4)?.parse().ok()
    }
}
