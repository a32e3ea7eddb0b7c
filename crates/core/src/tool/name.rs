use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every tool the model can call.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Free-text search over movies and TV shows.
    SearchMedia,
    /// Filtered movie listing.
    DiscoverMovies,
    /// Filtered TV listing.
    DiscoverTv,
    /// Currently trending titles.
    GetTrending,
    /// Signals that the model has gathered enough to answer.
    PresentResults,
}

impl ToolName {
    /// All tools, in the order they are advertised to the model.
    pub const ALL: [ToolName; 5] = [
        ToolName::SearchMedia,
        ToolName::DiscoverMovies,
        ToolName::DiscoverTv,
        ToolName::GetTrending,
        ToolName::PresentResults,
    ];

    /// Returns the name the model calls the tool by.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::SearchMedia => "search_media",
            ToolName::DiscoverMovies => "discover_movies",
            ToolName::DiscoverTv => "discover_tv",
            ToolName::GetTrending => "get_trending",
            ToolName::PresentResults => "present_results",
        }
    }

    /// Returns `true` for the tool that ends the tool-calling phase.
    #[inline]
    pub fn is_completion(self) -> bool {
        self == ToolName::PresentResults
    }

    /// Returns `true` if the tool takes a `language` argument.
    #[inline]
    pub fn accepts_language(self) -> bool {
        !self.is_completion()
    }
}

impl Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown tool name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownToolName(pub String);

impl Display for UnknownToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tool: {}", self.0)
    }
}

impl std::error::Error for UnknownToolName {}

impl FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownToolName(s.to_owned()))
    }
}
