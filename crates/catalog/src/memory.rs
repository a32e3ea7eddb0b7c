use async_trait::async_trait;

use crate::{
    CatalogError, DiscoverQuery, MediaCatalog, MediaListItem, MediaType,
    SearchQuery, SearchScope, TrendingQuery,
};

/// A [`MediaCatalog`] over a fixed list of items.
///
/// Items keep their insertion order, which stands in for popularity when
/// listing trending titles.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    items: Vec<MediaListItem>,
    max_results: usize,
}

impl InMemoryCatalog {
    /// Creates a catalog holding `items`.
    pub fn with_items(items: Vec<MediaListItem>) -> Self {
        Self {
            items,
            max_results: 10,
        }
    }

    /// Creates a catalog with a small built-in selection of titles.
    pub fn sample() -> Self {
        fn item(
            id: u64,
            media_type: MediaType,
            title: &str,
            date: &str,
            rating: f32,
            genres: &[u32],
        ) -> MediaListItem {
            MediaListItem {
                id,
                media_type,
                title: title.to_owned(),
                overview: String::new(),
                release_date: Some(date.to_owned()),
                poster_path: None,
                vote_average: Some(rating),
                genre_ids: genres.to_vec(),
            }
        }

        use MediaType::{Movie, Tv};
        Self::with_items(vec![
            item(245891, Movie, "John Wick", "2014-10-22", 7.4, &[28, 53]),
            item(
                76341,
                Movie,
                "Mad Max: Fury Road",
                "2015-05-13",
                7.6,
                &[28, 12, 878],
            ),
            item(
                155,
                Movie,
                "The Dark Knight",
                "2008-07-16",
                8.5,
                &[18, 28, 80, 53],
            ),
            item(
                129,
                Movie,
                "Spirited Away",
                "2001-07-20",
                8.5,
                &[16, 10751, 14],
            ),
            item(348, Movie, "Alien", "1979-05-25", 8.1, &[27, 878]),
            item(
                120467,
                Movie,
                "The Grand Budapest Hotel",
                "2014-02-26",
                8.0,
                &[35, 18],
            ),
            item(496243, Movie, "Parasite", "2019-05-30", 8.5, &[35, 53, 18]),
            item(1396, Tv, "Breaking Bad", "2008-01-20", 8.9, &[18, 80]),
            item(1920, Tv, "Twin Peaks", "1990-04-08", 8.1, &[9648, 18, 80]),
            item(
                66732,
                Tv,
                "Stranger Things",
                "2016-07-15",
                8.6,
                &[18, 10765, 9648],
            ),
            item(
                94997,
                Tv,
                "House of the Dragon",
                "2022-08-21",
                8.4,
                &[10765, 18, 10759],
            ),
        ])
    }

    fn limit(
        &self,
        items: impl Iterator<Item = MediaListItem>,
    ) -> Vec<MediaListItem> {
        items.take(self.max_results).collect()
    }
}

#[async_trait]
impl MediaCatalog for InMemoryCatalog {
    async fn search(
        &self,
        query: SearchQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError> {
        let needle = query.query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(CatalogError::InvalidQuery("empty query".to_owned()));
        }
        let matches = self.items.iter().filter(|item| {
            let scope_ok = match query.scope {
                SearchScope::Movie => item.media_type == MediaType::Movie,
                SearchScope::Tv => item.media_type == MediaType::Tv,
                SearchScope::Multi => true,
            };
            scope_ok
                && item.title.to_lowercase().contains(&needle)
                && query.year.is_none_or(|y| item.release_year() == Some(y))
        });
        Ok(self.limit(matches.cloned()))
    }

    async fn discover(
        &self,
        query: DiscoverQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError> {
        let matches = self.items.iter().filter(|item| {
            item.media_type == query.media_type
                && query.genres.iter().all(|g| item.genre_ids.contains(g))
                && query.year.is_none_or(|y| item.release_year() == Some(y))
                && query
                    .min_rating
                    .is_none_or(|min| item.vote_average.unwrap_or(0.0) >= min)
        });
        Ok(self.limit(matches.cloned()))
    }

    async fn trending(
        &self,
        query: TrendingQuery,
    ) -> Result<Vec<MediaListItem>, CatalogError> {
        let matches = self
            .items
            .iter()
            .filter(|item| {
                query.media_type.is_none_or(|t| item.media_type == t)
            });
        Ok(self.limit(matches.cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search() {
        let catalog = InMemoryCatalog::sample();
        let items = catalog
            .search(SearchQuery {
                query: "alien".to_owned(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 348);

        let err = catalog.search(SearchQuery::default()).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_discover_filters() {
        let catalog = InMemoryCatalog::sample();
        let mut query = DiscoverQuery::new(MediaType::Movie);
        query.genres = vec![28];
        let items = catalog.discover(query.clone()).await.unwrap();
        assert_eq!(items.len(), 3);

        query.min_rating = Some(8.0);
        let items = catalog.discover(query).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "The Dark Knight");
    }

    #[tokio::test]
    async fn test_trending_by_type() {
        let catalog = InMemoryCatalog::sample();
        let items = catalog
            .trending(TrendingQuery {
                media_type: Some(MediaType::Tv),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|i| i.media_type == MediaType::Tv));
    }
}
