//! Catalog data returned by the film, homepage and search services.

mod homepage;
mod movie;
mod search;

use serde::{Deserialize, Deserializer};

pub use homepage::{HomepageSection, SectionType};
pub use movie::{
    CatalogItem, Category, Duration, Episode, MediaFile, Movie, MovieInfo, Season, Series,
};
pub use search::{Filter, FilterData, SearchFilters, SearchQuery, SearchResult, Sort, SortData};

/// Data that is fetched on first access and kept afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Loadable<T> {
    #[default]
    NotLoaded,
    Loaded(T),
}

impl<T> Loadable<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::NotLoaded => None,
        }
    }

    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::NotLoaded => None,
        }
    }
}

/// Treat an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
