use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Loadable, null_as_default};
use crate::{Error, Result};

/// Content category of a catalog item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum Category {
    #[default]
    Movie,
    Series,
    Anime,
    TvShow,
    Cartoon,
    Music,
    Documental,
    News,
    Sport,
    Other(u32),
}

impl From<u32> for Category {
    fn from(id: u32) -> Self {
        match id {
            1 => Self::Movie,
            2 => Self::Series,
            3 => Self::Anime,
            4 => Self::TvShow,
            5 => Self::Cartoon,
            35 => Self::Music,
            36 => Self::Documental,
            37 => Self::News,
            39 => Self::Sport,
            other => Self::Other(other),
        }
    }
}

impl From<Category> for u32 {
    fn from(category: Category) -> Self {
        match category {
            Category::Movie => 1,
            Category::Series => 2,
            Category::Anime => 3,
            Category::TvShow => 4,
            Category::Cartoon => 5,
            Category::Music => 35,
            Category::Documental => 36,
            Category::News => 37,
            Category::Sport => 39,
            Category::Other(id) => id,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => f.write_str("movie"),
            Self::Series => f.write_str("series"),
            Self::Anime => f.write_str("anime"),
            Self::TvShow => f.write_str("tv show"),
            Self::Cartoon => f.write_str("cartoon"),
            Self::Music => f.write_str("music"),
            Self::Documental => f.write_str("documental"),
            Self::News => f.write_str("news"),
            Self::Sport => f.write_str("sport"),
            Self::Other(id) => write!(f, "category {id}"),
        }
    }
}

/// Running time; the service sends either seconds or a preformatted string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Duration {
    Seconds(f64),
    Text(String),
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(secs) => {
                let secs = secs.max(0.0) as u64;
                write!(f, "{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
            }
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Descriptive fields shared by movies, series and list fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub type_id: Option<u32>,
    #[serde(default, rename = "category_id", deserialize_with = "null_as_default")]
    pub category: Category,
    #[serde(default)]
    pub rating_kp: Option<f64>,
    #[serde(default)]
    pub rating_imdb: Option<f64>,
    #[serde(default)]
    pub for_kids: Option<bool>,
    #[serde(default)]
    pub like: Option<bool>,
    #[serde(default)]
    pub dislike: Option<bool>,
    #[serde(default)]
    pub favorites: Option<bool>,
    /// Seconds already watched by the current user.
    #[serde(default)]
    pub watch_time: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub countries: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub directors: Vec<String>,
    #[serde(default)]
    pub images: Option<Value>,
    #[serde(default)]
    pub thumbnails: Option<Value>,
    #[serde(default)]
    pub trailers: Option<Value>,
    #[serde(default)]
    pub media_info: Option<Value>,
    #[serde(default)]
    pub last_episode_info: Option<Value>,
}

/// A playable source; `filename` is the manifest URL handed to the downloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub filename: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaFile {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            extra: Map::new(),
        }
    }

    /// Short label for listings, taken from the first descriptive field present.
    pub fn label(&self) -> Option<String> {
        ["quality", "name", "label", "resolution"]
            .iter()
            .find_map(|key| match self.extra.get(*key)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub type_id: Option<u32>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub last_watch: Option<Value>,
    #[serde(rename = "sources", default, deserialize_with = "null_as_default")]
    pub files: Vec<MediaFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Season {
    pub id: u64,
    pub name: String,
    pub episodes: Loadable<Vec<Episode>>,
}

impl Season {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            episodes: Loadable::NotLoaded,
        }
    }

    /// Look up a loaded episode.
    pub fn episode(&self, episode_id: u64) -> Option<&Episode> {
        self.episodes.get()?.iter().find(|e| e.id == episode_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub info: MovieInfo,
    pub files: Loadable<Vec<MediaFile>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub info: MovieInfo,
    pub seasons: Vec<Season>,
}

impl Series {
    pub fn season(&self, season_id: u64) -> Option<&Season> {
        self.seasons.iter().find(|s| s.id == season_id)
    }

    pub fn season_mut(&mut self, season_id: u64) -> Option<&mut Season> {
        self.seasons.iter_mut().find(|s| s.id == season_id)
    }
}

/// A catalog entry, either a single movie or a series of seasons.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogItem {
    Movie(Movie),
    Series(Series),
}

#[derive(Debug, Deserialize)]
struct SeasonStub {
    id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
}

impl CatalogItem {
    /// Build from the `film` object of a catalog response. A null or missing
    /// `seasons` field means the item is a movie.
    pub fn from_film(film: Value) -> Result<Self> {
        let seasons = match film.get("seasons") {
            None | Some(Value::Null) => None,
            Some(seasons) => Some(Vec::<SeasonStub>::deserialize(seasons)?),
        };
        let info: MovieInfo = serde_json::from_value(film)?;

        Ok(match seasons {
            None => Self::Movie(Movie {
                info,
                files: Loadable::NotLoaded,
            }),
            Some(stubs) => Self::Series(Series {
                info,
                seasons: stubs
                    .into_iter()
                    .map(|s| Season::new(s.id, s.name))
                    .collect(),
            }),
        })
    }

    pub fn info(&self) -> &MovieInfo {
        match self {
            Self::Movie(movie) => &movie.info,
            Self::Series(series) => &series.info,
        }
    }

    pub fn id(&self) -> u64 {
        self.info().id
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn into_movie(self) -> Result<Movie> {
        match self {
            Self::Movie(movie) => Ok(movie),
            Self::Series(series) => Err(Error::invalid_input(format!(
                "catalog item {} is a series",
                series.info.id
            ))),
        }
    }

    pub fn into_series(self) -> Result<Series> {
        match self {
            Self::Series(series) => Ok(series),
            Self::Movie(movie) => Err(Error::invalid_input(format!(
                "catalog item {} is a movie",
                movie.info.id
            ))),
        }
    }
}
