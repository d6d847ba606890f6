use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MovieInfo, null_as_default};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionType {
    Header,
    Continue,
    Favorite,
    Promotion,
    ByCategory,
    #[serde(other)]
    Unknown,
}

/// One row of the homepage layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomepageSection {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title_tk: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title_ru: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    #[serde(default)]
    pub category_type: Option<String>,
    #[serde(default)]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub item_size: Option<u32>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub content_type_id: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub movies: Vec<MovieInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub promotions: Vec<Value>,
}
