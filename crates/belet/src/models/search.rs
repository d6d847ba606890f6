use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{MovieInfo, null_as_default};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "films", default, deserialize_with = "null_as_default")]
    pub movies: Vec<MovieInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterData {
    pub id: u64,
    pub name: String,
}

/// A filter group such as genres or countries; `query_name` is the search
/// parameter its values are sent under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub query_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<FilterData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortData {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub name: String,
    pub name_param: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<SortData>,
}

/// Filter and sort options accepted by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(rename = "data", default, deserialize_with = "null_as_default")]
    pub filters: Vec<Filter>,
    #[serde(rename = "data_sort", default, deserialize_with = "empty_as_none")]
    pub sort: Option<Sort>,
}

impl SearchFilters {
    pub fn filter(&self, query_name: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.query_name == query_name)
    }
}

/// `{}` and `null` both mean "not sortable".
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<Sort>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => Sort::deserialize(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Parameters of a catalog search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub order: Option<String>,
    pub page: u32,
    /// `(query_name, value id)` pairs.
    pub filters: Vec<(String, u64)>,
    /// `(name_param, value id)`.
    pub sort: Option<(String, String)>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: 1,
            ..Self::default()
        }
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn filter(mut self, filter: &Filter, value: &FilterData) -> Self {
        self.filters.push((filter.query_name.clone(), value.id));
        self
    }

    pub fn filter_param(mut self, query_name: impl Into<String>, id: u64) -> Self {
        self.filters.push((query_name.into(), id));
        self
    }

    pub fn sort(mut self, sort: &Sort, value: &SortData) -> Self {
        self.sort = Some((sort.name_param.clone(), value.id.clone()));
        self
    }

    pub fn sort_param(mut self, name_param: impl Into<String>, id: impl Into<String>) -> Self {
        self.sort = Some((name_param.into(), id.into()));
        self
    }

    /// Query-string pairs in the order they are sent.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("text".to_string(), self.text.clone())];
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        params.push(("page".to_string(), self.page.to_string()));
        params.extend(
            self.filters
                .iter()
                .map(|(name, id)| (name.clone(), id.to_string())),
        );
        if let Some((param, id)) = &self.sort {
            params.push((param.clone(), id.clone()));
        }
        params
    }
}
