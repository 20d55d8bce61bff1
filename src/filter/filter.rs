use std::collections::{BTreeMap, HashMap};

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::Page;
use crate::config::ApiConfig;

/// Row listing options parsed from query parameters:
/// `where[col]=v`, `limit`, `offset` and an optional `columns=a,b` projection
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub conditions: BTreeMap<String, String>,
    pub page: Page,
    pub columns: Option<Vec<String>>,
}

impl Filter {
    pub fn from_query(query: &HashMap<String, String>, api: &ApiConfig) -> Result<Self, FilterError> {
        let conditions = FilterWhere::extract(query)?;

        let limit = match query.get("limit").map(|s| s.trim()) {
            None | Some("") => api.default_page_size,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| FilterError::InvalidLimit(raw.to_string()))?,
        };
        let offset = match query.get("offset").map(|s| s.trim()) {
            None | Some("") => 0,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| FilterError::InvalidOffset(raw.to_string()))?,
        };

        let columns = query.get("columns").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        });

        Ok(Self {
            conditions,
            page: Page {
                limit: limit.clamp(1, api.max_page_size.max(1)),
                offset,
            },
            columns,
        })
    }

    pub fn where_sql(&self) -> (String, Vec<String>) {
        FilterWhere::generate(&self.conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn parse(pairs: &[(&str, &str)]) -> Result<Filter, FilterError> {
        let query = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Filter::from_query(&query, &AppConfig::development().api)
    }

    #[test]
    fn defaults_and_clamping() {
        let filter = parse(&[]).unwrap();
        assert_eq!(filter.page, Page { limit: 100, offset: 0 });
        assert_eq!(filter.columns, None);

        assert_eq!(parse(&[("limit", "5000")]).unwrap().page.limit, 1000);
        assert_eq!(parse(&[("limit", "0")]).unwrap().page.limit, 1);
        assert!(parse(&[("limit", "-3")]).is_err());
        assert!(parse(&[("offset", "x")]).is_err());
    }

    #[test]
    fn column_projection() {
        let filter = parse(&[("columns", "name, price,,")]).unwrap();
        assert_eq!(filter.columns, Some(vec!["name".to_string(), "price".to_string()]));
    }

    #[test]
    fn page_numbers() {
        assert_eq!(Page { limit: 10, offset: 25 }.number(), 3);
    }
}
