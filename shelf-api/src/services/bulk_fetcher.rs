//! Full-collection retrieval from the hosted data store
//!
//! A [`DataQuery`] describes one collection query (includes, filters, sort).
//! [`BulkFetcher`] pages through it with a fixed page size until the store
//! reports no further pages, concatenating pages in server order.

use async_trait::async_trait;
use serde_json::{json, Value};
use shelf_common::Record;
use std::sync::Arc;
use tracing::{debug, warn};

use super::platform_client::PlatformError;

/// Items per page when the configuration does not say otherwise
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Query filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    IsEmpty(String),
    IsNotEmpty(String),
    HasSome(String, Vec<Value>),
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Query against one data collection
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    collection: String,
    includes: Vec<String>,
    filters: Vec<Filter>,
    sort: Vec<(String, SortOrder)>,
    limit: Option<usize>,
}

impl DataQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            includes: Vec::new(),
            filters: Vec::new(),
            sort: Vec::new(),
            limit: None,
        }
    }

    /// Expand a reference field inline
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.includes.push(field.into());
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ne(field.into(), value.into()));
        self
    }

    pub fn is_empty(mut self, field: impl Into<String>) -> Self {
        self.filters.push(Filter::IsEmpty(field.into()));
        self
    }

    pub fn is_not_empty(mut self, field: impl Into<String>) -> Self {
        self.filters.push(Filter::IsNotEmpty(field.into()));
        self
    }

    pub fn has_some(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filters.push(Filter::HasSome(field.into(), values));
        self
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortOrder::Ascending));
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortOrder::Descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort(&self) -> &[(String, SortOrder)] {
        &self.sort
    }

    pub fn page_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Filter document in the platform's query language
    ///
    /// Multiple conditions are combined with `$and`; no conditions yields an
    /// empty object.
    pub fn filter_json(&self) -> Value {
        let mut conditions: Vec<Value> = self
            .filters
            .iter()
            .map(|filter| match filter {
                Filter::Eq(field, value) => json!({ field: { "$eq": value } }),
                Filter::Ne(field, value) => json!({ field: { "$ne": value } }),
                Filter::IsEmpty(field) => json!({ field: { "$exists": false } }),
                Filter::IsNotEmpty(field) => json!({ field: { "$exists": true } }),
                Filter::HasSome(field, values) => json!({ field: { "$hasSome": values } }),
            })
            .collect();

        match conditions.len() {
            0 => json!({}),
            1 => conditions.remove(0),
            _ => json!({ "$and": conditions }),
        }
    }

    /// Sort document in the platform's query language
    pub fn sort_json(&self) -> Value {
        Value::Array(
            self.sort
                .iter()
                .map(|(field, order)| {
                    let order = match order {
                        SortOrder::Ascending => "ASC",
                        SortOrder::Descending => "DESC",
                    };
                    json!({ "fieldName": field, "order": order })
                })
                .collect(),
        )
    }
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Record>,
    pub has_next: bool,
}

/// Paged access to data collections
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Fetch the page of `query` starting at `offset`, `query.page_limit()` items long
    async fn query_page(&self, query: &DataQuery, offset: usize) -> Result<Page, PlatformError>;
}

/// Pages through whole collections
#[derive(Clone)]
pub struct BulkFetcher {
    store: Arc<dyn DataStore>,
    page_size: usize,
}

impl BulkFetcher {
    pub fn new(store: Arc<dyn DataStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Fetch every item of `collection`
    pub async fn fetch_all(&self, collection: &str) -> Result<Vec<Record>, PlatformError> {
        self.fetch_all_with(collection, &[], |query| query).await
    }

    /// Fetch every item of `collection` with inline includes and a query shaper
    ///
    /// Includes are applied to the base query first, then `shaper` runs once.
    /// The page limit is always the fetcher's page size, whatever the shaper set.
    pub async fn fetch_all_with<F>(
        &self,
        collection: &str,
        includes: &[&str],
        shaper: F,
    ) -> Result<Vec<Record>, PlatformError>
    where
        F: FnOnce(DataQuery) -> DataQuery,
    {
        let query = includes
            .iter()
            .fold(DataQuery::new(collection), |query, field| query.include(*field));
        let query = shaper(query).limit(self.page_size);

        let mut items = Vec::new();
        let mut offset = 0;
        let mut pages = 0usize;

        loop {
            let page = self.store.query_page(&query, offset).await?;
            pages += 1;
            let fetched = page.items.len();
            items.extend(page.items);

            if !page.has_next {
                break;
            }
            if fetched == 0 {
                warn!(
                    collection,
                    offset, "Data store reported more pages but returned none; stopping"
                );
                break;
            }
            offset += fetched;
        }

        debug!(collection, pages, items = items.len(), "Fetched collection");
        Ok(items)
    }
}
