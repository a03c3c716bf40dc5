//! Catalog views: audiobooks, chapters, achievements, book sponsors
//!
//! Each view fetches one whole collection and runs it through a
//! [`FacetIndexBuilder`] with that collection's preset.

use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Value};
use shelf_common::config::CatalogConfig;
use shelf_common::record::key_of;
use shelf_common::Record;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::bulk_fetcher::BulkFetcher;
use super::facet_index::{FacetConfig, FacetIndex, FacetIndexBuilder};
use super::genre_map::genre_map_json;
use super::media_resolver::MediaResolver;
use crate::error::ApiResult;

/// Reference field linking sponsorships to audiobooks
pub const SPONSORED_BOOKS_FIELD: &str = "PremiumAudiobooks_sponsorshipsReferences";

/// Collection names and media tuning for the catalog views
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub audiobooks_collection: String,
    pub chapters_collection: String,
    pub achievements_collection: String,
    pub sponsorships_collection: String,
    pub media_concurrency: usize,
    pub media_timeout: Option<Duration>,
}

impl From<&CatalogConfig> for CatalogSettings {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            audiobooks_collection: config.audiobooks_collection.clone(),
            chapters_collection: config.chapters_collection.clone(),
            achievements_collection: config.achievements_collection.clone(),
            sponsorships_collection: config.sponsorships_collection.clone(),
            media_concurrency: config.media_concurrency,
            media_timeout: config.media_timeout(),
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self::from(&CatalogConfig::default())
    }
}

/// Builds the catalog responses
pub struct CatalogService {
    fetcher: BulkFetcher,
    resolver: Arc<dyn MediaResolver>,
    settings: CatalogSettings,
}

impl CatalogService {
    pub fn new(fetcher: BulkFetcher, resolver: Arc<dyn MediaResolver>, settings: CatalogSettings) -> Self {
        Self {
            fetcher,
            resolver,
            settings,
        }
    }

    async fn index_collection(&self, collection: &str, preset: FacetConfig) -> ApiResult<FacetIndex> {
        let config = preset
            .with_concurrency(self.settings.media_concurrency)
            .with_media_timeout(self.settings.media_timeout);
        let builder = FacetIndexBuilder::new(config)?;

        let items = self.fetcher.fetch_all(collection).await?;
        let index = builder.build(items, self.resolver.as_ref()).await;

        info!(
            collection,
            records = index.contents.len(),
            "Built catalog view"
        );
        Ok(index)
    }

    /// `{books, genres, map}`
    pub async fn audiobooks(&self) -> ApiResult<Value> {
        let index = self
            .index_collection(&self.settings.audiobooks_collection, FacetConfig::audiobooks())
            .await?;

        Ok(json!({
            "books": index.contents,
            "genres": index.facet_view(),
            "map": genre_map_json(),
        }))
    }

    /// `{chapters}`
    pub async fn chapters(&self) -> ApiResult<Value> {
        let index = self
            .index_collection(&self.settings.chapters_collection, FacetConfig::chapters())
            .await?;

        Ok(json!({ "chapters": index.contents }))
    }

    /// `{achievements}`
    pub async fn achievements(&self) -> ApiResult<Value> {
        let index = self
            .index_collection(
                &self.settings.achievements_collection,
                FacetConfig::achievements(),
            )
            .await?;

        Ok(json!({ "achievements": index.contents }))
    }

    /// Book id → ids of the sponsorships referencing it
    pub async fn book_sponsors(&self) -> ApiResult<IndexMap<String, Vec<String>>> {
        let sponsorships = self
            .fetcher
            .fetch_all_with(
                &self.settings.sponsorships_collection,
                &[SPONSORED_BOOKS_FIELD],
                |query| query.is_not_empty(SPONSORED_BOOKS_FIELD),
            )
            .await?;

        let map = sponsors_by_book(&sponsorships);
        debug!(
            sponsorships = sponsorships.len(),
            books = map.len(),
            "Built book sponsor map"
        );
        Ok(map)
    }
}

/// Group sponsorship ids by the books they reference
///
/// A reference is either a bare book id string or an included book record with
/// `_id`. Sponsorships without an id and empty references are skipped; ids are unique
/// per book in first-seen order.
pub fn sponsors_by_book(sponsorships: &[Record]) -> IndexMap<String, Vec<String>> {
    let mut map: IndexMap<String, IndexSet<String>> = IndexMap::new();

    for sponsorship in sponsorships {
        let Some(sponsor_id) = sponsorship.get("_id").and_then(key_of) else {
            continue;
        };
        let references = match sponsorship.get(SPONSORED_BOOKS_FIELD) {
            Some(Value::Array(refs)) => refs.as_slice(),
            _ => continue,
        };

        for reference in references {
            let book_id = match reference {
                Value::Object(book) => book.get("_id").and_then(key_of),
                Value::String(id) => Some(id.clone()),
                _ => None,
            };
            if let Some(book_id) = book_id.filter(|id| !id.is_empty()) {
                map.entry(book_id)
                    .or_default()
                    .insert(sponsor_id.clone());
            }
        }
    }

    map.into_iter()
        .map(|(book, sponsors)| (book, sponsors.into_iter().collect()))
        .collect()
}
