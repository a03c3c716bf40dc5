//! Business services for shelf-api

pub mod bulk_fetcher;
pub mod catalog;
pub mod facet_index;
pub mod genre_map;
pub mod media_resolver;
pub mod membership;
pub mod platform_client;

pub use bulk_fetcher::{BulkFetcher, DataQuery, DataStore, Page};
pub use catalog::{CatalogService, CatalogSettings};
pub use facet_index::{FacetConfig, FacetIndex, FacetIndexBuilder, FacetValue};
pub use media_resolver::{MediaResolver, MediaValue};
pub use membership::{MembersPage, MembershipDirectory, MembershipService, OrdersPage};
pub use platform_client::{PlatformClient, PlatformError};
