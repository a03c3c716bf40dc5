//! Membership data: pricing plans, sold subscriptions, members, contacts
//!
//! Plans, orders and members live behind dedicated platform APIs rather than
//! data collections, so they come through [`MembershipDirectory`]. Member
//! reference data is an ordinary collection and goes through the
//! [`BulkFetcher`].

use async_trait::async_trait;
use indexmap::IndexMap;
use shelf_common::record::{index_by, merge_with_reference_key};
use shelf_common::Record;
use std::sync::Arc;
use tracing::{debug, warn};

use super::bulk_fetcher::BulkFetcher;
use super::platform_client::PlatformError;

/// Orders requested per page
pub const ORDERS_PAGE_SIZE: usize = 50;
/// Members requested per page
pub const MEMBERS_PAGE_SIZE: usize = 100;
/// Key under which member reference data is nested
pub const MEMBERS_REFERENCE_KEY: &str = "members_reference";

/// One page of sold plan orders
#[derive(Debug, Clone, Default)]
pub struct OrdersPage {
    pub orders: Vec<Record>,
    /// Offset the server reports for this page
    pub offset: usize,
    /// Number of orders on this page
    pub count: usize,
    pub has_next: bool,
}

/// One page of site members
#[derive(Debug, Clone, Default)]
pub struct MembersPage {
    pub members: Vec<Record>,
    pub count: usize,
}

/// Pricing-plan and member APIs
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn public_plans(&self) -> Result<Vec<Record>, PlatformError>;

    async fn orders_page(&self, limit: usize, offset: usize) -> Result<OrdersPage, PlatformError>;

    async fn members_page(&self, limit: usize, offset: usize)
        -> Result<MembersPage, PlatformError>;
}

/// Assembles the membership views served over HTTP
pub struct MembershipService {
    directory: Arc<dyn MembershipDirectory>,
    fetcher: BulkFetcher,
    member_reference_collection: String,
}

impl MembershipService {
    pub fn new(
        directory: Arc<dyn MembershipDirectory>,
        fetcher: BulkFetcher,
        member_reference_collection: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            fetcher,
            member_reference_collection: member_reference_collection.into(),
        }
    }

    /// Public pricing plans keyed by `_id`
    pub async fn pricing_plans(&self) -> Result<IndexMap<String, Record>, PlatformError> {
        let plans = self.directory.public_plans().await?;
        Ok(index_by(plans, "_id"))
    }

    /// Every sold plan order keyed by `subscriptionId`
    pub async fn sold_subscriptions(&self) -> Result<IndexMap<String, Record>, PlatformError> {
        let mut orders = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.directory.orders_page(ORDERS_PAGE_SIZE, offset).await?;
            orders.extend(page.orders);

            if !page.has_next {
                break;
            }
            if page.count == 0 {
                warn!(offset, "Orders API reported more pages but returned none; stopping");
                break;
            }
            offset = page.offset + page.count;
        }

        debug!(orders = orders.len(), "Fetched sold subscriptions");
        Ok(index_by(orders, "subscriptionId"))
    }

    /// Every member keyed by `contactId`, with reference data nested under
    /// [`MEMBERS_REFERENCE_KEY`]
    pub async fn members(&self) -> Result<IndexMap<String, Record>, PlatformError> {
        let mut members = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.directory.members_page(MEMBERS_PAGE_SIZE, offset).await?;
            members.extend(page.members);

            if page.count < MEMBERS_PAGE_SIZE {
                break;
            }
            offset += page.count;
        }

        let reference = self
            .fetcher
            .fetch_all(&self.member_reference_collection)
            .await?;

        debug!(
            members = members.len(),
            reference = reference.len(),
            "Fetched members"
        );

        Ok(merge_with_reference_key(
            index_by(members, "contactId"),
            index_by(reference, "contactId"),
            MEMBERS_REFERENCE_KEY,
        ))
    }

    /// Raw member reference records
    pub async fn contacts(&self) -> Result<Vec<Record>, PlatformError> {
        self.fetcher.fetch_all(&self.member_reference_collection).await
    }
}
