//! Listing feed: category/location filter plus the paginated listing query.
//!
//! Each (category, location) pair owns its own cache key, so a response that
//! arrives after the filter changed lands under the key it was requested for
//! and is never shown for the new filter.

mod comments;

pub use comments::*;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::ListingsClient;
use crate::cache::{InfiniteQuery, PageFetch, Paged, QueryClient, QueryKey, QueryOptions};
use crate::errors::ApiError;
use crate::models::{Listing, ListingPage};

/// Default page size requested from GET /listings.
const PAGE_LIMIT: u32 = 10;

impl Paged for ListingPage {
    fn has_more(&self) -> bool {
        self.has_more
    }
}

/// Active search filter for the listing feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub category: String,
    pub location: String,
}

/// Cache key for the paginated listing collection under a filter.
pub fn listings_key(filter: &SearchFilter) -> QueryKey {
    QueryKey::with_params(
        "getAllListing",
        [filter.category.clone(), filter.location.clone()],
    )
}

/// Cache key for a single listing detail.
pub fn listing_detail_key(listing_id: &str) -> QueryKey {
    QueryKey::with_params("getListingById", [listing_id])
}

/// The home-screen listing feed.
pub struct ListingFeed {
    listings: ListingsClient,
    cache: Arc<QueryClient>,
    filter: Mutex<SearchFilter>,
}

impl ListingFeed {
    pub fn new(listings: ListingsClient, cache: Arc<QueryClient>) -> Self {
        Self {
            listings,
            cache,
            filter: Mutex::new(SearchFilter::default()),
        }
    }

    pub fn filter(&self) -> SearchFilter {
        self.filter.lock().expect("filter mutex poisoned").clone()
    }

    /// Select a category; selecting the active category again clears it.
    pub fn set_category(&self, category: &str) {
        let mut filter = self.filter.lock().expect("filter mutex poisoned");
        if filter.category == category {
            filter.category.clear();
        } else {
            filter.category = category.to_string();
        }
    }

    pub fn set_location(&self, location: &str) {
        self.filter.lock().expect("filter mutex poisoned").location = location.to_string();
    }

    pub fn reset_filter(&self) {
        *self.filter.lock().expect("filter mutex poisoned") = SearchFilter::default();
    }

    /// Fetch the next page for the current filter. A fetch outstanding for an
    /// older filter keeps running against its own key and cannot touch this
    /// one.
    pub async fn load_more(&self) -> Result<PageFetch, ApiError> {
        let filter = self.filter();
        let query = self.active_query(&filter);
        let listings = self.listings.clone();
        query
            .fetch_next_page(move |page| async move {
                listings
                    .get_all(
                        Some(&filter.category),
                        Some(&filter.location),
                        page,
                        PAGE_LIMIT,
                    )
                    .await
            })
            .await
    }

    /// All listings accumulated for the current filter, page order preserved.
    pub fn listings(&self) -> Vec<Listing> {
        self.active_query(&self.filter())
            .pages()
            .iter()
            .flat_map(|page| page.listings.clone())
            .collect()
    }

    pub fn has_more(&self) -> bool {
        self.active_query(&self.filter()).has_next_page()
    }

    pub fn is_fetching(&self) -> bool {
        self.active_query(&self.filter()).is_fetching()
    }

    /// A single listing detail, served from cache while younger than five
    /// minutes, with two transparent retries on transient failure.
    pub async fn listing(&self, listing_id: &str) -> Result<Arc<Listing>, ApiError> {
        let options = QueryOptions::stale_after(Duration::from_secs(5 * 60)).with_retries(2);
        let listings = self.listings.clone();
        let id = listing_id.to_string();
        self.cache
            .query(listing_detail_key(listing_id), options, move || {
                let listings = listings.clone();
                let id = id.clone();
                async move { listings.get_by_id(&id).await }
            })
            .await
    }

    fn active_query(&self, filter: &SearchFilter) -> Arc<InfiniteQuery<ListingPage>> {
        self.cache.infinite_query::<ListingPage>(&listings_key(filter))
    }
}
