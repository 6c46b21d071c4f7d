//! Listing endpoints.

use std::sync::Arc;

use reqwest::Method;

use crate::errors::ApiError;
use crate::http::HttpClient;
use crate::models::{CreateListingRequest, Listing, ListingPage};

/// Client for `/listings`.
#[derive(Clone)]
pub struct ListingsClient {
    http: Arc<HttpClient>,
}

impl ListingsClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// GET /listings - fetch one page of the listing collection.
    ///
    /// Empty category or location filters are omitted from the query string.
    pub async fn get_all(
        &self,
        category: Option<&str>,
        location: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<ListingPage, ApiError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            query.push(("category", category.to_string()));
        }
        if let Some(location) = location.filter(|l| !l.is_empty()) {
            query.push(("location", location.to_string()));
        }
        query.push(("page", page.to_string()));
        query.push(("limit", limit.to_string()));

        self.http
            .send::<ListingPage>(self.http.request(Method::GET, "/listings").query(&query))
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Listing failed"))
    }

    /// GET /listings/:id - fetch a single listing.
    pub async fn get_by_id(&self, listing_id: &str) -> Result<Listing, ApiError> {
        self.http
            .send_to::<Listing>(Method::GET, &format!("/listings/{listing_id}"))
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Listing failed"))
    }

    /// POST /listings - create a listing.
    pub async fn create(&self, payload: &CreateListingRequest) -> Result<Listing, ApiError> {
        self.http
            .send::<Listing>(self.http.request(Method::POST, "/listings").json(payload))
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Listing creation failed"))
    }
}
