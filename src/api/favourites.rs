//! Favourite endpoints.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;

use crate::errors::ApiError;
use crate::http::HttpClient;

/// Membership record in the favourite collection. The server attaches more
/// fields; only the listing id matters to the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favourite {
    pub id: String,
}

/// Result of an add/remove mutation: the updated id list plus the
/// server-supplied outcome message.
#[derive(Debug, Clone)]
pub struct FavouriteUpdate {
    pub ids: Vec<String>,
    pub message: String,
}

/// Client for `/favourites`.
#[derive(Clone)]
pub struct FavouritesClient {
    http: Arc<HttpClient>,
}

impl FavouritesClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// POST /favourites/:id - mark a listing favourite.
    pub async fn add(&self, listing_id: &str) -> Result<FavouriteUpdate, ApiError> {
        self.http
            .send_to::<Vec<String>>(Method::POST, &format!("/favourites/{listing_id}"))
            .await
            .map(|envelope| FavouriteUpdate {
                ids: envelope.data,
                message: envelope.message,
            })
            .map_err(|e| e.with_fallback("Failed to add favourite"))
    }

    /// DELETE /favourites/:id - unmark a listing favourite.
    pub async fn remove(&self, listing_id: &str) -> Result<FavouriteUpdate, ApiError> {
        self.http
            .send_to::<Vec<String>>(Method::DELETE, &format!("/favourites/{listing_id}"))
            .await
            .map(|envelope| FavouriteUpdate {
                ids: envelope.data,
                message: envelope.message,
            })
            .map_err(|e| e.with_fallback("Failed to remove favourite"))
    }

    /// GET /favourites - the current user's favourite set.
    pub async fn get_all(&self) -> Result<Vec<Favourite>, ApiError> {
        self.http
            .send_to::<Vec<Favourite>>(Method::GET, "/favourites")
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Failed to fetch favourites"))
    }
}
