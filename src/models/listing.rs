//! Listing model and paginated listing collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A property listing. Read-only from the client's perspective except for
/// creation; the server owns and validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_src: Vec<String>,
    pub category: String,
    pub location: String,
    pub price: f64,
    pub room_count: u32,
    pub guest_count: u32,
    pub bathroom_count: u32,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of the paginated listing collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub listings: Vec<Listing>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    /// Whether a further page exists after this one
    #[serde(default)]
    pub has_more: bool,
}

/// Request body for POST /listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub image_src: Vec<String>,
    pub category: String,
    pub bathroom_count: u32,
    pub room_count: u32,
    pub guest_count: u32,
}
