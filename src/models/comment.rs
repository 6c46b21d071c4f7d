//! Comment model for listing reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user comment on a listing, with a 1-5 star rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub listing_id: String,
    /// Author of the comment
    pub user_id: String,
    pub content: String,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Whether the given user may see edit/delete controls for this comment.
    ///
    /// Cosmetic only; the server independently enforces ownership.
    pub fn editable_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Request body for POST /comments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub listing_id: String,
    pub content: String,
    pub rating: u8,
}

/// Request body for PATCH /comments/:id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}
