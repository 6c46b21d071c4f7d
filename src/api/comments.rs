//! Comment endpoints.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;

use crate::errors::ApiError;
use crate::http::HttpClient;
use crate::models::{Comment, CreateCommentRequest, UpdateCommentRequest};

/// Payload of GET /comments/:listingId.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentList {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Client for `/comments`.
#[derive(Clone)]
pub struct CommentsClient {
    http: Arc<HttpClient>,
}

impl CommentsClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// GET /comments/:listingId - all comments on a listing.
    pub async fn for_listing(&self, listing_id: &str) -> Result<Vec<Comment>, ApiError> {
        self.http
            .send_to::<CommentList>(Method::GET, &format!("/comments/{listing_id}"))
            .await
            .map(|envelope| envelope.data.comments)
            .map_err(|e| e.with_fallback("Failed to fetch comments"))
    }

    /// POST /comments - create a comment.
    pub async fn create(&self, payload: &CreateCommentRequest) -> Result<Comment, ApiError> {
        self.http
            .send::<Comment>(self.http.request(Method::POST, "/comments").json(payload))
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Failed to create comment"))
    }

    /// PATCH /comments/:id - edit an owned comment.
    pub async fn update(
        &self,
        comment_id: &str,
        payload: &UpdateCommentRequest,
    ) -> Result<Comment, ApiError> {
        self.http
            .send::<Comment>(
                self.http
                    .request(Method::PATCH, &format!("/comments/{comment_id}"))
                    .json(payload),
            )
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Failed to update comment"))
    }

    /// DELETE /comments/:id - delete an owned comment.
    pub async fn delete(&self, comment_id: &str) -> Result<(), ApiError> {
        self.http
            .send_to::<serde_json::Value>(Method::DELETE, &format!("/comments/{comment_id}"))
            .await
            .map(|_| ())
            .map_err(|e| e.with_fallback("Failed to delete comment"))
    }
}
