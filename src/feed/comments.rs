//! Comment thread for one listing: cached read plus mutations that
//! invalidate the thread's key so it refetches.

use std::sync::Arc;

use crate::api::CommentsClient;
use crate::cache::{QueryClient, QueryKey, QueryOptions};
use crate::errors::ApiError;
use crate::models::{Comment, CreateCommentRequest, UpdateCommentRequest};

/// Cache key for the comments on a listing.
pub fn comments_key(listing_id: &str) -> QueryKey {
    QueryKey::with_params("comments", [listing_id])
}

/// Cached view of one listing's comments.
pub struct CommentThread {
    client: CommentsClient,
    cache: Arc<QueryClient>,
    listing_id: String,
}

impl CommentThread {
    pub fn new(client: CommentsClient, cache: Arc<QueryClient>, listing_id: &str) -> Self {
        Self {
            client,
            cache,
            listing_id: listing_id.to_string(),
        }
    }

    pub async fn comments(&self) -> Result<Arc<Vec<Comment>>, ApiError> {
        let client = self.client.clone();
        let listing_id = self.listing_id.clone();
        self.cache
            .query(
                comments_key(&self.listing_id),
                QueryOptions::default(),
                move || {
                    let client = client.clone();
                    let listing_id = listing_id.clone();
                    async move { client.for_listing(&listing_id).await }
                },
            )
            .await
    }

    pub async fn add(&self, content: &str, rating: u8) -> Result<Comment, ApiError> {
        let client = self.client.clone();
        let payload = CreateCommentRequest {
            listing_id: self.listing_id.clone(),
            content: content.to_string(),
            rating,
        };
        self.cache
            .mutate(
                move || async move { client.create(&payload).await },
                &[comments_key(&self.listing_id)],
            )
            .await
    }

    pub async fn edit(
        &self,
        comment_id: &str,
        changes: UpdateCommentRequest,
    ) -> Result<Comment, ApiError> {
        let client = self.client.clone();
        let id = comment_id.to_string();
        self.cache
            .mutate(
                move || async move { client.update(&id, &changes).await },
                &[comments_key(&self.listing_id)],
            )
            .await
    }

    pub async fn remove(&self, comment_id: &str) -> Result<(), ApiError> {
        let client = self.client.clone();
        let id = comment_id.to_string();
        self.cache
            .mutate(
                move || async move { client.delete(&id).await },
                &[comments_key(&self.listing_id)],
            )
            .await
    }
}
