//! Favourites synchronization.
//!
//! Add/remove is deliberately non-optimistic: a toggle calls the server, and
//! only a successful mutation invalidates and refetches the cached favourite
//! set. The UI shows a loading state (`is_pending`) until the refetch lands.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::api::FavouritesClient;
use crate::cache::{QueryClient, QueryKey, QueryOptions};
use crate::errors::ApiError;
use crate::notify::{SharedNotifier, ToastKind};
use crate::session::SessionController;

/// Cache key for the current user's favourite set.
pub fn favourites_key() -> QueryKey {
    QueryKey::new("getFavourites")
}

/// Outcome of a favourite toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// No-op: the user is not logged in; the UI should prompt login instead
    NotAuthenticated,
    /// No-op: a mutation for this listing id is still in flight
    Pending,
}

/// Synchronizes the current user's favourite set with the server.
pub struct FavouritesSync {
    client: FavouritesClient,
    cache: Arc<QueryClient>,
    session: Arc<SessionController>,
    notifier: SharedNotifier,
    pending: Mutex<HashSet<String>>,
}

impl FavouritesSync {
    pub fn new(
        client: FavouritesClient,
        cache: Arc<QueryClient>,
        session: Arc<SessionController>,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            client,
            cache,
            session,
            notifier,
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// The cached favourite id list, fetched on first access.
    pub async fn favourites(&self) -> Result<Arc<Vec<String>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .query(favourites_key(), QueryOptions::default(), move || {
                let client = client.clone();
                async move {
                    client
                        .get_all()
                        .await
                        .map(|favourites| favourites.into_iter().map(|f| f.id).collect())
                }
            })
            .await
    }

    pub async fn is_favourite(&self, listing_id: &str) -> Result<bool, ApiError> {
        Ok(self.favourites().await?.iter().any(|id| id == listing_id))
    }

    /// Whether a mutation for this listing id is still in flight; the UI
    /// disables the control while true.
    pub fn is_pending(&self, listing_id: &str) -> bool {
        self.pending
            .lock()
            .expect("pending mutex poisoned")
            .contains(listing_id)
    }

    /// Toggle membership of a listing in the favourite set.
    ///
    /// Never calls the server while unauthenticated, and ignores re-taps for
    /// an id whose mutation is still pending.
    pub async fn toggle(&self, listing_id: &str) -> Result<ToggleOutcome, ApiError> {
        if !self.session.is_logged_in() {
            return Ok(ToggleOutcome::NotAuthenticated);
        }
        {
            let mut pending = self.pending.lock().expect("pending mutex poisoned");
            if !pending.insert(listing_id.to_string()) {
                return Ok(ToggleOutcome::Pending);
            }
        }

        let result = self.toggle_inner(listing_id).await;

        self.pending
            .lock()
            .expect("pending mutex poisoned")
            .remove(listing_id);
        result
    }

    async fn toggle_inner(&self, listing_id: &str) -> Result<ToggleOutcome, ApiError> {
        let removing = self.is_favourite(listing_id).await?;
        let client = self.client.clone();
        let id = listing_id.to_string();

        let result = self
            .cache
            .mutate(
                move || async move {
                    if removing {
                        client.remove(&id).await
                    } else {
                        client.add(&id).await
                    }
                },
                &[favourites_key()],
            )
            .await;

        match result {
            Ok(update) => {
                self.notifier.notify(
                    ToastKind::Success,
                    if removing {
                        "Removed from favourites"
                    } else {
                        "Added to favourites"
                    },
                    &update.message,
                );
                // The displayed set lags until this refetch completes; no
                // optimistic local patch.
                if let Err(err) = self.favourites().await {
                    tracing::warn!(%err, "favourites refetch after mutation failed");
                }
                Ok(if removing {
                    ToggleOutcome::Removed
                } else {
                    ToggleOutcome::Added
                })
            }
            Err(err) => {
                let (_, message) = err.notification();
                self.notifier
                    .notify(ToastKind::Error, "Favourites", &message);
                Err(err)
            }
        }
    }
}
