//! Roost Client
//!
//! Data-fetching and synchronization layer for the Roost property-listing
//! mobile client: secure token storage, an HTTP transport with error
//! classification, typed resource clients, an auth session controller, a
//! keyed query/mutation cache with infinite pagination, and favourites
//! synchronization. Screens, navigation, and the remote API server live
//! elsewhere.

pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod favourites;
pub mod feed;
pub mod http;
pub mod models;
pub mod notify;
pub mod session;
pub mod token;

use std::sync::Arc;

use api::{AuthClient, CommentsClient, FavouritesClient, ListingsClient};
use cache::QueryClient;
use config::Config;
use errors::ApiError;
use favourites::FavouritesSync;
use feed::{CommentThread, ListingFeed};
use http::HttpClient;
use notify::SharedNotifier;
use session::SessionController;
use token::TokenStore;

/// Everything a screen needs, constructed explicitly at startup and passed
/// down. There are no module-level singletons.
pub struct AppContext {
    pub config: Arc<Config>,
    pub tokens: Arc<dyn TokenStore>,
    pub notifier: SharedNotifier,
    pub http: Arc<HttpClient>,
    pub listings: ListingsClient,
    pub comments: CommentsClient,
    pub cache: Arc<QueryClient>,
    pub session: Arc<SessionController>,
    pub feed: ListingFeed,
    pub favourites: FavouritesSync,
}

impl AppContext {
    /// Wire the full client stack against a configuration.
    pub fn new(
        config: Config,
        tokens: Arc<dyn TokenStore>,
        notifier: SharedNotifier,
    ) -> Result<Self, ApiError> {
        let config = Arc::new(config);
        let http = Arc::new(HttpClient::new(
            &config,
            Arc::clone(&tokens),
            Arc::clone(&notifier),
        )?);

        let listings = ListingsClient::new(Arc::clone(&http));
        let comments = CommentsClient::new(Arc::clone(&http));
        let favourites_api = FavouritesClient::new(Arc::clone(&http));
        let auth = AuthClient::new(Arc::clone(&http), Arc::clone(&tokens));

        let cache = Arc::new(QueryClient::new());
        let session = Arc::new(SessionController::new(
            auth,
            Arc::clone(&tokens),
            Arc::clone(&notifier),
        ));
        let feed = ListingFeed::new(listings.clone(), Arc::clone(&cache));
        let favourites = FavouritesSync::new(
            favourites_api,
            Arc::clone(&cache),
            Arc::clone(&session),
            Arc::clone(&notifier),
        );

        Ok(Self {
            config,
            tokens,
            notifier,
            http,
            listings,
            comments,
            cache,
            session,
            feed,
            favourites,
        })
    }

    /// Run the startup session check.
    pub async fn start(&self) {
        tracing::info!(api_url = %self.config.api_url, "starting Roost client");
        self.session.initialize().await;
    }

    /// Cached comment thread for a listing.
    pub fn comment_thread(&self, listing_id: &str) -> CommentThread {
        CommentThread::new(self.comments.clone(), Arc::clone(&self.cache), listing_id)
    }
}
