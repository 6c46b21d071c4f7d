//! Typed resource clients for the Roost API.
//!
//! Each function performs one HTTP call and, on failure, re-wraps the
//! classified error into a domain error carrying the server message or a fixed
//! fallback string. The raw transport error never reaches callers.

mod auth;
mod comments;
mod favourites;
mod listings;

pub use auth::*;
pub use comments::*;
pub use favourites::*;
pub use listings::*;
