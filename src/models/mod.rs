//! Wire models for the Roost API.
//!
//! These models match the server's JSON payloads exactly; the server owns all
//! validation and business rules, the client only caches and displays them.

mod comment;
mod listing;
mod user;

pub use comment::*;
pub use listing::*;
pub use user::*;
