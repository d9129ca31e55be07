//! Safe outbound fetching for monitored sources.
//!
//! All network access in the pipeline funnels through [`SafeFetcher`], which
//! enforces the outbound trust boundary before any request is made.

mod client;
mod guard;

pub use self::client::{FetchedPage, SafeFetcher, DEFAULT_FETCH_TIMEOUT, USER_AGENT};
pub use self::guard::{vet_url, VettedUrl};
