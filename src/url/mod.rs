//! URL handling for listings and items
//!
//! Listing links are resolved and canonicalized before anything else looks
//! at them. The item identifier is derived from the canonical URL, so two
//! links that only differ by a fragment or tracking parameter name the same
//! item.

mod host;
mod identifier;
mod normalize;
mod pagination;

pub use host::host_key;
pub use identifier::identifier_from_url;
pub use normalize::canonicalize_url;
pub use pagination::{build_page_url, listing_page_url};
