//! Service layer for the history extractor.
//!
//! This module contains the business logic for:
//! - Fetching archive pages (`Transport`)
//! - Walking paginated date indexes (`IndexWalker`)
//! - Recovering message id and body from message pages (`BodyExtractor`)
//! - Turning message bodies into upload records (`parse_upload`)

pub mod address;
pub mod body;
pub mod dates;
mod index;
pub mod metadata;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use body::{BodyExtractor, CurrentTemplate, ExtractMiss, ExtractedMessage, LegacyTemplate, MessageLayout};
pub use index::{IndexPage, IndexWalker};
pub use metadata::parse_upload;
pub use transport::{Fetch, Transport};
