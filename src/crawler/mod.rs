//! Requests against the manga API: shared client, endpoint wrappers, and batch crawls that
//! run on the task runner.

mod client;
mod error;

pub mod batch;
pub mod endpoints;

pub use batch::{
    attach_bonus, classify_all, comics_details, home_feed_all, update_pages, BatchOptions,
};
pub use client::{load_headers_file, MangaClient, MangaClientBuilder};
pub use error::CrawlerError;

use crate::model::Dictionaries;

/// Built-in dictionaries plus the classify labels and ranking types fetched from the site.
pub fn fetch_dictionaries(client: &MangaClient) -> Result<Dictionaries, CrawlerError> {
    let mut dicts = Dictionaries::builtin();
    dicts.merge_labels(&endpoints::classify_labels(client)?);
    dicts.merge_ranking(&endpoints::ranking_page(client, 0)?);
    Ok(dicts)
}
