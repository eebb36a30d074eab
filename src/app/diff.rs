//! Desired-versus-local diffing
//!
//! Pure functions over immutable snapshots: the desired book set, the local
//! archive list, and the server staleness record. Outputs are sorted by
//! title so a fixed input always yields the same order.

use std::collections::HashMap;

use crate::app::books::BooksState;
use crate::app::catalog::LastUpdated;
use crate::app::scan::LocalArchive;

/// Books that must be fetched
///
/// A book is scheduled when it is desired and either has no local archive or
/// its archive is strictly older than the server's recorded last-modified
/// time. A desired book missing from the staleness record is only scheduled
/// on the missing-file branch; with no server timestamp there is nothing to
/// compare against.
pub fn books_to_download(
    books: &BooksState,
    local: &[LocalArchive],
    last_updated: &LastUpdated,
) -> Vec<String> {
    let on_disk: HashMap<&str, &LocalArchive> =
        local.iter().map(|a| (a.title.as_str(), a)).collect();

    let mut scheduled: Vec<String> = books
        .values()
        .filter(|b| b.desired)
        .filter(|b| match on_disk.get(b.title.as_str()) {
            None => true,
            Some(archive) => match last_updated.timestamp(&b.title) {
                Some(server) => archive.modified < server,
                None => false,
            },
        })
        .map(|b| b.title.clone())
        .collect();
    scheduled.sort();
    scheduled
}

/// Local archives that are no longer wanted
pub fn books_to_delete(books: &BooksState, local: &[LocalArchive]) -> Vec<String> {
    let mut scheduled: Vec<String> = local
        .iter()
        .filter(|a| !books.get(&a.title).map(|b| b.desired).unwrap_or(false))
        .map(|a| a.title.clone())
        .collect();
    scheduled.sort();
    scheduled
}
