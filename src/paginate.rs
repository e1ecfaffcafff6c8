//! Cursor-chained pagination over the networking service's listing calls.
//!
//! The service returns results in pages: an initial call with no cursor, then
//! repeated calls passing back the cursor from the previous response, until a
//! response carries no cursor. [`pages`] models that protocol as a lazy
//! stream whose state starts in an explicit "first page pending" position, so
//! no sentinel cursor value is needed for the first call.
//!
//! # Example
//!
//! ```ignore
//! use culvert::paginate::collect_all;
//!
//! let tables = collect_all(|cursor| client.list_route_tables("net-1", cursor)).await?;
//! ```

use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};

use crate::Result;

/// One page of results from a cursor-chained listing call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page; absent on the last page
    pub next: Option<String>,
}

/// Progress of a cursor-chained listing
enum Cursor {
    /// First page not fetched yet
    Start,
    /// More pages pending, resume from this cursor
    Next(String),
    /// Last page seen
    Done,
}

/// Lazily fetch every page of a listing.
///
/// `fetch` is called with `None` for the first page and with the previous
/// response's cursor for each following page. The stream ends after the first
/// page that carries no cursor, or on the first error.
pub fn pages<T, F, Fut>(fetch: F) -> impl Stream<Item = Result<Vec<T>>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    stream::try_unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = fetch(token).await?;
        let cursor = match page.next {
            Some(token) => Cursor::Next(token),
            None => Cursor::Done,
        };

        Ok(Some((page.items, (cursor, fetch))))
    })
}

/// Fetch every page and accumulate all items before the caller inspects any
pub async fn collect_all<T, F, Fut>(fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    pages(fetch).try_concat().await
}
