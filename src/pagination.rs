//! Cursor-following traversal shared by every list operation.
//!
//! GraphQL connections continue with an opaque end cursor while the REST API
//! continues with a page number taken from the `Link` header. Both are
//! modelled as a [`Cursor`] value that each fetch step receives and the
//! following [`Page`] replaces; nothing is mutated between iterations.

use std::future::Future;

use serde::Deserialize;

use crate::error::GithubError;

/// Maximum page size accepted by both GitHub APIs.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Position within a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// The first page, before any continuation has been seen.
    Start,
    /// GraphQL continuation: fetch the items after this end cursor.
    After(String),
    /// REST continuation: fetch this page number.
    Page(u32),
}

impl Cursor {
    /// GraphQL `after:` argument for this position.
    pub fn after(&self) -> Option<&str> {
        match self {
            Cursor::After(cursor) => Some(cursor),
            Cursor::Start | Cursor::Page(_) => None,
        }
    }

    /// REST `page` parameter for this position. The first page is 1.
    pub fn page(&self) -> u32 {
        match self {
            Cursor::Page(page) => *page,
            Cursor::Start | Cursor::After(_) => 1,
        }
    }

    /// Whether moving from `previous` to `self` makes progress.
    pub fn advances_from(&self, previous: &Cursor) -> bool {
        match (previous, self) {
            (_, Cursor::Start) => false,
            (Cursor::Page(_) | Cursor::Start, Cursor::Page(next)) => *next > previous.page(),
            (Cursor::After(prev), Cursor::After(next)) => prev != next,
            (Cursor::Start, Cursor::After(_)) => true,
            (Cursor::After(_), Cursor::Page(_)) | (Cursor::Page(_), Cursor::After(_)) => false,
        }
    }
}

/// One batch of items plus where to continue, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<Cursor>) -> Self {
        Self { items, next }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// GraphQL `pageInfo` selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Converts the connection state into the next cursor.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::Pagination`] when GitHub claims there is a next
    /// page but provides no cursor to reach it.
    pub fn continuation(&self) -> Result<Option<Cursor>, GithubError> {
        match (self.has_next_page, &self.end_cursor) {
            (false, _) => Ok(None),
            (true, Some(cursor)) => Ok(Some(Cursor::After(cursor.clone()))),
            (true, None) => Err(GithubError::Pagination {
                message: "hasNextPage is set without an endCursor".to_string(),
            }),
        }
    }
}

/// Fetches pages starting at `start` until no continuation is signalled and
/// returns every item in page order.
///
/// # Errors
///
/// Propagates the first error from `fetch`, and fails with
/// [`GithubError::Pagination`] when a continuation does not advance past the
/// cursor it was fetched with.
pub async fn collect_all<T, F, Fut>(start: Cursor, mut fetch: F) -> Result<Vec<T>, GithubError>
where
    F: FnMut(Cursor) -> Fut,
    Fut: Future<Output = Result<Page<T>, GithubError>>,
{
    let mut items = Vec::new();
    let mut cursor = start;

    loop {
        let page = fetch(cursor.clone()).await?;
        items.extend(page.items);

        let Some(next) = page.next else {
            return Ok(items);
        };
        if !next.advances_from(&cursor) {
            return Err(GithubError::Pagination {
                message: format!("continuation {next:?} does not advance past {cursor:?}"),
            });
        }
        cursor = next;
    }
}
