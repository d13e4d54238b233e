// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Page walker for GitHub list endpoints.

use std::future::Future;

use tracing::{debug, warn};

use crate::{
    error::FetchError,
    models::{Page, PageRequest},
    retry::RateLimitedExecutor,
};

/// Items accumulated by [`walk_pages`].
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct PageWalk<T,>
{
    /// Items from every page fetched, in page order.
    pub items:    Vec<T,>,
    /// `false` when the walk stopped early on an error or shutdown.
    pub complete: bool,
}

/// Fetches every page of a listing through `executor`.
///
/// Pages are requested starting at page 1 and following the cursor returned
/// by each response until it equals [`Page::LAST`]. Throttled requests are
/// reissued for the same page by the executor, so no page is skipped or
/// fetched twice. A surfaced error ends the walk with what was accumulated
/// so far and `complete == false`.
///
/// # Arguments
///
/// * `executor` - Executor applying the rate-limit retry policy
/// * `operation` - Name of the listing for logging
/// * `per_page` - Page size requested from the API
/// * `fetch` - Issues the request for one page
pub async fn walk_pages<T, F, Fut,>(
    executor: &RateLimitedExecutor,
    operation: &str,
    per_page: u32,
    mut fetch: F,
) -> PageWalk<T,>
where
    F: FnMut(PageRequest,) -> Fut,
    Fut: Future<Output = Result<Page<T,>, FetchError,>,>,
{
    let mut items = Vec::new();
    let mut request = PageRequest {
        page: 1, per_page,
    };

    loop {
        match executor.execute(operation, || fetch(request,),).await {
            Ok(page,) => {
                debug!("{} page {} returned {} items", operation, request.page, page.items.len());
                items.extend(page.items,);
                if page.next_page == Page::<T,>::LAST {
                    return PageWalk {
                        items, complete: true,
                    };
                }
                request.page = page.next_page;
            }
            Err(FetchError::Cancelled,) => {
                debug!("{} interrupted by shutdown after {} items", operation, items.len());
                return PageWalk {
                    items, complete: false,
                };
            }
            Err(error,) => {
                warn!(
                    "{} stopped at page {} with {} items: {}",
                    operation,
                    request.page,
                    items.len(),
                    error
                );
                return PageWalk {
                    items, complete: false,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::{Arc, Mutex};

    use chrono::{TimeDelta, Utc};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::retry::RetryPolicy;

    fn executor() -> RateLimitedExecutor
    {
        RateLimitedExecutor::new(RetryPolicy::default(), CancellationToken::new(),)
    }

    #[tokio::test]
    async fn walk_follows_cursor_until_last_page()
    {
        let requested = Arc::new(Mutex::new(Vec::new(),),);
        let log = requested.clone();

        let walk = walk_pages(&executor(), "list", 2, move |request| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(request,);
                let page = match request.page {
                    1 => Page {
                        items: vec![1, 2], next_page: 2,
                    },
                    2 => Page {
                        items: vec![3, 4], next_page: 3,
                    },
                    _ => Page::last(vec![5],),
                };
                Ok(page,)
            }
        },)
        .await;

        assert_eq!(walk, PageWalk {
            items: vec![1, 2, 3, 4, 5], complete: true,
        });
        let pages: Vec<u32,> = requested.lock().unwrap().iter().map(|request| request.page,).collect();
        assert_eq!(pages, [1, 2, 3]);
        assert!(requested.lock().unwrap().iter().all(|request| request.per_page == 2));
    }

    #[tokio::test]
    async fn empty_listing_terminates_on_sentinel()
    {
        let walk = walk_pages(&executor(), "list", 100, |_| async {
            Ok::<_, FetchError,>(Page::<u8,>::last(Vec::new(),),)
        },)
        .await;

        assert!(walk.items.is_empty());
        assert!(walk.complete);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_page_is_reissued_not_restarted()
    {
        let requested = Arc::new(Mutex::new(Vec::new(),),);
        let log = requested.clone();
        let reset = Utc::now() + TimeDelta::seconds(3,);

        let walk = walk_pages(&executor(), "list", 100, move |request| {
            let log = log.clone();
            async move {
                let mut log = log.lock().unwrap();
                log.push(request.page,);
                let throttled_once = log.iter().filter(|page| **page == 2,).count() == 1;
                match request.page {
                    1 => Ok(Page {
                        items: vec!["a"], next_page: 2,
                    },),
                    2 if throttled_once => Err(FetchError::PrimaryRateLimit {
                        reset,
                    },),
                    _ => Ok(Page::last(vec!["b"],),),
                }
            }
        },)
        .await;

        assert_eq!(walk.items, ["a", "b"]);
        assert!(walk.complete);
        assert_eq!(*requested.lock().unwrap(), [1, 2, 2]);
    }

    #[tokio::test]
    async fn generic_error_returns_partial_result()
    {
        let walk = walk_pages(&executor(), "list", 100, |request| async move {
            if request.page == 1 {
                Ok(Page {
                    items: vec![10, 11], next_page: 2,
                },)
            } else {
                Err(FetchError::Status {
                    status: 500, message: "boom".to_owned(),
                },)
            }
        },)
        .await;

        assert_eq!(walk.items, [10, 11]);
        assert!(!walk.complete);
    }

    #[tokio::test]
    async fn cancelled_executor_stops_immediately()
    {
        let token = CancellationToken::new();
        token.cancel();
        let executor = RateLimitedExecutor::new(RetryPolicy::default(), token,);

        let walk = walk_pages(&executor, "list", 100, |_| async {
            Ok::<_, FetchError,>(Page::last(vec![1u8],),)
        },)
        .await;

        assert!(walk.items.is_empty());
        assert!(!walk.complete);
    }
}
