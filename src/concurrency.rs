//! Bounded-concurrency mapping over async operations.

use crate::error::{Result, SpecIndexError};
use futures::future::try_join_all;
use std::future::Future;

/// Map over items with bounded concurrency.
///
/// Items are processed in chunks of `concurrency`: every operation of a
/// chunk is polled concurrently, and the next chunk only starts once the
/// whole chunk has settled. Output order matches input order. The first
/// failing operation aborts the remaining chunks.
pub async fn map_concurrent<T, R, F, Fut>(items: Vec<T>, concurrency: usize, f: F) -> Result<Vec<R>>
where
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if concurrency < 1 {
        return Err(SpecIndexError::InvalidArgument(
            "concurrency must be >= 1".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().enumerate().peekable();

    while items.peek().is_some() {
        let chunk = items
            .by_ref()
            .take(concurrency)
            .map(|(index, item)| f(item, index));
        results.extend(try_join_all(chunk).await?);
    }

    Ok(results)
}
