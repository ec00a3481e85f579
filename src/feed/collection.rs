use super::entry::Feed;
use super::fetcher::Transport;
use super::source::{FeedError, FeedSource, Query};
use futures::stream::{self, StreamExt, TryStreamExt};

/// Upper bound on feeds fetched at the same time.
const MAX_CONCURRENT: usize = 10;

/// Runs `find` for every query concurrently.
///
/// Returns one [`Feed`] per query, in query order. The first failure to
/// complete ends the whole operation; feeds still in flight are dropped and
/// results already gathered are discarded.
pub async fn find_many<T: Transport>(
    source: &FeedSource<T>,
    queries: &[Query],
) -> Result<Vec<Feed>, FeedError> {
    if queries.is_empty() {
        return Ok(Vec::new());
    }

    let mut feeds: Vec<(usize, Feed)> = stream::iter(queries.iter().enumerate())
        .map(|(index, query)| async move {
            let feed = source.find(query).await.inspect_err(|e| {
                tracing::warn!(
                    index = index,
                    url = query.url().unwrap_or_default(),
                    error = %e,
                    "Feed failed, abandoning remaining feeds"
                );
            })?;
            Ok::<_, FeedError>((index, feed))
        })
        .buffer_unordered(MAX_CONCURRENT)
        .try_collect()
        .await?;

    feeds.sort_unstable_by_key(|(index, _)| *index);
    tracing::info!(feeds = feeds.len(), "Fetched all feeds");
    Ok(feeds.into_iter().map(|(_, feed)| feed).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchError;
    use std::time::Duration;

    /// Responds after a delay encoded in the URL: `http://delay/<ms>/<title>`.
    struct SlowTransport;

    impl Transport for SlowTransport {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            let rest = url.trim_start_matches("http://delay/");
            let (ms, title) = rest.split_once('/').unwrap_or((rest, ""));
            let ms: u64 = ms.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if title == "fail" {
                return Err(FetchError::HttpStatus(500));
            }
            Ok(format!(
                "<rss><channel><item><title>{title}</title></item></channel></rss>"
            ))
        }
    }

    #[tokio::test]
    async fn test_results_in_query_order() {
        let source = FeedSource::new(SlowTransport);
        let queries = [
            Query::for_url("http://delay/30/a"),
            Query::for_url("http://delay/0/b"),
            Query::for_url("http://delay/10/c"),
        ];
        let feeds = find_many(&source, &queries).await.unwrap();
        let names: Vec<_> = feeds.iter().map(|f| f.entries[0].name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let source = FeedSource::new(SlowTransport);
        let queries = [
            Query::for_url("http://delay/0/a"),
            Query::for_url("http://delay/5/fail"),
            Query::for_url("http://delay/10000/never"),
        ];
        let started = tokio::time::Instant::now();
        let err = find_many(&source, &queries).await.unwrap_err();
        assert!(matches!(err, FeedError::Transport(FetchError::HttpStatus(500))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_empty_query_list() {
        let source = FeedSource::new(SlowTransport);
        assert!(find_many(&source, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_without_url_gives_empty_feed() {
        let source = FeedSource::new(SlowTransport);
        let feeds = find_many(&source, &[Query::default(), Query::for_url("http://delay/0/x")])
            .await
            .unwrap();
        assert!(feeds[0].is_empty());
        assert_eq!(feeds[1].entries[0].name, "x");
    }
}
