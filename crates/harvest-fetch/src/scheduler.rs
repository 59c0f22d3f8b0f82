//! Download Scheduler.
//!
//! Work items whose destination already exists are skipped without a
//! request. The rest are fetched through a fixed window of concurrent
//! requests: as soon as one completes, the next queued request starts.
//! Completions arrive out of order and are matched back to their work items
//! by URL.

use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use futures::stream::{self, StreamExt};
use harvest_core::stats::FailedDownload;
use harvest_core::{write_atomic, DownloadStats, WorkItem, FEEDBACK_INTERVAL};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of requests in flight.
pub const DEFAULT_CONCURRENCY: usize = 10;

pub struct Downloader {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            transport,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every item whose destination is missing.
    ///
    /// `limit` truncates the work list before anything else happens.
    /// Individual failures are recorded in the returned stats and never
    /// abort the batch.
    pub async fn run(&self, mut items: Vec<WorkItem>, limit: Option<usize>) -> DownloadStats {
        if let Some(limit) = limit {
            items.truncate(limit);
        }

        let mut stats = DownloadStats {
            total: items.len(),
            ..Default::default()
        };

        let (existing, pending): (Vec<WorkItem>, Vec<WorkItem>) =
            items.into_iter().partition(|item| item.destination.exists());
        stats.skipped_existing = existing.len();

        tracing::info!(
            total = stats.total,
            skipped = stats.skipped_existing,
            pending = pending.len(),
            "starting downloads"
        );

        // Distinct destinations normally mean distinct URLs; if two items
        // share a URL it is fetched once and written to each destination.
        let mut by_url: HashMap<&str, Vec<&WorkItem>> = HashMap::new();
        let mut urls: Vec<&str> = Vec::new();
        for item in &pending {
            let entry = by_url.entry(item.url.as_str()).or_default();
            if entry.is_empty() {
                urls.push(item.url.as_str());
            }
            entry.push(item);
        }

        let by_url = &by_url;
        let mut completions = stream::iter(urls)
            .map(|url| async move {
                let fetched = self.retry.run(|| self.transport.get(url)).await;
                let outcomes: Vec<Option<Arc<FetchError>>> = match fetched {
                    Ok(body) => {
                        let body = Arc::new(body);
                        let mut outcomes = Vec::new();
                        for item in by_url.get(url).into_iter().flatten() {
                            let written = store(item.destination.clone(), Arc::clone(&body)).await;
                            outcomes.push(written.err().map(Arc::new));
                        }
                        outcomes
                    }
                    Err(err) => {
                        let err = Arc::new(err);
                        by_url
                            .get(url)
                            .into_iter()
                            .flatten()
                            .map(|_| Some(Arc::clone(&err)))
                            .collect()
                    }
                };
                (url, outcomes)
            })
            .buffer_unordered(self.concurrency);

        let mut completed = 0usize;
        while let Some((url, outcomes)) = completions.next().await {
            let Some(targets) = by_url.get(url) else {
                tracing::warn!(url, "response for unknown url");
                continue;
            };

            for (item, outcome) in targets.iter().zip(outcomes) {
                match outcome {
                    None => {
                        stats.downloaded += 1;
                        tracing::debug!(url, path = %item.destination.display(), "saved");
                    }
                    Some(err) => record_failure(&mut stats, item, &err),
                }
            }

            completed += 1;
            if completed % FEEDBACK_INTERVAL == 0 {
                tracing::info!(
                    completed,
                    downloaded = stats.downloaded,
                    failed = stats.failed,
                    "progress"
                );
            }
        }

        tracing::info!(
            downloaded = stats.downloaded,
            skipped = stats.skipped_existing,
            failed = stats.failed,
            "downloads finished"
        );
        stats
    }
}

/// Write a fetched body to disk off the async runtime.
async fn store(destination: PathBuf, body: Arc<Vec<u8>>) -> Result<(), FetchError> {
    let display = destination.display().to_string();
    tokio::task::spawn_blocking(move || write_atomic(&destination, &body))
        .await
        .map_err(|e| FetchError::Io {
            path: display.clone(),
            source: std::io::Error::other(e.to_string()),
        })?
        .map_err(|source| FetchError::Io {
            path: display,
            source,
        })
}

fn record_failure(stats: &mut DownloadStats, item: &WorkItem, err: &FetchError) {
    tracing::warn!(
        url = %item.url,
        case_id = %item.case_id,
        path = %item.destination.display(),
        error = %err,
        "download failed"
    );
    stats.record_failure(FailedDownload {
        url: item.url.clone(),
        destination: item.destination.clone(),
        case_id: item.case_id.clone(),
        reason: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory transport: bodies by URL, anything else is a 404.
    /// Tracks the peak number of concurrent requests.
    #[derive(Default)]
    struct MockTransport {
        bodies: HashMap<String, Vec<u8>>,
        failing: HashMap<String, u16>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
        latency: Duration,
    }

    impl MockTransport {
        fn with_bodies(urls: &[&str]) -> Self {
            Self {
                bodies: urls
                    .iter()
                    .map(|u| (u.to_string(), u.as_bytes().to_vec()))
                    .collect(),
                latency: Duration::from_millis(10),
                ..Default::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Vary latency so completions interleave out of submission order.
            let jitter = (url.len() % 7) as u64;
            tokio::time::sleep(self.latency + Duration::from_millis(jitter)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(status) = self.failing.get(url) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                });
            }
            self.bodies.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn item(root: &std::path::Path, n: usize) -> WorkItem {
        WorkItem {
            url: format!("https://mock/dl/{n}"),
            destination: root.join(format!("T/files/Photo/{n}-key{n}.jpg")),
            mime_type: "image/jpeg".into(),
            case_id: n.to_string(),
            category: "Photo".into(),
        }
    }

    fn downloader(transport: Arc<MockTransport>, concurrency: usize) -> Downloader {
        Downloader::new(
            transport,
            RetryPolicy::new(3, Duration::from_millis(100)).without_jitter(),
            concurrency,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_downloads_and_writes_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let items: Vec<_> = (0..5).map(|n| item(dir.path(), n)).collect();
        let urls: Vec<String> = items.iter().map(|i| i.url.clone()).collect();
        let transport = Arc::new(MockTransport::with_bodies(
            &urls.iter().map(String::as_str).collect::<Vec<_>>(),
        ));

        let stats = downloader(transport, 2).run(items.clone(), None).await;

        assert_eq!(stats.total, 5);
        assert_eq!(stats.downloaded, 5);
        assert_eq!(stats.failed, 0);
        for it in &items {
            // Each file holds the body served for its own URL.
            assert_eq!(std::fs::read(&it.destination).unwrap(), it.url.as_bytes());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_makes_no_requests() {
        let dir = tempfile::tempdir().unwrap();
        let items: Vec<_> = (0..4).map(|n| item(dir.path(), n)).collect();
        let urls: Vec<String> = items.iter().map(|i| i.url.clone()).collect();
        let transport = Arc::new(MockTransport::with_bodies(
            &urls.iter().map(String::as_str).collect::<Vec<_>>(),
        ));
        let d = downloader(transport.clone(), 3);

        let first = d.run(items.clone(), None).await;
        assert_eq!(first.downloaded, 4);
        let calls_after_first = transport.call_count();

        let second = d.run(items, None).await;
        assert_eq!(second.skipped_existing, 4);
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.attempted(), 0);
        assert_eq!(transport.call_count(), calls_after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_window() {
        let dir = tempfile::tempdir().unwrap();
        let items: Vec<_> = (0..40).map(|n| item(dir.path(), n)).collect();
        let urls: Vec<String> = items.iter().map(|i| i.url.clone()).collect();
        let transport = Arc::new(MockTransport::with_bodies(
            &urls.iter().map(String::as_str).collect::<Vec<_>>(),
        ));

        let stats = downloader(transport.clone(), 4).run(items, None).await;

        assert_eq!(stats.downloaded, 40);
        let peak = transport.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak in-flight {peak} exceeded window");
        assert_eq!(peak, 4, "window should be saturated");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_leaves_no_file_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let items: Vec<_> = (0..3).map(|n| item(dir.path(), n)).collect();
        let mut transport = MockTransport::with_bodies(&[items[0].url.as_str(), items[2].url.as_str()]);
        transport.failing.insert(items[1].url.clone(), 500);
        let transport = Arc::new(transport);

        let stats = downloader(transport.clone(), 2).run(items.clone(), None).await;

        assert_eq!(stats.downloaded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.failures[0].url, items[1].url);
        assert!(!items[1].destination.exists());
        // 500 is transient: one initial attempt plus two retries.
        let attempts = transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| **u == items[1].url)
            .count();
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item(dir.path(), 0)];
        let transport = Arc::new(MockTransport::default());

        let stats = downloader(transport.clone(), 2).run(items.clone(), None).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(transport.call_count(), 1);
        assert!(!items[0].destination.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_truncates_work() {
        let dir = tempfile::tempdir().unwrap();
        let items: Vec<_> = (0..10).map(|n| item(dir.path(), n)).collect();
        let urls: Vec<String> = items.iter().map(|i| i.url.clone()).collect();
        let transport = Arc::new(MockTransport::with_bodies(
            &urls.iter().map(String::as_str).collect::<Vec<_>>(),
        ));

        let stats = downloader(transport.clone(), 4).run(items.clone(), Some(3)).await;

        assert_eq!(stats.total, 3);
        assert_eq!(stats.downloaded, 3);
        assert_eq!(transport.call_count(), 3);
        assert!(!items[3].destination.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_url_fetched_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = item(dir.path(), 0);
        let mut b = item(dir.path(), 1);
        b.url = a.url.clone();
        let transport = Arc::new(MockTransport::with_bodies(&[a.url.as_str()]));

        let stats = downloader(transport.clone(), 2).run(vec![a.clone(), b.clone()], None).await;

        assert_eq!(stats.downloaded, 2);
        assert_eq!(transport.call_count(), 1);
        assert!(a.destination.exists() && b.destination.exists());
    }
}
