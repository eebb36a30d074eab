//! Bundle request protocol
//!
//! Downloading many books one archive at a time is wasteful, so the server
//! assembles a multi-book bundle on demand. Assembly is server-side work
//! that outlives one request: the protocol posts the book list, and the
//! server answers 200 with a ready ticket or 202 while still assembling.
//! On 202 the client pauses and re-issues the same request, up to a bounded
//! number of total attempts. Any other status, or running out of attempts,
//! surfaces as `BundleUnavailable` with the last observed status.
//!
//! The loop is an explicit state machine over an injectable transport, so
//! tests can script server behavior and run the poll cycle without real
//! sleeps. A shutdown signal aborts between attempts, never mid-attempt.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::progress::{ProgressSample, ProgressTracker};
use crate::constants::{bundle, files, http};
use crate::errors::{BundleError, BundleResult};

/// Raw transport response: status code plus body text
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Progress callback for archive downloads: `(bytes_received, bytes_total)`
pub type ByteProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// HTTP seam for the bundle protocol
///
/// Production uses the reqwest-backed [`HttpTransport`]; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait BundleTransport: Send + Sync {
    /// POST a JSON body and return the raw response
    async fn request(&self, url: &Url, body: &serde_json::Value) -> BundleResult<TransportResponse>;

    /// Stream an archive to `dest`, reporting raw byte samples
    async fn download(
        &self,
        url: &Url,
        dest: &Path,
        progress: ByteProgress<'_>,
    ) -> BundleResult<u64>;
}

/// Ready-bundle ticket returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct BundleTicket {
    /// Location of the assembled archive, absolute or endpoint-relative
    pub bundle: String,

    /// Archive size in bytes, when the server reports it
    #[serde(default)]
    pub size: Option<u64>,
}

/// Configuration for the request/poll loop
#[derive(Debug, Clone, Copy)]
pub struct BundleRequestConfig {
    /// Total attempts (initial request plus polls)
    pub max_attempts: u32,

    /// Pause between attempts while the server assembles
    pub poll_delay: Duration,
}

impl Default for BundleRequestConfig {
    fn default() -> Self {
        Self {
            max_attempts: bundle::MAX_ATTEMPTS,
            poll_delay: bundle::POLL_DELAY,
        }
    }
}

impl BundleRequestConfig {
    /// Configuration for tests: immediate transitions, small budget
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            poll_delay: Duration::ZERO,
        }
    }
}

/// Protocol phase
#[derive(Debug)]
enum BundlePhase {
    /// Initial request not yet issued
    Requesting,
    /// Server answered 202; waiting to re-request
    Polling { attempt: u32 },
    /// Server produced a ready ticket
    Ready(BundleTicket),
    /// Terminal failure with the last observed status
    Failed { last_status: Option<u16> },
}

/// Client for requesting and fetching server-assembled bundles
pub struct BundleClient<T> {
    transport: T,
    endpoint: Url,
    config: BundleRequestConfig,
}

impl<T: BundleTransport> BundleClient<T> {
    /// Create a client over a transport and bundle endpoint
    pub fn new(transport: T, endpoint: Url, config: BundleRequestConfig) -> Self {
        Self {
            transport,
            endpoint,
            config,
        }
    }

    /// Request a bundle for the given books, polling until ready
    pub async fn request_bundle(&self, titles: &[String]) -> BundleResult<BundleTicket> {
        // Sender kept alive so the receiver never observes a closed channel.
        let (_keep_alive, mut shutdown) = broadcast::channel(1);
        self.request_bundle_cancellable(titles, &mut shutdown).await
    }

    /// Request a bundle, aborting between attempts on a shutdown signal
    pub async fn request_bundle_cancellable(
        &self,
        titles: &[String],
        shutdown: &mut broadcast::Receiver<()>,
    ) -> BundleResult<BundleTicket> {
        let body = serde_json::json!({ "books": titles });
        let mut attempts: u32 = 0;
        let mut phase = BundlePhase::Requesting;

        loop {
            match phase {
                BundlePhase::Requesting => {
                    attempts += 1;
                    phase = self.issue_attempt(&body, attempts).await;
                }
                BundlePhase::Polling { attempt } => {
                    debug!(
                        "Bundle still assembling after attempt {}, polling again",
                        attempt
                    );
                    self.pause_between_attempts(shutdown).await?;
                    attempts += 1;
                    phase = self.issue_attempt(&body, attempts).await;
                }
                BundlePhase::Ready(ticket) => {
                    info!("Bundle ready after {} attempts", attempts);
                    return Ok(ticket);
                }
                BundlePhase::Failed { last_status } => {
                    return Err(BundleError::Unavailable {
                        attempts,
                        last_status,
                    });
                }
            }
        }
    }

    /// Fetch the assembled archive, routing progress through the tracker
    ///
    /// Raw byte samples and any failure are reported under the caller's
    /// identity, so one subscription observes the whole lifecycle.
    pub async fn download_archive(
        &self,
        ticket: &BundleTicket,
        dest: &Path,
        tracker: &ProgressTracker,
        identity: &str,
    ) -> BundleResult<u64> {
        let url = self.archive_url(ticket)?;
        let report = |received: u64, total: u64| {
            tracker.report(identity, ProgressSample::Bytes { received, total });
        };
        match self.transport.download(&url, dest, &report).await {
            Ok(bytes) => {
                info!("Downloaded bundle archive ({} bytes) to {}", bytes, dest.display());
                Ok(bytes)
            }
            Err(e) => {
                tracker.report(
                    identity,
                    ProgressSample::Failed {
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Resolve the archive location against the bundle endpoint
    fn archive_url(&self, ticket: &BundleTicket) -> BundleResult<Url> {
        self.endpoint
            .join(&ticket.bundle)
            .map_err(|_| BundleError::InvalidUrl {
                url: ticket.bundle.clone(),
            })
    }

    async fn issue_attempt(&self, body: &serde_json::Value, attempts: u32) -> BundlePhase {
        match self.transport.request(&self.endpoint, body).await {
            Ok(response) => match response.status {
                200 => match serde_json::from_str::<BundleTicket>(&response.body) {
                    Ok(ticket) => BundlePhase::Ready(ticket),
                    Err(e) => {
                        warn!("Ready bundle response was unusable: {}", e);
                        BundlePhase::Failed {
                            last_status: Some(200),
                        }
                    }
                },
                202 if attempts < self.config.max_attempts => {
                    BundlePhase::Polling { attempt: attempts }
                }
                202 => BundlePhase::Failed {
                    last_status: Some(202),
                },
                status => BundlePhase::Failed {
                    last_status: Some(status),
                },
            },
            Err(e) if attempts < self.config.max_attempts => {
                warn!("Bundle request attempt {} failed: {}", attempts, e);
                BundlePhase::Polling { attempt: attempts }
            }
            Err(e) => {
                warn!("Final bundle request attempt failed: {}", e);
                BundlePhase::Failed { last_status: None }
            }
        }
    }

    async fn pause_between_attempts(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> BundleResult<()> {
        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_delay) => Ok(()),
            _ = shutdown.recv() => Err(BundleError::Cancelled),
        }
    }
}

/// reqwest-backed production transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the application's standard HTTP settings
    pub fn new() -> BundleResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(http::USER_AGENT)
            .timeout(http::DEFAULT_TIMEOUT)
            .connect_timeout(http::CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BundleTransport for HttpTransport {
    async fn request(&self, url: &Url, body: &serde_json::Value) -> BundleResult<TransportResponse> {
        let response = self.client.post(url.clone()).json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }

    async fn download(
        &self,
        url: &Url,
        dest: &Path,
        progress: ByteProgress<'_>,
    ) -> BundleResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Atomic temp file + rename so an interrupted download never leaves
        // a half-written archive at the final path.
        let temp_path = dest.with_extension(format!(
            "{}{}",
            dest.extension().and_then(|s| s.to_str()).unwrap_or(""),
            files::TEMP_FILE_SUFFIX
        ));

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(BundleError::FetchFailed {
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        let mut received: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress(received, total.max(received));
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&temp_path, dest)
            .await
            .map_err(|_| BundleError::AtomicOperationFailed {
                temp_path: temp_path.clone(),
                final_path: dest.to_path_buf(),
            })?;

        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport that replays a scripted sequence of responses
    struct ScriptedTransport {
        responses: Mutex<Vec<BundleResult<TransportResponse>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<BundleResult<TransportResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BundleTransport for ScriptedTransport {
        async fn request(
            &self,
            _url: &Url,
            _body: &serde_json::Value,
        ) -> BundleResult<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("scripted transport exhausted");
            }
            responses.remove(0)
        }

        async fn download(
            &self,
            _url: &Url,
            dest: &Path,
            progress: ByteProgress<'_>,
        ) -> BundleResult<u64> {
            tokio::fs::write(dest, b"archive").await?;
            progress(7, 7);
            Ok(7)
        }
    }

    fn ok(status: u16, body: &str) -> BundleResult<TransportResponse> {
        Ok(TransportResponse {
            status,
            body: body.to_string(),
        })
    }

    fn ready_body() -> &'static str {
        r#"{"bundle": "bundles/shelf-1234.zip", "size": 7}"#
    }

    fn client(transport: ScriptedTransport) -> BundleClient<ScriptedTransport> {
        BundleClient::new(
            transport,
            Url::parse("https://library.example.org/api/bundle").unwrap(),
            BundleRequestConfig::for_testing(),
        )
    }

    fn titles() -> Vec<String> {
        vec!["Genesis".to_string(), "Job".to_string()]
    }

    #[tokio::test]
    async fn immediate_ready_consumes_one_attempt() {
        let client = client(ScriptedTransport::new(vec![ok(200, ready_body())]));
        let ticket = client.request_bundle(&titles()).await.unwrap();
        assert_eq!(ticket.bundle, "bundles/shelf-1234.zip");
        assert_eq!(ticket.size, Some(7));
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn accepted_then_ready_consumes_two_attempts() {
        let client = client(ScriptedTransport::new(vec![
            ok(202, ""),
            ok(200, ready_body()),
        ]));
        let ticket = client.request_bundle(&titles()).await.unwrap();
        assert_eq!(ticket.bundle, "bundles/shelf-1234.zip");
        assert_eq!(client.transport.calls(), 2);
    }

    #[tokio::test]
    async fn attempt_budget_exhaustion_reports_last_status() {
        let client = client(ScriptedTransport::new(vec![
            ok(202, ""),
            ok(202, ""),
            ok(202, ""),
        ]));
        let err = client.request_bundle(&titles()).await.unwrap_err();
        match err {
            BundleError::Unavailable {
                attempts,
                last_status,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, Some(202));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.transport.calls(), 3);
    }

    #[tokio::test]
    async fn unexpected_status_fails_without_retry() {
        let client = client(ScriptedTransport::new(vec![ok(500, "boom")]));
        let err = client.request_bundle(&titles()).await.unwrap_err();
        match err {
            BundleError::Unavailable {
                attempts,
                last_status,
            } => {
                assert_eq!(attempts, 1);
                assert_eq!(last_status, Some(500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_ready_payload_fails() {
        let client = client(ScriptedTransport::new(vec![ok(200, "not json")]));
        let err = client.request_bundle(&titles()).await.unwrap_err();
        assert!(matches!(
            err,
            BundleError::Unavailable {
                last_status: Some(200),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn shutdown_aborts_between_attempts() {
        let client = BundleClient::new(
            ScriptedTransport::new(vec![ok(202, ""), ok(200, ready_body())]),
            Url::parse("https://library.example.org/api/bundle").unwrap(),
            BundleRequestConfig {
                max_attempts: 3,
                poll_delay: Duration::from_secs(60),
            },
        );
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let err = client
            .request_bundle_cancellable(&titles(), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Cancelled));
        // The in-flight attempt completed; the poll never started.
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn relative_archive_location_resolves_against_endpoint() {
        let client = client(ScriptedTransport::new(vec![]));
        let ticket = BundleTicket {
            bundle: "bundles/shelf-1234.zip".to_string(),
            size: None,
        };
        let url = client.archive_url(&ticket).unwrap();
        assert_eq!(
            url.as_str(),
            "https://library.example.org/api/bundles/shelf-1234.zip"
        );
    }

    #[tokio::test]
    async fn download_reports_through_identity_channel() {
        use crate::app::progress::{ProgressSample, ProgressTracker, ThrottleConfig};
        use std::sync::Arc;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let dest = temp_dir.path().join("bundle.zip");
        let client = client(ScriptedTransport::new(vec![]));
        let ticket = BundleTicket {
            bundle: "bundles/shelf-1234.zip".to_string(),
            size: Some(7),
        };

        let tracker = ProgressTracker::new();
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        tracker.attach(
            "bundle",
            Box::new(move |s: ProgressSample| sink.lock().unwrap().push(s)),
            ThrottleConfig {
                count: 10,
                interval: Duration::ZERO,
            },
        );

        let bytes = client
            .download_archive(&ticket, &dest, &tracker, "bundle")
            .await
            .unwrap();

        assert_eq!(bytes, 7);
        assert!(dest.exists());
        let samples = samples.lock().unwrap();
        assert_eq!(
            *samples,
            vec![ProgressSample::Bytes {
                received: 7,
                total: 7
            }]
        );
    }
}
