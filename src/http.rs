//! HTTP transport to the exchange endpoints.
//!
//! A thin JSON POST client over a shared connection pool. Errors are
//! classified at this layer: 4xx statuses are final, 5xx and transport
//! failures are retryable. The optional retry policy lives here and nowhere
//! else; the signer and normalizer stay pure.

use std::{cmp, time::Duration};

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Exponential back-off configuration for retryable failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Sleep before the first retry.
    pub initial_backoff: Duration,
    /// Back-off growth factor between attempts.
    pub backoff_multiplier: f64,
    /// Upper bound on a single sleep.
    pub max_backoff: Duration,
    /// Retries after the initial attempt. Zero disables retrying.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

/// JSON POST client bound to one base URL.
///
/// Cloning is cheap; the underlying `reqwest` pool is shared. All requests
/// observe the per-attempt timeout configured at construction.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: Url,
    retry: Option<RetryPolicy>,
}

impl Transport {
    pub(crate) fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self {
            http,
            base_url,
            retry: None,
        })
    }

    pub(crate) fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Posts a JSON payload and returns the parsed response tree.
    pub(crate) async fn post<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<Value> {
        let body = serde_json::to_vec(payload).map_err(|err| Error::Io(err.to_string()))?;

        let Some(policy) = &self.retry else {
            return self.post_once(path, &body).await;
        };

        let mut attempt = 0u32;
        let mut backoff = policy.initial_backoff;
        loop {
            match self.post_once(path, &body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    if attempt > policy.max_retries {
                        return Err(err);
                    }
                    log::warn!(
                        "POST {path} failed, retrying ({attempt}/{}): {err}",
                        policy.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = cmp::min(backoff.mul_f64(policy.backoff_multiplier), policy.max_backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_once(&self, path: &str, body: &[u8]) -> Result<Value> {
        let mut url = self.base_url.clone();
        url.set_path(path);

        log::debug!("POST {url}");
        log::debug!("request: {}", String::from_utf8_lossy(body));

        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_client_error() {
            return Err(Error::ClientStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        if status.is_server_error() {
            return Err(Error::ServerStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        log::debug!("response: {text}");
        serde_json::from_str(&text).map_err(|err| Error::Io(format!("invalid JSON response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpListener,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
    };

    use super::*;

    /// One-shot HTTP server that plays back canned responses, one per
    /// connection, and counts how many requests it saw.
    fn stub_server(responses: Vec<(u16, &'static str)>) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf);
                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (Url::parse(&format!("http://{addr}")).unwrap(), hits)
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_millis(20),
            max_retries,
        }
    }

    #[tokio::test]
    async fn posts_and_parses_json() {
        let (url, hits) = stub_server(vec![(200, r#"{"status":"ok"}"#)]);
        let transport = Transport::new(url, Duration::from_secs(2)).unwrap();
        let value = transport
            .post("/info", &serde_json::json!({"type": "allMids"}))
            .await
            .unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn four_xx_is_never_retried() {
        let (url, hits) = stub_server(vec![(422, r#"{"error":"bad order"}"#)]);
        let transport = Transport::new(url, Duration::from_secs(2))
            .unwrap()
            .with_retry(fast_policy(5));
        let err = transport
            .post("/exchange", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClientStatus { status: 422, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn five_xx_retries_until_success() {
        let (url, hits) = stub_server(vec![
            (500, "oops"),
            (503, "still down"),
            (200, r#"{"recovered":true}"#),
        ]);
        let transport = Transport::new(url, Duration::from_secs(2))
            .unwrap()
            .with_retry(fast_policy(3));
        let value = transport.post("/info", &serde_json::json!({})).await.unwrap();
        assert_eq!(value["recovered"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let (url, hits) = stub_server(vec![(500, "a"), (500, "b"), (500, "c"), (500, "d")]);
        let transport = Transport::new(url, Duration::from_secs(2))
            .unwrap()
            .with_retry(fast_policy(2));
        let err = transport.post("/info", &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ServerStatus { status: 500, .. }));
        // Initial attempt plus exactly max_retries.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_policy_means_single_attempt() {
        let (url, hits) = stub_server(vec![(500, "down")]);
        let transport = Transport::new(url, Duration::from_secs(2)).unwrap();
        let err = transport.post("/info", &serde_json::json!({})).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
