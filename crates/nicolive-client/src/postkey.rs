//! Post-key acquisition.
//!
//! Posting requires a single-use key that the server invalidates after each
//! post (or after a short timeout), so the client fetches a fresh one over
//! HTTP immediately before every post frame.  The endpoint is authenticated
//! with the session cookie and answers with a plain-text body of the form
//! `postkey=<value>`.
//!
//! The fetch sits behind the [`PostKeySource`] trait so the post flow can
//! be exercised with a scripted source in tests.

use async_trait::async_trait;
use reqwest::header;
use thiserror::Error;

/// Production post-key endpoint.
pub const DEFAULT_POSTKEY_ENDPOINT: &str = "http://live.nicovideo.jp/api/getpostkey";

/// Ways a post-key fetch can fail.
#[derive(Debug, Error)]
pub enum PostKeyError {
    /// The HTTP request itself failed (DNS, TCP, TLS, ...).
    #[error("post key request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("post key endpoint returned HTTP {0}")]
    BadStatus(reqwest::StatusCode),

    /// The body did not match the expected `postkey=<value>` form.
    #[error("post key response body did not match `postkey=<value>`")]
    MalformedBody,

    /// The body matched but the key was empty.
    #[error("post key endpoint returned an empty key")]
    EmptyKey,
}

/// Source of single-use posting keys.
#[async_trait]
pub trait PostKeySource: Send + Sync {
    /// Fetches a fresh post key for `thread`.
    async fn fetch_post_key(&self, thread: &str) -> Result<String, PostKeyError>;
}

/// HTTP implementation against the key-retrieval endpoint.
pub struct HttpPostKeySource {
    http: reqwest::Client,
    endpoint: String,
    cookie: String,
}

impl HttpPostKeySource {
    /// Source against the production endpoint.
    pub fn new(cookie: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_POSTKEY_ENDPOINT, cookie)
    }

    /// Source against a custom endpoint (tests, mirrors).
    pub fn with_endpoint(endpoint: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            cookie: cookie.into(),
        }
    }
}

#[async_trait]
impl PostKeySource for HttpPostKeySource {
    async fn fetch_post_key(&self, thread: &str) -> Result<String, PostKeyError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("thread", thread)])
            .header(header::COOKIE, self.cookie.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PostKeyError::BadStatus(status));
        }

        let body = response.text().await?;
        let value = body
            .strip_prefix("postkey=")
            .ok_or(PostKeyError::MalformedBody)?
            .trim_end();
        if value.is_empty() {
            return Err(PostKeyError::EmptyKey);
        }
        Ok(value.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
