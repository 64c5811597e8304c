use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PipelineConfig;

/// Blocking JSON GET against the provider. `path` is relative to the API
/// base URL.
pub trait Fetch {
    fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<Value>;
}

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: f64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2.0,
            max_jitter_ms: 250,
        }
    }
}

/// Classifies a failed attempt.
#[derive(Debug)]
pub enum Attempt {
    Retry(anyhow::Error),
    Fatal(anyhow::Error),
}

impl RetryPolicy {
    /// Wait after the zero-based `attempt` failed: `backoff_base^attempt`
    /// seconds plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff_base.max(0.0).powi(attempt as i32);
        let jitter = if self.max_jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.max_jitter_ms)
        } else {
            0
        };
        Duration::from_secs_f64(base.min(300.0)) + Duration::from_millis(jitter)
    }

    pub fn run<T>(&self, label: &str, op: impl FnMut(u32) -> Result<T, Attempt>) -> Result<T> {
        self.run_with_sleep(label, op, thread::sleep)
    }

    pub fn run_with_sleep<T>(
        &self,
        label: &str,
        mut op: impl FnMut(u32) -> Result<T, Attempt>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(Attempt::Fatal(err)) => {
                    return Err(err.context(format!("{label} failed without retry")));
                }
                Err(Attempt::Retry(err)) => {
                    if attempt + 1 < attempts {
                        let wait = self.delay_for(attempt);
                        warn!(
                            label,
                            attempt = attempt + 1,
                            wait_ms = wait.as_millis() as u64,
                            error = %err,
                            "request failed; retrying"
                        );
                        sleep(wait);
                    }
                    last_err = Some(err);
                }
            }
        }
        let err = last_err.unwrap_or_else(|| anyhow!("no attempts made"));
        Err(err.context(format!("{label} failed after {attempts} attempts")))
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str, api_key: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry,
        }
    }

    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let api_key = cfg.require_api_key()?;
        let client = build_http_client(cfg.request_timeout)?;
        Ok(Self::new(client, &cfg.api_base_url, api_key, cfg.retry_policy()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn attempt(&self, url: &str, params: &[(&str, String)]) -> Result<Value, Attempt> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("halfline/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.api_key)
            .query(params)
            .send()
            .map_err(|e| Attempt::Retry(anyhow!(e).context("request failed")))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| Attempt::Retry(anyhow!(e).context("failed reading body")))?;
        if !status.is_success() {
            let err = anyhow!("http {}: {}", status, truncate(&body, 300));
            return Err(if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }
        serde_json::from_str::<Value>(body.trim())
            .map_err(|e| Attempt::Fatal(anyhow!(e).context("invalid json body")))
    }
}

impl Fetch for ApiClient {
    fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "GET");
        self.retry.run(path, |_| self.attempt(&url, params))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, Default)]
pub struct Paged {
    pub items: Vec<Value>,
    pub pages: usize,
    /// Set when a page after the first failed; items gathered so far are kept.
    pub error: Option<String>,
}

/// Follows `pagination.has_more`. A failing first page is an error; a later
/// failure ends the walk with what was collected.
pub fn fetch_all_pages(
    fetcher: &dyn Fetch,
    path: &str,
    params: &[(&str, String)],
    per_page: usize,
    delay: Duration,
) -> Result<Paged> {
    let mut out = Paged::default();
    let mut page = 1usize;
    loop {
        let mut query = params.to_vec();
        query.push(("page", page.to_string()));
        query.push(("per_page", per_page.to_string()));

        let doc = match fetcher.fetch(path, &query) {
            Ok(doc) => doc,
            Err(err) if page == 1 => return Err(err),
            Err(err) => {
                warn!(path, page, error = %err, "page fetch failed; stopping");
                out.error = Some(format!("page {page}: {err:#}"));
                break;
            }
        };
        let Some(items) = doc.get("data").and_then(|d| d.as_array()) else {
            debug!(path, page, "page without data array; stopping");
            break;
        };
        out.items.extend(items.iter().cloned());
        out.pages += 1;

        let has_more = doc
            .get("pagination")
            .and_then(|p| p.get("has_more"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !has_more {
            break;
        }
        page += 1;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    Ok(out)
}
