use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::domain::{AccessionId, MetadataRecord};
use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn request(&self, id: &AccessionId) -> Result<RawResponse, KiraError>;
    fn decode(&self, id: &AccessionId, body: &str) -> Result<MetadataRecord, KiraError>;
    fn status_error(&self, status: u16, message: String) -> KiraError;
}

pub trait Backoff: Send + Sync {
    fn wait(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Backoff for ThreadSleep {
    fn wait(&self, delay: Duration) {
        thread::sleep(delay);
    }
}

pub struct Fetcher<S: MetadataSource, B: Backoff = ThreadSleep> {
    source: S,
    policy: RetryPolicy,
    backoff: B,
}

impl<S: MetadataSource> Fetcher<S, ThreadSleep> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self::with_backoff(source, policy, ThreadSleep)
    }
}

impl<S: MetadataSource, B: Backoff> Fetcher<S, B> {
    pub fn with_backoff(source: S, policy: RetryPolicy, backoff: B) -> Self {
        Self {
            source,
            policy,
            backoff,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn backoff(&self) -> &B {
        &self.backoff
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn fetch(&self, id: &AccessionId) -> Result<MetadataRecord, KiraError> {
        self.fetch_with_retries(id, self.policy.n_tries.saturating_sub(1))
    }

    // Performs `retries_remaining + 1` attempts at most. Only non-200
    // responses are retried; transport and decode errors return immediately.
    pub fn fetch_with_retries(
        &self,
        id: &AccessionId,
        mut retries_remaining: u32,
    ) -> Result<MetadataRecord, KiraError> {
        loop {
            let response = self.source.request(id)?;
            if response.is_ok() {
                return self.source.decode(id, &response.body);
            }
            if retries_remaining == 0 {
                return Err(self.source.status_error(response.status, response.body));
            }
            warn!(
                source = self.source.name(),
                accession = %id,
                status = response.status,
                "request failed ({}); retrying in {}s ({} tries left)",
                summarize(&response.body),
                self.policy.backoff.as_secs_f64(),
                retries_remaining
            );
            self.backoff.wait(self.policy.backoff);
            retries_remaining -= 1;
        }
    }
}

fn summarize(body: &str) -> &str {
    const MAX_CHARS: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX_CHARS) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
