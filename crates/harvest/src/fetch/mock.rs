//! Scripted transport for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HarvestError, Result};

use super::endpoint::Request;
use super::transport::{RawResponse, Transport};

#[derive(Debug, Clone)]
enum Scripted {
    Response(RawResponse),
    Error(String),
}

#[derive(Debug, Default)]
struct Script {
    queue: Vec<Scripted>,
    served: usize,
}

impl Script {
    /// Next scripted reply; the last one repeats once the queue is exhausted.
    fn next(&mut self) -> Option<Scripted> {
        let index = self.served.min(self.queue.len().checked_sub(1)?);
        self.served += 1;
        self.queue.get(index).cloned()
    }
}

/// Transport that answers from per-URL scripts.
///
/// Requests are matched on their rendered form (`url?name=value&...`). Each
/// key holds a queue of replies served in order; the last reply repeats.
/// Unknown keys answer 404. The mock also records call counts and the peak
/// number of concurrent calls.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, Script>>,
    delays: HashMap<String, Duration>,
    latency: Duration,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `key`.
    pub fn respond(self, key: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.push(key.into(), Scripted::Response(RawResponse::new(status, body)))
    }

    /// Queue a 200 reply carrying `value`.
    pub fn respond_json(self, key: impl Into<String>, value: Value) -> Self {
        self.respond(key, 200, value.to_string())
    }

    /// Queue a transport-level failure.
    pub fn fail(self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.push(key.into(), Scripted::Error(message.into()))
    }

    /// Latency applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Latency for one key, overriding the default.
    pub fn with_delay(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(key.into(), delay);
        self
    }

    /// Number of calls made for `key`.
    pub fn call_count(&self, key: &str) -> usize {
        lock(&self.calls).get(key).copied().unwrap_or(0)
    }

    /// Total calls over all keys.
    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn push(self, key: String, reply: Scripted) -> Self {
        lock(&self.scripts).entry(key).or_default().queue.push(reply);
        self
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &Request) -> Result<RawResponse> {
        let key = request.to_string();
        *lock(&self.calls).entry(key.clone()).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(&key).copied().unwrap_or(self.latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = lock(&self.scripts).get_mut(&key).and_then(Script::next);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(HarvestError::Transport(message)),
            None => Ok(RawResponse::new(404, "")),
        }
    }
}
