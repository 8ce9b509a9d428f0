//! Correlation table: request id to waiting caller.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use parley_core::GatewayError;

pub type Resolution = Result<Value, GatewayError>;

/// A request that has been sent and not yet answered.
#[derive(Debug)]
pub struct PendingRequest {
    pub method: String,
    pub issued_at: Instant,
    pub deadline: Instant,
    resolver: oneshot::Sender<Resolution>,
}

/// Outstanding requests keyed by correlation id.
///
/// The table never fires deadlines itself: the waiting caller owns the timer
/// and removes its entry when it expires.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: HashMap<String, PendingRequest>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return the receiver its caller waits on.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        method: &str,
        timeout: Duration,
    ) -> oneshot::Receiver<Resolution> {
        let (resolver, receiver) = oneshot::channel();
        let issued_at = Instant::now();
        let entry = PendingRequest {
            method: method.to_string(),
            issued_at,
            deadline: issued_at + timeout,
            resolver,
        };
        self.pending.insert(id.into(), entry);
        receiver
    }

    /// Complete the entry for `id`. Returns `false` for unknown ids.
    pub fn resolve(&mut self, id: &str, result: Resolution) -> bool {
        let Some(entry) = self.pending.remove(id) else {
            return false;
        };
        tracing::debug!(
            id,
            method = %entry.method,
            elapsed_ms = entry.issued_at.elapsed().as_millis(),
            late = Instant::now() > entry.deadline,
            "Resolved gateway request"
        );
        // The caller may already have given up.
        let _ = entry.resolver.send(result);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<PendingRequest> {
        self.pending.remove(id)
    }

    /// Fail every outstanding request with `error`. Returns how many were failed.
    pub fn reject_all(&mut self, error: &GatewayError) -> usize {
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            let _ = entry.resolver.send(Err(error.clone()));
        }
        count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
