//! Flaky in-memory todo server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

/// Errors returned by the fake server
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server refused the write
    #[error("write #{0} rejected")]
    Rejected(usize),

    /// The backing store is unusable
    #[error("store poisoned")]
    Poisoned,
}

/// Todo store that rejects every n-th write after a simulated round trip
#[derive(Debug, Clone)]
pub struct FakeServer {
    items: Arc<Mutex<Vec<String>>>,
    writes: Arc<AtomicUsize>,
    reject_every: usize,
}

impl FakeServer {
    pub fn new(reject_every: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(vec!["read the docs".to_string()])),
            writes: Arc::new(AtomicUsize::new(0)),
            reject_every: reject_every.max(1),
        }
    }

    pub fn list(&self) -> Vec<String> {
        self.items.lock().map(|items| items.clone()).unwrap_or_default()
    }

    /// Append an item, returning the authoritative list
    pub async fn add(self, item: &str) -> Result<Vec<String>, ServerError> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(30 * n as u64)).await;

        if n % self.reject_every == 0 {
            return Err(ServerError::Rejected(n));
        }
        let mut items = self.items.lock().map_err(|_| ServerError::Poisoned)?;
        items.push(item.to_string());
        Ok(items.clone())
    }
}
