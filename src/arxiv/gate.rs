//! Single in-flight arXiv rate gate: one request at a time, spaced at least
//! `delay` apart, grounded on `AsyncArxivClient._rate_limited_request`
//! (an `asyncio.Semaphore(1)` plus a wall-clock spacing check).

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

pub struct RateGate {
    delay: Duration,
    permit: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            permit: Mutex::new(None),
        }
    }

    /// Acquire the gate, sleeping as needed so calls are spaced by at least
    /// `delay`. Holds the lock for the duration of the caller-supplied
    /// future `f`, serializing all arXiv requests across categories.
    pub async fn run<F, T>(&self, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let mut last = self.permit.lock().await;
        if let Some(last_at) = *last {
            let elapsed = last_at.elapsed();
            if elapsed < self.delay {
                sleep(self.delay - elapsed).await;
            }
        }
        let result = f.await;
        *last = Some(Instant::now());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn serializes_concurrent_callers() {
        let gate = Arc::new(RateGate::new(Duration::from_millis(20)));
        let counter = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let gate = gate.clone();
            let counter = counter.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                gate.run(async {
                    let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    counter.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }
}
