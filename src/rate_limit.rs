use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Spaces calls at least `60s / calls` apart.
pub struct SimpleRateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl SimpleRateLimiter {
    /// `None` when `calls` is 0, meaning unlimited.
    pub fn per_minute(calls: u32) -> Option<Self> {
        if calls == 0 { return None; }
        Some(Self {
            min_interval: Duration::from_millis(60_000 / calls as u64),
            last: Mutex::new(None),
        })
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let next_ok = prev + self.min_interval;
            let now = Instant::now();
            if now < next_ok {
                tokio::time::sleep(next_ok - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}
