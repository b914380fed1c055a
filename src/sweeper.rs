use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::{debug, info};

use crate::metrics::TRACKED_CLIENTS;
use crate::rate_limit::RateLimiter;

// Expired-window sweeper - runs every `sweep_interval`
//
// Purely housekeeping: an expired entry is reset on its next request anyway,
// this only keeps clients that never come back from piling up.
pub async fn window_sweeper(limiter: Arc<RateLimiter>, sweep_interval: Duration) {
    let mut interval = interval(sweep_interval);

    info!(interval = ?sweep_interval, "Window sweeper started");

    loop {
        interval.tick().await;
        sweep_once(&limiter);
    }
}

// One pass; returns how many entries went away
pub fn sweep_once(limiter: &RateLimiter) -> usize {
    let removed = limiter.purge_expired();
    let tracked = limiter.store().len();
    TRACKED_CLIENTS.set(tracked as f64);

    if removed > 0 {
        debug!(removed, tracked, "Purged expired rate-limit windows");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_key::{ClientKey, ClientKeyResolver};
    use crate::clock::ManualClock;
    use crate::rate_limit::RateLimitConfig;
    use crate::store::MemoryStore;

    fn limiter(clock: Arc<ManualClock>) -> Arc<RateLimiter> {
        let config = RateLimitConfig::new(1_000, 3).unwrap();
        Arc::new(RateLimiter::with_parts(
            config,
            ClientKeyResolver::default(),
            Arc::new(MemoryStore::new()),
            clock,
        ))
    }

    #[test]
    fn test_sweep_once_removes_only_expired() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock.clone());

        limiter.check(&ClientKey::from("a"), 0);
        limiter.check(&ClientKey::from("b"), 600);

        clock.set(1_200);
        assert_eq!(sweep_once(&limiter), 1);
        assert_eq!(limiter.store().len(), 1);

        clock.set(1_600);
        assert_eq!(sweep_once(&limiter), 1);
        assert!(limiter.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock.clone());
        limiter.check(&ClientKey::from("a"), 0);
        clock.set(5_000);

        let task = tokio::spawn(window_sweeper(limiter.clone(), Duration::from_secs(60)));
        // first tick fires immediately; let it run
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(limiter.store().is_empty());
        task.abort();
    }
}
