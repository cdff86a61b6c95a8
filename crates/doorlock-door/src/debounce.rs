//! Edge debouncing.

use std::time::Duration;
use tokio::time::Instant;

/// Accepts an event only if the previous accepted one is at least `window`
/// old.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Register an event happening now.
    pub fn accept(&mut self) -> bool {
        self.accept_at(Instant::now())
    }

    /// Register an event happening at `now`.
    pub fn accept_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounces_inside_window_are_dropped() {
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        let start = Instant::now();

        assert!(debouncer.accept_at(start));
        assert!(!debouncer.accept_at(start + Duration::from_millis(5)));
        assert!(!debouncer.accept_at(start + Duration::from_millis(199)));
        assert!(debouncer.accept_at(start + Duration::from_millis(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_edges_do_not_extend_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        let start = Instant::now();

        assert!(debouncer.accept_at(start));
        assert!(!debouncer.accept_at(start + Duration::from_millis(150)));
        assert!(debouncer.accept_at(start + Duration::from_millis(250)));
    }
}
