//! Resize throttle
//!
//! Leading-edge, deadline based: the first notification in a quiet period
//! arms a deadline; further notifications before it expires are dropped;
//! the redraw runs once the caller polls past the deadline. Time is always
//! passed in, so the throttle never reads a clock itself.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ResizeThrottle {
    window: Duration,
    deadline: Option<Instant>,
}

impl ResizeThrottle {
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a resize notification at `now`
    ///
    /// Returns true if this notification armed a new redraw.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            log::trace!("resize: coalesced");
            return false;
        }
        self.deadline = Some(now + self.window);
        true
    }

    /// Returns true exactly once per armed window, when `now` reaches the deadline
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop a pending redraw
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(66);

    #[test]
    fn test_burst_coalesces_to_one_redraw() {
        let start = Instant::now();
        let mut throttle = ResizeThrottle::new(WINDOW);
        assert_eq!(throttle.window(), WINDOW);

        assert!(throttle.trigger(start));
        for ms in 1..50 {
            assert!(!throttle.trigger(start + Duration::from_millis(ms)));
        }
        assert!(!throttle.poll(start + Duration::from_millis(65)));
        assert!(throttle.poll(start + WINDOW));
        assert!(!throttle.poll(start + WINDOW));
    }

    #[test]
    fn test_spread_notifications_redraw_once_per_window() {
        let start = Instant::now();
        let mut throttle = ResizeThrottle::new(WINDOW);
        let mut redraws = 0;

        // one notification every 10ms for 200ms
        for ms in (0..200).step_by(10) {
            let now = start + Duration::from_millis(ms);
            if throttle.poll(now) {
                redraws += 1;
            }
            throttle.trigger(now);
        }
        if throttle.poll(start + Duration::from_millis(400)) {
            redraws += 1;
        }
        // windows armed at 0, 70, 140
        assert_eq!(redraws, 3);
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut throttle = ResizeThrottle::new(WINDOW);
        throttle.trigger(start);
        assert!(throttle.is_pending());
        throttle.cancel();
        assert!(!throttle.poll(start + WINDOW * 2));
    }
}
