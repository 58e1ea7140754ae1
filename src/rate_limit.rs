use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

/// Time source for the limiter. Production code uses [`SystemClock`]; tests
/// swap in a fake that advances instead of sleeping.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Sliding-log request pacer. Enforces a minimum delay between consecutive
/// requests and caps the number of requests inside one trailing window.
/// When the cap is hit it blocks until the oldest logged request ages out,
/// then clears the log (the window has rolled over).
pub struct RateLimiter<C: Clock = SystemClock> {
    max_requests: usize,
    window: Duration,
    min_delay: Duration,
    log: VecDeque<Instant>,
    last_request: Option<Instant>,
    clock: C,
}

impl RateLimiter<SystemClock> {
    pub fn new(max_requests: usize, window: Duration, min_delay: Duration) -> Self {
        Self::with_clock(max_requests, window, min_delay, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(
        max_requests: usize,
        window: Duration,
        min_delay: Duration,
        clock: C,
    ) -> Self {
        Self {
            max_requests,
            window,
            min_delay,
            log: VecDeque::new(),
            last_request: None,
            clock,
        }
    }

    /// Blocks until a request may be issued, then records it.
    pub fn wait(&mut self) {
        let mut now = self.clock.now();

        if let Some(last) = self.last_request {
            let since_last = now.duration_since(last);
            if since_last < self.min_delay {
                self.clock.sleep(self.min_delay - since_last);
                now = self.clock.now();
            }
        }

        self.prune(now);

        if self.log.len() >= self.max_requests {
            if let Some(oldest) = self.log.front() {
                let elapsed = now.duration_since(*oldest);
                if elapsed < self.window {
                    self.clock.sleep(self.window - elapsed);
                }
            }
            self.log.clear();
            now = self.clock.now();
        }

        self.log.push_back(now);
        self.last_request = Some(now);
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.log.front() {
            if now.duration_since(*front) > self.window {
                self.log.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct TestClock {
        now: Cell<Instant>,
        slept: RefCell<Vec<Duration>>,
    }

    impl TestClock {
        fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
                slept: RefCell::new(Vec::new()),
            }
        }

        fn total_slept(&self) -> Duration {
            self.slept.borrow().iter().sum()
        }
    }

    impl Clock for Rc<TestClock> {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
            self.now.set(self.now.get() + duration);
        }
    }

    #[test]
    fn blocks_third_request_until_window_rolls_over() {
        let clock = Rc::new(TestClock::new());
        let mut limiter = RateLimiter::with_clock(
            2,
            Duration::from_secs(120),
            Duration::ZERO,
            Rc::clone(&clock),
        );

        limiter.wait();
        limiter.wait();
        assert_eq!(clock.total_slept(), Duration::ZERO);

        limiter.wait();
        assert_eq!(clock.total_slept(), Duration::from_secs(120));
    }

    #[test]
    fn enforces_minimum_delay_between_requests() {
        let clock = Rc::new(TestClock::new());
        let mut limiter = RateLimiter::with_clock(
            100,
            Duration::from_secs(120),
            Duration::from_millis(500),
            Rc::clone(&clock),
        );

        limiter.wait();
        assert_eq!(clock.total_slept(), Duration::ZERO);

        limiter.wait();
        assert_eq!(clock.total_slept(), Duration::from_millis(500));
    }

    #[test]
    fn window_rollover_clears_the_log() {
        let clock = Rc::new(TestClock::new());
        let mut limiter = RateLimiter::with_clock(
            2,
            Duration::from_secs(120),
            Duration::ZERO,
            Rc::clone(&clock),
        );

        limiter.wait();
        limiter.wait();
        limiter.wait();

        // The forced sleep rolled the window; the next request fits without
        // further waiting.
        let before = clock.total_slept();
        limiter.wait();
        assert_eq!(clock.total_slept(), before);
    }

    #[test]
    fn aged_out_requests_do_not_count() {
        let clock = Rc::new(TestClock::new());
        let mut limiter = RateLimiter::with_clock(
            2,
            Duration::from_secs(120),
            Duration::ZERO,
            Rc::clone(&clock),
        );

        limiter.wait();
        clock.now.set(clock.now.get() + Duration::from_secs(121));
        limiter.wait();
        limiter.wait();
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }
}
