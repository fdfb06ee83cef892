use std::time::{Duration, Instant};

/// Tracks the politeness state of one host during a run
///
/// Request times are reservations: a caller that has to wait is given the
/// slot at `now + wait` straight away, so concurrent callers queue up behind
/// it instead of all waking at the same instant.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current run
    pub request_count: u32,

    /// Time of the most recent (possibly future) reserved request
    pub last_request_time: Option<Instant>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let ready_at = last + min_delay;
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Reserves the next request slot and returns how long to wait for it
    pub fn reserve_slot(&mut self, min_delay: Duration, now: Instant) -> Duration {
        let wait = self
            .time_until_next_request(min_delay, now)
            .unwrap_or(Duration::ZERO);
        self.request_count += 1;
        self.last_request_time = Some(now + wait);
        wait
    }
}
