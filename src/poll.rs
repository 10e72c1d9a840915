//! Refresh scheduling for dashboard lists.
//!
//! Polling only runs while something upstream is still in flight, and
//! backs off exponentially after failed refreshes.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::PollingConfig;

/// Statuses that mean the service is still working on an entity
const IN_FLIGHT_STATUSES: &[&str] = &[
    "pending",
    "queued",
    "running",
    "processing",
    "in_progress",
    "scheduled",
    "crawling",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollState {
    /// Nothing in flight; no refresh is scheduled
    Idle,
    /// Some entities are in flight; refresh at the active interval
    Active,
    /// The last `attempt` refreshes failed
    Backoff { attempt: u32 },
}

/// Explicit poll state machine driven by refresh outcomes
#[derive(Debug, Clone)]
pub struct PollScheduler {
    state: PollState,
    active_interval: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
}

impl PollScheduler {
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            state: PollState::Idle,
            active_interval: Duration::from_millis(config.active_interval_ms),
            backoff_initial: Duration::from_millis(config.backoff_initial_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Record a successful refresh that found `in_flight` busy entities
    pub fn observe(&mut self, in_flight: usize) -> PollState {
        let next = if in_flight > 0 { PollState::Active } else { PollState::Idle };
        self.transition(next)
    }

    /// Record a failed refresh
    pub fn record_failure(&mut self) -> PollState {
        let attempt = match self.state {
            PollState::Backoff { attempt } => attempt.saturating_add(1),
            _ => 1,
        };
        self.transition(PollState::Backoff { attempt })
    }

    /// Delay before the next refresh; `None` means stop polling
    pub fn next_delay(&self) -> Option<Duration> {
        match self.state {
            PollState::Idle => None,
            PollState::Active => Some(self.active_interval),
            PollState::Backoff { attempt } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                Some(self.backoff_initial.saturating_mul(factor).min(self.backoff_max))
            }
        }
    }

    fn transition(&mut self, next: PollState) -> PollState {
        if next != self.state {
            debug!("Poll state {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        next
    }
}

/// Whether an entity status means work is still in progress
pub fn is_in_flight(status: &str) -> bool {
    let status = status.trim().to_lowercase();
    IN_FLIGHT_STATUSES.contains(&status.as_str())
}

/// Number of entities in `entities` whose `status` is in flight
pub fn count_in_flight(entities: &[Value]) -> usize {
    entities
        .iter()
        .filter(|entity| {
            entity
                .get("status")
                .and_then(Value::as_str)
                .map_or(false, is_in_flight)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scheduler() -> PollScheduler {
        PollScheduler::new(&PollingConfig {
            active_interval_ms: 3_000,
            backoff_initial_ms: 5_000,
            backoff_max_ms: 30_000,
        })
    }

    #[test]
    fn test_starts_idle() {
        let scheduler = scheduler();
        assert_eq!(scheduler.state(), PollState::Idle);
        assert_eq!(scheduler.next_delay(), None);
    }

    #[test]
    fn test_active_while_work_in_flight() {
        let mut scheduler = scheduler();
        assert_eq!(scheduler.observe(2), PollState::Active);
        assert_eq!(scheduler.next_delay(), Some(Duration::from_secs(3)));

        assert_eq!(scheduler.observe(0), PollState::Idle);
        assert_eq!(scheduler.next_delay(), None);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut scheduler = scheduler();
        scheduler.observe(1);

        let delays: Vec<Duration> = (0..5)
            .map(|_| {
                scheduler.record_failure();
                scheduler.next_delay().unwrap()
            })
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30),
                Duration::from_secs(30),
            ]
        );
        assert_eq!(scheduler.state(), PollState::Backoff { attempt: 5 });

        // A good refresh clears the backoff
        assert_eq!(scheduler.observe(1), PollState::Active);
    }

    #[test]
    fn test_in_flight_statuses() {
        assert!(is_in_flight("running"));
        assert!(is_in_flight(" Pending "));
        assert!(!is_in_flight("completed"));
        assert!(!is_in_flight("failed"));

        let jobs = vec![
            json!({"status": "running"}),
            json!({"status": "completed"}),
            json!({"status": "queued"}),
            json!({"id": 4}),
        ];
        assert_eq!(count_in_flight(&jobs), 2);
    }
}
