use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::grants::Action;

fn counter_key(actor: Uuid, action: Action) -> String {
    format!("actor:{actor}|act:{}", action.as_str())
}

#[derive(Debug, Clone)]
struct CounterState {
    window: Duration,
    started: Instant,
    count: u32,
}

impl CounterState {
    fn new(window: Duration) -> Self {
        Self {
            window,
            started: Instant::now(),
            count: 0,
        }
    }

    fn reset_if_needed(&mut self) {
        if self.started.elapsed() >= self.window {
            self.started = Instant::now();
            self.count = 0;
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: u32,
    pub window_seconds: u64,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy)]
struct QuotaCfg {
    limit: u32,
    window: Duration,
}

/// Windowed per-actor counters for abuse-prone filings. Actions without
/// a configured limit pass unconditionally.
#[derive(Default)]
pub struct QuotaKernel {
    limits: HashMap<Action, QuotaCfg>,
    counters: HashMap<String, CounterState>,
}

impl QuotaKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, action: Action, limit: u32, window: Duration) -> Self {
        self.limits.insert(action, QuotaCfg { limit, window });
        self
    }

    pub fn allow_and_count(&mut self, actor: Uuid, action: Action) -> QuotaDecision {
        let Some(quota) = self.limits.get(&action).copied() else {
            return QuotaDecision {
                allowed: true,
                limit: u32::MAX,
                window_seconds: 0,
                remaining: u32::MAX,
            };
        };
        let key = counter_key(actor, action);
        let state = self
            .counters
            .entry(key)
            .or_insert_with(|| CounterState::new(quota.window));
        if state.window != quota.window {
            state.window = quota.window;
        }
        state.reset_if_needed();
        let window_seconds = quota.window.as_secs();
        if state.count < quota.limit {
            state.count += 1;
            QuotaDecision {
                allowed: true,
                limit: quota.limit,
                window_seconds,
                remaining: quota.limit - state.count,
            }
        } else {
            QuotaDecision {
                allowed: false,
                limit: quota.limit,
                window_seconds,
                remaining: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_key_scopes_by_action() {
        let actor = Uuid::nil();
        assert_eq!(
            counter_key(actor, Action::FileJoinRequest),
            format!("actor:{actor}|act:join_request.file")
        );
    }

    #[test]
    fn test_separate_counters_per_action_and_actor() {
        let mut kernel = QuotaKernel::new()
            .with_limit(Action::FileJoinRequest, 1, Duration::from_secs(60))
            .with_limit(Action::FileMaintenance, 3, Duration::from_secs(60));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let d1 = kernel.allow_and_count(alice, Action::FileJoinRequest);
        assert!(d1.allowed && d1.remaining == 0);
        let d2 = kernel.allow_and_count(alice, Action::FileJoinRequest);
        assert!(!d2.allowed && d2.remaining == 0);

        // Bob's counter is untouched by Alice's filings.
        assert!(kernel.allow_and_count(bob, Action::FileJoinRequest).allowed);

        let mut ok = 0;
        for _ in 0..4 {
            if kernel.allow_and_count(alice, Action::FileMaintenance).allowed {
                ok += 1;
            }
        }
        assert_eq!(ok, 3);
    }

    #[test]
    fn test_unconfigured_action_passes() {
        let mut kernel = QuotaKernel::new();
        let d = kernel.allow_and_count(Uuid::new_v4(), Action::RecordPayment);
        assert!(d.allowed);
        assert_eq!(d.window_seconds, 0);
    }

    #[test]
    fn test_window_elapses_and_counter_resets() {
        let mut kernel =
            QuotaKernel::new().with_limit(Action::FileJoinRequest, 1, Duration::from_millis(20));
        let actor = Uuid::new_v4();
        assert!(kernel.allow_and_count(actor, Action::FileJoinRequest).allowed);
        assert!(!kernel.allow_and_count(actor, Action::FileJoinRequest).allowed);
        std::thread::sleep(Duration::from_millis(30));
        assert!(kernel.allow_and_count(actor, Action::FileJoinRequest).allowed);
    }
}
