//! Shared bot state between the control loop and the hotkey listener

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

/// Coarse run state driven by the start hotkey, emergency stop and
/// the auto-stop catch ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

/// What the bot is doing right now, for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BotActivity {
    Idle,
    WaitingForStart,
    Casting,
    AwaitingBite,
    Reeling,
    QteLoop,
    Stopped,
}

impl BotActivity {
    pub fn description(&self) -> &'static str {
        match self {
            BotActivity::Idle => "Idle",
            BotActivity::WaitingForStart => "Waiting for start key",
            BotActivity::Casting => "Casting the line...",
            BotActivity::AwaitingBite => "Waiting for a bite...",
            BotActivity::Reeling => "Reeling in...",
            BotActivity::QteLoop => "Playing QTE sequence...",
            BotActivity::Stopped => "Bot stopped",
        }
    }
}

/// Session counters, mutated only by the cycle controller.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleStats {
    pub fish_caught: u32,
    pub qte_success: u32,
    pub qte_failed: u32,
    pub failed_cycles: u32,
}

/// State shared between the control loop, the hotkey listener thread and
/// the shutdown path. Constructed once in `main` and passed around as an
/// `Arc` rather than living in a global.
pub struct SharedBotState {
    running: AtomicBool,
    emergency: AtomicBool,
    run_state: RwLock<RunState>,
    activity: RwLock<BotActivity>,
    stats: RwLock<CycleStats>,
    started_at: RwLock<Option<Instant>>,
}

impl SharedBotState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            emergency: AtomicBool::new(false),
            run_state: RwLock::new(RunState::Idle),
            activity: RwLock::new(BotActivity::Idle),
            stats: RwLock::new(CycleStats::default()),
            started_at: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        *self.run_state.write() = if running {
            RunState::Running
        } else {
            RunState::Stopped
        };
    }

    pub fn run_state(&self) -> RunState {
        *self.run_state.read()
    }

    /// Emergency stop: latched until the process exits.
    pub fn trigger_emergency_stop(&self) {
        self.emergency.store(true, Ordering::SeqCst);
        self.set_running(false);
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    pub fn activity(&self) -> BotActivity {
        *self.activity.read()
    }

    pub fn set_activity(&self, activity: BotActivity) {
        *self.activity.write() = activity;
    }

    pub fn stats(&self) -> CycleStats {
        *self.stats.read()
    }

    /// Reset counters and the session clock.
    pub fn reset_stats(&self) {
        *self.stats.write() = CycleStats::default();
        *self.started_at.write() = Some(Instant::now());
    }

    pub fn record_catch(&self) -> u32 {
        let mut stats = self.stats.write();
        stats.fish_caught += 1;
        stats.fish_caught
    }

    pub fn record_qte_success(&self) {
        self.stats.write().qte_success += 1;
    }

    pub fn record_qte_failure(&self) {
        self.stats.write().qte_failed += 1;
    }

    pub fn record_failed_cycle(&self) {
        self.stats.write().failed_cycles += 1;
    }

    /// Time since the session started, zero if it never did.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .read()
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }
}

impl Default for SharedBotState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_transitions() {
        let state = SharedBotState::new();
        assert_eq!(state.run_state(), RunState::Idle);
        assert!(!state.is_running());

        state.set_running(true);
        assert_eq!(state.run_state(), RunState::Running);

        state.trigger_emergency_stop();
        assert!(state.is_emergency_stopped());
        assert!(!state.is_running());
        assert_eq!(state.run_state(), RunState::Stopped);
    }

    #[test]
    fn test_stats_counters() {
        let state = SharedBotState::new();
        state.reset_stats();
        assert_eq!(state.record_catch(), 1);
        state.record_qte_success();
        state.record_qte_success();
        state.record_qte_failure();

        let stats = state.stats();
        assert_eq!(stats.fish_caught, 1);
        assert_eq!(stats.qte_success, 2);
        assert_eq!(stats.qte_failed, 1);
        assert_eq!(stats.failed_cycles, 0);
    }
}
