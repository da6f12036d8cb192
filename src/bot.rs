//! The fishing cycle controller.
//!
//! Drives repeated cast -> wait-for-bite -> reel -> QTE cycles against the
//! detectors and the actuator. All components are injected at construction;
//! the controller owns them for the life of the session.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;

use crate::input::Actuator;
use crate::screen_reader::FrameSource;
use crate::session_log;
use crate::utils::bot_state::{BotActivity, SharedBotState};
use crate::utils::settings::Settings;
use crate::vision::{QteDetector, SuccessDetector};

/// Bite detection strategy, chosen once at startup. Audio listens for the
/// bobber splash on the system output; visual falls back to frame
/// differencing.
pub trait BiteDetector {
    /// Bring the detector up. Idempotent; only resource acquisition may
    /// fail here.
    fn start(&mut self) -> Result<()>;

    /// Tear the detector down. Idempotent.
    fn stop(&mut self);

    /// Block (polling internally) until a bite or `timeout`.
    fn wait_for_bite(&mut self, timeout: Duration) -> bool;
}

/// The bot. One instance per session, running on the control thread.
pub struct FishingBot {
    frames: Box<dyn FrameSource>,
    qte: QteDetector,
    bite: Box<dyn BiteDetector>,
    actuator: Box<dyn Actuator>,
    banner: Option<SuccessDetector>,
    settings: Settings,
    state: Arc<SharedBotState>,
}

impl FishingBot {
    pub fn new(
        frames: Box<dyn FrameSource>,
        qte: QteDetector,
        bite: Box<dyn BiteDetector>,
        actuator: Box<dyn Actuator>,
        settings: Settings,
        state: Arc<SharedBotState>,
    ) -> Self {
        let banner = settings
            .banner
            .confirm_catch_banner
            .then(|| SuccessDetector::new(settings.banner.clone()));

        Self {
            frames,
            qte,
            bite,
            actuator,
            banner,
            settings,
            state,
        }
    }

    /// Outer loop: fish until the emergency stop, the stop hotkey or the
    /// auto-stop ceiling. A failing cycle never takes the loop down.
    pub fn run(&mut self) {
        self.state.set_running(true);
        self.state.reset_stats();

        loop {
            if self.actuator.is_emergency_stop_pressed() {
                println!("Emergency stop pressed!");
                break;
            }
            if !self.state.is_running() {
                break;
            }

            let ceiling = self.settings.safety.auto_stop_after;
            if ceiling > 0 && self.state.stats().fish_caught >= ceiling {
                println!("Auto-stop: {} fish caught", ceiling);
                break;
            }

            match self.fishing_cycle() {
                Ok(true) => {
                    let caught = self.state.record_catch();
                    println!("Fish #{} caught!", caught);

                    let stats = &self.settings.stats;
                    if stats.enabled
                        && stats.display_interval > 0
                        && caught % stats.display_interval == 0
                    {
                        self.display_stats();
                    }
                }
                Ok(false) => {
                    self.state.record_failed_cycle();
                }
                Err(e) => {
                    // one-off detector faults cost a cycle, not the session
                    tracing::warn!("[CYCLE] Error: {:#}", e);
                    self.state.record_failed_cycle();
                }
            }

            self.wait_random_delay();
        }

        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.state.set_activity(BotActivity::Stopped);
        self.bite.stop();
        self.display_final_stats();
    }

    /// One full cycle. `Ok(true)` means a fish landed.
    fn fishing_cycle(&mut self) -> Result<bool> {
        self.state.set_activity(BotActivity::Casting);
        tracing::info!("[CYCLE] Casting the line");
        self.actuator.click(self.settings.cast_button);
        thread::sleep(self.settings.timing.cast_delay());

        self.state.set_activity(BotActivity::AwaitingBite);
        tracing::info!("[CYCLE] Waiting for a bite");
        if !self.bite.wait_for_bite(self.settings.bite.timeout()) {
            tracing::info!("[CYCLE] No bite before the timeout");
            session_log::log_catch(false, None);
            return Ok(false);
        }

        self.state.set_activity(BotActivity::Reeling);
        tracing::info!("[CYCLE] Reeling in");
        self.actuator.click(self.settings.reel_button);
        thread::sleep(self.settings.timing.reel_settle());

        self.state.set_activity(BotActivity::QteLoop);
        let success = self.run_qte_sequence()?;

        if success {
            let banner_seen = self.check_catch_banner();
            if let Some(seen) = banner_seen {
                tracing::info!("[CYCLE] Catch banner visible: {}", seen);
            }
            session_log::log_catch(true, banner_seen);
        } else {
            session_log::log_catch(false, None);
        }

        Ok(success)
    }

    /// The QTE inner loop: up to `max_qte` timed clicks.
    ///
    /// The target ring disappearing is how the game signals the end of the
    /// sequence, so "no ring" after at least one hit is success; "no ring"
    /// before any hit for longer than the miss bound means the sequence
    /// never started and the fish is gone.
    pub fn run_qte_sequence(&mut self) -> Result<bool> {
        let mut hits = 0u32;
        let mut consecutive_misses = 0u32;
        let region = self.qte.config().region;

        tracing::debug!("[QTE] Watching for circles");

        while hits < self.settings.qte.max_qte {
            if self.actuator.is_emergency_stop_pressed() {
                return Ok(false);
            }

            let frame = self.frames.capture(Some(region))?;
            let (target, cursor) = self.qte.detect(&frame)?;

            if self.settings.show_debug_window {
                self.qte.show_debug_window();
            }

            let Some(target) = target else {
                if hits > 0 {
                    println!("QTE sequence complete ({} hits)", hits);
                    return Ok(true);
                }
                consecutive_misses += 1;
                if consecutive_misses > self.settings.qte.miss_limit {
                    tracing::warn!("[QTE] No circles appeared");
                    self.state.record_qte_failure();
                    return Ok(false);
                }
                thread::sleep(self.settings.qte.miss_poll());
                continue;
            };

            if self.qte.is_aligned(Some(&target), cursor.as_ref()) {
                self.actuator.click(self.settings.qte_button);
                thread::sleep(self.settings.timing.qte_reaction());
                hits += 1;
                self.state.record_qte_success();
                println!("QTE #{} hit!", hits);

                // let the cleared QTE disappear before looking for the next
                thread::sleep(self.settings.timing.post_qte_delay());
                consecutive_misses = 0;
            } else {
                thread::sleep(self.settings.qte.poll_interval());
            }
        }

        println!(
            "All QTEs cleared ({}/{})",
            hits, self.settings.qte.max_qte
        );
        Ok(true)
    }

    /// Confirmatory banner check after a successful sequence; `None` when
    /// disabled or the frame could not be captured.
    fn check_catch_banner(&mut self) -> Option<bool> {
        let banner = self.banner.as_ref()?;
        match self.frames.capture(None) {
            Ok(frame) => Some(banner.is_catch_banner_visible(&frame)),
            Err(e) => {
                tracing::debug!("[CYCLE] Banner check skipped: {}", e);
                None
            }
        }
    }

    /// Human-like pause between cycles.
    fn wait_random_delay(&mut self) {
        let s = &self.settings.safety;
        if !s.random_delay_enabled || s.random_delay_max_secs <= 0.0 {
            return;
        }
        let delay = rand::rng().random_range(s.random_delay_min_secs..=s.random_delay_max_secs);
        tracing::debug!("[CYCLE] Human pause: {:.2}s", delay);
        thread::sleep(Duration::from_secs_f64(delay));
    }

    fn display_stats(&self) {
        let stats = self.state.stats();
        let elapsed = self.state.elapsed().as_secs();
        let per_hour = if elapsed > 0 {
            stats.fish_caught as f64 / elapsed as f64 * 3600.0
        } else {
            0.0
        };

        println!("------------------------------------------------");
        println!("  Fish caught:   {}", stats.fish_caught);
        println!("  QTE hits:      {}", stats.qte_success);
        println!("  QTE misses:    {}", stats.qte_failed);
        println!("  Failed cycles: {}", stats.failed_cycles);
        println!("  Elapsed:       {}m {}s", elapsed / 60, elapsed % 60);
        println!("  Fish/hour:     {:.1}", per_hour);
        println!("------------------------------------------------");
    }

    fn display_final_stats(&self) {
        let stats = self.state.stats();
        let elapsed = self.state.elapsed().as_secs();

        println!("================================================");
        println!("Bot stopped - final statistics");
        println!("  Fish caught:   {}", stats.fish_caught);
        println!("  QTE hits:      {}", stats.qte_success);
        println!("  QTE misses:    {}", stats.qte_failed);
        println!("  Failed cycles: {}", stats.failed_cycles);
        println!("  Total time:    {}m {}s", elapsed / 60, elapsed % 60);

        if stats.fish_caught > 0 && elapsed > 0 {
            let avg = elapsed as f64 / stats.fish_caught as f64;
            let per_hour = stats.fish_caught as f64 / elapsed as f64 * 3600.0;
            println!("  Avg time/fish: {:.1}s", avg);
            println!("  Fish/hour:     {:.1}", per_hour);
        }
        println!("================================================");
    }
}
