//! QTE sequence and bite detection against scripted frames.
//!
//! Synthetic frames are drawn with OpenCV and fed through the real
//! detectors and the cycle controller, so the whole pipeline from pixels
//! to clicks is exercised without a screen or a game.
//!
//! Run with: cargo test --test qte_cycle

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use opencv::core::{self, Mat, Point, Scalar};
use opencv::imgproc;
use parking_lot::Mutex;

use auto_angler::bot::{BiteDetector, FishingBot};
use auto_angler::input::Actuator;
use auto_angler::screen_reader::{FrameSource, Region};
use auto_angler::utils::bot_state::SharedBotState;
use auto_angler::utils::settings::{MouseButton, Settings};
use auto_angler::vision::{FishDetector, QteConfig, QteDetector};

const FRAME_SIZE: i32 = 300;
const TARGET_RADIUS: i32 = 44;
const CURSOR_RADIUS: i32 = 36;

fn center() -> Point {
    Point::new(150, 150)
}

fn red() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn white() -> Scalar {
    Scalar::new(255.0, 255.0, 255.0, 0.0)
}

fn blank_frame() -> Mat {
    Mat::new_rows_cols_with_default(
        FRAME_SIZE,
        FRAME_SIZE,
        core::CV_8UC3,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
    )
    .unwrap()
}

fn draw_disc(frame: &mut Mat, center: Point, radius: i32, color: Scalar) {
    imgproc::circle(frame, center, radius, color, imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
}

/// Red target ring with the white cursor dead center: a hit.
fn aligned_frame() -> Mat {
    let mut frame = blank_frame();
    draw_disc(&mut frame, center(), TARGET_RADIUS, red());
    draw_disc(&mut frame, center(), CURSOR_RADIUS, white());
    frame
}

/// Both rings present but the cursor is far off target.
fn unaligned_frame() -> Mat {
    let mut frame = blank_frame();
    draw_disc(&mut frame, center(), TARGET_RADIUS, red());
    draw_disc(&mut frame, Point::new(60, 150), CURSOR_RADIUS, white());
    frame
}

/// Frame source that replays a fixed list, repeating the last frame.
struct ScriptedFrames {
    frames: Vec<Mat>,
    index: usize,
}

impl ScriptedFrames {
    fn new(frames: Vec<Mat>) -> Self {
        assert!(!frames.is_empty());
        Self { frames, index: 0 }
    }
}

impl FrameSource for ScriptedFrames {
    fn capture(&mut self, _region: Option<Region>) -> Result<Mat> {
        let i = self.index.min(self.frames.len() - 1);
        self.index += 1;
        Ok(self.frames[i].clone())
    }

    fn screen_size(&mut self) -> Result<(u32, u32)> {
        Ok((FRAME_SIZE as u32, FRAME_SIZE as u32))
    }
}

/// Actuator that records clicks instead of issuing them.
struct CountingActuator {
    clicks: Arc<Mutex<Vec<MouseButton>>>,
    emergency: bool,
}

impl Actuator for CountingActuator {
    fn click(&mut self, button: MouseButton) {
        self.clicks.lock().push(button);
    }

    fn is_emergency_stop_pressed(&self) -> bool {
        self.emergency
    }
}

/// Bite detector that never fires; the QTE tests start past the bite.
struct NoBite;

impl BiteDetector for NoBite {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn wait_for_bite(&mut self, _timeout: Duration) -> bool {
        false
    }
}

/// Defaults with every sleep zeroed and tolerances matched to the small
/// synthetic frames (20px center, 12px radius at 300px width).
fn fast_settings() -> Settings {
    let mut s = Settings::default();
    s.timing.cast_delay_secs = 0.0;
    s.timing.reel_settle_secs = 0.0;
    s.timing.qte_reaction_secs = 0.0;
    s.timing.post_qte_delay_secs = 0.0;
    s.qte.poll_interval_secs = 0.0;
    s.qte.miss_poll_secs = 0.0;
    s.qte.center_tolerance_frac = 20.0 / FRAME_SIZE as f64;
    s.qte.radius_tolerance_frac = 12.0 / FRAME_SIZE as f64;
    s.safety.random_delay_enabled = false;
    s
}

fn make_bot(
    frames: Vec<Mat>,
    settings: Settings,
    emergency: bool,
) -> (FishingBot, Arc<SharedBotState>, Arc<Mutex<Vec<MouseButton>>>) {
    let state = Arc::new(SharedBotState::new());
    let clicks = Arc::new(Mutex::new(Vec::new()));

    let qte = QteDetector::new(QteConfig::for_screen(
        FRAME_SIZE as u32,
        FRAME_SIZE as u32,
        &settings.qte,
    ));
    let actuator = CountingActuator {
        clicks: clicks.clone(),
        emergency,
    };

    let bot = FishingBot::new(
        Box::new(ScriptedFrames::new(frames)),
        qte,
        Box::new(NoBite),
        Box::new(actuator),
        settings,
        state.clone(),
    );

    (bot, state, clicks)
}

#[test]
fn three_aligned_frames_give_three_hits_and_complete() {
    let frames = vec![
        aligned_frame(),
        unaligned_frame(),
        aligned_frame(),
        unaligned_frame(),
        aligned_frame(),
        blank_frame(),
    ];

    let (mut bot, state, clicks) = make_bot(frames, fast_settings(), false);
    let result = bot.run_qte_sequence().unwrap();

    assert!(result, "ring disappearing after hits means success");
    let clicks = clicks.lock();
    assert_eq!(clicks.len(), 3);
    assert!(clicks.iter().all(|c| *c == MouseButton::Left));
    assert_eq!(state.stats().qte_success, 3);
    assert_eq!(state.stats().qte_failed, 0);
}

#[test]
fn no_circles_at_all_is_a_failed_sequence() {
    let mut settings = fast_settings();
    settings.qte.miss_limit = 3;

    let (mut bot, state, clicks) = make_bot(vec![blank_frame()], settings, false);
    let result = bot.run_qte_sequence().unwrap();

    assert!(!result);
    assert!(clicks.lock().is_empty());
    assert_eq!(state.stats().qte_success, 0);
    assert_eq!(state.stats().qte_failed, 1);
}

#[test]
fn unaligned_cursor_never_clicks() {
    let mut settings = fast_settings();
    settings.qte.miss_limit = 2;

    // target stays visible but never lines up, then disappears with no hits
    let frames = vec![
        unaligned_frame(),
        unaligned_frame(),
        unaligned_frame(),
        blank_frame(),
    ];

    let (mut bot, _state, clicks) = make_bot(frames, settings, false);
    let result = bot.run_qte_sequence().unwrap();

    assert!(!result);
    assert!(clicks.lock().is_empty());
}

#[test]
fn emergency_stop_aborts_the_sequence() {
    let (mut bot, _state, clicks) = make_bot(vec![aligned_frame()], fast_settings(), true);
    let result = bot.run_qte_sequence().unwrap();

    assert!(!result);
    assert!(clicks.lock().is_empty());
}

#[test]
fn visual_bite_detector_end_to_end() {
    let mut bite_settings = fast_settings().bite;
    bite_settings.baseline_settle_secs = 0.0;
    bite_settings.check_interval_secs = 0.0;

    // 80x80 baseline, then a 50x50 white block: 39% of pixels change
    let black = Mat::new_rows_cols_with_default(
        80,
        80,
        core::CV_8UC3,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
    )
    .unwrap();
    let mut changed = black.clone();
    imgproc::rectangle(
        &mut changed,
        core::Rect::new(10, 10, 50, 50),
        white(),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )
    .unwrap();

    // default threshold 0.25: the block is a bite
    let mut detector = FishDetector::new(
        Box::new(ScriptedFrames::new(vec![black.clone(), changed.clone()])),
        bite_settings.clone(),
        None,
    );
    assert!(detector.wait_for_bite(Duration::from_millis(250)));

    // threshold 0.5: the same block is not enough
    bite_settings.diff_threshold = 0.5;
    let mut strict = FishDetector::new(
        Box::new(ScriptedFrames::new(vec![black, changed])),
        bite_settings,
        None,
    );
    assert!(!strict.wait_for_bite(Duration::from_millis(100)));
}
