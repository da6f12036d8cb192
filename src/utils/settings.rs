//! Bot configuration, loaded once at startup from `config/settings.json`

use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::path::get_data_dir;

/// Which bite detection strategy drives the fishing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Listen for the bobber splash on the system audio output (more reliable)
    Audio,
    /// Compare screen frames against a post-cast baseline
    Visual,
}

/// Mouse button used for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

/// Top-level settings. Every field has a default so a partial
/// `settings.json` only has to name what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bite detection strategy, chosen once at startup
    pub detection_mode: DetectionMode,
    /// Hotkey that starts/stops the bot
    pub start_key: String,
    /// Hotkey that triggers the emergency stop
    pub emergency_stop_key: String,
    /// Button for casting the line
    pub cast_button: MouseButton,
    /// Button for reeling in when a fish bites
    pub reel_button: MouseButton,
    /// Button for QTE confirm clicks
    pub qte_button: MouseButton,
    /// Show a live window with the circle detection overlay
    pub show_debug_window: bool,
    pub timing: TimingSettings,
    pub audio: AudioSettings,
    pub bite: BiteSettings,
    pub qte: QteSettings,
    pub banner: BannerSettings,
    pub safety: SafetySettings,
    pub stats: StatsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detection_mode: DetectionMode::Audio,
            start_key: "F9".to_string(),
            emergency_stop_key: "F10".to_string(),
            cast_button: MouseButton::Right,
            reel_button: MouseButton::Right,
            qte_button: MouseButton::Left,
            show_debug_window: false,
            timing: TimingSettings::default(),
            audio: AudioSettings::default(),
            bite: BiteSettings::default(),
            qte: QteSettings::default(),
            banner: BannerSettings::default(),
            safety: SafetySettings::default(),
            stats: StatsSettings::default(),
        }
    }
}

/// Delays between the stages of a fishing cycle, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Settle delay after casting the line
    pub cast_delay_secs: f64,
    /// Settle delay after the reel click, before the first QTE poll
    pub reel_settle_secs: f64,
    /// Pause after a QTE confirm click
    pub qte_reaction_secs: f64,
    /// Wait for the current QTE to disappear before looking for the next
    pub post_qte_delay_secs: f64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            cast_delay_secs: 1.0,
            reel_settle_secs: 0.1,
            qte_reaction_secs: 0.05,
            post_qte_delay_secs: 0.5,
        }
    }
}

/// Audio splash detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Requested capture sample rate (Hz)
    pub sample_rate: u32,
    /// Samples per analysis block
    pub chunk_size: usize,
    /// Absolute RMS floor for a splash; run `auto-angler calibrate` to tune
    pub rms_threshold: f32,
    /// Current block must exceed the rolling baseline by this factor
    pub peak_ratio: f32,
    /// Blocks kept in the capture queue; oldest is dropped on overflow
    pub queue_capacity: usize,
    /// RMS values kept for the rolling baseline
    pub history_size: usize,
    /// Minimum gap between two declared bites
    pub cooldown_secs: f64,
    /// Splash sounds are ignored for this long after casting (rod noise)
    pub ignore_after_cast_secs: f64,
    /// Timeout when popping a block from the capture queue
    pub block_poll_secs: f64,
    /// Sleep between detection ticks
    pub poll_interval_secs: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_size: 1024,
            rms_threshold: 0.01,
            peak_ratio: 3.0,
            queue_capacity: 100,
            history_size: 20,
            cooldown_secs: 0.3,
            ignore_after_cast_secs: 1.5,
            block_poll_secs: 0.1,
            poll_interval_secs: 0.005,
        }
    }
}

/// Visual bite detection and the shared bite-wait timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiteSettings {
    /// Maximum wait for a bite before the cycle is abandoned
    pub timeout_secs: f64,
    /// Poll interval while comparing frames against the baseline
    pub check_interval_secs: f64,
    /// Fraction of changed pixels that counts as a bite
    pub diff_threshold: f64,
    /// Grayscale delta for a pixel to count as changed
    pub diff_intensity: f64,
    /// Wait after arming the baseline so the cast animation settles
    pub baseline_settle_secs: f64,
}

impl Default for BiteSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60.0,
            check_interval_secs: 0.2,
            diff_threshold: 0.25,
            diff_intensity: 30.0,
            baseline_settle_secs: 2.0,
        }
    }
}

/// QTE circle detection parameters.
///
/// The region and tolerance values are fractions of the live screen size so
/// the detector behaves the same across resolutions. The region fractions
/// are empirically tuned for 16:9 displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QteSettings {
    /// Maximum QTEs in one sequence
    pub max_qte: u32,
    /// Sleep between polls while the target ring is visible
    pub poll_interval_secs: f64,
    /// Sleep between polls while no ring is visible yet
    pub miss_poll_secs: f64,
    /// Consecutive no-ring polls before the sequence is abandoned
    pub miss_limit: u32,
    pub region_left_frac: f64,
    pub region_top_frac: f64,
    pub region_width_frac: f64,
    pub region_height_frac: f64,
    /// Red target ring, low hue band (HSV)
    pub target_hsv_lower: [u8; 3],
    pub target_hsv_upper: [u8; 3],
    /// Red target ring, wraparound band near hue 180
    pub target_wrap_lower: [u8; 3],
    pub target_wrap_upper: [u8; 3],
    /// White cursor ring (HSV)
    pub cursor_hsv_lower: [u8; 3],
    pub cursor_hsv_upper: [u8; 3],
    /// Contours smaller than this are speckle
    pub min_contour_area: f64,
    /// 4*pi*area/perimeter^2 floor; permissive to tolerate pixelated rings
    pub min_circularity: f64,
    /// Center tolerance as a fraction of screen width (20px at 1920)
    pub center_tolerance_frac: f64,
    /// Radius tolerance as a fraction of screen width (10px at 1920)
    pub radius_tolerance_frac: f64,
    pub hough_dp: f64,
    pub hough_min_dist: f64,
    /// Canny upper threshold; low so faint ring edges register
    pub hough_edge_threshold: f64,
    /// Accumulator threshold; moderate so near-circular blobs register
    pub hough_accumulator_threshold: f64,
    pub hough_min_radius: i32,
    pub hough_max_radius: i32,
}

impl Default for QteSettings {
    fn default() -> Self {
        Self {
            max_qte: 6,
            poll_interval_secs: 0.005,
            miss_poll_secs: 0.1,
            miss_limit: 30,
            region_left_frac: 0.25,
            region_top_frac: 0.18,
            region_width_frac: 0.50,
            region_height_frac: 0.65,
            target_hsv_lower: [0, 100, 100],
            target_hsv_upper: [10, 255, 255],
            target_wrap_lower: [170, 100, 100],
            target_wrap_upper: [180, 255, 255],
            cursor_hsv_lower: [0, 0, 200],
            cursor_hsv_upper: [180, 30, 255],
            min_contour_area: 100.0,
            min_circularity: 0.5,
            center_tolerance_frac: 20.0 / 1920.0,
            radius_tolerance_frac: 10.0 / 1920.0,
            hough_dp: 1.0,
            hough_min_dist: 50.0,
            hough_edge_threshold: 50.0,
            hough_accumulator_threshold: 15.0,
            hough_min_radius: 10,
            hough_max_radius: 100,
        }
    }
}

/// Catch-banner confirmation (the cyan message shown after a catch).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerSettings {
    /// Check for the banner after a successful QTE sequence (log-only)
    pub confirm_catch_banner: bool,
    pub hsv_lower: [u8; 3],
    pub hsv_upper: [u8; 3],
    /// Banner search region, fractions of the screen (x then y)
    pub region_x_frac: (f64, f64),
    pub region_y_frac: (f64, f64),
    /// Fraction of matching pixels for the banner to count as visible
    pub min_ratio: f64,
    /// Chat fallback region (bottom-left), with its own lower ratio
    pub chat_x_frac: (f64, f64),
    pub chat_y_frac: (f64, f64),
    pub chat_min_ratio: f64,
}

impl Default for BannerSettings {
    fn default() -> Self {
        Self {
            confirm_catch_banner: false,
            hsv_lower: [80, 100, 100],
            hsv_upper: [100, 255, 255],
            region_x_frac: (0.3, 0.7),
            region_y_frac: (0.2, 0.5),
            min_ratio: 0.008,
            chat_x_frac: (0.0, 0.3),
            chat_y_frac: (0.7, 0.95),
            chat_min_ratio: 0.001,
        }
    }
}

/// Safety limits and human-like pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    /// Stop after catching this many fish (0 = unbounded)
    pub auto_stop_after: u32,
    pub random_delay_enabled: bool,
    pub random_delay_min_secs: f64,
    pub random_delay_max_secs: f64,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            auto_stop_after: 0,
            random_delay_enabled: true,
            random_delay_min_secs: 0.5,
            random_delay_max_secs: 2.0,
        }
    }
}

/// Statistics reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    pub enabled: bool,
    /// Log a stats block every N catches
    pub display_interval: u32,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            display_interval: 10,
        }
    }
}

impl Settings {
    /// Load settings from `config/settings.json` under the data dir.
    /// Missing file or unparseable content falls back to defaults.
    pub fn load() -> Self {
        let path = get_data_dir().join("config").join("settings.json");

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("[CONFIG] Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("[CONFIG] Failed to parse {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

impl TimingSettings {
    pub fn cast_delay(&self) -> Duration {
        Duration::from_secs_f64(self.cast_delay_secs)
    }

    pub fn reel_settle(&self) -> Duration {
        Duration::from_secs_f64(self.reel_settle_secs)
    }

    pub fn qte_reaction(&self) -> Duration {
        Duration::from_secs_f64(self.qte_reaction_secs)
    }

    pub fn post_qte_delay(&self) -> Duration {
        Duration::from_secs_f64(self.post_qte_delay_secs)
    }
}

impl AudioSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    pub fn ignore_after_cast(&self) -> Duration {
        Duration::from_secs_f64(self.ignore_after_cast_secs)
    }

    pub fn block_poll(&self) -> Duration {
        Duration::from_secs_f64(self.block_poll_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }
}

impl BiteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval_secs)
    }

    pub fn baseline_settle(&self) -> Duration {
        Duration::from_secs_f64(self.baseline_settle_secs)
    }
}

impl QteSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn miss_poll(&self) -> Duration {
        Duration::from_secs_f64(self.miss_poll_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.detection_mode, DetectionMode::Audio);
        assert_eq!(s.cast_button, MouseButton::Right);
        assert_eq!(s.qte_button, MouseButton::Left);
        assert_eq!(s.audio.sample_rate, 44100);
        assert_eq!(s.qte.max_qte, 6);
        assert_eq!(s.safety.auto_stop_after, 0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"detection_mode": "visual", "audio": {"rms_threshold": 0.02}}"#)
                .unwrap();
        assert_eq!(s.detection_mode, DetectionMode::Visual);
        assert!((s.audio.rms_threshold - 0.02).abs() < 1e-6);
        // untouched fields fall back to defaults
        assert_eq!(s.audio.chunk_size, 1024);
        assert_eq!(s.start_key, "F9");
    }

    #[test]
    fn test_duration_helpers() {
        let t = TimingSettings::default();
        assert_eq!(t.cast_delay(), Duration::from_secs(1));
        assert_eq!(t.qte_reaction(), Duration::from_millis(50));
    }
}
