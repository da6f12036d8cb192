//! Visual bite detection by frame differencing.
//!
//! Fallback strategy for setups where audio capture is unavailable: store a
//! baseline frame after casting, then flag a bite once enough pixels have
//! changed against it.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use opencv::core::{self, Mat};
use opencv::imgproc;
use opencv::prelude::*;

use crate::screen_reader::{FrameSource, Region};
use crate::utils::settings::BiteSettings;

/// Fraction of pixels whose grayscale difference exceeds `intensity_cutoff`.
pub fn frame_difference(baseline: &Mat, current: &Mat, intensity_cutoff: f64) -> opencv::Result<f64> {
    let mut gray_baseline = Mat::default();
    imgproc::cvt_color(baseline, &mut gray_baseline, imgproc::COLOR_BGR2GRAY, 0)?;
    let mut gray_current = Mat::default();
    imgproc::cvt_color(current, &mut gray_current, imgproc::COLOR_BGR2GRAY, 0)?;

    let mut diff = Mat::default();
    core::absdiff(&gray_baseline, &gray_current, &mut diff)?;

    let mut changed = Mat::default();
    imgproc::threshold(
        &diff,
        &mut changed,
        intensity_cutoff,
        255.0,
        imgproc::THRESH_BINARY,
    )?;

    let total = (changed.rows() * changed.cols()) as f64;
    if total == 0.0 {
        return Ok(0.0);
    }
    Ok(core::count_non_zero(&changed)? as f64 / total)
}

/// Visual bite detector.
pub struct FishDetector {
    frames: Box<dyn FrameSource>,
    settings: BiteSettings,
    region: Option<Region>,
    baseline: Option<Mat>,
}

impl FishDetector {
    /// `region` restricts the watched area; `None` watches the full screen.
    pub fn new(frames: Box<dyn FrameSource>, settings: BiteSettings, region: Option<Region>) -> Self {
        Self {
            frames,
            settings,
            region,
            baseline: None,
        }
    }

    /// Capture the reference frame the next polls compare against.
    pub fn set_baseline(&mut self) -> Result<()> {
        let frame = self.frames.capture(self.region)?;
        self.baseline = Some(frame);
        Ok(())
    }

    /// One poll against the baseline. Capture failures count as "no bite
    /// this tick", never as an error.
    pub fn detect_bite(&mut self, threshold: Option<f64>) -> bool {
        let threshold = threshold.unwrap_or(self.settings.diff_threshold);

        let Some(baseline) = self.baseline.as_ref() else {
            return false;
        };

        let current = match self.frames.capture(self.region) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("[VISUAL] Frame capture missed: {}", e);
                return false;
            }
        };

        match frame_difference(baseline, &current, self.settings.diff_intensity) {
            Ok(difference) => {
                if difference > threshold {
                    tracing::info!(
                        "[VISUAL] Bite detected: {:.3} of pixels changed (threshold {:.3})",
                        difference,
                        threshold
                    );
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                tracing::debug!("[VISUAL] Frame diff failed: {}", e);
                false
            }
        }
    }

    /// Re-arm the baseline (with a settle delay so the cast animation does
    /// not count as the bite), then poll until a bite or `timeout`.
    pub fn wait_for_bite(&mut self, timeout: Duration) -> bool {
        let started = Instant::now();

        if let Err(e) = self.set_baseline() {
            tracing::error!("[VISUAL] Cannot arm baseline: {}", e);
            return false;
        }
        thread::sleep(self.settings.baseline_settle());

        while started.elapsed() < timeout {
            if self.detect_bite(None) {
                return true;
            }
            thread::sleep(self.settings.check_interval());
        }

        tracing::debug!("[VISUAL] No bite within the timeout");
        false
    }
}

impl crate::bot::BiteDetector for FishDetector {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn wait_for_bite(&mut self, timeout: Duration) -> bool {
        FishDetector::wait_for_bite(self, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;

    fn black_frame(size: i32) -> Mat {
        Mat::new_rows_cols_with_default(size, size, core::CV_8UC3, Scalar::new(0.0, 0.0, 0.0, 0.0))
            .unwrap()
    }

    /// 80x80 black frame with a 50x50 white block: 2500/6400 = 39% changed.
    fn frame_with_white_block() -> Mat {
        let mut frame = black_frame(80);
        imgproc::rectangle(
            &mut frame,
            core::Rect::new(10, 10, 50, 50),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        frame
    }

    #[test]
    fn test_identical_frames_no_difference() {
        let a = black_frame(80);
        let b = black_frame(80);
        assert_eq!(frame_difference(&a, &b, 30.0).unwrap(), 0.0);
    }

    #[test]
    fn test_white_block_crosses_default_threshold_only() {
        let baseline = black_frame(80);
        let current = frame_with_white_block();
        let difference = frame_difference(&baseline, &current, 30.0).unwrap();
        assert!(difference > 0.25, "expected > 0.25, got {}", difference);
        assert!(difference < 0.5, "expected < 0.5, got {}", difference);
    }

    #[test]
    fn test_small_change_stays_below_threshold() {
        let baseline = black_frame(80);
        let mut current = black_frame(80);
        imgproc::rectangle(
            &mut current,
            core::Rect::new(0, 0, 8, 8),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        let difference = frame_difference(&baseline, &current, 30.0).unwrap();
        assert!(difference < 0.25);
    }
}
