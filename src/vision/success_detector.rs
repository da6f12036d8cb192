//! Catch-banner detection.
//!
//! After a successful QTE sequence the game shows a cyan catch message in
//! the upper-center of the screen, and a copy in the chat log. This check
//! is purely confirmatory: the cycle outcome never depends on it.

use opencv::core::{self, Mat, Rect, Scalar};
use opencv::imgproc;
use opencv::prelude::*;

use crate::utils::settings::BannerSettings;

pub struct SuccessDetector {
    settings: BannerSettings,
}

impl SuccessDetector {
    pub fn new(settings: BannerSettings) -> Self {
        Self { settings }
    }

    /// True if the catch banner (or its chat copy) is visible in the frame.
    pub fn is_catch_banner_visible(&self, frame: &Mat) -> bool {
        let s = &self.settings;

        match color_ratio_in_region(frame, s.region_x_frac, s.region_y_frac, s.hsv_lower, s.hsv_upper)
        {
            Ok(ratio) if ratio > s.min_ratio => return true,
            Ok(_) => {}
            Err(e) => tracing::debug!("[BANNER] Region check failed: {}", e),
        }

        // chat copy is smaller text, so its ratio floor is lower
        match color_ratio_in_region(frame, s.chat_x_frac, s.chat_y_frac, s.hsv_lower, s.hsv_upper) {
            Ok(ratio) => ratio > s.chat_min_ratio,
            Err(e) => {
                tracing::debug!("[BANNER] Chat check failed: {}", e);
                false
            }
        }
    }
}

/// Fraction of pixels inside a fractional sub-region that fall in an HSV
/// range.
fn color_ratio_in_region(
    frame: &Mat,
    x_frac: (f64, f64),
    y_frac: (f64, f64),
    hsv_lower: [u8; 3],
    hsv_upper: [u8; 3],
) -> opencv::Result<f64> {
    let width = frame.cols();
    let height = frame.rows();

    let x1 = (width as f64 * x_frac.0) as i32;
    let x2 = (width as f64 * x_frac.1) as i32;
    let y1 = (height as f64 * y_frac.0) as i32;
    let y2 = (height as f64 * y_frac.1) as i32;

    let rect = Rect::new(x1, y1, (x2 - x1).max(1), (y2 - y1).max(1));
    let roi = Mat::roi(frame, rect)?;

    let mut hsv = Mat::default();
    imgproc::cvt_color(&roi, &mut hsv, imgproc::COLOR_BGR2HSV, 0)?;

    let mut mask = Mat::default();
    core::in_range(
        &hsv,
        &Scalar::new(hsv_lower[0] as f64, hsv_lower[1] as f64, hsv_lower[2] as f64, 0.0),
        &Scalar::new(hsv_upper[0] as f64, hsv_upper[1] as f64, hsv_upper[2] as f64, 0.0),
        &mut mask,
    )?;

    let total = (mask.rows() * mask.cols()) as f64;
    Ok(core::count_non_zero(&mask)? as f64 / total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_frame() -> Mat {
        Mat::new_rows_cols_with_default(200, 200, core::CV_8UC3, Scalar::new(0.0, 0.0, 0.0, 0.0))
            .unwrap()
    }

    #[test]
    fn test_black_frame_has_no_banner() {
        let detector = SuccessDetector::new(BannerSettings::default());
        assert!(!detector.is_catch_banner_visible(&black_frame()));
    }

    #[test]
    fn test_cyan_block_in_banner_region_is_detected() {
        let mut frame = black_frame();
        // cyan in BGR, landing inside the default banner region
        imgproc::rectangle(
            &mut frame,
            Rect::new(80, 50, 40, 20),
            Scalar::new(255.0, 255.0, 0.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let detector = SuccessDetector::new(BannerSettings::default());
        assert!(detector.is_catch_banner_visible(&frame));
    }
}
