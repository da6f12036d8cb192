//! Screen capture service producing BGR frames for the detectors

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbaImage;
use opencv::core::{Mat, CV_8UC4};
use opencv::imgproc;
use opencv::prelude::*;
use screenshots::Screen;

/// Rectangle on the screen, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Derive a region from fractions of a screen size.
    pub fn from_fractions(
        screen_width: u32,
        screen_height: u32,
        left_frac: f64,
        top_frac: f64,
        width_frac: f64,
        height_frac: f64,
    ) -> Self {
        Self {
            left: (screen_width as f64 * left_frac) as i32,
            top: (screen_height as f64 * top_frac) as i32,
            width: (screen_width as f64 * width_frac) as u32,
            height: (screen_height as f64 * height_frac) as u32,
        }
    }
}

/// Source of screen frames. `None` region means the full primary display.
///
/// The production implementation is [`ScreenService`]; tests feed the
/// detectors and the cycle controller scripted frames instead.
pub trait FrameSource {
    /// Capture a BGR (8-bit, 3-channel) frame.
    fn capture(&mut self, region: Option<Region>) -> Result<Mat>;

    /// Size of the primary display in pixels.
    fn screen_size(&mut self) -> Result<(u32, u32)>;
}

/// Captures the primary display through the `screenshots` crate and hands
/// out OpenCV BGR mats.
pub struct ScreenService {
    retries: u32,
    retry_delay: Duration,
}

impl ScreenService {
    pub fn new() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }

    fn primary_screen() -> Result<Screen> {
        let screens = Screen::all().context("Failed to enumerate screens")?;
        screens
            .into_iter()
            .next()
            .context("No screens found - is a display connected?")
    }

    fn capture_once(&self, region: Option<Region>) -> Result<Mat> {
        let screen = Self::primary_screen()?;

        let image = match region {
            Some(r) => screen
                .capture_area(r.left, r.top, r.width, r.height)
                .context("Failed to capture screen region")?,
            None => screen.capture().context("Failed to capture screen")?,
        };

        let rgba = RgbaImage::from_raw(image.width(), image.height(), image.to_vec())
            .context("Capture buffer does not match its reported dimensions")?;
        rgba_to_bgr_mat(&rgba)
    }
}

impl FrameSource for ScreenService {
    fn capture(&mut self, region: Option<Region>) -> Result<Mat> {
        let mut last_err = None;
        for attempt in 0..self.retries {
            match self.capture_once(region) {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    tracing::warn!(
                        "Screenshot failed: {}. Retrying ({}/{})",
                        e,
                        attempt + 1,
                        self.retries
                    );
                    last_err = Some(e);
                    thread::sleep(self.retry_delay);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("screen capture failed")))
    }

    fn screen_size(&mut self) -> Result<(u32, u32)> {
        let screen = Self::primary_screen()?;
        let info = screen.display_info;
        Ok((
            (info.width as f32 * info.scale_factor) as u32,
            (info.height as f32 * info.scale_factor) as u32,
        ))
    }
}

impl Default for ScreenService {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a captured RGBA image to a BGR Mat.
fn rgba_to_bgr_mat(image: &RgbaImage) -> Result<Mat> {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let data = image.as_raw();
    let step = width as usize * 4;

    let rgba = unsafe {
        Mat::new_rows_cols_with_data_unsafe(
            height,
            width,
            CV_8UC4,
            data.as_ptr() as *mut std::ffi::c_void,
            step,
        )
        .context("Failed to wrap capture buffer")?
    };

    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgba, &mut bgr, imgproc::COLOR_RGBA2BGR, 0)
        .context("Failed to convert RGBA capture to BGR")?;
    Ok(bgr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_fractions() {
        let r = Region::from_fractions(1920, 1080, 0.25, 0.18, 0.50, 0.65);
        assert_eq!(r.left, 480);
        assert_eq!(r.top, 194);
        assert_eq!(r.width, 960);
        assert_eq!(r.height, 702);
    }

    #[test]
    fn test_rgba_to_bgr_mat() {
        // 2x1 image: one red pixel, one blue pixel (RGBA)
        let data = vec![255u8, 0, 0, 255, 0, 0, 255, 255];
        let rgba = RgbaImage::from_raw(2, 1, data).unwrap();
        let mat = rgba_to_bgr_mat(&rgba).unwrap();
        assert_eq!(mat.rows(), 1);
        assert_eq!(mat.cols(), 2);
        assert_eq!(mat.channels(), 3);

        let red = *mat.at_2d::<opencv::core::Vec3b>(0, 0).unwrap();
        assert_eq!(red.0, [0, 0, 255]); // BGR
        let blue = *mat.at_2d::<opencv::core::Vec3b>(0, 1).unwrap();
        assert_eq!(blue.0, [255, 0, 0]);
    }
}
