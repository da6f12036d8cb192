//! QTE circle detection.
//!
//! The minigame shows a fixed red target ring and a shrinking white cursor
//! ring; the click must land when the two coincide. The target is found by
//! red HSV segmentation plus contour analysis, the cursor by a Hough circle
//! transform over a near-white mask. Every frame is analyzed from scratch -
//! there is no tracking between frames.

use std::f64::consts::PI;

use opencv::core::{self, Mat, Point, Point2f, Scalar, Size, Vec3f, Vector};
use opencv::imgproc;
use opencv::prelude::*;

use crate::screen_reader::Region;
use crate::utils::settings::QteSettings;

/// A detected ring. Ephemeral: valid for the frame it was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Circle {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
}

impl Circle {
    pub fn center_distance(&self, other: &Circle) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Hough transform parameters for the cursor ring.
#[derive(Debug, Clone, Copy)]
pub struct HoughParams {
    pub dp: f64,
    pub min_dist: f64,
    pub edge_threshold: f64,
    pub accumulator_threshold: f64,
    pub min_radius: i32,
    pub max_radius: i32,
}

/// Per-resolution detection constants, computed once at construction.
///
/// The alignment tolerances are stored as pixel values derived from
/// fractions of the live screen width, which is what makes the detector
/// resolution independent: double the width and both tolerances double.
#[derive(Debug, Clone)]
pub struct QteConfig {
    pub region: Region,
    pub center_tolerance: f64,
    pub radius_tolerance: f64,
    pub target_lower: [u8; 3],
    pub target_upper: [u8; 3],
    pub target_wrap_lower: [u8; 3],
    pub target_wrap_upper: [u8; 3],
    pub cursor_lower: [u8; 3],
    pub cursor_upper: [u8; 3],
    pub min_contour_area: f64,
    pub min_circularity: f64,
    pub hough: HoughParams,
}

impl QteConfig {
    pub fn for_screen(screen_width: u32, screen_height: u32, s: &QteSettings) -> Self {
        Self {
            region: Region::from_fractions(
                screen_width,
                screen_height,
                s.region_left_frac,
                s.region_top_frac,
                s.region_width_frac,
                s.region_height_frac,
            ),
            center_tolerance: screen_width as f64 * s.center_tolerance_frac,
            radius_tolerance: screen_width as f64 * s.radius_tolerance_frac,
            target_lower: s.target_hsv_lower,
            target_upper: s.target_hsv_upper,
            target_wrap_lower: s.target_wrap_lower,
            target_wrap_upper: s.target_wrap_upper,
            cursor_lower: s.cursor_hsv_lower,
            cursor_upper: s.cursor_hsv_upper,
            min_contour_area: s.min_contour_area,
            min_circularity: s.min_circularity,
            hough: HoughParams {
                dp: s.hough_dp,
                min_dist: s.hough_min_dist,
                edge_threshold: s.hough_edge_threshold,
                accumulator_threshold: s.hough_accumulator_threshold,
                min_radius: s.hough_min_radius,
                max_radius: s.hough_max_radius,
            },
        }
    }
}

/// Detector for the target and cursor rings.
pub struct QteDetector {
    config: QteConfig,
    debug_frame: Option<Mat>,
}

impl QteDetector {
    pub fn new(config: QteConfig) -> Self {
        Self {
            config,
            debug_frame: None,
        }
    }

    pub fn config(&self) -> &QteConfig {
        &self.config
    }

    /// Locate the target and cursor rings in a BGR frame. A missing ring
    /// is `None`, not an error.
    pub fn detect(&mut self, frame: &Mat) -> opencv::Result<(Option<Circle>, Option<Circle>)> {
        let mut hsv = Mat::default();
        imgproc::cvt_color(frame, &mut hsv, imgproc::COLOR_BGR2HSV, 0)?;

        let target = self.detect_target(&hsv)?;
        let cursor = self.detect_cursor(&hsv)?;

        self.debug_frame = Some(draw_overlay(frame, target.as_ref(), cursor.as_ref())?);

        Ok((target, cursor))
    }

    /// Red target ring: two hue bands (red wraps around hue 180), mask
    /// union, close-then-open to kill speckle, then the largest
    /// sufficiently circular external contour.
    fn detect_target(&self, hsv: &Mat) -> opencv::Result<Option<Circle>> {
        let mut low_band = Mat::default();
        core::in_range(
            hsv,
            &scalar(self.config.target_lower),
            &scalar(self.config.target_upper),
            &mut low_band,
        )?;
        let mut wrap_band = Mat::default();
        core::in_range(
            hsv,
            &scalar(self.config.target_wrap_lower),
            &scalar(self.config.target_wrap_upper),
            &mut wrap_band,
        )?;

        let mut mask = Mat::default();
        core::bitwise_or(&low_band, &wrap_band, &mut mask, &core::no_array())?;

        let mask = morphology(&mask, imgproc::MORPH_CLOSE, 5)?;
        let mask = morphology(&mask, imgproc::MORPH_OPEN, 5)?;

        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            &mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let mut best: Option<Circle> = None;
        let mut best_area = 0.0;

        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false)?;
            if area < self.config.min_contour_area {
                continue;
            }

            let perimeter = imgproc::arc_length(&contour, true)?;
            if perimeter <= 0.0 {
                continue;
            }

            // near 1.0 for a clean disc; the floor is permissive because
            // the game's rings render pixelated at low resolutions
            let circularity = 4.0 * PI * area / (perimeter * perimeter);
            if circularity > self.config.min_circularity && area > best_area {
                let mut center = Point2f::default();
                let mut radius = 0f32;
                imgproc::min_enclosing_circle(&contour, &mut center, &mut radius)?;
                best_area = area;
                best = Some(Circle {
                    x: center.x as i32,
                    y: center.y as i32,
                    radius: radius as i32,
                });
            }
        }

        Ok(best)
    }

    /// White cursor ring via Hough transform. The edge threshold is low
    /// and the accumulator moderate so near-circular blobs still register.
    fn detect_cursor(&self, hsv: &Mat) -> opencv::Result<Option<Circle>> {
        let mut mask = Mat::default();
        core::in_range(
            hsv,
            &scalar(self.config.cursor_lower),
            &scalar(self.config.cursor_upper),
            &mut mask,
        )?;

        let mask = morphology(&mask, imgproc::MORPH_CLOSE, 3)?;

        let h = &self.config.hough;
        let mut circles = Vector::<Vec3f>::new();
        imgproc::hough_circles(
            &mask,
            &mut circles,
            imgproc::HOUGH_GRADIENT,
            h.dp,
            h.min_dist,
            h.edge_threshold,
            h.accumulator_threshold,
            h.min_radius,
            h.max_radius,
        )?;

        Ok(circles.get(0).ok().map(|c| Circle {
            x: c[0].round() as i32,
            y: c[1].round() as i32,
            radius: c[2].round() as i32,
        }))
    }

    /// True when both rings are present, their centers coincide within the
    /// center tolerance and their radii match within the radius tolerance.
    /// Pure function of its inputs: identical circles always give the same
    /// answer.
    pub fn is_aligned(&self, target: Option<&Circle>, cursor: Option<&Circle>) -> bool {
        let (Some(target), Some(cursor)) = (target, cursor) else {
            return false;
        };

        let distance = target.center_distance(cursor);
        let radius_diff = (target.radius - cursor.radius).abs() as f64;

        distance < self.config.center_tolerance && radius_diff < self.config.radius_tolerance
    }

    /// Show the last detection overlay in a window.
    pub fn show_debug_window(&self) {
        if let Some(frame) = &self.debug_frame {
            let _ = opencv::highgui::imshow("QTE Detection", frame);
            let _ = opencv::highgui::wait_key(1);
        }
    }
}

fn scalar(hsv: [u8; 3]) -> Scalar {
    Scalar::new(hsv[0] as f64, hsv[1] as f64, hsv[2] as f64, 0.0)
}

fn morphology(mask: &Mat, op: i32, kernel_size: i32) -> opencv::Result<Mat> {
    let kernel = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        Size::new(kernel_size, kernel_size),
        Point::new(-1, -1),
    )?;
    let mut out = Mat::default();
    imgproc::morphology_ex(
        mask,
        &mut out,
        op,
        &kernel,
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;
    Ok(out)
}

fn draw_overlay(
    frame: &Mat,
    target: Option<&Circle>,
    cursor: Option<&Circle>,
) -> opencv::Result<Mat> {
    let mut overlay = frame.clone();

    if let Some(c) = target {
        imgproc::circle(
            &mut overlay,
            Point::new(c.x, c.y),
            c.radius,
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            0,
        )?;
    }
    if let Some(c) = cursor {
        imgproc::circle(
            &mut overlay,
            Point::new(c.x, c.y),
            c.radius,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            0,
        )?;
    }

    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::settings::QteSettings;

    fn config_for_width(width: u32) -> QteConfig {
        QteConfig::for_screen(width, width * 9 / 16, &QteSettings::default())
    }

    fn detector() -> QteDetector {
        QteDetector::new(config_for_width(1920))
    }

    #[test]
    fn test_tolerances_scale_linearly_with_width() {
        for width in [1280u32, 1920, 2560, 3840] {
            let base = config_for_width(width);
            let doubled = config_for_width(width * 2);
            assert!((doubled.center_tolerance - base.center_tolerance * 2.0).abs() < 1e-9);
            assert!((doubled.radius_tolerance - base.radius_tolerance * 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_default_tolerances_at_1080p() {
        let config = config_for_width(1920);
        assert!((config.center_tolerance - 20.0).abs() < 1e-9);
        assert!((config.radius_tolerance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_alignment_missing_ring_is_not_aligned() {
        let d = detector();
        let c = Circle {
            x: 100,
            y: 100,
            radius: 40,
        };
        assert!(!d.is_aligned(None, None));
        assert!(!d.is_aligned(Some(&c), None));
        assert!(!d.is_aligned(None, Some(&c)));
    }

    #[test]
    fn test_alignment_is_deterministic() {
        let d = detector();
        let target = Circle {
            x: 500,
            y: 400,
            radius: 50,
        };
        let cursor = Circle {
            x: 510,
            y: 405,
            radius: 55,
        };
        let first = d.is_aligned(Some(&target), Some(&cursor));
        for _ in 0..10 {
            assert_eq!(d.is_aligned(Some(&target), Some(&cursor)), first);
        }
        assert!(first);
    }

    #[test]
    fn test_alignment_rejects_offset_and_radius_mismatch() {
        let d = detector();
        let target = Circle {
            x: 500,
            y: 400,
            radius: 50,
        };
        // centers too far apart (tolerance is 20px at 1920)
        let far = Circle {
            x: 530,
            y: 400,
            radius: 50,
        };
        assert!(!d.is_aligned(Some(&target), Some(&far)));
        // radii too different (tolerance is 10px at 1920)
        let wrong_size = Circle {
            x: 500,
            y: 400,
            radius: 65,
        };
        assert!(!d.is_aligned(Some(&target), Some(&wrong_size)));
    }

    #[test]
    fn test_detect_finds_red_disc() {
        let mut frame = Mat::new_rows_cols_with_default(
            300,
            300,
            core::CV_8UC3,
            Scalar::new(0.0, 0.0, 0.0, 0.0),
        )
        .unwrap();
        imgproc::circle(
            &mut frame,
            Point::new(150, 150),
            40,
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let mut d = detector();
        let (target, _cursor) = d.detect(&frame).unwrap();
        let target = target.expect("red disc should be detected as the target ring");
        assert!((target.x - 150).abs() <= 2);
        assert!((target.y - 150).abs() <= 2);
        assert!((target.radius - 40).abs() <= 3);
    }

    #[test]
    fn test_detect_empty_frame_finds_nothing() {
        let frame = Mat::new_rows_cols_with_default(
            300,
            300,
            core::CV_8UC3,
            Scalar::new(0.0, 0.0, 0.0, 0.0),
        )
        .unwrap();

        let mut d = detector();
        let (target, cursor) = d.detect(&frame).unwrap();
        assert!(target.is_none());
        assert!(cursor.is_none());
    }
}
