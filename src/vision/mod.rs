//! Visual detectors: QTE rings, bite frame-differencing, catch banner

pub mod fish_detector;
pub mod qte_detector;
pub mod success_detector;

pub use fish_detector::{frame_difference, FishDetector};
pub use qte_detector::{Circle, HoughParams, QteConfig, QteDetector};
pub use success_detector::SuccessDetector;
