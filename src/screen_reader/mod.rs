//! Screen capture module

pub mod screen_service;

pub use screen_service::{FrameSource, Region, ScreenService};
