//! Auto Angler - automatic Minecraft fishing bot.
//!
//! Watches the screen for the QTE circles and listens to the system audio
//! output for the bobber splash, then drives the fishing minigame with
//! synthetic mouse clicks.

pub mod audio;
pub mod bot;
pub mod input;
pub mod screen_reader;
pub mod session_log;
pub mod utils;
pub mod vision;

// Re-exports for convenience
pub use audio::{AudioError, SoundDetector};
pub use bot::{BiteDetector, FishingBot};
pub use input::{Actuator, MouseActuator};
pub use screen_reader::{FrameSource, Region, ScreenService};
pub use utils::bot_state::{BotActivity, CycleStats, RunState, SharedBotState};
pub use utils::settings::{DetectionMode, MouseButton, Settings};
pub use vision::{Circle, FishDetector, QteConfig, QteDetector, SuccessDetector};
