//! Auto Angler - automatic Minecraft fishing bot.
//!
//! Casts the line, listens for the bobber splash on the system audio output
//! (or watches the screen as a fallback), reels in and clears the QTE
//! circle sequence with timed clicks. Runs until the stop hotkey, the
//! emergency stop or the configured catch ceiling.

use std::env;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use global_hotkey::{hotkey::HotKey, GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

use auto_angler::audio::SoundDetector;
use auto_angler::bot::{BiteDetector, FishingBot};
use auto_angler::input::MouseActuator;
use auto_angler::screen_reader::{FrameSource, ScreenService};
use auto_angler::session_log;
use auto_angler::utils::bot_state::{BotActivity, SharedBotState};
use auto_angler::utils::keybinds::string_to_code;
use auto_angler::utils::path::get_data_dir;
use auto_angler::utils::settings::{DetectionMode, Settings};
use auto_angler::vision::{FishDetector, QteConfig, QteDetector};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = env::args().collect();

    let exit_code = match args.get(1).map(String::as_str) {
        Some("calibrate") => run_calibration(parse_secs(args.get(2), 10.0)),
        Some("test-audio") => run_audio_test(parse_secs(args.get(2), 30.0)),
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            1
        }
        None => run_bot(),
    };

    process::exit(exit_code);
}

fn parse_secs(arg: Option<&String>, default: f64) -> Duration {
    let secs = arg.and_then(|s| s.parse::<f64>().ok()).unwrap_or(default);
    Duration::from_secs_f64(secs)
}

fn print_usage() {
    println!("Usage:");
    println!("  auto-angler                  Run the fishing bot");
    println!("  auto-angler calibrate [secs] Measure ambient noise, recommend a threshold");
    println!("  auto-angler test-audio [secs] Print splash detections in real time");
}

/// Set up tracing with a file layer under `debug/log` plus stdout.
fn init_logging() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    const LOG_FILTER: &str = "info,auto_angler=info";

    let log_dir = get_data_dir().join("debug").join("log");
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file_path = log_dir.join("debug.log");
    let file_result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LOG_FILTER));

    match file_result {
        Ok(file) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE);

            let stdout_layer = tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(stdout_layer)
                .init();

            tracing::info!("[INIT] Logging initialized, file: {:?}", log_file_path);
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(LOG_FILTER))
                .init();
            eprintln!(
                "[INIT] Failed to create debug log file at {:?}: {}",
                log_file_path, e
            );
        }
    }
}

fn print_banner() {
    println!("==================================================");
    println!("       Auto Angler {} - Minecraft fishing bot", APP_VERSION);
    println!("       QTE timing + audio splash detection");
    println!("==================================================");
    println!();
}

fn print_instructions(settings: &Settings) {
    println!("Instructions:");
    println!("  1. Launch Minecraft and join your server");
    println!("  2. Equip your fishing rod and face the water");
    println!("  3. Press {} to start/stop the bot", settings.start_key);
    println!("  4. Press {} for an emergency stop", settings.emergency_stop_key);
    println!();

    match settings.detection_mode {
        DetectionMode::Audio => {
            println!("Bite detection: AUDIO (make sure the game sound is on!)");
            println!("  Tune the threshold with: auto-angler calibrate");
        }
        DetectionMode::Visual => {
            println!("Bite detection: VISUAL (frame differencing)");
        }
    }

    if settings.safety.auto_stop_after > 0 {
        println!("Auto-stop after {} fish", settings.safety.auto_stop_after);
    }
    println!();
}

/// Construct every component once and hand them to the controller.
/// Resource-acquisition failures here are the only fatal errors.
fn build_bot(settings: Settings, state: Arc<SharedBotState>) -> Result<FishingBot> {
    let mut frames = ScreenService::new();
    let (width, height) = frames
        .screen_size()
        .context("Failed to query the primary display")?;
    tracing::info!("[INIT] Screen resolution: {}x{}", width, height);

    let qte = QteDetector::new(QteConfig::for_screen(width, height, &settings.qte));

    let bite: Box<dyn BiteDetector> = match settings.detection_mode {
        DetectionMode::Audio => {
            let mut detector = SoundDetector::new(settings.audio.clone());
            detector
                .start()
                .context("Audio loopback capture failed to start")?;
            Box::new(detector)
        }
        DetectionMode::Visual => Box::new(FishDetector::new(
            Box::new(ScreenService::new()),
            settings.bite.clone(),
            None,
        )),
    };

    let actuator = Box::new(MouseActuator::new(state.clone()));

    Ok(FishingBot::new(
        Box::new(frames),
        qte,
        bite,
        actuator,
        settings,
        state,
    ))
}

/// Register the start and emergency hotkeys and spawn the listener thread.
/// The manager must outlive the registrations, so it is returned.
fn setup_hotkeys(settings: &Settings, state: Arc<SharedBotState>) -> Result<GlobalHotKeyManager> {
    let manager =
        GlobalHotKeyManager::new().map_err(|e| anyhow::anyhow!("Hotkey manager failed: {}", e))?;

    let start_code = string_to_code(&settings.start_key)
        .with_context(|| format!("Invalid start key: {}", settings.start_key))?;
    let emergency_code = string_to_code(&settings.emergency_stop_key)
        .with_context(|| format!("Invalid emergency stop key: {}", settings.emergency_stop_key))?;

    let start_hotkey = HotKey::new(None, start_code);
    let emergency_hotkey = HotKey::new(None, emergency_code);

    manager
        .register(start_hotkey)
        .map_err(|e| anyhow::anyhow!("Failed to register start hotkey: {}", e))?;
    manager
        .register(emergency_hotkey)
        .map_err(|e| anyhow::anyhow!("Failed to register emergency hotkey: {}", e))?;

    thread::spawn(move || {
        let receiver = GlobalHotKeyEvent::receiver();
        loop {
            if let Ok(event) = receiver.recv() {
                if event.state != HotKeyState::Pressed {
                    continue;
                }
                if event.id == start_hotkey.id() {
                    let running = !state.is_running();
                    state.set_running(running);
                    println!("{}", if running { "Start key pressed" } else { "Stop key pressed" });
                } else if event.id == emergency_hotkey.id() {
                    println!("Emergency stop key pressed!");
                    state.trigger_emergency_stop();
                }
            }
        }
    });

    Ok(manager)
}

fn wait_for_start(state: &SharedBotState, settings: &Settings) -> bool {
    state.set_activity(BotActivity::WaitingForStart);
    println!("Press {} to start...", settings.start_key);

    while !state.is_running() {
        if state.is_emergency_stopped() {
            return false;
        }
        thread::sleep(Duration::from_millis(100));
    }

    println!("Starting in 3 seconds...");
    for i in (1..=3).rev() {
        println!("{}...", i);
        thread::sleep(Duration::from_secs(1));
    }
    true
}

fn run_bot() -> i32 {
    init_logging();
    print_banner();

    let settings = Settings::load();
    print_instructions(&settings);

    let state = Arc::new(SharedBotState::new());

    let _hotkey_manager = match setup_hotkeys(&settings, state.clone()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Initialization failed: {:#}", e);
            return 1;
        }
    };

    let mut bot = match build_bot(settings.clone(), state.clone()) {
        Ok(bot) => bot,
        Err(e) => {
            eprintln!("Initialization failed: {:#}", e);
            if settings.detection_mode == DetectionMode::Audio {
                print_audio_hints();
            }
            return 1;
        }
    };

    if !wait_for_start(&state, &settings) {
        println!("Stopped before starting. Goodbye!");
        return 0;
    }

    session_log::start_session();
    bot.run();
    session_log::end_session(&state.stats());

    println!("Goodbye!");
    0
}

fn print_audio_hints() {
    eprintln!("Check that:");
    eprintln!("  1. The system has an active audio output device");
    eprintln!("  2. The system sound is not muted");
    eprintln!("  3. The game's sound is audible on the default output");
    eprintln!("Or switch to visual detection: \"detection_mode\": \"visual\"");
}

fn run_calibration(duration: Duration) -> i32 {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .init();

    println!("AUDIO THRESHOLD CALIBRATION");
    println!("==================================================");
    println!("Stay silent: measuring ambient noise for {:.0}s...", duration.as_secs_f64());
    println!();

    let settings = Settings::load();
    let mut detector = SoundDetector::new(settings.audio);

    match detector.calibrate(duration) {
        Ok(report) => {
            println!("Calibration results:");
            println!("  Mean noise:   {:.6}", report.mean);
            println!("  Max noise:    {:.6}", report.max);
            println!("  Std dev:      {:.6}", report.std_dev);
            println!("  Recommended:  {:.6}", report.recommended_threshold);
            println!();
            println!("Put this in config/settings.json:");
            println!(
                "  \"audio\": {{ \"rms_threshold\": {:.6} }}",
                report.recommended_threshold
            );
            0
        }
        Err(e) => {
            eprintln!("Calibration failed: {}", e);
            print_audio_hints();
            1
        }
    }
}

fn run_audio_test(duration: Duration) -> i32 {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .init();

    println!("AUDIO DETECTION TEST");
    println!("==================================================");
    println!("Listening for {:.0}s - make some noise or cast a line!", duration.as_secs_f64());
    println!();

    let settings = Settings::load();
    let mut detector = SoundDetector::new(settings.audio);

    match detector.test_detection(duration) {
        Ok(count) => {
            println!();
            println!("Test finished: {} detections in {:.0}s", count, duration.as_secs_f64());
            0
        }
        Err(e) => {
            eprintln!("Audio test failed: {}", e);
            print_audio_hints();
            1
        }
    }
}
