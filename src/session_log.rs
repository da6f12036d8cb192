//! Session and catch logging to JSON files under `logs/`

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::utils::bot_state::CycleStats;
use crate::utils::path::get_data_dir;

/// One bot session, with its final counters filled in on stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub start: String,
    pub stop: Option<String>,
    #[serde(default)]
    pub fish_caught: u32,
    #[serde(default)]
    pub qte_success: u32,
    #[serde(default)]
    pub qte_failed: u32,
}

/// One cycle outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchLogEntry {
    pub timestamp: String,
    #[serde(rename = "catch")]
    pub status: bool,
    /// Whether the catch banner was confirmed on screen, when enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_seen: Option<bool>,
}

fn sessions_path() -> PathBuf {
    get_data_dir().join("logs").join("sessions.json")
}

fn catch_log_path() -> PathBuf {
    get_data_dir().join("logs").join("fishing_log.json")
}

fn read_json_vec<T: for<'de> Deserialize<'de>>(path: &PathBuf) -> Vec<T> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

fn write_json_vec<T: Serialize>(path: &PathBuf, data: &[T]) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Ok(content) = serde_json::to_string_pretty(data) {
        let _ = fs::write(path, content);
    }
}

pub fn load_sessions() -> Vec<Session> {
    read_json_vec(&sessions_path())
}

/// Open a new session entry. A previous session left open (crash) is
/// closed without counters first.
pub fn start_session() {
    let mut sessions = load_sessions();

    if let Some(last) = sessions.last_mut() {
        if last.stop.is_none() {
            last.stop = Some(Utc::now().to_rfc3339());
        }
    }

    sessions.push(Session {
        start: Utc::now().to_rfc3339(),
        stop: None,
        fish_caught: 0,
        qte_success: 0,
        qte_failed: 0,
    });

    write_json_vec(&sessions_path(), &sessions);
}

/// Close the current session and store its final counters.
pub fn end_session(stats: &CycleStats) {
    let mut sessions = load_sessions();

    if let Some(last) = sessions.last_mut() {
        if last.stop.is_none() {
            last.stop = Some(Utc::now().to_rfc3339());
            last.fish_caught = stats.fish_caught;
            last.qte_success = stats.qte_success;
            last.qte_failed = stats.qte_failed;
        }
    }

    write_json_vec(&sessions_path(), &sessions);
}

/// Append one cycle outcome to the catch log.
pub fn log_catch(status: bool, banner_seen: Option<bool>) {
    let path = catch_log_path();
    let mut entries: Vec<CatchLogEntry> = read_json_vec(&path);

    entries.push(CatchLogEntry {
        timestamp: Utc::now().to_rfc3339(),
        status,
        banner_seen,
    });

    write_json_vec(&path, &entries);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_entry_serialization() {
        let entry = CatchLogEntry {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            status: true,
            banner_seen: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"catch\":true"));
        // absent banner field is omitted entirely
        assert!(!json.contains("banner_seen"));
    }

    #[test]
    fn test_session_defaults_for_old_entries() {
        let session: Session =
            serde_json::from_str(r#"{"start": "2024-01-01T00:00:00Z", "stop": null}"#).unwrap();
        assert_eq!(session.fish_caught, 0);
    }
}
