//! Data directory resolution

use std::env;
use std::path::PathBuf;

/// Returns the folder where config and log files live.
/// A bundled executable keeps its `config/` folder next to the binary;
/// otherwise the current working directory is used.
pub fn get_data_dir() -> PathBuf {
    if let Ok(exe_path) = env::current_exe() {
        if let Some(parent) = exe_path.parent() {
            if parent.join("config").exists() {
                return parent.to_path_buf();
            }
        }
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir() {
        let dir = get_data_dir();
        assert!(dir.exists() || dir == PathBuf::from("."));
    }
}
