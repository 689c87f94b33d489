use std::path::PathBuf;

/// Resolve the Cadenza home directory.
///
/// Priority:
/// 1) CADENZA_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.cadenza
pub fn cadenza_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("CADENZA_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".cadenza");
    }
    PathBuf::from(".").join(".cadenza")
}

/// Default logs directory: ~/.cadenza/logs
pub fn default_logs_dir() -> PathBuf {
    cadenza_home().join("logs")
}

/// Default configuration file: ~/.cadenza/config.toml
pub fn default_config_path() -> PathBuf {
    cadenza_home().join("config.toml")
}
