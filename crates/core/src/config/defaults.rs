//! Default values and functions for configuration

pub(crate) const DEFAULT_WATCH_PATH: &str = "./incoming";
pub(crate) const DEFAULT_FILE_PATTERN: &str = r"^test_\d+\.txt$";
pub(crate) const DEFAULT_DATABASE_PATH: &str = "./dropwatch.db";
pub(crate) const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_LOG_LEVEL: &str = "info";

/// Name of the config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "dropwatch.toml";

pub(crate) fn default_watch_path() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_WATCH_PATH)
}

pub(crate) fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

pub(crate) fn default_init_retries() -> u32 {
    3
}

pub(crate) fn default_init_retry_delay_ms() -> u64 {
    1000
}

pub(crate) fn default_check_interval_ms() -> u64 {
    2000
}

pub(crate) fn default_max_checks() -> u32 {
    5
}

pub(crate) fn default_max_concurrent_checks() -> usize {
    64
}

pub(crate) fn default_max_attempts() -> u32 {
    3
}

pub(crate) fn default_retry_delays_ms() -> Vec<u64> {
    vec![1000, 3000, 5000]
}

pub(crate) fn default_encodings() -> Vec<String> {
    ["utf-8", "cp1251", "windows-1251", "latin-1", "iso-8859-1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn default_database_path() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_DATABASE_PATH)
}

pub(crate) fn default_max_connections() -> u32 {
    5
}

pub(crate) fn default_server_enabled() -> bool {
    true
}

pub(crate) fn default_server_host() -> String {
    DEFAULT_SERVER_HOST.to_string()
}

pub(crate) fn default_server_port() -> u16 {
    8000
}

pub(crate) fn default_recent_limit() -> usize {
    20
}

pub(crate) fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
