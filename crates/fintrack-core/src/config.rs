//! Environment-driven settings shared by the server and the CLI

use std::path::PathBuf;

pub const REPORTS_DIR_ENV: &str = "FINTRACK_REPORTS_DIR";
pub const PUBLIC_URL_ENV: &str = "FINTRACK_PUBLIC_URL";
pub const COMPANY_NAME_ENV: &str = "FINTRACK_COMPANY_NAME";
pub const DUE_WINDOW_ENV: &str = "FINTRACK_DUE_WINDOW_DAYS";

pub const DEFAULT_COMPANY_NAME: &str = "Fintrack Solutions";
pub const DEFAULT_DUE_WINDOW_DAYS: i64 = 30;

/// Base directory for local data (`~/.local/share/fintrack` on Linux)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fintrack")
}

/// Read a non-empty environment variable
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable, falling back to `default` if unset or invalid
pub fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Where generated reports are written
pub fn reports_dir() -> PathBuf {
    env_var(REPORTS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_data_dir().join("reports"))
}

pub fn company_name() -> String {
    env_var(COMPANY_NAME_ENV).unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string())
}

pub fn due_window_days() -> i64 {
    env_parse(DUE_WINDOW_ENV, DEFAULT_DUE_WINDOW_DAYS).max(0)
}

/// Base URL for absolute links to generated documents
pub fn public_url() -> Option<String> {
    env_var(PUBLIC_URL_ENV).map(|u| u.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_falls_back() {
        assert_eq!(env_parse("FINTRACK_TEST_UNSET_VARIABLE", 7i64), 7);
        assert!(env_var("FINTRACK_TEST_UNSET_VARIABLE").is_none());
    }

    #[test]
    fn test_default_data_dir_is_namespaced() {
        assert!(default_data_dir().ends_with("fintrack"));
    }
}
