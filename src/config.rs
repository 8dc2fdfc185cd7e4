//! Client configuration from environment variables

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://cyraquiz.onrender.com";
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:4100";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the quiz backend (auth, quiz CRUD, PDF generation)
    pub api_url: String,
    /// Relay bridging this client to the real-time server
    pub relay_addr: String,
    pub session_file: PathBuf,
    pub http_timeout: Duration,
}

impl ClientConfig {
    /// Load config from environment variables
    /// CYRAQUIZ_API_URL, CYRAQUIZ_RELAY_ADDR, CYRAQUIZ_SESSION_FILE, CYRAQUIZ_HTTP_TIMEOUT_SECS
    pub fn from_env() -> Self {
        let api_url = env_non_empty("CYRAQUIZ_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let relay_addr =
            env_non_empty("CYRAQUIZ_RELAY_ADDR").unwrap_or_else(|| DEFAULT_RELAY_ADDR.to_string());

        let session_file = env_non_empty("CYRAQUIZ_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(default_session_file);

        let http_timeout_secs = match env_non_empty("CYRAQUIZ_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    tracing::warn!(
                        "Invalid CYRAQUIZ_HTTP_TIMEOUT_SECS '{}', using {}",
                        raw,
                        DEFAULT_HTTP_TIMEOUT_SECS
                    );
                    DEFAULT_HTTP_TIMEOUT_SECS
                }
            },
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Self {
            api_url,
            relay_addr,
            session_file,
            http_timeout: Duration::from_secs(http_timeout_secs),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cyraquiz")
        .join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 4] = [
        "CYRAQUIZ_API_URL",
        "CYRAQUIZ_RELAY_ADDR",
        "CYRAQUIZ_SESSION_FILE",
        "CYRAQUIZ_HTTP_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ClientConfig::from_env();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.relay_addr, DEFAULT_RELAY_ADDR);
        assert!(config.session_file.ends_with("cyraquiz/session.json"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("CYRAQUIZ_API_URL", "http://localhost:3000/");
        std::env::set_var("CYRAQUIZ_RELAY_ADDR", "10.0.0.2:9000");
        std::env::set_var("CYRAQUIZ_SESSION_FILE", "/tmp/s.json");
        std::env::set_var("CYRAQUIZ_HTTP_TIMEOUT_SECS", "5");

        let config = ClientConfig::from_env();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.relay_addr, "10.0.0.2:9000");
        assert_eq!(config.session_file, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_falls_back() {
        clear_env();
        std::env::set_var("CYRAQUIZ_HTTP_TIMEOUT_SECS", "soon");
        assert_eq!(ClientConfig::from_env().http_timeout, Duration::from_secs(30));

        std::env::set_var("CYRAQUIZ_HTTP_TIMEOUT_SECS", "0");
        assert_eq!(ClientConfig::from_env().http_timeout, Duration::from_secs(30));
        clear_env();
    }
}
