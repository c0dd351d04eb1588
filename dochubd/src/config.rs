use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings of the daemon, read from the environment after
/// `dotenvy` has loaded any `.env` file.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: Option<PathBuf>,
    pub bridge_url: String,
    pub api_base: Option<String>,
    pub api_token: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub bridge_probe_timeout: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: read_env("DOCHUB_DB").map(PathBuf::from),
            bridge_url: read_env("DOCHUB_BRIDGE_URL")
                .unwrap_or_else(|| dochub_bridge::DEFAULT_BASE_URL.to_string()),
            api_base: read_env("DOCHUB_API_BASE"),
            api_token: read_env("DOCHUB_API_TOKEN"),
            poll_interval: Duration::from_millis(read_u64_env("DOCHUB_POLL_INTERVAL_MS", 500)),
            poll_timeout: Duration::from_secs(read_u64_env("DOCHUB_POLL_TIMEOUT_SECS", 600)),
            bridge_probe_timeout: Duration::from_millis(read_u64_env(
                "DOCHUB_BRIDGE_PROBE_TIMEOUT_MS",
                1500,
            )),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    parse_positive_u64(std::env::var(name).ok(), default)
}

fn parse_positive_u64(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_u64_parsing_falls_back() {
        assert_eq!(parse_positive_u64(Some("750".to_string()), 500), 750);
        assert_eq!(parse_positive_u64(Some(" 250 ".to_string()), 500), 250);
        assert_eq!(parse_positive_u64(Some("0".to_string()), 500), 500);
        assert_eq!(parse_positive_u64(Some("-3".to_string()), 500), 500);
        assert_eq!(parse_positive_u64(Some("abc".to_string()), 500), 500);
        assert_eq!(parse_positive_u64(None, 500), 500);
    }
}
