use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct KickmatesConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub paths: KickmatesPaths,
}

impl KickmatesConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("KICKMATES_HOME") {
            Ok(raw) if !raw.trim().is_empty() => KickmatesPaths::from_base_dir(raw.trim()),
            _ => KickmatesPaths::discover()?,
        };
        let api_url = env::var("KICKMATES_API_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout_secs = env::var("KICKMATES_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(api_url, Duration::from_secs(timeout_secs), paths)
    }

    pub fn new(api_url: impl Into<String>, timeout: Duration, paths: KickmatesPaths) -> Result<Self> {
        Ok(Self {
            api_url: sanitize_base_url(api_url.into())?,
            timeout,
            paths,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct KickmatesPaths {
    pub base: PathBuf,
    pub session_file: PathBuf,
}

impl KickmatesPaths {
    pub fn discover() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow!("no config directory available; set KICKMATES_HOME"))?
            .join("kickmates");
        Ok(Self::from_base_dir(base))
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref().to_path_buf();
        let session_file = base.join("session.json");
        Self { base, session_file }
    }
}

/// Adds a scheme when missing and strips trailing slashes so paths can be
/// appended directly.
pub fn sanitize_base_url(mut base: String) -> Result<String> {
    base = base.trim().to_string();
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base = format!("http://{base}");
    }
    while base.ends_with('/') {
        base.pop();
    }
    Url::parse(&base).with_context(|| format!("invalid API URL '{base}'"))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        assert_eq!(
            sanitize_base_url("localhost:5000/api/".into()).expect("url"),
            "http://localhost:5000/api"
        );
        assert_eq!(
            sanitize_base_url("https://kickmates.example//".into()).expect("url"),
            "https://kickmates.example"
        );
        assert!(sanitize_base_url("http://exa mple".into()).is_err());
    }

    #[test]
    fn paths_hang_off_base_dir() {
        let paths = KickmatesPaths::from_base_dir("/tmp/kick");
        assert_eq!(paths.session_file, PathBuf::from("/tmp/kick/session.json"));
    }

    #[test]
    fn explicit_config_keeps_timeout() {
        let config = KickmatesConfig::new(
            "127.0.0.1:9000",
            Duration::from_secs(3),
            KickmatesPaths::from_base_dir("/tmp/kick"),
        )
        .expect("config");
        assert_eq!(config.api_url, "http://127.0.0.1:9000");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
