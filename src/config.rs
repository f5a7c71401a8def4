//! Optional config file loading. Search order: ./bmmc.toml, then
//! $XDG_CONFIG_HOME/bmmc/config.toml (or ~/.config/bmmc/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults, and
/// command-line flags override both.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Worker threads for batch requests. 1 runs them one by one.
    pub workers: Option<usize>,
    /// Delay in milliseconds between sequential requests.
    pub delay_ms: Option<u64>,
    /// Extra attempts per failed request.
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Comics per listing page.
    pub page_size: Option<u32>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// JSON file of extra request headers (usually a logged-in Cookie).
    pub headers: Option<PathBuf>,
    /// Default output file when -O is not set.
    pub output: Option<PathBuf>,
}

/// Search order: (1) ./bmmc.toml, (2) $XDG_CONFIG_HOME/bmmc/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("bmmc.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("bmmc").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            return Ok(Some(config));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.workers.is_none());
        assert!(c.delay_ms.is_none());
        assert!(c.retries.is_none());
        assert!(c.retry_delay_ms.is_none());
        assert!(c.timeout_secs.is_none());
        assert!(c.page_size.is_none());
        assert!(c.user_agent.is_none());
        assert!(c.headers.is_none());
        assert!(c.output.is_none());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            workers = 8
            delay_ms = 500
            retries = 2
            retry_delay_ms = 250
            timeout_secs = 10
            page_size = 50
            user_agent = "Custom/1.0"
            headers = "headers.json"
            output = "out.csv"
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert_eq!(c.workers, Some(8));
        assert_eq!(c.delay_ms, Some(500));
        assert_eq!(c.retries, Some(2));
        assert_eq!(c.retry_delay_ms, Some(250));
        assert_eq!(c.timeout_secs, Some(10));
        assert_eq!(c.page_size, Some(50));
        assert_eq!(c.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(
            c.headers.as_deref(),
            Some(std::path::Path::new("headers.json"))
        );
        assert_eq!(c.output.as_deref(), Some(std::path::Path::new("out.csv")));
    }

    #[test]
    fn parse_partial_config() {
        let c: Config = toml::from_str("workers = 1").unwrap();
        assert_eq!(c.workers, Some(1));
        assert!(c.delay_ms.is_none());
        assert!(c.output.is_none());
    }

    #[test]
    fn invalid_toml_errors() {
        assert!(toml::from_str::<Config>("workers = [").is_err());
        assert!(toml::from_str::<Config>("workers = -2").is_err());
    }
}
