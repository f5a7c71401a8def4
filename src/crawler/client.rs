//! Blocking HTTP client for the manga API: browser User-Agent, a fresh `buvid3` cookie,
//! optional extra headers from a JSON file, and a short timeout.

use super::error::CrawlerError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Shared, thread-safe client. Holds no per-request state, so one instance serves every
/// worker of a batch (wrap it in an `Arc`).
#[derive(Debug, Clone)]
pub struct MangaClient {
    inner: reqwest::blocking::Client,
}

impl MangaClient {
    pub fn new() -> Result<Self, CrawlerError> {
        Self::builder().build()
    }

    pub fn builder() -> MangaClientBuilder {
        MangaClientBuilder::default()
    }

    /// POST a form and return the response's `data` member (`Null` when absent).
    pub fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<Value, CrawlerError> {
        tracing::debug!(url, "POST");
        let response = self
            .inner
            .post(url)
            .form(form)
            .send()
            .map_err(|e| CrawlerError::Network {
                url: url.to_string(),
                source: e,
            })?;
        read_data(response, url)
    }

    /// GET and return the response's `data` member (`Null` when absent).
    pub fn get_json(&self, url: &str) -> Result<Value, CrawlerError> {
        tracing::debug!(url, "GET");
        let response = self.inner.get(url).send().map_err(|e| CrawlerError::Network {
            url: url.to_string(),
            source: e,
        })?;
        read_data(response, url)
    }
}

/// Check status and decode the JSON envelope.
fn read_data(response: reqwest::blocking::Response, url: &str) -> Result<Value, CrawlerError> {
    let status = response.status();
    if status.as_u16() == 401 {
        return Err(CrawlerError::Unauthorized {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(CrawlerError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let body = response.text().map_err(|e| CrawlerError::Network {
        url: url.to_string(),
        source: e,
    })?;
    parse_envelope(&body, url)
}

/// Extract `data` from `{"code": .., "msg": .., "data": ..}`.
pub(crate) fn parse_envelope(body: &str, url: &str) -> Result<Value, CrawlerError> {
    let mut envelope: Value = serde_json::from_str(body).map_err(|e| CrawlerError::Decode {
        url: url.to_string(),
        source: e,
    })?;
    Ok(envelope
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

/// Read a JSON object of header name → value. Typically carries a logged-in `Cookie`.
pub fn load_headers_file(path: &Path) -> Result<Vec<(String, String)>, CrawlerError> {
    let text = std::fs::read_to_string(path).map_err(|e| CrawlerError::HeadersFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_headers(&text).map_err(|reason| CrawlerError::InvalidHeaders {
        path: path.to_path_buf(),
        reason,
    })
}

fn parse_headers(text: &str) -> Result<Vec<(String, String)>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;
    object
        .iter()
        .map(|(name, value)| match value {
            Value::String(s) => Ok((name.clone(), s.clone())),
            other => Err(format!("header {} has non-string value {}", name, other)),
        })
        .collect()
}

/// `buvid3=<uuid>infoc;`, the anonymous device cookie the site expects.
fn device_cookie() -> String {
    format!("buvid3={}infoc;", uuid::Uuid::new_v4())
}

/// Builder for [MangaClient].
#[derive(Debug)]
pub struct MangaClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
    extra_headers: Vec<(String, String)>,
}

impl Default for MangaClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            extra_headers: Vec::new(),
        }
    }
}

impl MangaClientBuilder {
    /// Set a custom User-Agent. If not set, a desktop Chrome string is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Per-request timeout in seconds. Default 5.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Extra headers sent with every request; they override the defaults, including the
    /// generated cookie.
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers;
        self
    }

    pub fn build(self) -> Result<MangaClient, CrawlerError> {
        let default_headers = self.header_map()?;
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .default_headers(default_headers)
            .timeout(Duration::from_secs(self.timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| CrawlerError::Client { source: e })?;
        Ok(MangaClient { inner })
    }

    fn header_map(&self) -> Result<HeaderMap, CrawlerError> {
        let mut map = HeaderMap::new();
        let cookie = HeaderValue::from_str(&device_cookie()).map_err(|e| {
            CrawlerError::InvalidHeaders {
                path: "<generated>".into(),
                reason: e.to_string(),
            }
        })?;
        map.insert(COOKIE, cookie);
        for (name, value) in &self.extra_headers {
            let invalid = |reason: String| CrawlerError::InvalidHeaders {
                path: "--headers".into(),
                reason,
            };
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(format!("{}: {}", name, e)))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| invalid(format!("{}: {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn envelope_data_extracted() {
        let data = parse_envelope(r#"{"code":0,"msg":"","data":{"id":1}}"#, "u").unwrap();
        assert_eq!(data["id"], 1);
    }

    #[test]
    fn envelope_without_data_is_null() {
        assert!(parse_envelope(r#"{"code":0}"#, "u").unwrap().is_null());
    }

    #[test]
    fn envelope_invalid_json_is_decode_error() {
        assert!(matches!(
            parse_envelope("<html>", "u"),
            Err(CrawlerError::Decode { .. })
        ));
    }

    #[test]
    fn headers_file_parsed_and_validated() -> Result<(), Box<dyn std::error::Error>> {
        let mut f = tempfile::NamedTempFile::new()?;
        write!(f, r#"{{"Cookie": "SESSDATA=abc;", "Referer": "https://manga.bilibili.com"}}"#)?;
        let headers = load_headers_file(f.path())?;
        assert_eq!(headers.len(), 2);
        assert!(headers.contains(&("Cookie".to_string(), "SESSDATA=abc;".to_string())));
        Ok(())
    }

    #[test]
    fn headers_file_rejects_non_object() {
        assert!(parse_headers("[1,2]").is_err());
        assert!(parse_headers(r#"{"X-Num": 3}"#).is_err());
        assert!(parse_headers("not json").is_err());
    }

    #[test]
    fn user_cookie_overrides_generated_one() -> Result<(), CrawlerError> {
        let builder = MangaClient::builder().headers(vec![(
            "Cookie".to_string(),
            "SESSDATA=xyz;".to_string(),
        )]);
        let map = builder.header_map()?;
        assert_eq!(
            map.get(COOKIE).and_then(|v| v.to_str().ok()),
            Some("SESSDATA=xyz;")
        );
        Ok(())
    }

    #[test]
    fn generated_cookie_has_device_shape() {
        let cookie = device_cookie();
        assert!(cookie.starts_with("buvid3="));
        assert!(cookie.ends_with("infoc;"));
    }

    #[test]
    fn invalid_header_name_rejected() {
        let builder =
            MangaClient::builder().headers(vec![("bad header".to_string(), "v".to_string())]);
        assert!(matches!(
            builder.header_map(),
            Err(CrawlerError::InvalidHeaders { .. })
        ));
    }
}
