// src/translate/providers.rs
//! Translation backends. Each one knows its request shape and where the
//! translated text lives in the response; retry, cache and pacing are shared.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use super::transport::{HttpRequest, Method};

pub const MYMEMORY_ENDPOINT: &str = "https://api.mymemory.translated.net/get";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Returns the input unchanged.
    Null,
    /// Self-hosted or public LibreTranslate (`POST {endpoint}` with JSON).
    LibreTranslate { endpoint: String, api_key: String },
    /// MyMemory public API (`GET` with `q` + `langpair`).
    MyMemory,
}

impl Provider {
    /// Map a config string to a provider. Unknown names fall back to
    /// [`Provider::Null`] with a warning.
    pub fn from_name(name: &str, endpoint: &str, api_key: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "libretranslate" => Provider::LibreTranslate {
                endpoint: endpoint.trim().to_string(),
                api_key: api_key.to_string(),
            },
            "mymemory" => Provider::MyMemory,
            "none" => Provider::Null,
            _ => {
                warn!(target: "translate", provider = name, "unknown translate provider, using no-op translator");
                Provider::Null
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Provider::Null => "none",
            Provider::LibreTranslate { .. } => "libretranslate",
            Provider::MyMemory => "mymemory",
        }
    }

    /// Endpoint used for requests and as part of the cache key. `None` means
    /// the provider cannot reach the network and passes text through.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Provider::Null => None,
            Provider::LibreTranslate { endpoint, .. } if endpoint.is_empty() => None,
            Provider::LibreTranslate { endpoint, .. } => Some(endpoint.as_str()),
            Provider::MyMemory => Some(MYMEMORY_ENDPOINT),
        }
    }

    pub fn build_request(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        timeout: Duration,
    ) -> Option<HttpRequest> {
        let url = self.endpoint()?.to_string();
        let req = match self {
            Provider::Null => return None,
            Provider::LibreTranslate { api_key, .. } => {
                let mut payload = json!({
                    "q": text,
                    "source": source_lang,
                    "target": target_lang,
                    "format": "text",
                });
                if !api_key.is_empty() {
                    payload["api_key"] = Value::String(api_key.clone());
                }
                HttpRequest {
                    method: Method::Post,
                    url,
                    query: Vec::new(),
                    json: Some(payload),
                    timeout,
                }
            }
            Provider::MyMemory => HttpRequest {
                method: Method::Get,
                url,
                query: vec![
                    ("q".to_string(), text.to_string()),
                    ("langpair".to_string(), format!("{source_lang}|{target_lang}")),
                ],
                json: None,
                timeout,
            },
        };
        Some(req)
    }

    /// Pull the translated string out of a decoded response body.
    pub fn extract(&self, body: &Value) -> Option<String> {
        let field = match self {
            Provider::Null => return None,
            Provider::LibreTranslate { .. } => body.get("translatedText"),
            Provider::MyMemory => body
                .get("responseData")
                .and_then(|d| d.get("translatedText")),
        };
        field
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_map_case_insensitively() {
        assert_eq!(Provider::from_name(" MyMemory ", "", ""), Provider::MyMemory);
        assert_eq!(Provider::from_name("none", "", ""), Provider::Null);
        assert_eq!(Provider::from_name("deepl", "", ""), Provider::Null);
        assert!(matches!(
            Provider::from_name("LibreTranslate", "http://lt.local/translate", "k"),
            Provider::LibreTranslate { .. }
        ));
    }

    #[test]
    fn libretranslate_without_endpoint_is_offline() {
        let p = Provider::from_name("libretranslate", "  ", "");
        assert!(p.endpoint().is_none());
        assert!(p.build_request("x", "en", "zh-CN", Duration::from_secs(1)).is_none());
    }

    #[test]
    fn libretranslate_request_carries_api_key() {
        let p = Provider::from_name("libretranslate", "http://lt.local/translate", "secret");
        let req = p.build_request("Hello", "en", "zh-CN", Duration::from_secs(1)).unwrap();
        assert_eq!(req.method, Method::Post);
        let body = req.json.unwrap();
        assert_eq!(body["q"], "Hello");
        assert_eq!(body["target"], "zh-CN");
        assert_eq!(body["api_key"], "secret");
    }

    #[test]
    fn mymemory_request_and_extract() {
        let p = Provider::MyMemory;
        let req = p.build_request("Hello", "en", "zh-CN", Duration::from_secs(1)).unwrap();
        assert_eq!(req.method, Method::Get);
        assert!(req.query.contains(&("langpair".to_string(), "en|zh-CN".to_string())));

        let body = json!({"responseData": {"translatedText": "你好"}});
        assert_eq!(p.extract(&body).as_deref(), Some("你好"));
        assert_eq!(p.extract(&json!({"responseData": {}})), None);
    }
}
