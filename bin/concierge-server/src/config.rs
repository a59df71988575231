//! Server configuration, loaded from environment variables at startup.

use concierge_core::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use concierge_core::relay::DEFAULT_MAX_STEPS;

/// Runtime configuration for concierge-server.
///
/// Every field has a default so the server starts without any environment
/// variables; chat and publishing stay disabled (500) until their keys are set.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL of the document store (default: `"sqlite://concierge.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Shared secret expected in `x-api-key` on publish / admin routes.
    pub cms_api_key: Option<String>,

    pub model_api_key: Option<String>,
    pub model_base_url: String,
    pub model: String,

    /// Upper bound on model calls per chat request.
    pub max_steps: usize,

    pub mail_api_key: Option<String>,
    pub mail_from: String,

    /// Operator inbox receiving lead notifications.
    pub lead_inbox: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            database_url: "sqlite://concierge.db".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            enable_docs: true,
            cms_api_key: None,
            model_api_key: None,
            model_base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            max_steps: DEFAULT_MAX_STEPS,
            mail_api_key: None,
            mail_from: "Concierge <concierge@example.com>".to_owned(),
            lead_inbox: "leads@example.com".to_owned(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("database_url", &self.database_url)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_docs", &self.enable_docs)
            .field("cms_api_key", &redact(&self.cms_api_key))
            .field("model_api_key", &redact(&self.model_api_key))
            .field("model_base_url", &self.model_base_url)
            .field("model", &self.model)
            .field("max_steps", &self.max_steps)
            .field("mail_api_key", &redact(&self.mail_api_key))
            .field("mail_from", &self.mail_from)
            .field("lead_inbox", &self.lead_inbox)
            .finish()
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let or = |key: &str, default: String| get(key).unwrap_or(default);
        let secret = |key: &str| get(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        Self {
            bind_address: or("CONCIERGE_BIND", defaults.bind_address),
            database_url: or("CONCIERGE_DATABASE_URL", defaults.database_url),
            log_level: or("CONCIERGE_LOG", defaults.log_level),
            log_json: get("CONCIERGE_LOG_JSON").map(|v| parse_bool(&v)).unwrap_or(defaults.log_json),
            cors_allowed_origins: get("CONCIERGE_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            enable_docs: get("CONCIERGE_ENABLE_DOCS").map(|v| parse_bool(&v)).unwrap_or(defaults.enable_docs),
            cms_api_key: secret("CONCIERGE_CMS_API_KEY"),
            model_api_key: secret("CONCIERGE_MODEL_API_KEY").or_else(|| secret("GEMINI_API_KEY")),
            model_base_url: or("CONCIERGE_MODEL_BASE_URL", defaults.model_base_url),
            model: or("CONCIERGE_MODEL", defaults.model),
            max_steps: get("CONCIERGE_MAX_STEPS")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_steps),
            mail_api_key: secret("CONCIERGE_MAIL_API_KEY"),
            mail_from: or("CONCIERGE_MAIL_FROM", defaults.mail_from),
            lead_inbox: or("CONCIERGE_LEAD_INBOX", defaults.lead_inbox),
        }
    }
}

fn parse_bool(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = from_pairs(&[]);
        assert_eq!(cfg.bind_address, "0.0.0.0:3000");
        assert_eq!(cfg.max_steps, 5);
        assert!(cfg.cms_api_key.is_none());
        assert!(cfg.enable_docs);
    }

    #[test]
    fn model_key_falls_back_to_gemini_variable() {
        let cfg = from_pairs(&[("GEMINI_API_KEY", "g-key")]);
        assert_eq!(cfg.model_api_key.as_deref(), Some("g-key"));

        let cfg = from_pairs(&[("GEMINI_API_KEY", "g-key"), ("CONCIERGE_MODEL_API_KEY", "c-key")]);
        assert_eq!(cfg.model_api_key.as_deref(), Some("c-key"));
    }

    #[test]
    fn blank_secrets_are_unset() {
        let cfg = from_pairs(&[("CONCIERGE_CMS_API_KEY", "  ")]);
        assert!(cfg.cms_api_key.is_none());
    }

    #[test]
    fn invalid_max_steps_keeps_default() {
        assert_eq!(from_pairs(&[("CONCIERGE_MAX_STEPS", "0")]).max_steps, 5);
        assert_eq!(from_pairs(&[("CONCIERGE_MAX_STEPS", "x")]).max_steps, 5);
        assert_eq!(from_pairs(&[("CONCIERGE_MAX_STEPS", "3")]).max_steps, 3);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = from_pairs(&[("CONCIERGE_CMS_API_KEY", "s3cret")]);
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<set>"));
    }
}
