use std::path::PathBuf;

use crate::error::{CatalogError, Result};

/// Substrings that identify the backend's tools in function responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNames {
    pub catalog_search: String,
    pub product_question: String,
    pub prompt_checker: String,
}

impl Default for FunctionNames {
    fn default() -> Self {
        Self {
            catalog_search: "catalog_search".to_string(),
            product_question: "product_question".to_string(),
            prompt_checker: "prompt_checker".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifierConfig {
    pub functions: FunctionNames,
    /// Treat a response with no function call at all as a safety block.
    pub block_without_function_call: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub base_url: String,
    pub app_name: String,
    pub user_id: String,
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            app_name: "catalog_agent".to_string(),
            user_id: "user".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub agent: AgentConfig,
    pub classifier: ClassifierConfig,
    pub phrases_path: Option<PathBuf>,
    pub bind_address: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            classifier: ClassifierConfig::default(),
            phrases_path: None,
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        // A zero timeout would fail every agent request immediately.
        let timeout_secs = match lookup("AGENT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| CatalogError::InvalidConfig {
                    key: "AGENT_TIMEOUT_SECS".to_string(),
                    value: raw.clone(),
                })?,
            None => defaults.agent.timeout_secs,
        };

        let block_without_function_call = match lookup("BLOCK_WITHOUT_FUNCTION_CALL") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| CatalogError::InvalidConfig {
                key: "BLOCK_WITHOUT_FUNCTION_CALL".to_string(),
                value: raw.clone(),
            })?,
            None => defaults.classifier.block_without_function_call,
        };

        let names = defaults.classifier.functions;
        Ok(Self {
            agent: AgentConfig {
                base_url: text("AGENT_BASE_URL", &defaults.agent.base_url)
                    .trim_end_matches('/')
                    .to_string(),
                app_name: text("AGENT_APP_NAME", &defaults.agent.app_name),
                user_id: text("AGENT_USER_ID", &defaults.agent.user_id),
                timeout_secs,
            },
            classifier: ClassifierConfig {
                functions: FunctionNames {
                    catalog_search: text("CATALOG_SEARCH_FUNCTION", &names.catalog_search),
                    product_question: text("PRODUCT_QUESTION_FUNCTION", &names.product_question),
                    prompt_checker: text("PROMPT_CHECKER_FUNCTION", &names.prompt_checker),
                },
                block_without_function_call,
            },
            phrases_path: lookup("SAFETY_PHRASES_PATH")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            bind_address: text("GATEWAY_BIND", &defaults.bind_address),
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<CatalogConfig> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        CatalogConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(load(&[]).unwrap(), CatalogConfig::default());
        assert!(!CatalogConfig::default().classifier.block_without_function_call);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("AGENT_BASE_URL", "https://agents.example.com/"),
            ("AGENT_TIMEOUT_SECS", "5"),
            ("BLOCK_WITHOUT_FUNCTION_CALL", "Yes"),
            ("CATALOG_SEARCH_FUNCTION", "search_products"),
            ("SAFETY_PHRASES_PATH", "/etc/catalog/phrases.json"),
        ])
        .unwrap();

        assert_eq!(config.agent.base_url, "https://agents.example.com");
        assert_eq!(config.agent.timeout_secs, 5);
        assert!(config.classifier.block_without_function_call);
        assert_eq!(config.classifier.functions.catalog_search, "search_products");
        assert_eq!(config.classifier.functions.product_question, "product_question");
        assert_eq!(config.phrases_path, Some(PathBuf::from("/etc/catalog/phrases.json")));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load(&[("AGENT_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidConfig { ref key, .. } if key == "AGENT_TIMEOUT_SECS"
        ));

        let err = load(&[("BLOCK_WITHOUT_FUNCTION_CALL", "maybe")]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig { .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = load(&[("AGENT_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidConfig { ref key, ref value }
                if key == "AGENT_TIMEOUT_SECS" && value == "0"
        ));

        assert_eq!(load(&[("AGENT_TIMEOUT_SECS", " 1 ")]).unwrap().agent.timeout_secs, 1);
    }
}
