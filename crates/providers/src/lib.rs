//! Model provider implementations for OfferDesk.
//!
//! All providers implement the `offerdesk_core::Provider` trait.
//! `build_from_config` selects the provider named in the configuration.

pub mod gemini;

use std::sync::Arc;
use std::time::Duration;
use offerdesk_config::ModelConfig;
use offerdesk_core::error::ProviderError;
use offerdesk_core::provider::Provider;

pub use gemini::GeminiProvider;

/// Build the configured provider.
pub fn build_from_config(config: &ModelConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    match config.provider.as_str() {
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured("gemini: no API key (set GEMINI_API_KEY)".into())
            })?;
            let base_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string());
            let provider = GeminiProvider::new(base_url, api_key, Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::NotConfigured(format!("unknown provider '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_gemini_with_key() {
        let config = ModelConfig {
            api_key: Some("test-key".into()),
            ..ModelConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = build_from_config(&ModelConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = ModelConfig {
            provider: "carrier-pigeon".into(),
            api_key: Some("k".into()),
            ..ModelConfig::default()
        };
        let err = build_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
