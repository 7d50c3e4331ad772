use super::{types::Config, ConfigError};

/// Longest lifetime accepted for URLs handed to the service (one year).
pub const MAX_URL_EXPIRY_HOURS: u32 = 24 * 365;
/// Longest accepted retention window for abandoned containers (ten years).
pub const MAX_RETENTION_DAYS: u32 = 3650;

/// Validate configuration
/// Currently validates:
/// - Translator section exists (enforced by serde) and has an endpoint
/// - Run limits are non-zero and the sweep probability is a probability
/// - URL expiry and retention windows are within range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.translator.endpoint.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "translator.endpoint cannot be empty".to_string(),
        ));
    }

    let expiry = config.storage.url_expiry_hours;
    if !(1..=MAX_URL_EXPIRY_HOURS).contains(&expiry) {
        return Err(ConfigError::ValidationError(format!(
            "storage.url_expiry_hours must be between 1 and {}, got {}",
            MAX_URL_EXPIRY_HOURS, expiry
        )));
    }

    let run = &config.run;
    if run.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "run.max_concurrency cannot be 0".to_string(),
        ));
    }
    if run.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "run.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if run.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "run.event_buffer cannot be 0".to_string(),
        ));
    }
    if run.allowed_extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "run.allowed_extensions cannot be empty".to_string(),
        ));
    }
    if !(1..=MAX_RETENTION_DAYS).contains(&run.retention_days) {
        return Err(ConfigError::ValidationError(format!(
            "run.retention_days must be between 1 and {}, got {}",
            MAX_RETENTION_DAYS, run.retention_days
        )));
    }
    if !(0.0..=1.0).contains(&run.sweep_probability) {
        return Err(ConfigError::ValidationError(format!(
            "run.sweep_probability must be between 0 and 1, got {}",
            run.sweep_probability
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunConfig, StorageConfig, TranslatorConfig};

    fn valid_config() -> Config {
        Config {
            storage: StorageConfig::default(),
            translator: TranslatorConfig {
                endpoint: "https://example.cognitiveservices.azure.com".to_string(),
                api_key: "secret".to_string(),
                region: None,
                api_version: "v1.1".to_string(),
                languages_endpoint: "https://api.cognitive.microsofttranslator.com".to_string(),
                timeout_secs: 30,
            },
            run: RunConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = valid_config();
        config.run.max_concurrency = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_extensions_fails() {
        let mut config = valid_config();
        config.run.allowed_extensions.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_sweep_probability_range() {
        let mut config = valid_config();
        config.run.sweep_probability = 1.5;
        assert!(validate_config(&config).is_err());

        config.run.sweep_probability = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_url_expiry_range() {
        let mut config = valid_config();
        config.storage.url_expiry_hours = 4_000_000_000;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));

        config.storage.url_expiry_hours = 0;
        assert!(validate_config(&config).is_err());

        config.storage.url_expiry_hours = MAX_URL_EXPIRY_HOURS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_retention_range() {
        let mut config = valid_config();
        config.run.retention_days = u32::MAX;
        assert!(validate_config(&config).is_err());

        config.run.retention_days = 0;
        assert!(validate_config(&config).is_err());

        config.run.retention_days = MAX_RETENTION_DAYS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_blank_endpoint_fails() {
        let mut config = valid_config();
        config.translator.endpoint = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }
}
