use super::{types::AppConfig, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Browser timeout is not 0
/// - User agent is not blank
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.browser.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "browser.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.browser.user_agent.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "browser.user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_timeout_zero_fails() {
        let config = AppConfig {
            browser: BrowserConfig {
                timeout_secs: 0,
                ..BrowserConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_blank_user_agent_fails() {
        let config = AppConfig {
            browser: BrowserConfig {
                user_agent: "  ".to_string(),
                ..BrowserConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
