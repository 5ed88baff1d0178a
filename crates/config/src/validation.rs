use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a timeout is reasonable
    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> ConfigResult<()> {
        if timeout_seconds == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_seconds > 3600 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 3600"
            )));
        }
        Ok(())
    }

    /// Validate that a polling interval is within (0, 60s]
    pub fn validate_interval_ms(interval_ms: u64, field_name: &str) -> ConfigResult<()> {
        if interval_ms == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if interval_ms > 60_000 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 60000"
            )));
        }
        Ok(())
    }

    /// Validate that a URL uses one of the given schemes
    pub fn validate_url_scheme(url: &str, field_name: &str, schemes: &[&str]) -> ConfigResult<()> {
        Self::validate_not_empty(url, field_name)?;

        let scheme = match url.split_once("://") {
            Some((scheme, rest)) if !rest.is_empty() => scheme,
            _ => {
                return Err(crate::ConfigError::Validation(format!(
                    "{field_name} must be a valid URL with protocol"
                )))
            }
        };

        if !schemes.contains(&scheme) {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must use one of: {}",
                schemes.join(", ")
            )));
        }
        Ok(())
    }
}
