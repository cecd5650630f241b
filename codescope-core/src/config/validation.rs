//! Configuration validation module

use crate::config::{
    AnalysisConfig, Config, DatabaseConfig, GitConfig, LoggingConfig, ReviewerConfig,
    RetryConfigSerializable,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Logging configuration error: {message}")]
    Logging { message: String },

    #[error("Database configuration error: {message}")]
    Database { message: String },

    #[error("Reviewer configuration error: {message}")]
    Reviewer { message: String },

    #[error("Analysis configuration error: {message}")]
    Analysis { message: String },

    #[error("Git configuration error: {message}")]
    Git { message: String },
}

impl ValidationError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn reviewer(message: impl Into<String>) -> Self {
        Self::Reviewer {
            message: message.into(),
        }
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }

    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !matches!(self.format.as_str(), "json" | "pretty") {
            return Err(ValidationError::logging(format!(
                "Log format must be 'json' or 'pretty', got: {}",
                self.format
            )));
        }

        if self.level.trim().is_empty() {
            return Err(ValidationError::logging("Log level cannot be empty"));
        }

        Ok(())
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::database("Database URL cannot be empty"));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::database(
                "max_connections must be greater than 0",
            ));
        }

        if self.connect_timeout_seconds == 0 {
            return Err(ValidationError::database(
                "Connect timeout must be greater than 0 seconds",
            ));
        }

        Ok(())
    }
}

impl Validate for RetryConfigSerializable {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::reviewer(
                "retry.max_attempts must be at least 1",
            ));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ValidationError::reviewer(format!(
                "retry.backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ValidationError::reviewer(
                "retry.initial_delay_ms cannot exceed retry.max_delay_ms",
            ));
        }

        Ok(())
    }
}

impl Validate for ReviewerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::reviewer(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.model.trim().is_empty() {
            return Err(ValidationError::reviewer("Model name cannot be empty"));
        }

        if self.timeout_seconds == 0 {
            return Err(ValidationError::reviewer(
                "Timeout must be greater than 0 seconds",
            ));
        }

        self.retry.validate()
    }
}

impl Validate for AnalysisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::analysis("batch_size must be greater than 0"));
        }

        if self.max_chars_per_file == 0 {
            return Err(ValidationError::analysis(
                "max_chars_per_file must be greater than 0",
            ));
        }

        if self.max_concurrent_runs == 0 {
            return Err(ValidationError::analysis(
                "max_concurrent_runs must be greater than 0",
            ));
        }

        if self.poll_interval_seconds == 0 {
            return Err(ValidationError::analysis(
                "poll_interval_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for GitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.fetch_timeout_seconds == 0 {
            return Err(ValidationError::git(
                "fetch_timeout_seconds must be greater than 0",
            ));
        }

        if let Some(root) = &self.local_root
            && !root.is_absolute()
        {
            return Err(ValidationError::git(format!(
                "local_root must be an absolute path, got {}",
                root.display()
            )));
        }

        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.logging.validate()?;
        self.database.validate()?;
        self.reviewer.validate()?;
        self.analysis.validate()?;
        self.git.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_analysis_config_validation() {
        let valid = AnalysisConfig::default();
        assert!(valid.validate().is_ok());

        let invalid = AnalysisConfig {
            batch_size: 0,
            ..valid.clone()
        };
        assert!(invalid.validate().is_err());

        let invalid = AnalysisConfig {
            max_concurrent_runs: 0,
            ..valid
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_reviewer_config_validation() {
        let valid = ReviewerConfig::default();
        assert!(valid.validate().is_ok());

        let invalid = ReviewerConfig {
            model: "  ".to_string(),
            ..valid.clone()
        };
        assert!(invalid.validate().is_err());

        let invalid = ReviewerConfig {
            base_url: "ftp://models.internal".to_string(),
            ..valid.clone()
        };
        assert!(invalid.validate().is_err());

        let mut invalid = valid;
        invalid.retry.backoff_multiplier = 0.5;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_backoff_multiplier_must_be_finite() {
        for multiplier in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut config = ReviewerConfig::default();
            config.retry.backoff_multiplier = multiplier;
            assert!(config.validate().is_err(), "accepted {multiplier}");
        }

        let mut config = ReviewerConfig::default();
        config.retry.backoff_multiplier = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_git_local_root_must_be_absolute() {
        let valid = GitConfig {
            local_root: Some(std::path::PathBuf::from("/srv/repos")),
            ..GitConfig::default()
        };
        assert!(valid.validate().is_ok());

        let invalid = GitConfig {
            local_root: Some(std::path::PathBuf::from("repos")),
            ..GitConfig::default()
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_logging_format_validation() {
        let invalid = LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert!(invalid.validate().is_err());
    }
}
