//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, ExecutorKind, StoreBackend};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_processor(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_executor(config, &mut result);
        Self::validate_governor(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_processor(config: &Config, result: &mut ValidationResult) {
        let processor = &config.processor;

        if processor.inter_prompt_delay_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "processor.inter_prompt_delay_ms",
                "No delay between prompts; target platforms may rate-limit the batch",
            ));
        }

        if processor.max_prompt_retries > 0
            && processor.retry_base_delay_ms > processor.retry_max_delay_ms
        {
            result.add_error(ValidationError::new(
                "processor.retry_base_delay_ms",
                "retry_base_delay_ms cannot exceed retry_max_delay_ms",
            ));
        }

        if processor.max_prompt_retries > 10 {
            result.add_warning(ValidationWarning::new(
                "processor.max_prompt_retries",
                "max_prompt_retries is very high (>10), a failing prompt will stall its batch",
            ));
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        if config.store.backend != StoreBackend::Memory
            && config.store.path.as_os_str().is_empty()
        {
            result.add_error(ValidationError::new(
                "store.path",
                "A path is required for durable backends",
            ));
        }

        if config.store.backend == StoreBackend::Memory {
            result.add_warning(ValidationWarning::new(
                "store.backend",
                "Memory backend does not survive restarts",
            ));
        }
    }

    fn validate_executor(config: &Config, result: &mut ValidationResult) {
        let executor = &config.executor;

        if executor.kind == ExecutorKind::Http {
            if !executor.automation_url.starts_with("http://")
                && !executor.automation_url.starts_with("https://")
            {
                result.add_error(ValidationError::new(
                    "executor.automation_url",
                    "automation_url must be an http(s) URL",
                ));
            }

            if executor.timeout_secs == 0 {
                result.add_error(ValidationError::new(
                    "executor.timeout_secs",
                    "timeout_secs must be greater than 0",
                ));
            }
        }
    }

    fn validate_governor(config: &Config, result: &mut ValidationResult) {
        let governor = &config.governor;

        if governor.failure_threshold == 0 {
            result.add_error(ValidationError::new(
                "governor.failure_threshold",
                "failure_threshold must be greater than 0",
            ));
        }

        if governor.base_backoff_ms > governor.max_backoff_ms {
            result.add_error(ValidationError::new(
                "governor.base_backoff_ms",
                "base_backoff_ms cannot exceed max_backoff_ms",
            ));
        }

        if governor.request_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "governor.request_timeout_ms",
                "request_timeout_ms must be greater than 0",
            ));
        }

        if governor.grace_failure_count < governor.failure_threshold {
            result.add_warning(ValidationWarning::new(
                "governor.grace_failure_count",
                "Grace period starts before the breaker opens",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
