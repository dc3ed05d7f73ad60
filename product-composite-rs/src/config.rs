//! Composite configuration loaded from the environment.

use std::time::Duration;

use config_rs::{
    get_client_address, get_default_port, get_env_flag, get_env_or, get_formatted_service_name,
    get_service_address, load_dotenv,
};
use error_handling::{CircuitBreakerConfig, Error, LoggingConfig, Result, RetryConfig};

pub const SERVICE_NAME: &str = "PRODUCT_COMPOSITE";

/// Settings for the composite and its downstream call policies
#[derive(Debug, Clone)]
pub struct CompositeConfig {
    /// Address this instance reports in aggregates and fallbacks
    pub service_address: String,
    pub product_url: String,
    pub recommendation_url: String,
    pub review_url: String,
    /// Deadline for every downstream call
    pub call_timeout: Duration,
    /// In-flight call limit per downstream
    pub max_concurrent_calls: usize,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub logging: LoggingConfig,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        let call_timeout = Duration::from_millis(2000);
        Self {
            service_address: format!("localhost:{}", get_default_port(SERVICE_NAME)),
            product_url: format!("http://product:{}", get_default_port("PRODUCT")),
            recommendation_url: format!("http://recommendation:{}", get_default_port("RECOMMENDATION")),
            review_url: format!("http://review:{}", get_default_port("REVIEW")),
            call_timeout,
            max_concurrent_calls: 32,
            retry: RetryConfig {
                max_retries: 2,
                base_backoff: Duration::from_millis(1000),
                attempt_timeout: call_timeout,
                ..RetryConfig::default()
            },
            circuit_breaker: CircuitBreakerConfig::default(),
            logging: LoggingConfig {
                service_name: get_formatted_service_name(SERVICE_NAME),
                ..LoggingConfig::default()
            },
        }
    }
}

impl CompositeConfig {
    /// Reads only the logging settings, so logging can be up before the rest
    /// of the configuration is parsed
    pub fn logging_from_env() -> LoggingConfig {
        load_dotenv();
        let defaults = Self::default().logging;

        LoggingConfig {
            level: get_env_or("COMPOSITE_LOG_LEVEL", defaults.level.clone()),
            json_format: get_env_flag("COMPOSITE_LOG_JSON", defaults.json_format),
            ..defaults
        }
    }

    /// Loads `.env` if present, then reads every setting from the environment
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        let defaults = Self::default();

        let call_timeout = Duration::from_millis(get_env_or(
            "COMPOSITE_CALL_TIMEOUT_MS",
            defaults.call_timeout.as_millis() as u64,
        ));

        let retry = RetryConfig {
            max_retries: get_env_or("COMPOSITE_RETRY_MAX_RETRIES", defaults.retry.max_retries),
            base_backoff: Duration::from_millis(get_env_or(
                "COMPOSITE_RETRY_BASE_BACKOFF_MS",
                defaults.retry.base_backoff.as_millis() as u64,
            )),
            attempt_timeout: call_timeout,
            ..defaults.retry
        };

        let half_open_calls = get_env_or(
            "COMPOSITE_CB_HALF_OPEN_CALLS",
            defaults.circuit_breaker.half_open_max_calls,
        );
        let slow_call_ms: u64 = get_env_or("COMPOSITE_CB_SLOW_CALL_MS", 0);

        let circuit_breaker = CircuitBreakerConfig {
            window_size: get_env_or("COMPOSITE_CB_WINDOW_SIZE", defaults.circuit_breaker.window_size),
            error_threshold: get_env_or(
                "COMPOSITE_CB_ERROR_THRESHOLD",
                defaults.circuit_breaker.error_threshold,
            ),
            minimum_request_threshold: get_env_or(
                "COMPOSITE_CB_MIN_REQUESTS",
                defaults.circuit_breaker.minimum_request_threshold,
            ),
            reset_timeout: Duration::from_millis(get_env_or(
                "COMPOSITE_CB_RESET_TIMEOUT_MS",
                defaults.circuit_breaker.reset_timeout.as_millis() as u64,
            )),
            half_open_success_threshold: half_open_calls,
            half_open_max_calls: half_open_calls,
            slow_call_threshold: (slow_call_ms > 0).then(|| Duration::from_millis(slow_call_ms)),
        };

        let logging = Self::logging_from_env();

        let config = Self {
            service_address: get_service_address(SERVICE_NAME, get_default_port(SERVICE_NAME)),
            product_url: get_client_address("PRODUCT", get_default_port("PRODUCT"), Some("product")),
            recommendation_url: get_client_address(
                "RECOMMENDATION",
                get_default_port("RECOMMENDATION"),
                Some("recommendation"),
            ),
            review_url: get_client_address("REVIEW", get_default_port("REVIEW"), Some("review")),
            call_timeout,
            max_concurrent_calls: get_env_or(
                "COMPOSITE_MAX_CONCURRENT_CALLS",
                defaults.max_concurrent_calls,
            ),
            retry,
            circuit_breaker,
            logging,
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the resilience primitives cannot work with
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("product", &self.product_url),
            ("recommendation", &self.recommendation_url),
            ("review", &self.review_url),
        ] {
            if url.trim().is_empty() {
                return Err(Error::configuration(format!("Missing {} service URL", name)));
            }
        }

        if self.max_concurrent_calls == 0 {
            return Err(Error::configuration("Max concurrent calls must be at least 1"));
        }

        if self.call_timeout.is_zero() {
            return Err(Error::configuration("Call timeout must be positive"));
        }

        let threshold = self.circuit_breaker.error_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::configuration(format!(
                "Circuit breaker error threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.circuit_breaker.window_size == 0 || self.circuit_breaker.half_open_max_calls == 0 {
            return Err(Error::configuration(
                "Circuit breaker window size and half-open calls must be at least 1",
            ));
        }

        if self.circuit_breaker.half_open_success_threshold > self.circuit_breaker.half_open_max_calls {
            return Err(Error::configuration(format!(
                "Circuit breaker half-open success threshold {} exceeds half-open calls {}",
                self.circuit_breaker.half_open_success_threshold, self.circuit_breaker.half_open_max_calls
            )));
        }

        Ok(())
    }
}
