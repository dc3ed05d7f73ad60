//! config-rs/lib.rs
//! Shared configuration utilities for consistent service configuration
//! Provides standardized functions for port/address management

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Loads a `.env` file from the working directory if one exists
///
/// Returns true when a file was found and applied.
pub fn load_dotenv() -> bool {
    match dotenv::dotenv() {
        Ok(path) => {
            log::debug!("Loaded environment from {}", path.display());
            true
        }
        Err(_) => false,
    }
}

/// Read an environment variable and parse it, falling back to `default`
///
/// Unparseable values are logged and replaced by the default.
pub fn get_env_or<T>(var_name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(var_name) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            log::warn!("Invalid value '{}' in {}, using default {}", raw, var_name, default);
            default
        }),
        Err(_) => default,
    }
}

/// Read a boolean flag; accepts `true/false`, `1/0`, `yes/no`, `on/off`
pub fn get_env_flag(var_name: &str, default: bool) -> bool {
    match env::var(var_name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                log::warn!("Invalid flag '{}' in {}, using default {}", raw, var_name, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "PRODUCT", "REVIEW")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// The port number to use for the service
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    get_env_or(&var_name, default_port)
}

/// Get the address a service reports about itself
///
/// `{NAME}_SERVICE_ADDR` wins; otherwise `HOSTNAME` (or `localhost`) joined
/// with the service port.
pub fn get_service_address(service_name: &str, default_port: u16) -> String {
    let addr_var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr) = env::var(&addr_var_name) {
        if !addr.trim().is_empty() {
            return addr;
        }
    }

    let host = env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("{}:{}", host, get_service_port(service_name, default_port))
}

/// Get client connection address for connecting to a service
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "PRODUCT", "REVIEW")
/// * `default_port` - The default port to use if not specified in environment
/// * `host` - Optional host to use if not specified in environment (default: "localhost")
///
/// # Returns
/// A connection string for the client to connect to the service
pub fn get_client_address(service_name: &str, default_port: u16, host: Option<&str>) -> String {
    let addr_var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    // First check if there's a full address override
    if let Ok(addr) = env::var(&addr_var_name) {
        return addr;
    }

    let port = get_service_port(service_name, default_port);

    // Build the address with the host (default to localhost if not provided)
    let host = host.unwrap_or("localhost");
    format!("http://{}:{}", host, port)
}

/// Get service name for logging and monitoring
pub fn get_formatted_service_name(service_name: &str) -> String {
    match service_name.to_uppercase().as_str() {
        "PRODUCT_COMPOSITE" => "product-composite".to_string(),
        "PRODUCT" => "product-service".to_string(),
        "RECOMMENDATION" => "recommendation-service".to_string(),
        "REVIEW" => "review-service".to_string(),
        _ => format!("{}-service", service_name.to_lowercase().replace('_', "-")),
    }
}

/// Get default port for a specific service
pub fn get_default_port(service_name: &str) -> u16 {
    match service_name.to_uppercase().as_str() {
        "PRODUCT_COMPOSITE" => 7000,
        "PRODUCT" => 7001,
        "RECOMMENDATION" => 7002,
        "REVIEW" => 7003,
        _ => 7100, // Unknown services start at 7100
    }
}
