use anyhow::{Result, anyhow};
use url::Url;

use crate::monitoring::endpoint::PgEndpoint;
use crate::monitoring::probe::ProtocolTag;

/// Shortest interval a user may register, in seconds
pub const MIN_INTERVAL_SECS: u64 = 10;
/// Longest interval a user may register, in seconds
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn to_result(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(anyhow!(self.error.clone().unwrap_or_else(|| "Validation failed".to_string())))
        }
    }
}

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate key-value store endpoint (redis:// URL or host:port)
pub fn validate_kv_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    if target.contains("://") {
        return match Url::parse(target) {
            Ok(url) if !matches!(url.scheme(), "redis" | "rediss") => ValidationResult::err(format!(
                "Invalid scheme '{}'. Must be redis or rediss",
                url.scheme()
            )),
            Ok(url) if url.host_str().is_none_or(str::is_empty) => {
                ValidationResult::err("URL must have a valid host")
            }
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::err(format!("Invalid URL: {e}")),
        };
    }

    let Some((host, port)) = target.rsplit_once(':') else {
        return ValidationResult::err("Target must be a redis:// URL or 'host:port'");
    };

    if host.is_empty() || host.contains(' ') {
        return ValidationResult::err("Invalid host");
    }

    match port.parse::<u16>() {
        Ok(port) if port > 0 => ValidationResult::ok(),
        Ok(_) => ValidationResult::err("Port must be between 1 and 65535"),
        Err(_) => ValidationResult::err("Invalid port number"),
    }
}

/// Validate relational store endpoint (postgres URL with host and database)
pub fn validate_relational_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    match PgEndpoint::parse(target) {
        Ok(_) => ValidationResult::ok(),
        Err(e) => ValidationResult::err(e.to_string()),
    }
}

/// Validate an endpoint for the given protocol
pub fn validate_endpoint(target: &str, protocol: &ProtocolTag) -> ValidationResult {
    match protocol.as_str() {
        ProtocolTag::HTTP => validate_http_endpoint(target),
        ProtocolTag::KV_STORE => validate_kv_endpoint(target),
        ProtocolTag::RELATIONAL_STORE => validate_relational_endpoint(target),
        other => ValidationResult::err(format!("Unknown service type: {other}")),
    }
}

/// Validate an owner email and return its local part
pub fn email_username(email: &str) -> Result<&str> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(anyhow!("Email must contain '@'"));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(' ') {
        return Err(anyhow!("Invalid email address: {email}"));
    }

    Ok(local)
}

/// Validate probe interval
pub fn validate_interval(interval: u64) -> ValidationResult {
    if interval < MIN_INTERVAL_SECS {
        return ValidationResult::err(format!("Interval must be at least {MIN_INTERVAL_SECS} seconds"));
    }

    if interval > MAX_INTERVAL_SECS {
        return ValidationResult::err("Interval too long (max 24 hours)");
    }

    ValidationResult::ok()
}
