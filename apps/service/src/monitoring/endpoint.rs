//! Endpoint parsing for the store checkers.
//!
//! Parsing happens before any socket is opened, so a bad registry row fails
//! fast with `MalformedEndpoint` on every firing.

use percent_encoding::percent_decode_str;
use url::Url;

use super::error::ProbeError;

const DEFAULT_PG_PORT: u16 = 5432;

/// Connection parameters extracted from a PostgreSQL URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgEndpoint {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub tls: bool,
}

impl PgEndpoint {
    pub fn parse(endpoint: &str) -> Result<Self, ProbeError> {
        let url = Url::parse(endpoint.trim())
            .map_err(|e| ProbeError::malformed(format!("invalid postgres url: {e}")))?;

        match url.scheme() {
            "postgres" | "postgresql" => {}
            other => {
                return Err(ProbeError::malformed(format!(
                    "expected postgres:// or postgresql:// scheme, got '{other}'"
                )));
            }
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(ProbeError::malformed("postgres url has no host")),
        };

        let database = decode(url.path().trim_start_matches('/'))?;
        if database.is_empty() {
            return Err(ProbeError::malformed("postgres url has no database"));
        }

        let user = match url.username() {
            "" => None,
            raw => Some(decode(raw)?),
        };
        let password = url.password().map(decode).transpose()?;

        Ok(Self {
            user,
            password,
            host,
            port: url.port().unwrap_or(DEFAULT_PG_PORT),
            database,
            tls: tls_requested(&url),
        })
    }
}

fn decode(raw: &str) -> Result<String, ProbeError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| ProbeError::malformed(format!("invalid percent-encoding: {e}")))
}

fn tls_requested(url: &Url) -> bool {
    url.query_pairs().any(|(key, value)| {
        let value = value.to_ascii_lowercase();
        match key.as_ref() {
            "ssl" => matches!(value.as_str(), "true" | "1" | "yes"),
            "sslmode" => matches!(value.as_str(), "require" | "verify-ca" | "verify-full"),
            _ => false,
        }
    })
}

/// Accepts `redis://`/`rediss://` URLs and bare `host:port`.
pub fn normalize_redis_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("redis://{trimmed}")
    }
}
