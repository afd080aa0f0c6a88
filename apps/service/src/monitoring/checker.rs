use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;
use tokio::time::timeout;
use url::Url;

use super::endpoint::{PgEndpoint, normalize_redis_endpoint};
use super::error::ProbeError;
use super::types::CheckOutcome;

/// One protocol's health check.
///
/// Implementations must respect `deadline` and report every failure as a
/// [`ProbeError`]; the runner still enforces the deadline from outside.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, endpoint: &str, deadline: Duration) -> Result<CheckOutcome, ProbeError>;
}

/// HTTP/HTTPS checker
///
/// Any response counts as alive; the status code is only recorded.
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("bootup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, endpoint: &str, deadline: Duration) -> Result<CheckOutcome, ProbeError> {
        let url = parse_http_url(endpoint)?;

        let response = self
            .client
            .get(url)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::CheckTimeout(deadline)
                } else if e.is_builder() {
                    ProbeError::malformed(error_chain(&e))
                } else {
                    ProbeError::connection(error_chain(&e))
                }
            })?;

        Ok(CheckOutcome::with_status(response.status().as_u16()))
    }
}

fn parse_http_url(endpoint: &str) -> Result<Url, ProbeError> {
    let url = Url::parse(endpoint.trim()).map_err(|e| ProbeError::malformed(format!("invalid url: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProbeError::malformed(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ProbeError::malformed("url has no host"));
    }

    Ok(url)
}

/// reqwest hides the interesting part (refused, dns) in the source chain.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Select `ring` as the process-wide rustls backend. The redis, reqwest and
/// sqlx TLS stacks enable different backends, so none is picked implicitly.
pub fn install_crypto_provider() {
    let provider = rustls::crypto::ring::default_provider();
    if rustls::crypto::CryptoProvider::install_default(provider).is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }
}

/// Redis checker: connect and `PING`.
#[derive(Default)]
pub struct RedisChecker;

#[async_trait::async_trait]
impl Checker for RedisChecker {
    async fn check(&self, endpoint: &str, deadline: Duration) -> Result<CheckOutcome, ProbeError> {
        let client = redis::Client::open(normalize_redis_endpoint(endpoint))
            .map_err(|e| ProbeError::malformed(format!("invalid redis url: {e}")))?;

        let ping = async {
            let mut conn =
                client.get_multiplexed_async_connection().await.map_err(ProbeError::connection)?;
            let reply: String =
                redis::cmd("PING").query_async(&mut conn).await.map_err(ProbeError::connection)?;

            if reply.eq_ignore_ascii_case("PONG") {
                Ok(CheckOutcome::reachable())
            } else {
                Err(ProbeError::connection(format!("unexpected PING reply '{reply}'")))
            }
        };

        timeout(deadline, ping).await.map_err(|_| ProbeError::CheckTimeout(deadline))?
    }
}

/// PostgreSQL checker: connect and run `SELECT NOW()`.
#[derive(Default)]
pub struct PostgresChecker;

impl PostgresChecker {
    fn connect_options(endpoint: &PgEndpoint) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&endpoint.host)
            .port(endpoint.port)
            .database(&endpoint.database)
            .ssl_mode(if endpoint.tls { PgSslMode::Require } else { PgSslMode::Prefer });

        if let Some(user) = &endpoint.user {
            options = options.username(user);
        }
        if let Some(password) = &endpoint.password {
            options = options.password(password);
        }
        options
    }
}

#[async_trait::async_trait]
impl Checker for PostgresChecker {
    async fn check(&self, endpoint: &str, deadline: Duration) -> Result<CheckOutcome, ProbeError> {
        let parsed = PgEndpoint::parse(endpoint)?;
        let options = Self::connect_options(&parsed);

        let round_trip = async {
            let mut conn = PgConnection::connect_with(&options).await.map_err(ProbeError::connection)?;
            sqlx::query("SELECT NOW()").fetch_one(&mut conn).await.map_err(ProbeError::connection)?;

            if let Err(e) = conn.close().await {
                tracing::debug!(host = %parsed.host, error = %e, "Failed to close probe connection");
            }
            Ok::<_, ProbeError>(CheckOutcome::reachable())
        };

        timeout(deadline, round_trip).await.map_err(|_| ProbeError::CheckTimeout(deadline))?
    }
}
