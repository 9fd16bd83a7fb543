//! Yield-aggregator HTTP client (DefiLlama `yields` API shape).

use super::{FeedError, FixedAttempts, PoolFeed};
use crate::config::FeedConfig;
use crate::domain::{Decimal, Pool, PoolId};
use async_trait::async_trait;
use backoff::future::retry_notify;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("yieldsim/", env!("CARGO_PKG_VERSION"));

/// Pool feed backed by the public yields API.
#[derive(Debug, Clone)]
pub struct LlamaPoolFeed {
    client: Client,
    base_url: String,
    policy: FeedConfig,
}

impl LlamaPoolFeed {
    /// Create a new feed client.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: String, policy: FeedConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(policy.timeout)
            .build()
            .map_err(|e| FeedError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        })
    }

    async fn get_pools_body(&self) -> Result<LlamaResponse, FeedError> {
        let url = format!("{}/pools", self.base_url);
        let backoff = FixedAttempts::new(self.policy.max_attempts, self.policy.retry_delay);

        retry_notify(
            backoff,
            || async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| classify(FeedError::NetworkError(e.to_string())))?;

                let status = response.status();
                if status == 429 {
                    return Err(classify(FeedError::RateLimited));
                }
                if !status.is_success() {
                    let message = if status.is_server_error() {
                        "Server error"
                    } else {
                        "Client error"
                    };
                    return Err(classify(FeedError::HttpError {
                        status: status.as_u16(),
                        message: message.to_string(),
                    }));
                }

                response
                    .json::<LlamaResponse>()
                    .await
                    .map_err(|e| classify(FeedError::ParseError(e.to_string())))
            },
            |err: FeedError, wait: std::time::Duration| {
                warn!(error = %err, retry_in_ms = wait.as_millis() as u64, "Pool feed request failed, retrying");
            },
        )
        .await
    }
}

/// Retry only what [`FeedError::is_transient`] says another attempt could fix.
fn classify(err: FeedError) -> backoff::Error<FeedError> {
    if err.is_transient() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

#[async_trait]
impl PoolFeed for LlamaPoolFeed {
    async fn fetch_pools(&self) -> Result<Vec<Pool>, FeedError> {
        debug!(base_url = %self.base_url, "Fetching pool feed");

        let body = self.get_pools_body().await?;
        let total = body.data.len();
        let pools = parse_pools(body.data);

        info!(
            total,
            accepted = pools.len(),
            skipped = total - pools.len(),
            "Pool feed fetched"
        );
        Ok(pools)
    }
}

#[derive(Debug, Deserialize)]
struct LlamaResponse {
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPool {
    pool: Option<String>,
    symbol: Option<String>,
    project: Option<String>,
    chain: Option<String>,
    apy: Option<f64>,
    #[serde(rename = "tvlUsd")]
    tvl_usd: Option<f64>,
}

/// Validate raw records into typed pools, dropping anything incomplete.
fn parse_pools(records: Vec<serde_json::Value>) -> Vec<Pool> {
    let mut pools = Vec::with_capacity(records.len());
    for record in records {
        let raw = match serde_json::from_value::<RawPool>(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to parse pool record");
                continue;
            }
        };
        match validate_pool(raw) {
            Ok(pool) => pools.push(pool),
            Err(e) => debug!(error = %e, "Skipping pool record"),
        }
    }
    pools
}

fn validate_pool(raw: RawPool) -> Result<Pool, FeedError> {
    let id = raw
        .pool
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| FeedError::ParseError("Missing pool field".to_string()))?;
    let apy = raw
        .apy
        .and_then(Decimal::from_f64)
        .ok_or_else(|| FeedError::ParseError(format!("Missing or invalid apy for {}", id)))?;
    let tvl_usd = raw
        .tvl_usd
        .and_then(Decimal::from_f64)
        .filter(|tvl| !tvl.is_negative())
        .ok_or_else(|| FeedError::ParseError(format!("Missing or invalid tvlUsd for {}", id)))?;

    Ok(Pool {
        id: PoolId::new(id),
        symbol: raw.symbol.unwrap_or_default(),
        project: raw.project.unwrap_or_default(),
        chain: raw.chain.unwrap_or_default(),
        apy,
        tvl_usd,
    })
}
