//! HTTP market data source

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::domain::market::{DataType, MarketDataSource, Quote};
use crate::domain::DomainError;

/// Connection settings for an upstream quote API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }
}

/// Body of a batch response; symbols the upstream does not know are
/// simply absent
#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    quotes: Vec<Quote>,
}

/// Quote API client for one data type.
///
/// Endpoints are `GET {base_url}/{data_type}/quotes?symbols=A,B` and
/// `GET {base_url}/{data_type}/quotes/{symbol}`.
#[derive(Debug, Clone)]
pub struct HttpMarketDataSource {
    data_type: DataType,
    base_url: String,
    client: Client,
}

impl HttpMarketDataSource {
    pub fn new(data_type: DataType, config: &SourceConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            data_type,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn quotes_url(&self) -> String {
        format!("{}/{}/quotes", self.base_url, self.data_type)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, DomainError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DomainError::invalid_response(format!("Undecodable body from {}: {}", url, e)))
    }
}

fn map_request_error(error: reqwest::Error) -> DomainError {
    if error.is_timeout() {
        DomainError::network(format!("Request timed out: {}", error))
    } else if error.is_connect() {
        DomainError::network(format!("Connection failed: {}", error))
    } else if let Some(status) = error.status() {
        DomainError::http(status.as_u16(), error.to_string())
    } else {
        DomainError::network(format!("Request failed: {}", error))
    }
}

fn http_error(status: StatusCode, body: &str) -> DomainError {
    let excerpt: String = body.chars().take(200).collect();
    let message = if excerpt.is_empty() {
        status.canonical_reason().unwrap_or("Unexpected status").to_string()
    } else {
        excerpt
    };

    DomainError::http(status.as_u16(), message)
}

#[async_trait]
impl MarketDataSource for HttpMarketDataSource {
    fn data_type(&self) -> DataType {
        self.data_type
    }

    async fn fetch_batch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Option<Quote>>, DomainError> {
        let body: BatchResponse = self
            .get_json(&self.quotes_url(), &[("symbols", symbols.join(","))])
            .await?;

        let mut quotes: HashMap<String, Option<Quote>> =
            symbols.iter().map(|symbol| (symbol.clone(), None)).collect();

        for quote in body.quotes {
            if let Some(slot) = quotes.get_mut(&quote.ticker) {
                *slot = Some(quote);
            }
        }

        debug!(
            data_type = %self.data_type,
            requested = symbols.len(),
            returned = quotes.values().filter(|q| q.is_some()).count(),
            "Fetched quote batch"
        );

        Ok(quotes)
    }

    async fn fetch_one(&self, symbol: &str) -> Result<Quote, DomainError> {
        let url = format!("{}/{}", self.quotes_url(), symbol);
        self.get_json(&url, &[]).await
    }
}
