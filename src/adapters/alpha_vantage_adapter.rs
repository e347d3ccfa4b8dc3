//! Alpha Vantage HTTP adapter.
//!
//! One blocking GET per call. Spacing, retries and payload parsing belong to
//! the caller. Errors are stripped of their URL since it carries the API key.

use crate::domain::error::{FetchError, PipelineError};
use crate::domain::pipeline_config::ApiConfig;
use crate::ports::market_data_port::MarketDataPort;
use reqwest::blocking::{Client, Request};

pub struct AlphaVantageAdapter {
    client: Client,
    api: ApiConfig,
}

impl AlphaVantageAdapter {
    pub fn new(api: ApiConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(api.timeout)
            .user_agent(concat!("stockflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| std::io::Error::other(e.without_url()))?;
        Ok(Self { client, api })
    }

    /// The GET request for `symbol`, including every query parameter.
    pub fn build_request(&self, symbol: &str) -> Result<Request, FetchError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("function", self.api.function.as_str()),
            ("symbol", symbol),
            ("apikey", self.api.api_key.as_str()),
            ("datatype", "json"),
        ];
        if let Some(size) = &self.api.output_size {
            query.push(("outputsize", size.as_str()));
        }
        self.client
            .get(&self.api.base_url)
            .query(&query)
            .build()
            .map_err(|e| FetchError::Network {
                reason: e.without_url().to_string(),
            })
    }
}

impl MarketDataPort for AlphaVantageAdapter {
    fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<u8>, FetchError> {
        let request = self.build_request(symbol)?;
        let response = self
            .client
            .execute(request)
            .map_err(|e| FetchError::Network {
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Network {
                reason: e.without_url().to_string(),
            })
    }
}
