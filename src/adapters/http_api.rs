use crate::core::{RecordSet, Source};
use crate::domain::records::Exchange;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;

/// CoinCap-style `/exchanges` listing: `{"data": [...], "timestamp": ...}`.
#[derive(Debug, Clone)]
pub struct ExchangeApiSource {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ExchangeApiSource {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(Client::new(), endpoint, api_key)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub async fn fetch(&self) -> Result<Vec<Exchange>> {
        let mut request = self.client.get(&self.endpoint);
        match &self.api_key {
            Some(key) => request = request.query(&[("apiKey", key)]),
            None => tracing::warn!("No API key configured; sending unauthenticated request"),
        }

        tracing::debug!("Making API request to: {}", self.endpoint);
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            return Err(EtlError::HttpStatusError {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Exchange::parse_response(&body)
    }
}

impl Source for ExchangeApiSource {
    fn describe(&self) -> String {
        format!("api:{}", self.endpoint)
    }

    async fn extract(&self) -> Result<RecordSet> {
        let exchanges = self.fetch().await?;
        Ok(Exchange::to_record_set(exchanges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn listing() -> serde_json::Value {
        serde_json::json!({
            "data": [
                {
                    "exchangeId": "itbit",
                    "name": "Itbit",
                    "rank": "33",
                    "percentTotalVolume": null,
                    "volumeUsd": null,
                    "tradingPairs": "0",
                    "socket": null,
                    "exchangeUrl": "https://www.itbit.com/",
                    "updated": 0
                }
            ],
            "timestamp": 1726084388658i64
        })
    }

    #[tokio::test]
    async fn test_extract_sends_api_key() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v3/exchanges")
                .query_param("apiKey", "secret");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(listing());
        });

        let source = ExchangeApiSource::new(server.url("/v3/exchanges"), Some("secret".to_string()));
        let rs = source.extract().await.unwrap();

        api_mock.assert();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.column_index("exchangeId").unwrap(), 0);
    }

    #[test]
    fn test_blank_api_key_is_not_sent() {
        let source = ExchangeApiSource::new("http://localhost/v3/exchanges", Some("  ".to_string()));
        assert!(source.api_key.is_none());
    }

    #[tokio::test]
    async fn test_extract_non_success_status() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/v3/exchanges");
            then.status(401).body("unauthorized");
        });

        let source = ExchangeApiSource::new(server.url("/v3/exchanges"), None);
        let err = source.extract().await.unwrap_err();

        api_mock.assert();
        assert!(matches!(err, EtlError::HttpStatusError { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_extract_malformed_body_is_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/exchanges");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([{"exchangeId": "itbit"}]));
        });

        let source = ExchangeApiSource::new(server.url("/v3/exchanges"), None);
        let err = source.extract().await.unwrap_err();

        assert!(matches!(err, EtlError::ParseError { .. }));
    }
}
