use crate::api::{PriceSample, PriceSource};
use crate::error::FetchError;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// `simple/price` body: asset id -> quote currency -> price.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct SimplePriceResponse(HashMap<String, HashMap<String, Value>>);

/// Client for the CoinGecko `simple/price` endpoint.
///
/// The response maps asset ids to quotes:
/// `{"usd-coin": {"usd": 0.9998}}`
pub struct CoinGeckoClient {
    base_url: String,
    quote_currency: String,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: impl Into<String>,
        quote_currency: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quote_currency: quote_currency.into(),
            client,
        })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch(&self, asset_id: &str) -> Result<PriceSample, FetchError> {
        if asset_id.trim().is_empty() {
            return Err(FetchError::NotFound("empty asset id".to_string()));
        }

        let url = format!("{}/simple/price", self.base_url);
        debug!("GET {} ids={} vs_currencies={}", url, asset_id, self.quote_currency);

        let response = self
            .client
            .get(&url)
            .query(&[("ids", asset_id), ("vs_currencies", self.quote_currency.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!(
                "price provider returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: SimplePriceResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                FetchError::Parse(e.to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;
        let price = extract_price(&body, asset_id, &self.quote_currency)?;

        Ok(PriceSample {
            asset_id: asset_id.to_string(),
            price,
            fetched_at: chrono::Utc::now(),
        })
    }
}

fn extract_price(
    body: &SimplePriceResponse,
    asset_id: &str,
    quote_currency: &str,
) -> Result<f64, FetchError> {
    let quote = body
        .0
        .get(asset_id)
        .and_then(|asset| asset.get(quote_currency))
        .ok_or_else(|| {
            FetchError::NotFound(format!("no {} price for {}", quote_currency, asset_id))
        })?;

    match quote.as_f64() {
        Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
        Some(price) => Err(FetchError::Parse(format!("invalid price {}", price))),
        None => Err(FetchError::Parse(format!("non-numeric price {}", quote))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CoinGeckoClient {
        CoinGeckoClient::new(server.uri(), "usd", Duration::from_secs(5)).unwrap()
    }

    async fn mount_body(server: &MockServer, body: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "usd-coin"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(body)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_price() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"usd-coin": {"usd": 0.9998}})),
        )
        .await;

        let sample = client_for(&server).await.fetch("usd-coin").await.unwrap();

        assert_eq!(sample.asset_id, "usd-coin");
        assert_eq!(sample.price, 0.9998);
    }

    #[tokio::test]
    async fn test_integer_price_accepted() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"usd-coin": {"usd": 1}})),
        )
        .await;

        let sample = client_for(&server).await.fetch("usd-coin").await.unwrap();
        assert_eq!(sample.price, 1.0);
    }

    #[tokio::test]
    async fn test_empty_object_is_not_found() {
        let server = MockServer::start().await;
        mount_body(&server, ResponseTemplate::new(200).set_body_json(json!({}))).await;

        let err = client_for(&server).await.fetch("usd-coin").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_quote_currency_is_not_found() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"usd-coin": {"eur": 0.92}})),
        )
        .await;

        let err = client_for(&server).await.fetch("usd-coin").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_numeric_price_is_parse_error() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"usd-coin": {"usd": "1.00"}})),
        )
        .await;

        let err = client_for(&server).await.fetch("usd-coin").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        mount_body(&server, ResponseTemplate::new(200).set_body_string("<html>busy</html>")).await;

        let err = client_for(&server).await.fetch("usd-coin").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let server = MockServer::start().await;
        mount_body(&server, ResponseTemplate::new(429)).await;

        let err = client_for(&server).await.fetch("usd-coin").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Network("price provider returned HTTP 429".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_network_error() {
        let client =
            CoinGeckoClient::new("http://127.0.0.1:1", "usd", Duration::from_secs(1)).unwrap();

        let err = client.fetch("usd-coin").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_empty_asset_id_rejected() {
        let client =
            CoinGeckoClient::new("http://127.0.0.1:1", "usd", Duration::from_secs(1)).unwrap();

        let err = client.fetch("  ").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[test]
    fn test_negative_price_rejected() {
        let body: SimplePriceResponse =
            serde_json::from_value(json!({"usd-coin": {"usd": -0.5}})).unwrap();

        let err = extract_price(&body, "usd-coin", "usd").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_non_object_body_is_parse_error() {
        let server = MockServer::start().await;
        mount_body(&server, ResponseTemplate::new(200).set_body_json(json!([1, 2, 3]))).await;

        let err = client_for(&server).await.fetch("usd-coin").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unexpected_asset_shape_is_parse_error() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"usd-coin": 1.0})),
        )
        .await;

        let err = client_for(&server).await.fetch("usd-coin").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
