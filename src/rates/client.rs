use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::net::{Network, Request};

use super::api_types::{ApiConvertResponse, ApiCurrenciesResponse};
use super::types::{Conversion, Currency, RatePair};

/// URLs of the rate provider
#[derive(Debug, Clone)]
pub struct Endpoints {
  base: Url,
}

impl Endpoints {
  pub fn new(base_url: &str) -> Result<Self> {
    let base = Url::parse(base_url.trim_end_matches('/'))
      .map_err(|e| Error::InvalidInput(format!("bad API base url '{}': {}", base_url, e)))?;

    if base.cannot_be_a_base() {
      return Err(Error::InvalidInput(format!(
        "API base url '{}' cannot have paths",
        base_url
      )));
    }

    Ok(Self { base })
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  fn join(&self, endpoint: &str) -> Url {
    let mut url = self.base.clone();
    let path = format!("{}/{}", url.path().trim_end_matches('/'), endpoint);
    url.set_path(&path);
    url
  }

  /// The rate-query endpoint without a query string
  pub fn convert(&self) -> Url {
    self.join("convert")
  }

  /// `<base>/convert?q=FROM_TO,TO_FROM`
  pub fn convert_pair(&self, pair: &RatePair) -> Url {
    let mut url = self.convert();
    // Kept literal (no %2C) so the cached key reads like the request
    url.set_query(Some(&format!("q={}", pair.query())));
    url
  }

  /// `<base>/currencies?`
  pub fn currencies(&self) -> Url {
    let mut url = self.join("currencies");
    url.set_query(Some(""));
    url
  }
}

/// Conversion fetcher.
///
/// Issues provider requests through any `Network`; in the running app that
/// is the cache worker handle, so every call passes the cache controller.
#[derive(Clone)]
pub struct RatesClient<N: Network> {
  network: N,
  endpoints: Endpoints,
}

impl<N: Network> RatesClient<N> {
  pub fn new(network: N, endpoints: Endpoints) -> Self {
    Self { network, endpoints }
  }

  /// Fetch both directions of `pair` in one round trip.
  pub async fn fetch_conversion(&self, pair: &RatePair, amount: f64) -> Result<Conversion> {
    let request = Request::get(self.endpoints.convert_pair(pair));
    debug!(pair = %pair.id(), "fetching conversion");

    let response = self.network.fetch(&request).await?.error_for_status()?;

    let date = response.date().unwrap_or_else(Utc::now);
    ApiConvertResponse::parse(&response.body)?.into_conversion(pair, amount, date)
  }

  /// Fetch the full currency list.
  pub async fn fetch_currencies(&self) -> Result<Vec<Currency>> {
    let request = Request::get(self.endpoints.currencies());
    debug!("fetching currency list");

    let response = self.network.fetch(&request).await?.error_for_status()?;

    Ok(ApiCurrenciesResponse::parse(&response.body)?.into_currencies())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::FakeNetwork;

  #[test]
  fn test_endpoint_urls() {
    let endpoints = Endpoints::new("https://rates.test/api/v7/").unwrap();
    let pair = RatePair::new("USD", "EUR").unwrap();

    assert_eq!(
      endpoints.convert_pair(&pair).as_str(),
      "https://rates.test/api/v7/convert?q=USD_EUR,EUR_USD"
    );
    assert_eq!(
      endpoints.currencies().as_str(),
      "https://rates.test/api/v7/currencies?"
    );
  }

  #[test]
  fn test_bad_base_url() {
    assert!(Endpoints::new("not a url").is_err());
    assert!(Endpoints::new("mailto:rates@test").is_err());
  }

  #[tokio::test]
  async fn test_fetch_conversion() {
    let network = FakeNetwork::new();
    network.respond_json(
      "https://rates.test/api/convert?q=USD_EUR,EUR_USD",
      r#"{"results":{"USD_EUR":{"val":0.9},"EUR_USD":{"val":1.11}}}"#,
    );
    let client = RatesClient::new(network, Endpoints::new("https://rates.test/api").unwrap());

    let conversion = client
      .fetch_conversion(&RatePair::new("USD", "EUR").unwrap(), 100.0)
      .await
      .unwrap();

    assert_eq!(conversion.id, "USD_EUR");
    assert!((conversion.converted_amount() - 90.0).abs() < 1e-9);
  }

  #[tokio::test]
  async fn test_conversion_dated_by_response() {
    let network = FakeNetwork::new();
    network.respond_dated(
      "https://rates.test/api/convert?q=USD_EUR,EUR_USD",
      r#"{"results":{"USD_EUR":{"val":0.9},"EUR_USD":{"val":1.11}}}"#,
      "Mon, 02 Feb 2026 08:00:00 GMT",
    );
    let client = RatesClient::new(network, Endpoints::new("https://rates.test/api").unwrap());

    let conversion = client
      .fetch_conversion(&RatePair::new("USD", "EUR").unwrap(), 1.0)
      .await
      .unwrap();

    assert_eq!(conversion.date.to_rfc3339(), "2026-02-02T08:00:00+00:00");
  }

  #[tokio::test]
  async fn test_fetch_conversion_status_error() {
    let network = FakeNetwork::new();
    network.respond(
      "https://rates.test/api/convert?q=USD_EUR,EUR_USD",
      500,
      "oops",
    );
    let client = RatesClient::new(network, Endpoints::new("https://rates.test/api").unwrap());

    let err = client
      .fetch_conversion(&RatePair::new("USD", "EUR").unwrap(), 1.0)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Status { status: 500, .. }));
  }

  #[tokio::test]
  async fn test_fetch_currencies() {
    let network = FakeNetwork::new();
    network.respond_json(
      "https://rates.test/api/currencies?",
      r#"{"results":{"EUR":{"id":"EUR","currencyName":"Euro"}}}"#,
    );
    let client = RatesClient::new(network, Endpoints::new("https://rates.test/api").unwrap());

    let currencies = client.fetch_currencies().await.unwrap();
    assert_eq!(
      currencies,
      vec![Currency {
        id: "EUR".into(),
        name: "Euro".into()
      }]
    );
  }
}
