//! Serde-deserializable types matching the rate provider's responses.
//!
//! Parsing goes through these types and a validation step, so a missing or
//! odd field becomes `Error::MalformedResponse` instead of a panic.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Error, Result};

use super::types::{Conversion, Currency, RatePair};

// ============================================================================
// Convert endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRate {
  pub val: f64,
}

/// `GET <base>/convert?q=FROM_TO,TO_FROM`
#[derive(Debug, Deserialize)]
pub struct ApiConvertResponse {
  pub results: HashMap<String, ApiRate>,
}

impl ApiConvertResponse {
  pub fn parse(body: &[u8]) -> Result<Self> {
    serde_json::from_slice(body)
      .map_err(|e| Error::MalformedResponse(format!("convert response: {}", e)))
  }

  fn rate(&self, id: &str) -> Result<f64> {
    let rate = self
      .results
      .get(id)
      .ok_or_else(|| Error::MalformedResponse(format!("missing rate for {}", id)))?;

    if !rate.val.is_finite() {
      return Err(Error::MalformedResponse(format!(
        "rate for {} is not a number",
        id
      )));
    }
    Ok(rate.val)
  }

  /// Build the conversion record for `pair` out of both directions.
  pub fn into_conversion(
    self,
    pair: &RatePair,
    amount: f64,
    date: DateTime<Utc>,
  ) -> Result<Conversion> {
    let dc = self.rate(&pair.id())?;
    let rc = self.rate(&pair.reverse_id())?;

    Ok(Conversion {
      id: pair.id(),
      fr: pair.fr.clone(),
      to: pair.to.clone(),
      amount,
      dc,
      rc,
      date,
    })
  }
}

// ============================================================================
// Currencies endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCurrency {
  pub id: String,
  #[serde(rename = "currencyName")]
  pub currency_name: String,
}

/// `GET <base>/currencies?`
#[derive(Debug, Deserialize)]
pub struct ApiCurrenciesResponse {
  pub results: HashMap<String, ApiCurrency>,
}

impl ApiCurrenciesResponse {
  pub fn parse(body: &[u8]) -> Result<Self> {
    serde_json::from_slice(body)
      .map_err(|e| Error::MalformedResponse(format!("currencies response: {}", e)))
  }

  /// Currencies sorted by code
  pub fn into_currencies(self) -> Vec<Currency> {
    let mut currencies: Vec<Currency> = self
      .results
      .into_values()
      .map(|c| Currency {
        id: c.id,
        name: c.currency_name,
      })
      .collect();
    currencies.sort_by(|a, b| a.id.cmp(&b.id));
    currencies
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn usd_eur() -> RatePair {
    RatePair::new("USD", "EUR").unwrap()
  }

  #[test]
  fn test_convert_response_into_conversion() {
    let body = br#"{"results":{"USD_EUR":{"id":"USD_EUR","val":0.9,"to":"EUR","fr":"USD"},"EUR_USD":{"val":1.11}}}"#;
    let date = Utc::now();
    let conversion = ApiConvertResponse::parse(body)
      .unwrap()
      .into_conversion(&usd_eur(), 100.0, date)
      .unwrap();

    assert_eq!(conversion.id, "USD_EUR");
    assert_eq!(conversion.dc, 0.9);
    assert_eq!(conversion.rc, 1.11);
    assert_eq!(conversion.amount, 100.0);
    assert_eq!(conversion.date, date);
  }

  #[test]
  fn test_missing_direction_is_malformed() {
    let body = br#"{"results":{"USD_EUR":{"val":0.9}}}"#;
    let err = ApiConvertResponse::parse(body)
      .unwrap()
      .into_conversion(&usd_eur(), 1.0, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
  }

  #[test]
  fn test_wrong_shape_is_malformed() {
    for body in [
      &br#"{"status":400,"error":"bad query"}"#[..],
      &br#"{"results":{"USD_EUR":{"val":"0.9"}}}"#[..],
      &b"<html>rate limited</html>"[..],
    ] {
      assert!(matches!(
        ApiConvertResponse::parse(body),
        Err(Error::MalformedResponse(_))
      ));
    }
  }

  #[test]
  fn test_currencies_sorted_by_code() {
    let body = br#"{"results":{
      "USD":{"id":"USD","currencyName":"United States Dollar","currencySymbol":"$"},
      "AED":{"id":"AED","currencyName":"UAE Dirham"},
      "EUR":{"id":"EUR","currencyName":"Euro"}
    }}"#;
    let currencies = ApiCurrenciesResponse::parse(body)
      .unwrap()
      .into_currencies();

    let ids: Vec<&str> = currencies.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["AED", "EUR", "USD"]);
    assert_eq!(currencies[1].name, "Euro");
  }
}
