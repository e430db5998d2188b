//! Outgoing requests, buffered responses and the network seam.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::future::Future;
use url::Url;

use crate::error::{Error, Result};

/// An outgoing HTTP request as seen by the cache worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  pub url: Url,
}

impl Request {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
    }
  }
}

/// A fully buffered response.
///
/// The body is owned bytes, so handing one copy to the caller and writing
/// another to the cache is an explicit `clone()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub url: String,
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  /// Whether the status is in the 2xx range.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Value of the `Date` header, if present and well formed.
  ///
  /// Cached responses keep their original headers, so this is when the
  /// provider produced the data.
  pub fn date(&self) -> Option<DateTime<Utc>> {
    self
      .headers
      .iter()
      .find(|(name, _)| name.eq_ignore_ascii_case("date"))
      .and_then(|(_, value)| DateTime::parse_from_rfc2822(value).ok())
      .map(|date| date.with_timezone(&Utc))
  }

  /// Turn a non-2xx response into an error.
  pub fn error_for_status(self) -> Result<Self> {
    if self.is_success() {
      Ok(self)
    } else {
      Err(Error::Status {
        url: self.url,
        status: self.status,
      })
    }
  }
}

/// Something that can perform a request.
///
/// Implemented by the real HTTP client, by the cache worker handle (so
/// requests pass through the cache controller) and by test fakes.
pub trait Network: Send + Sync {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<N: Network> Network for std::sync::Arc<N> {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send {
    (**self).fetch(request)
  }
}

/// reqwest-backed network access.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
  /// Requests under this prefix get the API key appended
  api_base: String,
  api_key: Option<String>,
}

impl HttpNetwork {
  pub fn new(api_base: &Url, api_key: Option<String>) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("convter/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self {
      client,
      api_base: api_base.as_str().trim_end_matches('/').to_string(),
      api_key,
    })
  }

  fn authorize(&self, url: &Url) -> Url {
    let mut url = url.clone();
    if let Some(key) = &self.api_key {
      if url.as_str().starts_with(&self.api_base) {
        url.query_pairs_mut().append_pair("apiKey", key);
      }
    }
    url
  }
}

impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = self.authorize(&request.url);

    let response = self
      .client
      .request(request.method.clone(), url)
      .send()
      .await?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response.bytes().await?.to_vec();

    Ok(Response {
      // Never leak the API key into cached rows
      url: request.url.to_string(),
      status,
      headers,
      body,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_api_key_only_added_to_api_requests() {
    let base = Url::parse("https://rates.test/api/v7").unwrap();
    let net = HttpNetwork::new(&base, Some("secret".into())).unwrap();

    let api = net.authorize(&Url::parse("https://rates.test/api/v7/convert?q=USD_EUR").unwrap());
    assert_eq!(
      api.as_str(),
      "https://rates.test/api/v7/convert?q=USD_EUR&apiKey=secret"
    );

    let other = net.authorize(&Url::parse("https://cdn.test/icon.png").unwrap());
    assert_eq!(other.as_str(), "https://cdn.test/icon.png");
  }

  #[test]
  fn test_date_header() {
    let mut response = Response {
      url: "https://x.test/".into(),
      status: 200,
      headers: vec![("Date".into(), "Thu, 05 Mar 2026 14:07:09 GMT".into())],
      body: Vec::new(),
    };
    assert_eq!(
      response.date().unwrap().to_rfc3339(),
      "2026-03-05T14:07:09+00:00"
    );

    response.headers = vec![("date".into(), "yesterday".into())];
    assert_eq!(response.date(), None);
  }

  #[test]
  fn test_error_for_status() {
    let ok = Response {
      url: "https://x.test/".into(),
      status: 204,
      headers: Vec::new(),
      body: Vec::new(),
    };
    assert!(ok.clone().error_for_status().is_ok());

    let failed = Response { status: 503, ..ok };
    match failed.error_for_status() {
      Err(Error::Status { status, .. }) => assert_eq!(status, 503),
      other => panic!("unexpected: {:?}", other),
    }
  }
}
