//! Request classification and cache keys.

use sha2::{Digest, Sha256};
use url::Url;

use crate::net::Request;

/// How the controller treats a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
  /// Live conversion rates: network first, dynamic cache fallback
  RateQuery,
  /// One of the precached shell assets
  ShellAsset,
  /// Anything else
  Other,
}

/// Keys under which a request is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
  /// Exact request identity (method + url)
  pub request: String,
  /// Semantic identity: equal for requests that ask the same question
  pub query: String,
}

/// Sorts requests into `RequestKind`s and computes their keys.
#[derive(Debug, Clone)]
pub struct Classifier {
  rate_query: Url,
  shell_assets: Vec<Url>,
}

impl Classifier {
  pub fn new(rate_query: Url, shell_assets: Vec<Url>) -> Self {
    Self {
      rate_query,
      shell_assets,
    }
  }

  pub fn shell_assets(&self) -> &[Url] {
    &self.shell_assets
  }

  pub fn classify(&self, request: &Request) -> RequestKind {
    if request.method == reqwest::Method::GET && same_endpoint(&request.url, &self.rate_query) {
      RequestKind::RateQuery
    } else if self
      .shell_assets
      .iter()
      .any(|asset| without_fragment(asset) == without_fragment(&request.url))
    {
      RequestKind::ShellAsset
    } else {
      RequestKind::Other
    }
  }

  pub fn key(&self, request: &Request) -> CacheKey {
    let exact = format!("{} {}", request.method, without_fragment(&request.url));
    let semantic = match self.classify(request) {
      RequestKind::RateQuery => rate_query_identity(&request.url),
      _ => exact.clone(),
    };

    CacheKey {
      request: hash(&exact),
      query: hash(&semantic),
    }
  }
}

/// `q=USD_EUR,EUR_USD` and `q=EUR_USD,USD_EUR` ask for the same rates.
fn rate_query_identity(url: &Url) -> String {
  let mut directions: Vec<String> = url
    .query_pairs()
    .filter(|(name, _)| name == "q")
    .flat_map(|(_, value)| {
      value
        .split(',')
        .map(|d| d.trim().to_uppercase())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
    })
    .collect();
  directions.sort();
  directions.dedup();

  format!("rate_query:{}:{}", endpoint_path(url), directions.join(","))
}

fn same_endpoint(a: &Url, b: &Url) -> bool {
  a.scheme() == b.scheme()
    && a.host_str() == b.host_str()
    && a.port_or_known_default() == b.port_or_known_default()
    && endpoint_path(a) == endpoint_path(b)
}

fn endpoint_path(url: &Url) -> &str {
  url.path().trim_end_matches('/')
}

fn without_fragment(url: &Url) -> String {
  let mut url = url.clone();
  url.set_fragment(None);
  url.to_string()
}

// SHA256 hash for stable, fixed-length keys
fn hash(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}
