use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A currency known to the rate provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
  pub id: String, // ISO code
  pub name: String,
}

/// An ordered (from, to) currency pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RatePair {
  pub fr: String,
  pub to: String,
}

impl RatePair {
  /// Build a pair from user input, upper-casing the codes.
  pub fn new(fr: &str, to: &str) -> Result<Self> {
    Ok(Self {
      fr: normalize_code(fr)?,
      to: normalize_code(to)?,
    })
  }

  /// Conversion id, e.g. `USD_EUR`
  pub fn id(&self) -> String {
    format!("{}_{}", self.fr, self.to)
  }

  /// Id of the opposite direction, e.g. `EUR_USD`
  pub fn reverse_id(&self) -> String {
    format!("{}_{}", self.to, self.fr)
  }

  /// Value of the `q` parameter asking for both directions at once
  pub fn query(&self) -> String {
    format!("{},{}", self.id(), self.reverse_id())
  }
}

fn normalize_code(code: &str) -> Result<String> {
  let code = code.trim().to_uppercase();
  if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
    return Err(Error::InvalidInput(format!(
      "'{}' is not a currency code",
      code
    )));
  }
  Ok(code)
}

/// A saved conversion between two currencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
  pub id: String,
  pub fr: String,
  pub to: String,
  pub amount: f64,
  /// Direct rate: 1 `fr` = `dc` `to`
  pub dc: f64,
  /// Reverse rate: 1 `to` = `rc` `fr`
  pub rc: f64,
  pub date: DateTime<Utc>,
}

impl Conversion {
  pub fn pair(&self) -> RatePair {
    RatePair {
      fr: self.fr.clone(),
      to: self.to.clone(),
    }
  }

  /// Amount expressed in the target currency
  pub fn converted_amount(&self) -> f64 {
    self.dc * self.amount
  }
}

/// Amounts are always positive; the sign of user input is dropped.
pub fn normalize_amount(amount: f64) -> Result<f64> {
  if !amount.is_finite() {
    return Err(Error::InvalidInput(format!("'{}' is not an amount", amount)));
  }
  Ok(amount.abs())
}
