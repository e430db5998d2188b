//! Local store bindings for rate types.

use crate::store::{Collection, Record};

use super::types::{Conversion, Currency};

impl Record for Currency {
  fn record_id(&self) -> String {
    self.id.clone()
  }

  fn collection() -> Collection {
    Collection::Currencies
  }
}

impl Record for Conversion {
  fn record_id(&self) -> String {
    self.id.clone()
  }

  fn collection() -> Collection {
    Collection::Conversions
  }
}
